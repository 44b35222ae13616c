//! Build version derivation.
//!
//! The version is `git-<fork>-<tag>`. The tag is `BUILD_NUMBER` verbatim
//! when that variable is set, otherwise the quoted short revision of the
//! project checkout.

use crate::backend::{GitBackend, Repo};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Environment variable holding the CI build number.
pub const BUILD_NUMBER_ENV: &str = "BUILD_NUMBER";

/// Produces the short revision hash of a checkout.
pub trait RevisionSource {
    /// Short revision, e.g. `a1b2c3d`.
    fn short_revision(&self) -> Result<String>;
}

/// Revision source backed by `git rev-parse --short HEAD`.
pub struct GitRevision<'a> {
    repo: Repo<'a>,
}

impl<'a> GitRevision<'a> {
    /// Read the revision of the repository containing `dir`.
    pub fn new(git: &'a dyn GitBackend, dir: &Path) -> Self {
        Self {
            repo: Repo::new(git, dir),
        }
    }
}

impl RevisionSource for GitRevision<'_> {
    fn short_revision(&self) -> Result<String> {
        let rev = self.repo.short_head().map_err(|e| match e {
            Error::Git { stderr, .. } => Error::RevisionLookup(stderr),
            other => Error::RevisionLookup(other.to_string()),
        })?;
        if rev.is_empty() {
            return Err(Error::RevisionLookup("git returned an empty revision".into()));
        }
        Ok(rev)
    }
}

/// Where the version tag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    /// `BUILD_NUMBER` was set.
    BuildNumber,
    /// Fallback to the source revision.
    Revision,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildNumber => write!(f, "{}", BUILD_NUMBER_ENV),
            Self::Revision => write!(f, "git revision"),
        }
    }
}

/// A derived build version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    /// Tag component.
    pub tag: String,
    /// Origin of the tag.
    pub source: VersionSource,
    /// Full version string.
    pub version: String,
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}

/// Version prefix for a fork, `git-<fork>-`.
#[must_use]
pub fn version_prefix(fork_name: &str) -> String {
    format!("git-{}-", fork_name)
}

/// Derive the version.
///
/// `revision` is only consulted when `build_number` is `None`. A set but
/// empty build number is still used verbatim.
pub fn resolve(
    fork_name: &str,
    build_number: Option<&str>,
    revision: &dyn RevisionSource,
) -> Result<ResolvedVersion> {
    let (tag, source) = match build_number {
        Some(number) => (number.to_string(), VersionSource::BuildNumber),
        None => (
            format!("\"{}\"", revision.short_revision()?),
            VersionSource::Revision,
        ),
    };

    let version = format!("{}{}", version_prefix(fork_name), tag);
    log::debug!("Resolved version {} from {}", version, source);
    Ok(ResolvedVersion {
        tag,
        source,
        version,
    })
}

/// Derive the version reading `BUILD_NUMBER` from the process environment.
pub fn resolve_from_env(fork_name: &str, revision: &dyn RevisionSource) -> Result<ResolvedVersion> {
    let build_number = std::env::var_os(BUILD_NUMBER_ENV).map(|v| v.to_string_lossy().into_owned());
    resolve(fork_name, build_number.as_deref(), revision)
}
