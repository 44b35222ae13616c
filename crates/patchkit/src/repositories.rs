//! Dependency repository list.
//!
//! Entries are either aliases (`maven-central`, `maven-local`) or URLs.
//! Resolution keeps the declared order because order is precedence.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Alias for the central Maven repository.
pub const MAVEN_CENTRAL: &str = "maven-central";

/// Alias for the local Maven repository under the home directory.
pub const MAVEN_LOCAL: &str = "maven-local";

const MAVEN_CENTRAL_URL: &str = "https://repo.maven.apache.org/maven2/";

/// Where a repository lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    /// Reached over http(s).
    Remote,
    /// A directory on this machine.
    Local,
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// A resolved dependency repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    /// Short display name (alias or URL host).
    pub name: String,
    /// Fully expanded location.
    pub location: String,
    /// Remote or local.
    pub kind: RepositoryKind,
}

/// Resolve every entry, preserving order.
///
/// Fails on an empty list, an unrecognised entry or a duplicate location.
pub fn resolve(entries: &[String]) -> Result<Vec<Repository>> {
    if entries.is_empty() {
        return Err(Error::invalid(
            "repositories",
            "at least one repository is required",
        ));
    }

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let repo = resolve_entry(entry)
            .map_err(|message| Error::invalid(format!("repositories[{}]", i), message))?;

        if !seen.insert(repo.location.clone()) {
            return Err(Error::invalid(
                format!("repositories[{}]", i),
                format!("duplicate repository {}", repo.location),
            ));
        }
        resolved.push(repo);
    }

    log::debug!("Resolved {} repositories", resolved.len());
    Ok(resolved)
}

fn resolve_entry(entry: &str) -> std::result::Result<Repository, String> {
    let entry = entry.trim();
    match entry {
        "" => Err("empty repository entry".to_string()),
        MAVEN_CENTRAL => Ok(Repository {
            name: MAVEN_CENTRAL.to_string(),
            location: MAVEN_CENTRAL_URL.to_string(),
            kind: RepositoryKind::Remote,
        }),
        MAVEN_LOCAL => {
            let home = dirs::home_dir().ok_or("could not determine home directory")?;
            let path = home.join(".m2").join("repository");
            Ok(Repository {
                name: MAVEN_LOCAL.to_string(),
                location: format!("file://{}/", path.display()),
                kind: RepositoryKind::Local,
            })
        }
        url => {
            let (kind, rest) = if let Some(rest) = url.strip_prefix("https://") {
                (RepositoryKind::Remote, rest)
            } else if let Some(rest) = url.strip_prefix("http://") {
                (RepositoryKind::Remote, rest)
            } else if let Some(rest) = url.strip_prefix("file://") {
                (RepositoryKind::Local, rest)
            } else {
                return Err(format!(
                    "'{}' is neither a known alias ({}, {}) nor an http(s):// or file:// URL",
                    url, MAVEN_CENTRAL, MAVEN_LOCAL
                ));
            };

            let name = match kind {
                RepositoryKind::Remote => {
                    let host = rest.split('/').next().unwrap_or_default();
                    if host.is_empty() {
                        return Err(format!("'{}' has no host", url));
                    }
                    host.to_string()
                }
                RepositoryKind::Local => "local".to_string(),
            };

            Ok(Repository {
                name,
                location: url.to_string(),
                kind,
            })
        }
    }
}
