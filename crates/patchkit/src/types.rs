//! Core types for fork descriptors.
//!
//! These mirror the sections of `patchstack.toml`. Everything here is
//! static configuration: read once, never mutated by an operation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Ref in an upstream module checkout that patches are applied onto.
pub const DEFAULT_BASE_REF: &str = "HEAD";

/// The full fork descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForkDescriptor {
    /// Ordered dependency source locations (aliases or URLs).
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Fork identity.
    pub fork: ForkIdentity,

    /// Platform the fork targets.
    #[serde(default)]
    pub target: BuildTarget,

    /// Tracked upstream project.
    pub upstream: UpstreamRef,

    /// Packaged launcher artifact.
    pub launcher: LauncherArtifact,

    /// Module bindings, in declaration order.
    #[serde(default)]
    pub modules: Vec<ModuleBinding>,

    /// Optional git settings.
    #[serde(default, skip_serializing_if = "GitSettings::is_empty")]
    pub git: GitSettings,
}

/// Identity metadata of the fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForkIdentity {
    /// Fork name, e.g. `AirplaneLite`.
    pub name: String,
    /// Group id, e.g. `gg.airplane`.
    pub group: String,
    /// Source URL of the fork.
    pub url: String,
}

impl ForkIdentity {
    /// Lowercase fork name, used for default module project directories.
    #[must_use]
    pub fn lowercase_name(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Runtime/platform the fork is built against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildTarget {
    /// Platform version, e.g. `1.16.5`.
    #[serde(default)]
    pub runtime_version: String,
    /// Internal package revision tag, e.g. `1_16_R3`.
    #[serde(default)]
    pub package: String,
    /// Internal artifact revision, e.g. `R0.1-SNAPSHOT`.
    #[serde(default)]
    pub revision: String,
}

/// Reference to the upstream project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamRef {
    /// Upstream project name, e.g. `Tuinity`.
    pub name: String,
    /// Branch tracked when updating, e.g. `origin/master`.
    pub branch: String,
    /// Checkout directory relative to the project root. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl UpstreamRef {
    /// Checkout directory relative to the project root.
    #[must_use]
    pub fn checkout_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.name))
    }
}

/// The single packaged launcher file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherArtifact {
    /// File name, e.g. `launcher-airplanelite.jar`.
    pub artifact: String,
}

/// Binds a trackable module to its patch directory and working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleBinding {
    /// Module name, e.g. `api` or `server`.
    pub name: String,

    /// Patch directory relative to the project root.
    pub patches: PathBuf,

    /// Working copy directory. Defaults to `<fork lowercase>-<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Upstream source of this module, relative to the project root.
    /// Defaults to `<upstream checkout>/<Upstream>-<Name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_dir: Option<PathBuf>,

    /// Ref in the upstream module source to apply onto.
    #[serde(default = "default_base_ref")]
    pub base_ref: String,
}

fn default_base_ref() -> String {
    DEFAULT_BASE_REF.to_string()
}

impl ModuleBinding {
    /// Create a binding with default project, upstream dir and base ref.
    pub fn new(name: impl Into<String>, patches: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            patches: patches.into(),
            project: None,
            upstream_dir: None,
            base_ref: default_base_ref(),
        }
    }

    /// Working copy directory name.
    #[must_use]
    pub fn project_name(&self, fork: &ForkIdentity) -> String {
        self.project
            .clone()
            .unwrap_or_else(|| format!("{}-{}", fork.lowercase_name(), self.name))
    }

    /// Upstream module source, relative to the project root.
    #[must_use]
    pub fn upstream_source(&self, upstream: &UpstreamRef) -> PathBuf {
        match &self.upstream_dir {
            Some(dir) => dir.clone(),
            None => upstream
                .checkout_path()
                .join(format!("{}-{}", upstream.name, capitalize(&self.name))),
        }
    }
}

/// Optional git settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSettings {
    /// Committer name used when applying patches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer_name: Option<String>,
    /// Committer email used when applying patches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer_email: Option<String>,
}

impl GitSettings {
    /// Whether no setting is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.committer_name.is_none() && self.committer_email.is_none()
    }

    /// Committer identity, only when both name and email are set.
    #[must_use]
    pub fn identity(&self) -> Option<(&str, &str)> {
        match (&self.committer_name, &self.committer_email) {
            (Some(name), Some(email)) => Some((name.as_str(), email.as_str())),
            _ => None,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Normalize a relative path for comparison (drops `.` and trailing separators).
pub fn normalize_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fork() -> ForkIdentity {
        ForkIdentity {
            name: "AirplaneLite".into(),
            group: "gg.airplane".into(),
            url: "https://github.com/Technove/Airplane-Lite".into(),
        }
    }

    fn upstream() -> UpstreamRef {
        UpstreamRef {
            name: "Tuinity".into(),
            branch: "origin/master".into(),
            path: None,
        }
    }

    #[test]
    fn test_default_project_name() {
        let module = ModuleBinding::new("server", "patches/server");
        assert_eq!(module.project_name(&fork()), "airplanelite-server");
    }

    #[test]
    fn test_explicit_project_name() {
        let mut module = ModuleBinding::new("api", "patches/api");
        module.project = Some("Airplane-API".into());
        assert_eq!(module.project_name(&fork()), "Airplane-API");
    }

    #[test]
    fn test_default_upstream_source() {
        let module = ModuleBinding::new("server", "patches/server");
        assert_eq!(
            module.upstream_source(&upstream()),
            PathBuf::from("Tuinity/Tuinity-Server")
        );
    }

    #[test]
    fn test_upstream_source_with_custom_checkout() {
        let mut up = upstream();
        up.path = Some(PathBuf::from("vendor/tuinity"));
        let module = ModuleBinding::new("api", "patches/api");
        assert_eq!(
            module.upstream_source(&up),
            PathBuf::from("vendor/tuinity/Tuinity-Api")
        );
    }

    #[test]
    fn test_git_identity_requires_both() {
        let mut git = GitSettings::default();
        assert!(git.is_empty());
        git.committer_name = Some("bot".into());
        assert!(git.identity().is_none());
        git.committer_email = Some("bot@example.com".into());
        assert_eq!(git.identity(), Some(("bot", "bot@example.com")));
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(
            normalize_relative(Path::new("./patches/api/")),
            PathBuf::from("patches/api")
        );
    }
}
