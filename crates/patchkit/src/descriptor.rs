//! Loading, validating and resolving `patchstack.toml`.

use crate::error::{Error, Result};
use crate::repositories::{self, MAVEN_CENTRAL, MAVEN_LOCAL};
use crate::types::{
    BuildTarget, ForkDescriptor, ForkIdentity, GitSettings, LauncherArtifact, ModuleBinding,
    UpstreamRef, normalize_relative,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the fork descriptor at the project root.
pub const DESCRIPTOR_FILE: &str = "patchstack.toml";

impl ForkDescriptor {
    /// Parse a descriptor from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::DescriptorParse {
            path: None,
            message: e.to_string(),
        })
    }

    /// Read and parse a descriptor file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let descriptor: Self = toml::from_str(&content).map_err(|e| Error::DescriptorParse {
            path: Some(path.to_path_buf()),
            message: e.to_string(),
        })?;
        log::debug!("Loaded descriptor from {}", path.display());
        Ok(descriptor)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Other(format!("serialize descriptor: {}", e)))
    }

    /// Template written by `patchstack init`.
    #[must_use]
    pub fn template(name: &str) -> Self {
        let lower = name.to_lowercase();
        Self {
            repositories: vec![MAVEN_CENTRAL.to_string(), MAVEN_LOCAL.to_string()],
            fork: ForkIdentity {
                name: name.to_string(),
                group: format!("org.{}", lower),
                url: format!("https://github.com/{0}/{0}", name),
            },
            target: BuildTarget::default(),
            upstream: UpstreamRef {
                name: "Upstream".to_string(),
                branch: "origin/master".to_string(),
                path: None,
            },
            launcher: LauncherArtifact {
                artifact: format!("launcher-{}.jar", lower),
            },
            modules: vec![
                ModuleBinding::new("api", "patches/api"),
                ModuleBinding::new("server", "patches/server"),
            ],
            git: GitSettings::default(),
        }
    }

    /// Find a module binding by name.
    pub fn module(&self, name: &str) -> Result<&ModuleBinding> {
        self.modules
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::UnknownModule(name.to_string()))
    }

    /// Validate the descriptor.
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        require("fork.name", &self.fork.name)?;
        if self
            .fork
            .name
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\')
        {
            return Err(Error::invalid(
                "fork.name",
                "must not contain whitespace or path separators",
            ));
        }
        require("fork.group", &self.fork.group)?;
        require("fork.url", &self.fork.url)?;
        require("upstream.name", &self.upstream.name)?;
        require("upstream.branch", &self.upstream.branch)?;

        self.validate_modules()?;
        repositories::resolve(&self.repositories)?;
        self.validate_launcher()?;
        Ok(())
    }

    fn validate_modules(&self) -> Result<()> {
        if self.modules.is_empty() {
            return Err(Error::invalid("modules", "at least one module is required"));
        }

        let mut names = HashSet::new();
        let mut patch_dirs = HashSet::new();
        let mut projects = HashSet::new();

        for (i, module) in self.modules.iter().enumerate() {
            let field = |name: &str| format!("modules[{}].{}", i, name);

            if module.name.is_empty()
                || !module
                    .name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
            {
                return Err(Error::invalid(
                    field("name"),
                    format!(
                        "'{}' must be a non-empty lowercase identifier",
                        module.name
                    ),
                ));
            }
            if !names.insert(module.name.as_str()) {
                return Err(Error::invalid(
                    field("name"),
                    format!("duplicate module '{}'", module.name),
                ));
            }

            let patches = normalize_relative(&module.patches);
            if patches.as_os_str().is_empty() {
                return Err(Error::invalid(field("patches"), "must not be empty"));
            }
            if patches.is_absolute() {
                return Err(Error::invalid(
                    field("patches"),
                    "must be relative to the project root",
                ));
            }
            if !patch_dirs.insert(patches.clone()) {
                return Err(Error::invalid(
                    field("patches"),
                    format!("{} is already used by another module", patches.display()),
                ));
            }

            let project = module.project_name(&self.fork);
            if !projects.insert(project.clone()) {
                return Err(Error::invalid(
                    field("project"),
                    format!("{} is already used by another module", project),
                ));
            }

            require(&field("base_ref"), &module.base_ref)?;
        }
        Ok(())
    }

    fn validate_launcher(&self) -> Result<()> {
        let artifact = &self.launcher.artifact;
        require("launcher.artifact", artifact)?;
        if artifact.contains('/') || artifact.contains('\\') {
            return Err(Error::invalid(
                "launcher.artifact",
                "must be a file name, not a path",
            ));
        }
        if !artifact.ends_with(".jar") {
            return Err(Error::invalid("launcher.artifact", "must end in .jar"));
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::invalid(field, "must not be empty"))
    } else {
        Ok(())
    }
}

// ============================================================================
// ForkProject - descriptor resolved against a root directory
// ============================================================================

/// A descriptor together with the directory it was loaded from.
#[derive(Debug, Clone)]
pub struct ForkProject {
    root: PathBuf,
    descriptor: ForkDescriptor,
}

impl ForkProject {
    /// Wrap an already loaded descriptor.
    ///
    /// A relative `root` is resolved against the current directory, since
    /// git runs inside the module working copies and must see absolute paths.
    pub fn new(root: impl Into<PathBuf>, descriptor: ForkDescriptor) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root, descriptor }
    }

    /// Load `patchstack.toml` from `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let descriptor = ForkDescriptor::load(&root.join(DESCRIPTOR_FILE))?;
        Ok(Self::new(root, descriptor))
    }

    /// Walk up from `start` to the nearest directory holding `patchstack.toml`.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = std::path::absolute(start).map_err(|e| Error::io(start, e))?;
        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            if dir.join(DESCRIPTOR_FILE).is_file() {
                log::debug!("Found project root at {}", dir.display());
                return Self::open(dir);
            }
            current = dir.parent();
        }
        Err(Error::DescriptorNotFound { start })
    }

    /// Project root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The parsed descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &ForkDescriptor {
        &self.descriptor
    }

    /// Module bindings in declaration order.
    #[must_use]
    pub fn modules(&self) -> &[ModuleBinding] {
        &self.descriptor.modules
    }

    /// Find a module binding by name.
    pub fn module(&self, name: &str) -> Result<&ModuleBinding> {
        self.descriptor.module(name)
    }

    /// Absolute patch directory of a module.
    #[must_use]
    pub fn patches_dir(&self, module: &ModuleBinding) -> PathBuf {
        self.root.join(&module.patches)
    }

    /// Absolute working copy directory of a module.
    #[must_use]
    pub fn project_dir(&self, module: &ModuleBinding) -> PathBuf {
        self.root.join(module.project_name(&self.descriptor.fork))
    }

    /// Absolute upstream source directory of a module.
    #[must_use]
    pub fn upstream_dir(&self, module: &ModuleBinding) -> PathBuf {
        self.root
            .join(module.upstream_source(&self.descriptor.upstream))
    }

    /// Absolute upstream checkout directory.
    #[must_use]
    pub fn upstream_checkout(&self) -> PathBuf {
        self.root.join(self.descriptor.upstream.checkout_path())
    }

    /// Where the packaged launcher artifact is expected.
    #[must_use]
    pub fn launcher_path(&self) -> PathBuf {
        self.root.join(&self.descriptor.launcher.artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const AIRPLANE: &str = r#"
repositories = [
  "maven-central",
  "https://repo.aikar.co/content/groups/aikar/",
  "https://nexus.velocitypowered.com/repository/velocity-artifacts-snapshots/",
  "https://libraries.minecraft.net",
  "maven-local",
]

[fork]
name = "AirplaneLite"
group = "gg.airplane"
url = "https://github.com/Technove/Airplane-Lite"

[target]
runtime_version = "1.16.5"
package = "1_16_R3"
revision = "R0.1-SNAPSHOT"

[upstream]
name = "Tuinity"
branch = "origin/master"

[launcher]
artifact = "launcher-airplanelite.jar"

[[modules]]
name = "server"
patches = "patches/server"

[[modules]]
name = "api"
patches = "patches/api"
"#;

    fn airplane() -> ForkDescriptor {
        ForkDescriptor::from_toml(AIRPLANE).unwrap()
    }

    #[test]
    fn test_parse_full_descriptor() {
        let d = airplane();
        assert_eq!(d.fork.name, "AirplaneLite");
        assert_eq!(d.target.package, "1_16_R3");
        assert_eq!(d.upstream.checkout_path(), PathBuf::from("Tuinity"));
        assert_eq!(d.modules.len(), 2);
        assert_eq!(d.modules[0].base_ref, "HEAD");
        assert_eq!(d.repositories.len(), 5);
        assert!(d.git.is_empty());
        d.validate().unwrap();
    }

    #[test]
    fn test_unknown_key_rejected() {
        let content = AIRPLANE.replace("[launcher]", "[launcher]\nbundle = true");
        let err = ForkDescriptor::from_toml(&content).unwrap_err();
        assert!(matches!(err, Error::DescriptorParse { path: None, .. }));
    }

    #[test]
    fn test_template_validates_and_round_trips() {
        let template = ForkDescriptor::template("Skyline");
        template.validate().unwrap();
        let text = template.to_toml().unwrap();
        assert_eq!(ForkDescriptor::from_toml(&text).unwrap(), template);
    }

    #[test]
    fn test_validate_rejects_shared_patch_dir() {
        let mut d = airplane();
        d.modules[1].patches = PathBuf::from("./patches/server/");
        let err = d.validate().unwrap_err();
        assert!(err.to_string().contains("modules[1].patches"));
    }

    #[test]
    fn test_validate_rejects_duplicate_module() {
        let mut d = airplane();
        d.modules[1].name = "server".into();
        assert!(d.validate().unwrap_err().to_string().contains("duplicate module"));
    }

    #[test]
    fn test_validate_rejects_shared_project_dir() {
        let mut d = airplane();
        d.modules[1].project = Some("airplanelite-server".into());
        assert!(d.validate().unwrap_err().to_string().contains("modules[1].project"));
    }

    #[test]
    fn test_validate_rejects_bad_fork_name() {
        let mut d = airplane();
        d.fork.name = "Airplane Lite".into();
        assert!(d.validate().unwrap_err().to_string().contains("fork.name"));
    }

    #[test]
    fn test_validate_rejects_empty_repositories() {
        let mut d = airplane();
        d.repositories.clear();
        assert!(d.validate().unwrap_err().to_string().contains("repositories"));
    }

    #[test]
    fn test_validate_rejects_bad_launcher() {
        let mut d = airplane();
        d.launcher.artifact = "build/launcher.jar".into();
        assert!(d.validate().is_err());
        d.launcher.artifact = "launcher.zip".into();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_no_modules() {
        let mut d = airplane();
        d.modules.clear();
        assert!(d.validate().unwrap_err().to_string().contains("modules"));
    }

    #[test]
    fn test_module_lookup() {
        let d = airplane();
        assert_eq!(d.module("api").unwrap().patches, PathBuf::from("patches/api"));
        assert!(matches!(d.module("web"), Err(Error::UnknownModule(_))));
    }

    #[test]
    fn test_project_paths() {
        let project = ForkProject::new("/work/fork", airplane());
        let server = project.module("server").unwrap();
        assert_eq!(
            project.patches_dir(server),
            PathBuf::from("/work/fork/patches/server")
        );
        assert_eq!(
            project.project_dir(server),
            PathBuf::from("/work/fork/airplanelite-server")
        );
        assert_eq!(
            project.upstream_dir(server),
            PathBuf::from("/work/fork/Tuinity/Tuinity-Server")
        );
        assert_eq!(
            project.launcher_path(),
            PathBuf::from("/work/fork/launcher-airplanelite.jar")
        );
    }

    #[test]
    fn test_discover_walks_up() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(DESCRIPTOR_FILE), AIRPLANE).unwrap();
        let nested = tmp.path().join("airplanelite-server").join("src");
        fs::create_dir_all(&nested).unwrap();

        let project = ForkProject::discover(&nested).unwrap();
        assert_eq!(project.root(), tmp.path());
        assert_eq!(project.descriptor().fork.name, "AirplaneLite");
    }

    #[test]
    fn test_discover_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = ForkProject::discover(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::DescriptorNotFound { .. }));
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DESCRIPTOR_FILE);
        fs::write(&path, "[fork]\nname = ").unwrap();
        let err = ForkDescriptor::load(&path).unwrap_err();
        assert!(matches!(err, Error::DescriptorParse { path: Some(_), .. }));
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let project = ForkProject::new("fork", ForkDescriptor::template("Demo"));
        assert!(project.root().is_absolute());
        assert!(project.root().ends_with("fork"));

        let server = project.module("server").unwrap();
        assert!(project.patches_dir(server).is_absolute());
        assert!(project.project_dir(server).is_absolute());
        assert!(project.upstream_dir(server).is_absolute());
    }
}
