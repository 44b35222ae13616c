use anyhow::{Context as _, Result, bail};
use patchkit::{DESCRIPTOR_FILE, ForkDescriptor, ForkProject};
use std::fs;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::InitArgs;
use crate::paths;
use crate::ui;

pub fn run(ctx: &Context, args: InitArgs) -> Result<()> {
    let dir = match args.path {
        Some(path) => path,
        None => paths::search_start(ctx.root.as_deref())?,
    };

    let name = match args.name {
        Some(name) => name,
        None => default_name(&dir)?,
    };

    let file = dir.join(DESCRIPTOR_FILE);
    if file.exists() {
        if !args.force {
            bail!(
                "{} already exists (use --force to overwrite)",
                file.display()
            );
        }
        if !args.yes && !confirm_overwrite(&file)? {
            ui::warn("Aborted, nothing was changed");
            return Ok(());
        }
    }

    let project = write_project(&dir, &name)?;

    ui::success(&format!("Created {}", file.display()));
    for module in project.modules() {
        ui::dim(&format!(
            "{} → {}",
            module.name,
            paths::display_relative(&project.patches_dir(module), project.root())
        ));
    }
    ui::info("Edit [upstream] and [[modules]] before running `patchstack apply`");
    Ok(())
}

/// Fork name derived from the directory name
fn default_name(dir: &Path) -> Result<String> {
    let absolute = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Could not determine current directory")?
            .join(dir)
    };
    absolute
        .file_name()
        .map(|n| n.to_string_lossy().replace(char::is_whitespace, "-"))
        .context("Cannot derive a fork name from the directory, pass --name")
}

/// Write the template descriptor and create the module patch directories
fn write_project(dir: &Path, name: &str) -> Result<ForkProject> {
    let descriptor = ForkDescriptor::template(name);
    descriptor
        .validate()
        .with_context(|| format!("'{name}' is not a usable fork name"))?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let file: PathBuf = dir.join(DESCRIPTOR_FILE);
    fs::write(&file, descriptor.to_toml()?)
        .with_context(|| format!("Failed to write {}", file.display()))?;

    let project = ForkProject::new(dir, descriptor);
    for module in project.modules() {
        let patches = project.patches_dir(module);
        fs::create_dir_all(&patches)
            .with_context(|| format!("Failed to create {}", patches.display()))?;
    }
    Ok(project)
}

fn confirm_overwrite(file: &Path) -> Result<bool> {
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(format!("Overwrite {}?", file.display()))
        .default(false)
        .interact()?;
    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_project_round_trips() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("AirplaneLite");

        write_project(&dir, "AirplaneLite").unwrap();

        assert!(dir.join("patches/api").is_dir());
        assert!(dir.join("patches/server").is_dir());

        let project = ForkProject::open(&dir).unwrap();
        project.descriptor().validate().unwrap();
        assert_eq!(project.descriptor().fork.name, "AirplaneLite");
        assert_eq!(
            project.descriptor().launcher.artifact,
            "launcher-airplanelite.jar"
        );
    }

    #[test]
    fn test_write_project_rejects_bad_name() {
        let tmp = TempDir::new().unwrap();
        assert!(write_project(tmp.path(), "has space").is_err());
        assert!(!tmp.path().join(DESCRIPTOR_FILE).exists());
    }

    #[test]
    fn test_default_name_from_directory() {
        assert_eq!(default_name(Path::new("/srv/My Fork")).unwrap(), "My-Fork");
        assert_eq!(default_name(Path::new("/srv/demo")).unwrap(), "demo");
    }
}
