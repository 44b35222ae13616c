pub mod apply;
pub mod check;
pub mod init;
pub mod rebuild;
pub mod repos;
pub mod status;
pub mod upstream;
pub mod version;

use anyhow::{Context as _, Result, bail};
use patchkit::{CliGit, ForkProject, ModuleBinding};

use crate::Context;
use crate::paths;

/// Locate and load the project the command operates on
pub fn load_project(ctx: &Context) -> Result<ForkProject> {
    let start = paths::search_start(ctx.root.as_deref())?;
    let project = ForkProject::discover(&start)
        .with_context(|| format!("No fork project found from {}", start.display()))?;
    log::debug!("Project root: {}", project.root().display());
    Ok(project)
}

/// Load the project and fail if its descriptor is invalid
pub fn load_valid_project(ctx: &Context) -> Result<ForkProject> {
    let project = load_project(ctx)?;
    project
        .descriptor()
        .validate()
        .context("patchstack.toml is invalid")?;
    Ok(project)
}

/// Git backend configured with the descriptor's committer identity
pub fn git_for(project: &ForkProject) -> Result<CliGit> {
    let git = CliGit::new()?;
    Ok(match project.descriptor().git.identity() {
        Some((name, email)) => git.with_identity(name, email),
        None => git,
    })
}

/// Modules selected by an optional name filter, in descriptor order
pub fn select_modules<'a>(
    project: &'a ForkProject,
    filter: Option<&str>,
) -> Result<Vec<&'a ModuleBinding>> {
    match filter {
        Some(name) => Ok(vec![project.module(name)?]),
        None => {
            let modules: Vec<_> = project.modules().iter().collect();
            if modules.is_empty() {
                bail!("No modules declared in patchstack.toml");
            }
            Ok(modules)
        }
    }
}
