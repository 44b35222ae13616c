use anyhow::{Context as _, Result};
use colored::Colorize;
use patchkit::version::{self, GitRevision};
use patchkit::{CliGit, ForkProject, ResolvedVersion, RevisionSource};
use std::path::Path;

use crate::Context;

/// Revision source that only looks for git when the tag needs it
pub struct ProjectRevision<'a> {
    root: &'a Path,
}

impl<'a> ProjectRevision<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }
}

impl RevisionSource for ProjectRevision<'_> {
    fn short_revision(&self) -> patchkit::Result<String> {
        let git = CliGit::new()?;
        GitRevision::new(&git, self.root).short_revision()
    }
}

/// Version of `project` from `BUILD_NUMBER` or the checkout revision
pub fn resolve(project: &ForkProject) -> patchkit::Result<ResolvedVersion> {
    let revision = ProjectRevision::new(project.root());
    version::resolve_from_env(&project.descriptor().fork.name, &revision)
}

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let project = super::load_project(ctx)?;
    let resolved = resolve(&project).context("Could not derive the build version")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else if ctx.quiet {
        println!("{}", resolved.version);
    } else {
        println!(
            "{} {}",
            resolved.version.bold(),
            format!("(from {})", resolved.source).dimmed()
        );
    }
    Ok(())
}
