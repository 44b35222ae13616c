use anyhow::Result;
use colored::Colorize;
use patchkit::{RepositoryKind, repositories};

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let project = super::load_project(ctx)?;
    let resolved = repositories::resolve(&project.descriptor().repositories)?;

    ui::header("Dependency Repositories");
    for (i, repo) in resolved.iter().enumerate() {
        let kind = match repo.kind {
            RepositoryKind::Remote => repo.kind.to_string().blue(),
            RepositoryKind::Local => repo.kind.to_string().yellow(),
        };
        println!(
            "  {} {} [{}] {}",
            format!("{}.", i + 1).bold(),
            repo.name,
            kind,
            repo.location.dimmed()
        );
    }
    Ok(())
}
