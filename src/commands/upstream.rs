use anyhow::Result;
use colored::Colorize;
use patchkit::upstream::commit_message;
use patchkit::{UpstreamManager, UpstreamStatus};

use crate::Context;
use crate::cli::UpstreamCommand;
use crate::paths;
use crate::progress;
use crate::ui;

pub fn run(ctx: &Context, cmd: UpstreamCommand) -> Result<()> {
    match cmd {
        UpstreamCommand::Status => status(ctx),
        UpstreamCommand::Update { commit } => update(ctx, commit),
    }
}

fn status(ctx: &Context) -> Result<()> {
    let project = super::load_project(ctx)?;
    let git = super::git_for(&project)?;
    let status = UpstreamManager::new(&git, &project).status()?;
    print_status(&status, project.root());
    Ok(())
}

fn print_status(status: &UpstreamStatus, root: &std::path::Path) {
    ui::header(&format!("Upstream {}", status.name));
    ui::kv("Checkout", &paths::display_relative(&status.path, root));
    ui::kv("Branch", &status.branch);
    match &status.revision {
        Some(rev) => ui::kv("Revision", rev),
        None => ui::kv("Revision", &format!("{}", "not checked out".yellow())),
    }
}

fn update(ctx: &Context, commit: bool) -> Result<()> {
    let project = super::load_valid_project(ctx)?;
    let git = super::git_for(&project)?;
    let manager = UpstreamManager::new(&git, &project);
    let name = &project.descriptor().upstream.name;

    let spinner = if ctx.quiet {
        indicatif::ProgressBar::hidden()
    } else {
        progress::spinner(&format!("Updating {name}"))
    };
    let result = manager.update();
    spinner.finish_and_clear();
    let update = result?;

    if !update.changed() {
        ui::success(&format!("{name} is up to date ({})", update.new));
        return Ok(());
    }

    ui::success(&format!(
        "{name}: {} → {}",
        update.old.as_deref().unwrap_or("none"),
        update.new
    ));
    for line in &update.log {
        ui::dim(line);
    }

    let message = commit_message(name, &update.log);
    if commit {
        manager.commit(&message)?;
        ui::success("Committed upstream update");
    } else {
        log::info!("Commit message:\n{message}");
        ui::info("Run with --commit to record the update");
    }
    Ok(())
}
