use anyhow::{Result, bail};
use colored::Colorize;
use patchkit::{PatchRebuilder, RebuildReport};
use std::path::Path;

use crate::Context;
use crate::state::StackState;
use crate::ui;

pub fn run(ctx: &Context, module: Option<&str>) -> Result<()> {
    let project = super::load_valid_project(ctx)?;
    let modules = super::select_modules(&project, module)?;
    let git = super::git_for(&project)?;
    let rebuilder = PatchRebuilder::new(&git, &project);

    ui::header("Rebuilding Patches");

    let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    rebuild_all(ctx, project.root(), &names, |name| {
        rebuilder.rebuild_module(name)
    })
}

/// Rebuild every module, keep going past failures and record the ones that
/// succeeded before reporting.
fn rebuild_all<F>(ctx: &Context, root: &Path, names: &[&str], mut rebuild: F) -> Result<()>
where
    F: FnMut(&str) -> patchkit::Result<RebuildReport>,
{
    let mut state = StackState::load(root)?;
    let mut failures = Vec::new();

    for &name in names {
        match rebuild(name) {
            Ok(report) => {
                state.record_rebuild(&report);
                print_report(ctx, &report);
            }
            Err(e) => {
                ui::error(&format!("{name}: {e}"));
                ui::dim(e.category().advice());
                failures.push(name);
            }
        }
    }

    state.save(root)?;

    match failures.as_slice() {
        [] => Ok(()),
        [single] => bail!("Module {single} could not be rebuilt"),
        many => bail!(
            "{} modules could not be rebuilt: {}",
            many.len(),
            many.join(", ")
        ),
    }
}

fn print_report(ctx: &Context, report: &RebuildReport) {
    let s = report.summary;
    let counts = format!(
        "{} added, {} modified, {} removed, {} unchanged",
        s.added, s.modified, s.removed, s.unchanged
    );

    if s.has_changes() {
        ui::success(&format!("{}: {}", report.module, counts));
    } else {
        ui::info(&format!("{}: no changes {}", report.module, format!("({counts})").dimmed()));
    }

    for patch in &report.modified {
        println!("    {} {}", "~".yellow(), patch.file_name);
        if ctx.verbose > 0 {
            ui::diff(&patch.old, &patch.new);
        }
    }
}
