use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use indicatif::MultiProgress;
use patchkit::{
    ApplyOptions, ApplyOutcome, ApplyReport, ForkProject, ModuleBinding, PatchApplier, PatchSet,
};
use rayon::prelude::*;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::paths;
use crate::progress::ModuleBar;
use crate::state::StackState;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let project = super::load_valid_project(ctx)?;
    let modules = super::select_modules(&project, args.module.as_deref())?;

    if args.dry_run {
        return dry_run(&project, &modules);
    }

    let git = super::git_for(&project)?;
    let applier = PatchApplier::new(&git, &project);

    if !args.yes && !confirm_discard(&applier, &modules)? {
        ui::warn("Aborted, nothing was changed");
        return Ok(());
    }

    let jobs = args.jobs.max(1);
    ui::header("Applying Patches");
    ui::kv("Modules", &modules.len().to_string());
    ui::kv("Parallel jobs", &jobs.to_string());
    println!();

    let opts = ApplyOptions {
        dry_run: false,
        abort_on_conflict: args.abort_on_conflict,
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to build thread pool")?;
    let multi = MultiProgress::new();

    let results: Vec<(String, patchkit::Result<ApplyReport>)> = pool.install(|| {
        modules
            .par_iter()
            .map(|module| {
                let mut bar = ModuleBar::new(&multi, ctx.quiet);
                let result = applier.apply_module(&module.name, opts, &mut bar);
                (module.name.clone(), result)
            })
            .collect()
    });

    let mut state = StackState::load(project.root())?;
    let mut failures = Vec::new();

    for (name, result) in results {
        match result {
            Ok(report) => {
                state.record_apply(&report);
                print_report(&project, &report);
                if report.outcome.is_conflict() {
                    failures.push(name);
                }
            }
            Err(e) => {
                ui::error(&format!("{name}: {e}"));
                ui::dim(e.category().advice());
                failures.push(name);
            }
        }
    }

    state.save(project.root())?;

    println!();
    match failures.as_slice() {
        [] => {
            ui::success("All patches applied");
            Ok(())
        }
        [single] => bail!("Module {single} did not apply cleanly"),
        many => bail!(
            "{} modules did not apply cleanly: {}",
            many.len(),
            many.join(", ")
        ),
    }
}

fn dry_run(project: &ForkProject, modules: &[&ModuleBinding]) -> Result<()> {
    ui::warn("Dry run - no changes will be made");

    for module in modules {
        let set = PatchSet::load(&project.patches_dir(module))?;
        ui::section(&format!(
            "{} ({})",
            module.name,
            ui::plural(set.len(), "patch", "patches")
        ));
        if !set.exists() {
            ui::dim("patch directory does not exist");
        }
        for patch in &set {
            println!(
                "  {} {} {}",
                "→".cyan(),
                format!("{:>4}", patch.index).dimmed(),
                patch.subject
            );
        }
    }
    Ok(())
}

/// Ask before a reset throws away uncommitted work. Returns false if declined.
fn confirm_discard(applier: &PatchApplier<'_>, modules: &[&ModuleBinding]) -> Result<bool> {
    let mut dirty = Vec::new();
    for module in modules {
        if applier.has_local_changes(&module.name)? {
            dirty.push(module.name.as_str());
        }
    }

    if dirty.is_empty() {
        return Ok(true);
    }

    ui::warn(&format!(
        "Uncommitted changes will be discarded in: {}",
        dirty.join(", ")
    ));

    let confirmed = dialoguer::Confirm::new()
        .with_prompt("Continue?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

fn print_report(project: &ForkProject, report: &ApplyReport) {
    match &report.outcome {
        ApplyOutcome::Applied { count } => {
            let head = report.head.as_deref().unwrap_or("?");
            ui::success(&format!(
                "{}: applied {} {}",
                report.module,
                ui::plural(*count, "patch", "patches"),
                format!("({head})").dimmed()
            ));
        }
        ApplyOutcome::Conflict {
            index,
            patch,
            files,
            message,
        } => {
            ui::error(&format!(
                "{}: patch #{} {} failed to apply",
                report.module, index, patch
            ));
            for file in files {
                println!("    {} {}", "✗".red(), file);
            }
            if files.is_empty() {
                for line in message.lines().take(5) {
                    ui::dim(line);
                }
            }
            let dir = project
                .module(&report.module)
                .map(|m| paths::display_relative(&project.project_dir(m), project.root()))
                .unwrap_or_else(|_| report.module.clone());
            ui::dim(&format!(
                "Resolve in {dir}, run `git am --continue`, then `patchstack rebuild {}`",
                report.module
            ));
        }
        ApplyOutcome::DryRun { count } => {
            ui::info(&format!(
                "{}: {} would be applied",
                report.module,
                ui::plural(*count, "patch", "patches")
            ));
        }
    }
}
