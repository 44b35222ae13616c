use anyhow::Result;
use colored::Colorize;
use patchkit::{BuildTarget, ForkIdentity, ForkProject, PatchSet};
use serde::Serialize;
use std::path::PathBuf;

use crate::Context;
use crate::paths;
use crate::state::{ApplyRecord, StackState};
use crate::ui;

#[derive(Debug, Serialize)]
struct StatusReport {
    root: PathBuf,
    fork: ForkIdentity,
    target: BuildTarget,
    upstream: UpstreamInfo,
    launcher: PathBuf,
    version: Option<String>,
    version_error: Option<String>,
    modules: Vec<ModuleStatus>,
}

#[derive(Debug, Serialize)]
struct UpstreamInfo {
    name: String,
    branch: String,
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ModuleStatus {
    name: String,
    patches_dir: PathBuf,
    patches: usize,
    patches_dir_exists: bool,
    working_copy: PathBuf,
    working_copy_exists: bool,
    last_apply: Option<ApplyRecord>,
}

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let project = super::load_project(ctx)?;
    let state = StackState::load(project.root())?;
    let report = collect(&project, &state)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print(&project, &report);
    }
    Ok(())
}

fn collect(project: &ForkProject, state: &StackState) -> Result<StatusReport> {
    let descriptor = project.descriptor();

    let (version, version_error) = match super::version::resolve(project) {
        Ok(resolved) => (Some(resolved.version), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let mut modules = Vec::new();
    for module in project.modules() {
        let dir = project.patches_dir(module);
        let set = PatchSet::load(&dir)?;
        let working_copy = project.project_dir(module);
        modules.push(ModuleStatus {
            name: module.name.clone(),
            patches: set.len(),
            patches_dir_exists: set.exists(),
            patches_dir: dir,
            working_copy_exists: working_copy.join(".git").exists(),
            working_copy,
            last_apply: state.last_apply(&module.name).cloned(),
        });
    }

    Ok(StatusReport {
        root: project.root().to_path_buf(),
        fork: descriptor.fork.clone(),
        target: descriptor.target.clone(),
        upstream: UpstreamInfo {
            name: descriptor.upstream.name.clone(),
            branch: descriptor.upstream.branch.clone(),
            path: project.upstream_checkout(),
        },
        launcher: project.launcher_path(),
        version,
        version_error,
        modules,
    })
}

fn print(project: &ForkProject, report: &StatusReport) {
    let root = project.root();
    ui::header(&format!("{} Status", report.fork.name));

    ui::section("Fork");
    ui::kv("Group", &report.fork.group);
    ui::kv("URL", &report.fork.url);
    match (&report.version, &report.version_error) {
        (Some(version), _) => ui::kv("Version", version),
        (None, Some(e)) => ui::kv("Version", &format!("{}", e.red())),
        (None, None) => {}
    }
    ui::kv(
        "Launcher",
        &paths::display_relative(&report.launcher, root),
    );

    let target = &report.target;
    if !target.runtime_version.is_empty() {
        ui::section("Target");
        ui::kv("Runtime", &target.runtime_version);
        ui::kv("Package", &target.package);
        ui::kv("Revision", &target.revision);
    }

    ui::section("Upstream");
    ui::kv("Name", &report.upstream.name);
    ui::kv("Branch", &report.upstream.branch);
    ui::kv(
        "Checkout",
        &paths::display_relative(&report.upstream.path, root),
    );

    ui::section("Modules");
    for module in &report.modules {
        let marker = if module.working_copy_exists {
            "✓".green()
        } else {
            "○".dimmed()
        };
        let patches = if module.patches_dir_exists {
            ui::plural(module.patches, "patch", "patches")
        } else {
            format!("{}", "no patch directory".yellow())
        };
        println!(
            "  {} {} {} {}",
            marker,
            module.name.bold(),
            patches,
            format!("→ {}", paths::display_relative(&module.working_copy, root)).dimmed()
        );
        match &module.last_apply {
            Some(record) => ui::dim(&format!("  last apply: {}", record.describe())),
            None => ui::dim("  never applied"),
        }
    }
    println!();
}
