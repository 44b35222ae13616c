use anyhow::{Result, bail};
use colored::Colorize;
use patchkit::version::{self, BUILD_NUMBER_ENV};
use patchkit::types::normalize_relative;
use patchkit::{CliGit, ForkProject, PatchSet, RevisionSource, repositories};
use std::collections::HashSet;

use super::version::ProjectRevision;
use crate::Context;
use crate::paths;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug)]
struct Check {
    name: String,
    status: Status,
    detail: Option<String>,
}

impl Check {
    fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::Pass,
            detail: None,
        }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::Fail,
            detail: Some(detail.into()),
        }
    }

    fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::Warn,
            detail: Some(detail.into()),
        }
    }
}

/// Inputs that come from outside the project
struct Environment<'a> {
    build_number: Option<String>,
    revision: &'a dyn RevisionSource,
    git_available: bool,
}

pub fn run(ctx: &Context) -> Result<()> {
    let project = super::load_project(ctx)?;
    let revision = ProjectRevision::new(project.root());
    let env = Environment {
        build_number: std::env::var_os(BUILD_NUMBER_ENV)
            .map(|v| v.to_string_lossy().into_owned()),
        revision: &revision,
        git_available: CliGit::is_available(),
    };

    ui::header("Project Checks");
    ui::kv("Root", &project.root().display().to_string());
    println!();

    let checks = run_checks(&project, &env);
    for check in &checks {
        let symbol = match check.status {
            Status::Pass => "✓".green(),
            Status::Warn => "⚠".yellow(),
            Status::Fail => "✗".red(),
        };
        println!("  {} {}", symbol, check.name);
        if let Some(detail) = &check.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
    }

    let failed = checks.iter().filter(|c| c.status == Status::Fail).count();
    let warned = checks.iter().filter(|c| c.status == Status::Warn).count();

    println!();
    if failed > 0 {
        bail!("{} failed", ui::plural(failed, "check", "checks"));
    }
    if warned > 0 {
        ui::warn(&format!(
            "All checks passed with {}",
            ui::plural(warned, "warning", "warnings")
        ));
    } else {
        ui::success("All checks passed");
    }
    Ok(())
}

fn run_checks(project: &ForkProject, env: &Environment<'_>) -> Vec<Check> {
    let descriptor = project.descriptor();
    let mut checks = Vec::new();

    // descriptor
    checks.push(match descriptor.validate() {
        Ok(()) => Check::pass("patchstack.toml is valid"),
        Err(e) => Check::fail("patchstack.toml is valid", e.to_string()),
    });

    // patch directories
    let mut seen = HashSet::new();
    for module in project.modules() {
        let dir = project.patches_dir(module);
        let shown = paths::display_relative(&dir, project.root());
        let name = format!("module {} has patch directory {}", module.name, shown);

        if !seen.insert(normalize_relative(&module.patches)) {
            checks.push(Check::fail(name, "directory is shared with another module"));
            continue;
        }
        checks.push(match PatchSet::load_existing(&dir) {
            Ok(set) => Check::pass(format!(
                "{name} ({})",
                ui::plural(set.len(), "patch", "patches")
            )),
            Err(e) => Check::fail(name, e.to_string()),
        });
    }

    // repositories
    let name = "repository list is non-empty and order-stable";
    checks.push(
        match (
            repositories::resolve(&descriptor.repositories),
            repositories::resolve(&descriptor.repositories),
        ) {
            (Ok(first), Ok(second)) if first == second => Check::pass(format!(
                "{name} ({})",
                ui::plural(first.len(), "repository", "repositories")
            )),
            (Ok(_), Ok(_)) => Check::fail(name, "resolving twice gave different lists"),
            (Err(e), _) | (_, Err(e)) => Check::fail(name, e.to_string()),
        },
    );

    // version
    checks.push(check_version(project, env));

    // git
    checks.push(if env.git_available {
        Check::pass("git is on PATH")
    } else {
        Check::fail("git is on PATH", "install git to apply or rebuild patches")
    });

    // upstream checkouts
    for module in project.modules() {
        let dir = project.upstream_dir(module);
        let shown = paths::display_relative(&dir, project.root());
        let name = format!("upstream for {} exists at {}", module.name, shown);
        checks.push(if dir.is_dir() {
            Check::pass(name)
        } else {
            Check::warn(name, "run `patchstack upstream update` to populate it")
        });
    }

    checks
}

/// A revision already looked up
struct KnownRevision(String);

impl RevisionSource for KnownRevision {
    fn short_revision(&self) -> patchkit::Result<String> {
        Ok(self.0.clone())
    }
}

fn check_version(project: &ForkProject, env: &Environment<'_>) -> Check {
    let name = "build version follows git-<fork>-<tag>";
    let fork = &project.descriptor().fork.name;
    let prefix = version::version_prefix(fork);

    if let Some(number) = env.build_number.as_deref() {
        return match version::resolve(fork, Some(number), env.revision) {
            Ok(resolved) if resolved.version == format!("{prefix}{number}") => {
                Check::pass(format!("{name} ({})", resolved.version))
            }
            Ok(resolved) => Check::fail(
                name,
                format!(
                    "{BUILD_NUMBER_ENV}={number} should give {prefix}{number}, got {}",
                    resolved.version
                ),
            ),
            Err(e) => Check::fail(name, e.to_string()),
        };
    }

    let revision = match env.revision.short_revision() {
        Ok(rev) => rev,
        Err(e) => return Check::fail(name, e.to_string()),
    };
    match version::resolve(fork, None, &KnownRevision(revision.clone())) {
        Ok(resolved) if resolved.version == format!("{prefix}\"{revision}\"") => {
            Check::pass(format!("{name} ({})", resolved.version))
        }
        Ok(resolved) => Check::fail(
            name,
            format!(
                "{} does not carry revision {revision}",
                resolved.version
            ),
        ),
        Err(e) => Check::fail(name, e.to_string()),
    }
}
