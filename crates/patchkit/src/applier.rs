//! Sequential patch application.
//!
//! Every run starts by resetting the module working copy onto the upstream
//! base, so applying twice yields the same history. Patches are applied one
//! by one with `git am --3way`; the first one that fails stops the run and
//! is reported with the paths it left conflicted.

use crate::backend::{GitBackend, Repo, UPSTREAM_BRANCH, UPSTREAM_REMOTE, WORK_BRANCH};
use crate::descriptor::ForkProject;
use crate::error::{Error, Result};
use crate::patches::{PatchFile, PatchSet};
use crate::types::ModuleBinding;
use serde::Serialize;
use std::fs;

/// Receives progress while a module is applied.
pub trait ApplyProgress {
    /// Application of `total` patches is about to start.
    fn on_start(&mut self, _module: &str, _total: usize) {}

    /// `patch` is about to be applied.
    fn on_patch(&mut self, _module: &str, _patch: &PatchFile) {}

    /// The module finished (successfully or not).
    fn on_finish(&mut self, _module: &str, _outcome: &ApplyOutcome) {}

    /// The module stopped with an error after [`on_start`](Self::on_start).
    fn on_error(&mut self, _module: &str, _error: &Error) {}
}

/// Progress sink that ignores everything.
pub struct NoProgress;

impl ApplyProgress for NoProgress {}

/// Options for [`PatchApplier::apply_module`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// List what would be applied without touching git.
    pub dry_run: bool,
    /// Run `git am --abort` after a conflict instead of leaving it for
    /// manual resolution.
    pub abort_on_conflict: bool,
}

/// How a module application ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// All patches applied.
    Applied {
        /// Number of patches applied.
        count: usize,
    },
    /// A patch failed.
    Conflict {
        /// 1-based index of the failing patch.
        index: usize,
        /// File name of the failing patch.
        patch: String,
        /// Paths with unresolved conflicts.
        files: Vec<String>,
        /// git's error output.
        message: String,
    },
    /// Nothing was done.
    DryRun {
        /// Number of patches that would be applied.
        count: usize,
    },
}

impl ApplyOutcome {
    /// Whether the outcome is a conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result of applying one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Module name.
    pub module: String,
    /// Outcome.
    pub outcome: ApplyOutcome,
    /// Short HEAD of the working copy afterwards (not for dry runs).
    pub head: Option<String>,
}

impl ApplyReport {
    /// Turn a conflict into `Error::PatchConflict`.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            ApplyOutcome::Conflict {
                index,
                patch,
                files,
                ..
            } => Err(Error::PatchConflict {
                module: self.module,
                index,
                patch,
                files,
            }),
            _ => Ok(self),
        }
    }
}

/// Applies module patch sets onto their upstream base.
pub struct PatchApplier<'a> {
    git: &'a dyn GitBackend,
    project: &'a ForkProject,
}

impl<'a> PatchApplier<'a> {
    /// Create an applier for `project`.
    pub fn new(git: &'a dyn GitBackend, project: &'a ForkProject) -> Self {
        Self { git, project }
    }

    /// Whether the module working copy has uncommitted changes that a reset
    /// would discard.
    pub fn has_local_changes(&self, module: &str) -> Result<bool> {
        let binding = self.project.module(module)?;
        let repo = Repo::new(self.git, self.project.project_dir(binding));
        if !repo.exists() {
            return Ok(false);
        }
        repo.is_dirty()
    }

    /// Apply the patch set of `module`.
    pub fn apply_module(
        &self,
        module: &str,
        opts: ApplyOptions,
        progress: &mut dyn ApplyProgress,
    ) -> Result<ApplyReport> {
        let binding = self.project.module(module)?;
        let patches = PatchSet::load(&self.project.patches_dir(binding))?;
        progress.on_start(module, patches.len());

        if opts.dry_run {
            let outcome = ApplyOutcome::DryRun {
                count: patches.len(),
            };
            progress.on_finish(module, &outcome);
            return Ok(ApplyReport {
                module: module.to_string(),
                outcome,
                head: None,
            });
        }

        let result = self.reset_and_apply(module, binding, &patches, opts, progress);
        match &result {
            Ok(report) => progress.on_finish(module, &report.outcome),
            Err(e) => progress.on_error(module, e),
        }
        result
    }

    fn reset_and_apply(
        &self,
        module: &str,
        binding: &ModuleBinding,
        patches: &PatchSet,
        opts: ApplyOptions,
        progress: &mut dyn ApplyProgress,
    ) -> Result<ApplyReport> {
        let upstream = self.project.upstream_dir(binding);
        if !upstream.is_dir() {
            return Err(Error::UpstreamMissing(upstream));
        }

        let work_dir = self.project.project_dir(binding);
        fs::create_dir_all(&work_dir).map_err(|e| Error::io(&work_dir, e))?;
        let repo = Repo::new(self.git, &work_dir);

        if !repo.exists() {
            log::info!("Initializing working copy {}", work_dir.display());
            repo.init()?;
        }

        repo.set_remote(UPSTREAM_REMOTE, &upstream.to_string_lossy())?;
        repo.am_abort();
        repo.fetch_into_branch(UPSTREAM_REMOTE, &binding.base_ref, UPSTREAM_BRANCH)?;
        repo.reset_branch(WORK_BRANCH, UPSTREAM_BRANCH)?;
        log::info!(
            "{}: reset {} onto {} ({})",
            module,
            WORK_BRANCH,
            UPSTREAM_BRANCH,
            binding.base_ref
        );

        let outcome = apply_all(&repo, module, patches, opts, progress)?;
        let head = repo.short_head().ok();

        Ok(ApplyReport {
            module: module.to_string(),
            outcome,
            head,
        })
    }
}

fn apply_all(
    repo: &Repo<'_>,
    module: &str,
    patches: &PatchSet,
    opts: ApplyOptions,
    progress: &mut dyn ApplyProgress,
) -> Result<ApplyOutcome> {
    for patch in patches {
        progress.on_patch(module, patch);
        log::debug!("{}: applying {}", module, patch.file_name);

        match repo.am(&patch.path) {
            Ok(()) => {}
            Err(Error::Git { stderr, .. }) => {
                let files = repo.conflicted_files().unwrap_or_default();
                log::warn!(
                    "{}: {} failed to apply ({} conflicted files)",
                    module,
                    patch.file_name,
                    files.len()
                );
                if opts.abort_on_conflict {
                    repo.am_abort();
                }
                return Ok(ApplyOutcome::Conflict {
                    index: patch.index,
                    patch: patch.file_name.clone(),
                    files,
                    message: stderr,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(ApplyOutcome::Applied {
        count: patches.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GitOutput, MockGit};
    use crate::types::{ForkDescriptor, ModuleBinding};
    use std::path::Path;
    use tempfile::TempDir;

    struct Recorder {
        events: Vec<String>,
    }

    impl ApplyProgress for Recorder {
        fn on_start(&mut self, module: &str, total: usize) {
            self.events.push(format!("start {} {}", module, total));
        }
        fn on_patch(&mut self, module: &str, patch: &PatchFile) {
            self.events.push(format!("patch {} {}", module, patch.index));
        }
        fn on_finish(&mut self, module: &str, outcome: &ApplyOutcome) {
            self.events
                .push(format!("finish {} {}", module, outcome.is_conflict()));
        }
        fn on_error(&mut self, module: &str, error: &Error) {
            self.events
                .push(format!("error {} {}", module, error.category()));
        }
    }

    fn fixture(patches: &[&str]) -> (TempDir, ForkProject) {
        let tmp = TempDir::new().unwrap();
        let mut descriptor = ForkDescriptor::template("Demo");
        descriptor.upstream.name = "Base".into();
        descriptor.modules = vec![ModuleBinding::new("server", "patches/server")];

        let patch_dir = tmp.path().join("patches/server");
        fs::create_dir_all(&patch_dir).unwrap();
        for name in patches {
            fs::write(
                patch_dir.join(name),
                format!("Subject: [PATCH] {}\n\n", name),
            )
            .unwrap();
        }
        fs::create_dir_all(tmp.path().join("Base/Base-Server")).unwrap();

        let project = ForkProject::new(tmp.path(), descriptor);
        (tmp, project)
    }

    fn commands(mock: &MockGit) -> Vec<String> {
        mock.calls().iter().map(|c| c.command()).collect()
    }

    #[test]
    fn test_apply_all_patches_in_order() {
        let (tmp, project) = fixture(&["0002-b.patch", "0001-a.patch"]);
        let mock = MockGit::new();
        mock.on(&["rev-parse"], GitOutput::ok("cafe123"));

        let applier = PatchApplier::new(&mock, &project);
        let mut rec = Recorder { events: vec![] };
        let report = applier
            .apply_module("server", ApplyOptions::default(), &mut rec)
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::Applied { count: 2 });
        assert_eq!(report.head.as_deref(), Some("cafe123"));
        assert_eq!(
            rec.events,
            vec![
                "start server 2",
                "patch server 1",
                "patch server 2",
                "finish server false"
            ]
        );

        let cmds = commands(&mock);
        let upstream = tmp.path().join("Base/Base-Server");
        assert_eq!(cmds[0], "init --quiet");
        assert_eq!(
            cmds[2],
            format!("remote add upstream {}", upstream.display())
        );
        assert_eq!(cmds[3], "am --abort");
        assert_eq!(cmds[4], "fetch --no-tags --quiet upstream +HEAD:refs/heads/upstream");
        assert_eq!(cmds[5], "checkout --quiet --force -B master upstream");

        let am: Vec<_> = mock
            .calls_starting_with(&["am", "--3way"])
            .iter()
            .map(|c| c.args[3].clone())
            .collect();
        assert!(am[0].ends_with("0001-a.patch"));
        assert!(am[1].ends_with("0002-b.patch"));

        for call in mock.calls() {
            assert_eq!(call.dir, tmp.path().join("demo-server"));
        }
    }

    #[test]
    fn test_conflict_stops_and_reports_files() {
        let (_tmp, project) = fixture(&["0001-a.patch", "0002-b.patch", "0003-c.patch"]);
        let mock = MockGit::new();
        mock.on_with(
            &["am", "--3way"],
            "0002-b.patch",
            GitOutput::failed("Patch failed at 0002 b"),
        )
        .on(
            &["diff", "--name-only"],
            GitOutput::ok("src/Main.java\n"),
        );

        let applier = PatchApplier::new(&mock, &project);
        let report = applier
            .apply_module("server", ApplyOptions::default(), &mut NoProgress)
            .unwrap();

        assert_eq!(
            report.outcome,
            ApplyOutcome::Conflict {
                index: 2,
                patch: "0002-b.patch".into(),
                files: vec!["src/Main.java".into()],
                message: "Patch failed at 0002 b".into(),
            }
        );
        assert_eq!(mock.calls_starting_with(&["am", "--3way"]).len(), 2);
        // left mid-am for manual resolution: only the pre-apply abort ran
        assert_eq!(mock.calls_starting_with(&["am", "--abort"]).len(), 1);

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, Error::PatchConflict { index: 2, .. }));
    }

    #[test]
    fn test_abort_on_conflict() {
        let (_tmp, project) = fixture(&["0001-a.patch"]);
        let mock = MockGit::new();
        mock.on(&["am", "--3way"], GitOutput::failed("does not apply"));

        let opts = ApplyOptions {
            abort_on_conflict: true,
            ..Default::default()
        };
        let report = PatchApplier::new(&mock, &project)
            .apply_module("server", opts, &mut NoProgress)
            .unwrap();

        assert!(report.outcome.is_conflict());
        assert_eq!(mock.calls_starting_with(&["am", "--abort"]).len(), 2);
    }

    #[test]
    fn test_existing_working_copy_is_not_reinitialized() {
        let (tmp, project) = fixture(&["0001-a.patch"]);
        fs::create_dir_all(tmp.path().join("demo-server/.git")).unwrap();
        let mock = MockGit::new();

        PatchApplier::new(&mock, &project)
            .apply_module("server", ApplyOptions::default(), &mut NoProgress)
            .unwrap();

        assert!(mock.calls_starting_with(&["init"]).is_empty());
    }

    #[test]
    fn test_reapply_issues_identical_commands() {
        let (_tmp, project) = fixture(&["0001-a.patch", "0002-b.patch"]);
        let first = MockGit::new();
        let second = MockGit::new();
        let applier_a = PatchApplier::new(&first, &project);
        let applier_b = PatchApplier::new(&second, &project);

        applier_a
            .apply_module("server", ApplyOptions::default(), &mut NoProgress)
            .unwrap();
        applier_b
            .apply_module("server", ApplyOptions::default(), &mut NoProgress)
            .unwrap();

        assert_eq!(commands(&first), commands(&second));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let (tmp, project) = fixture(&["0001-a.patch", "0002-b.patch"]);
        let mock = MockGit::new();
        let opts = ApplyOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = PatchApplier::new(&mock, &project)
            .apply_module("server", opts, &mut NoProgress)
            .unwrap();

        assert_eq!(report.outcome, ApplyOutcome::DryRun { count: 2 });
        assert!(mock.calls().is_empty());
        assert!(!tmp.path().join("demo-server").exists());
    }

    #[test]
    fn test_missing_upstream() {
        let (tmp, project) = fixture(&[]);
        fs::remove_dir_all(tmp.path().join("Base")).unwrap();
        let mock = MockGit::new();

        let err = PatchApplier::new(&mock, &project)
            .apply_module("server", ApplyOptions::default(), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamMissing(ref p) if p.ends_with(Path::new("Base/Base-Server"))));
    }

    #[test]
    fn test_missing_upstream_notifies_progress() {
        let (tmp, project) = fixture(&["0001-a.patch"]);
        fs::remove_dir_all(tmp.path().join("Base")).unwrap();
        let mock = MockGit::new();
        let mut rec = Recorder { events: vec![] };

        let result =
            PatchApplier::new(&mock, &project).apply_module("server", ApplyOptions::default(), &mut rec);

        assert!(result.is_err());
        assert_eq!(rec.events, vec!["start server 1", "error server Not found"]);
    }

    #[test]
    fn test_fetch_failure_notifies_progress() {
        let (_tmp, project) = fixture(&["0001-a.patch"]);
        let mock = MockGit::new();
        mock.on(&["fetch"], GitOutput::failed("couldn't find remote ref"));
        let mut rec = Recorder { events: vec![] };

        let err = PatchApplier::new(&mock, &project)
            .apply_module("server", ApplyOptions::default(), &mut rec)
            .unwrap_err();

        assert!(matches!(err, Error::Git { .. }));
        assert_eq!(rec.events.len(), 2);
        assert!(rec.events[1].starts_with("error server"));
        assert!(mock.calls_starting_with(&["am", "--3way"]).is_empty());
    }

    #[test]
    fn test_unknown_module() {
        let (_tmp, project) = fixture(&[]);
        let mock = MockGit::new();
        let err = PatchApplier::new(&mock, &project)
            .apply_module("api", ApplyOptions::default(), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownModule(_)));
    }

    #[test]
    fn test_has_local_changes() {
        let (tmp, project) = fixture(&[]);
        let mock = MockGit::new();
        mock.on(&["status", "--porcelain"], GitOutput::ok("?? new.txt"));
        let applier = PatchApplier::new(&mock, &project);

        assert!(!applier.has_local_changes("server").unwrap());
        fs::create_dir_all(tmp.path().join("demo-server/.git")).unwrap();
        assert!(applier.has_local_changes("server").unwrap());
    }
}
