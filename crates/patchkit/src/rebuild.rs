//! Regenerating patch directories from working copy commits.
//!
//! Patches whose normalized content did not change are left untouched so a
//! rebuild without real edits produces no diff in the patch directory.

use crate::backend::{GitBackend, Repo, UPSTREAM_BRANCH};
use crate::descriptor::ForkProject;
use crate::error::{Error, Result};
use crate::patches::{PatchSet, content_hash};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Counts of what a rebuild did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    /// New patch files.
    pub added: usize,
    /// Existing files whose content changed.
    pub modified: usize,
    /// Existing files left as they were.
    pub unchanged: usize,
    /// Files deleted because no commit produces them anymore.
    pub removed: usize,
}

impl RebuildSummary {
    /// Whether the patch directory changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.added + self.modified + self.removed > 0
    }
}

/// A patch whose content changed, with both versions for diff display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedPatch {
    /// File name.
    pub file_name: String,
    /// Previous content.
    pub old: String,
    /// New content.
    pub new: String,
}

/// Result of syncing one patch directory.
#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    /// Module name (empty when produced by [`sync_patch_dir`] directly).
    pub module: String,
    /// Counts.
    pub summary: RebuildSummary,
    /// Changed patches.
    pub modified: Vec<ModifiedPatch>,
}

/// Regenerates module patch directories with `git format-patch`.
pub struct PatchRebuilder<'a> {
    git: &'a dyn GitBackend,
    project: &'a ForkProject,
}

impl<'a> PatchRebuilder<'a> {
    /// Create a rebuilder for `project`.
    pub fn new(git: &'a dyn GitBackend, project: &'a ForkProject) -> Self {
        Self { git, project }
    }

    /// Rebuild the patch directory of `module` from commits on top of the
    /// `upstream` branch of its working copy.
    pub fn rebuild_module(&self, module: &str) -> Result<RebuildReport> {
        let binding = self.project.module(module)?;
        let work_dir = self.project.project_dir(binding);
        let repo = Repo::new(self.git, &work_dir);
        if !repo.exists() {
            return Err(Error::WorkingCopyMissing(work_dir));
        }
        // the history is partial until the am finishes
        if repo.am_in_progress() {
            return Err(Error::AmInProgress(work_dir));
        }

        let staging = work_dir.join(".git").join("patchstack-rebuild");
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| Error::io(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| Error::io(&staging, e))?;

        let result = repo
            .format_patch(UPSTREAM_BRANCH, &staging)
            .and_then(|()| sync_patch_dir(&staging, &self.project.patches_dir(binding)));

        if let Err(e) = fs::remove_dir_all(&staging) {
            log::warn!("Could not remove {}: {}", staging.display(), e);
        }

        let mut report = result?;
        report.module = module.to_string();
        log::info!(
            "{}: {} added, {} modified, {} removed, {} unchanged",
            module,
            report.summary.added,
            report.summary.modified,
            report.summary.removed,
            report.summary.unchanged
        );
        Ok(report)
    }
}

/// Make `target` hold exactly the patches in `staged`, keeping files whose
/// normalized content is unchanged.
pub fn sync_patch_dir(staged: &Path, target: &Path) -> Result<RebuildReport> {
    fs::create_dir_all(target).map_err(|e| Error::io(target, e))?;

    let new_set = PatchSet::load(staged)?;
    let old_set = PatchSet::load(target)?;
    let mut report = RebuildReport::default();
    let mut produced = HashSet::new();

    for patch in &new_set {
        produced.insert(patch.file_name.clone());
        let new = read(&patch.path)?;
        let dest = target.join(&patch.file_name);

        if dest.is_file() {
            let old = read(&dest)?;
            if content_hash(&old) == content_hash(&new) {
                report.summary.unchanged += 1;
                continue;
            }
            report.summary.modified += 1;
            report.modified.push(ModifiedPatch {
                file_name: patch.file_name.clone(),
                old,
                new: new.clone(),
            });
        } else {
            report.summary.added += 1;
        }
        fs::write(&dest, new).map_err(|e| Error::io(&dest, e))?;
    }

    for old in &old_set {
        if !produced.contains(&old.file_name) {
            log::debug!("Removing stale patch {}", old.file_name);
            fs::remove_file(&old.path).map_err(|e| Error::io(&old.path, e))?;
            report.summary.removed += 1;
        }
    }

    Ok(report)
}

fn read(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
