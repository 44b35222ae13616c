use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use patchkit::{ApplyOutcome, ApplyReport, RebuildReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

// ============================================================================
// State Structures
// ============================================================================

/// Last known result per module, kept in `<root>/.patchstack/state.toml`
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StackState {
    /// State for each module
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleState>,

    /// Last time the state was updated
    pub last_updated: Option<DateTime<Utc>>,
}

/// State for a single module
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ModuleState {
    /// Most recent apply
    pub last_apply: Option<ApplyRecord>,

    /// Most recent rebuild
    pub last_rebuild: Option<RebuildRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Applied,
    Conflict,
}

/// One apply run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ApplyRecord {
    pub at: DateTime<Utc>,
    pub outcome: RecordOutcome,
    /// Patches applied (or the index of the failing one on conflict)
    pub patches: usize,
    /// Working copy HEAD afterwards
    pub head: Option<String>,
    /// Failing patch file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_patch: Option<String>,
}

/// One rebuild run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RebuildRecord {
    pub at: DateTime<Utc>,
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ApplyRecord {
    /// Record for a finished apply; dry runs are not recorded.
    pub fn from_report(report: &ApplyReport) -> Option<Self> {
        let (outcome, patches, failed_patch) = match &report.outcome {
            ApplyOutcome::Applied { count } => (RecordOutcome::Applied, *count, None),
            ApplyOutcome::Conflict { index, patch, .. } => {
                (RecordOutcome::Conflict, *index, Some(patch.clone()))
            }
            ApplyOutcome::DryRun { .. } => return None,
        };

        Some(Self {
            at: Utc::now(),
            outcome,
            patches,
            head: report.head.clone(),
            failed_patch,
        })
    }

    /// One-line description for status output
    pub fn describe(&self) -> String {
        let when = self.at.format("%Y-%m-%d %H:%M UTC");
        match (self.outcome, &self.failed_patch) {
            (RecordOutcome::Conflict, Some(patch)) => {
                format!("conflict at #{} {} ({when})", self.patches, patch)
            }
            (RecordOutcome::Conflict, None) => format!("conflict at #{} ({when})", self.patches),
            (RecordOutcome::Applied, _) => format!(
                "applied {} at {} ({when})",
                self.patches,
                self.head.as_deref().unwrap_or("?")
            ),
        }
    }
}

impl From<&RebuildReport> for RebuildRecord {
    fn from(report: &RebuildReport) -> Self {
        Self {
            at: Utc::now(),
            added: report.summary.added,
            modified: report.summary.modified,
            removed: report.summary.removed,
            unchanged: report.summary.unchanged,
        }
    }
}

// ============================================================================
// StackState Implementation
// ============================================================================

impl StackState {
    /// Get the state file path
    pub fn state_file(root: &Path) -> PathBuf {
        paths::state_dir(root).join("state.toml")
    }

    /// Load state from disk, or return default if file doesn't exist
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::state_file(root);

        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, root: &Path) -> Result<()> {
        let dir = paths::state_dir(root);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let path = Self::state_file(root);
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(&path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Get or create module state
    pub fn module_mut(&mut self, name: &str) -> &mut ModuleState {
        self.modules.entry(name.to_string()).or_default()
    }

    /// Last apply record of a module, if any
    pub fn last_apply(&self, name: &str) -> Option<&ApplyRecord> {
        self.modules.get(name).and_then(|m| m.last_apply.as_ref())
    }

    pub fn record_apply(&mut self, report: &ApplyReport) {
        if let Some(record) = ApplyRecord::from_report(report) {
            self.module_mut(&report.module).last_apply = Some(record);
            self.last_updated = Some(Utc::now());
        }
    }

    pub fn record_rebuild(&mut self, report: &RebuildReport) {
        self.module_mut(&report.module).last_rebuild = Some(RebuildRecord::from(report));
        self.last_updated = Some(Utc::now());
    }
}

// ============================================================================
// Tests
// ============================================================================
