//! Upstream checkout management.

use crate::backend::{GitBackend, Repo};
use crate::descriptor::ForkProject;
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::PathBuf;

/// Current state of the upstream checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamStatus {
    /// Upstream project name.
    pub name: String,
    /// Checkout directory.
    pub path: PathBuf,
    /// Tracked branch.
    pub branch: String,
    /// Short HEAD revision, if the checkout exists and has one.
    pub revision: Option<String>,
}

/// What an update changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamUpdate {
    /// Revision before the update.
    pub old: Option<String>,
    /// Revision after the update.
    pub new: String,
    /// `git log --oneline old..new`.
    pub log: Vec<String>,
}

impl UpstreamUpdate {
    /// Whether the checkout moved.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.old.as_deref() != Some(self.new.as_str())
    }
}

/// Drives the upstream checkout of a project.
pub struct UpstreamManager<'a> {
    git: &'a dyn GitBackend,
    project: &'a ForkProject,
}

impl<'a> UpstreamManager<'a> {
    /// Create a manager for `project`.
    pub fn new(git: &'a dyn GitBackend, project: &'a ForkProject) -> Self {
        Self { git, project }
    }

    /// Report the checkout state without modifying anything.
    pub fn status(&self) -> Result<UpstreamStatus> {
        let upstream = &self.project.descriptor().upstream;
        let path = self.project.upstream_checkout();
        let revision = if path.is_dir() {
            Repo::new(self.git, &path).short_head().ok()
        } else {
            None
        };

        Ok(UpstreamStatus {
            name: upstream.name.clone(),
            path,
            branch: upstream.branch.clone(),
            revision,
        })
    }

    /// Initialize submodules, then hard-reset the checkout to the tracked
    /// branch.
    pub fn update(&self) -> Result<UpstreamUpdate> {
        let root = Repo::new(self.git, self.project.root());
        if self.project.root().join(".gitmodules").is_file() {
            log::info!("Updating submodules");
            root.run(&["submodule", "update", "--init", "--recursive"])?;
        }

        let path = self.project.upstream_checkout();
        if !path.is_dir() {
            return Err(Error::UpstreamMissing(path));
        }

        let branch = &self.project.descriptor().upstream.branch;
        let checkout = Repo::new(self.git, &path);
        let old = checkout.short_head().ok();

        checkout.run(&["fetch", "--quiet"])?;
        checkout.run(&["reset", "--quiet", "--hard", branch.as_str()])?;
        let new = checkout.short_head()?;

        let log = match &old {
            Some(old) if *old != new => checkout.log_oneline(old, &new)?,
            _ => Vec::new(),
        };

        log::info!(
            "Upstream {} -> {} ({} commits)",
            old.as_deref().unwrap_or("none"),
            new,
            log.len()
        );
        Ok(UpstreamUpdate { old, new, log })
    }

    /// Stage the upstream checkout in the project root and commit it.
    pub fn commit(&self, message: &str) -> Result<()> {
        let root = Repo::new(self.git, self.project.root());
        let path = self.project.descriptor().upstream.checkout_path();
        let path = path.to_string_lossy();
        root.run(&["add", &*path])?;
        root.run(&["commit", "--quiet", "-m", message])?;
        Ok(())
    }
}

/// Commit message recording an upstream update.
#[must_use]
pub fn commit_message(upstream: &str, log: &[String]) -> String {
    let mut message = format!(
        "Updated Upstream ({0})\n\n\
         Upstream has released updates that appear to apply and compile correctly\n\n\
         {0} Changes:\n",
        upstream
    );
    for line in log {
        message.push_str(line);
        message.push('\n');
    }
    message
}
