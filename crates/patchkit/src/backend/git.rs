//! Real git backend using the `git` executable.

use crate::backend::{GitBackend, GitOutput};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Backend that executes the `git` binary found on PATH.
#[derive(Debug, Clone)]
pub struct CliGit {
    git_path: PathBuf,
    identity: Option<(String, String)>,
}

impl CliGit {
    /// Create a backend.
    ///
    /// Returns `Error::GitNotFound` if git is not installed.
    pub fn new() -> Result<Self> {
        let git_path = which::which("git").map_err(|_| Error::GitNotFound)?;
        log::debug!("Using git at {}", git_path.display());
        Ok(Self {
            git_path,
            identity: None,
        })
    }

    /// Commit as `name <email>` (passed as `-c user.*` overrides).
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    /// Whether git is available on PATH.
    #[must_use]
    pub fn is_available() -> bool {
        which::which("git").is_ok()
    }
}

impl GitBackend for CliGit {
    fn run(&self, dir: &Path, args: &[&str]) -> Result<GitOutput> {
        let mut cmd = Command::new(&self.git_path);
        if let Some((name, email)) = &self.identity {
            cmd.arg("-c")
                .arg(format!("user.name={}", name))
                .arg("-c")
                .arg(format!("user.email={}", email));
        }
        cmd.args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0");

        log::debug!("[{}] git {}", dir.display(), args.join(" "));
        let output = cmd.output().map_err(|e| Error::io(dir, e))?;

        let result = GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success {
            log::trace!("git {} failed: {}", args.join(" "), result.stderr.trim());
        }
        Ok(result)
    }
}
