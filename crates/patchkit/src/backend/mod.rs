//! Git backend trait and implementations.
//!
//! Every git interaction goes through [`GitBackend::run`], so the applier,
//! rebuilder and upstream manager can be tested with [`MockGit`] instead
//! of a real repository. [`Repo`] wraps a backend and a directory with the
//! handful of git operations the patch stack needs.

pub mod git;

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Captured result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    /// Whether git exited with status 0.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl GitOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given stderr.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs git commands.
pub trait GitBackend: Send + Sync {
    /// Run `git <args>` in `dir`.
    ///
    /// Returns `Ok` with `success == false` when git ran but failed; `Err`
    /// only when git could not be executed at all.
    fn run(&self, dir: &Path, args: &[&str]) -> Result<GitOutput>;
}

/// Branch holding the upstream base inside a module working copy.
pub const UPSTREAM_BRANCH: &str = "upstream";

/// Branch the patches are applied on.
pub const WORK_BRANCH: &str = "master";

/// Remote pointing at the upstream module source.
pub const UPSTREAM_REMOTE: &str = "upstream";

/// A git repository directory driven through a [`GitBackend`].
pub struct Repo<'a> {
    git: &'a dyn GitBackend,
    dir: PathBuf,
}

impl<'a> Repo<'a> {
    /// Wrap `dir`.
    pub fn new(git: &'a dyn GitBackend, dir: impl Into<PathBuf>) -> Self {
        Self {
            git,
            dir: dir.into(),
        }
    }

    /// Repository directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `dir` is itself the top of a repository (not merely inside one).
    #[must_use]
    pub fn exists(&self) -> bool {
        self.dir.join(".git").exists()
    }

    /// Whether a `git am` stopped here and is waiting for resolution.
    #[must_use]
    pub fn am_in_progress(&self) -> bool {
        self.dir.join(".git").join("rebase-apply").exists()
    }

    /// Run and require success, returning trimmed stdout.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.git.run(&self.dir, args)?;
        if output.success {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(Error::Git {
                command: args.join(" "),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Run and ignore failure.
    pub fn run_quiet(&self, args: &[&str]) -> bool {
        match self.git.run(&self.dir, args) {
            Ok(output) => output.success,
            Err(e) => {
                log::debug!("git {} could not run: {}", args.join(" "), e);
                false
            }
        }
    }

    /// `git init`.
    pub fn init(&self) -> Result<()> {
        self.run(&["init", "--quiet"]).map(|_| ())
    }

    /// Point `name` at `url`, replacing any previous remote of that name.
    pub fn set_remote(&self, name: &str, url: &str) -> Result<()> {
        self.run_quiet(&["remote", "remove", name]);
        self.run(&["remote", "add", name, url]).map(|_| ())
    }

    /// Force-fetch `src` from `remote` into local branch `branch`.
    pub fn fetch_into_branch(&self, remote: &str, src: &str, branch: &str) -> Result<()> {
        let refspec = format!("+{}:refs/heads/{}", src, branch);
        self.run(&["fetch", "--no-tags", "--quiet", remote, refspec.as_str()])
            .map(|_| ())
    }

    /// Check out `branch`, force-resetting it onto `start`.
    pub fn reset_branch(&self, branch: &str, start: &str) -> Result<()> {
        self.run(&["checkout", "--quiet", "--force", "-B", branch, start])
            .map(|_| ())
    }

    /// Abort any in-progress `git am`; a no-op when none is running.
    pub fn am_abort(&self) {
        self.run_quiet(&["am", "--abort"]);
    }

    /// Apply one mailbox patch with three-way fallback.
    pub fn am(&self, patch: &Path) -> Result<()> {
        let patch = patch.to_string_lossy();
        self.run(&["am", "--3way", "--ignore-whitespace", &*patch])
            .map(|_| ())
    }

    /// Paths with unresolved conflicts.
    pub fn conflicted_files(&self) -> Result<Vec<String>> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(lines(&out))
    }

    /// `git rev-parse --short HEAD`.
    pub fn short_head(&self) -> Result<String> {
        self.run(&["rev-parse", "--short", "HEAD"])
    }

    /// Whether the working tree has uncommitted changes.
    pub fn is_dirty(&self) -> Result<bool> {
        Ok(!self.run(&["status", "--porcelain"])?.is_empty())
    }

    /// Write commits `base..HEAD` as patches into `out_dir`.
    pub fn format_patch(&self, base: &str, out_dir: &Path) -> Result<()> {
        let out = out_dir.to_string_lossy();
        self.run(&[
            "format-patch",
            "--quiet",
            "--zero-commit",
            "--full-index",
            "--no-signature",
            "--no-stat",
            "-N",
            "-o",
            &*out,
            base,
        ])
        .map(|_| ())
    }

    /// `git log --oneline from..to`, one entry per line.
    pub fn log_oneline(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let range = format!("{}..{}", from, to);
        let out = self.run(&["log", "--oneline", "--no-decorate", range.as_str()])?;
        Ok(lines(&out))
    }
}

fn lines(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// MockGit
// ============================================================================

/// A recorded git invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCall {
    /// Directory git ran in.
    pub dir: PathBuf,
    /// Arguments.
    pub args: Vec<String>,
}

impl GitCall {
    /// Arguments joined with spaces.
    #[must_use]
    pub fn command(&self) -> String {
        self.args.join(" ")
    }
}

struct Rule {
    prefix: Vec<String>,
    contains: Option<String>,
    output: GitOutput,
    once: bool,
}

impl Rule {
    fn matches(&self, args: &[&str]) -> bool {
        args.len() >= self.prefix.len()
            && self.prefix.iter().zip(args).all(|(p, a)| p.as_str() == *a)
            && self
                .contains
                .as_ref()
                .is_none_or(|needle| args.iter().any(|a| a.contains(needle.as_str())))
    }
}

/// In-memory backend that records calls and replays scripted outputs.
///
/// Unmatched commands succeed with empty output. Rules are checked in the
/// order they were added; `once` rules are dropped after their first match.
#[derive(Default)]
pub struct MockGit {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<GitCall>>,
}

impl MockGit {
    /// Create a mock where every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to commands starting with `prefix`.
    pub fn on(&self, prefix: &[&str], output: GitOutput) -> &Self {
        self.push_rule(prefix, None, output, false)
    }

    /// Respond to commands starting with `prefix` that mention `needle`.
    pub fn on_with(&self, prefix: &[&str], needle: &str, output: GitOutput) -> &Self {
        self.push_rule(prefix, Some(needle.to_string()), output, false)
    }

    /// Respond to the next command starting with `prefix` only.
    pub fn once(&self, prefix: &[&str], output: GitOutput) -> &Self {
        self.push_rule(prefix, None, output, true)
    }

    fn push_rule(
        &self,
        prefix: &[&str],
        contains: Option<String>,
        output: GitOutput,
        once: bool,
    ) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.iter().map(|s| (*s).to_string()).collect(),
            contains,
            output,
            once,
        });
        self
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<GitCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose arguments start with `prefix`.
    pub fn calls_starting_with(&self, prefix: &[&str]) -> Vec<GitCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                c.args.len() >= prefix.len() && prefix.iter().zip(&c.args).all(|(p, a)| *p == a.as_str())
            })
            .collect()
    }
}

impl GitBackend for MockGit {
    fn run(&self, dir: &Path, args: &[&str]) -> Result<GitOutput> {
        self.calls.lock().unwrap().push(GitCall {
            dir: dir.to_path_buf(),
            args: args.iter().map(|s| (*s).to_string()).collect(),
        });

        let mut rules = self.rules.lock().unwrap();
        let Some(pos) = rules.iter().position(|r| r.matches(args)) else {
            return Ok(GitOutput::ok(""));
        };
        if rules[pos].once {
            Ok(rules.remove(pos).output)
        } else {
            Ok(rules[pos].output.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mock = MockGit::new();
        let repo = Repo::new(&mock, "/tmp/work");
        repo.init().unwrap();
        repo.set_remote("upstream", "/tmp/up").unwrap();

        let commands: Vec<_> = mock.calls().iter().map(GitCall::command).collect();
        assert_eq!(
            commands,
            vec![
                "init --quiet",
                "remote remove upstream",
                "remote add upstream /tmp/up"
            ]
        );
        assert_eq!(mock.calls()[0].dir, PathBuf::from("/tmp/work"));
    }

    #[test]
    fn test_mock_rules_first_match_wins() {
        let mock = MockGit::new();
        mock.on_with(&["am"], "0002", GitOutput::failed("conflict"))
            .on(&["rev-parse"], GitOutput::ok("abc1234\n"));

        let repo = Repo::new(&mock, "/w");
        assert!(repo.am(Path::new("/p/0001-a.patch")).is_ok());
        let err = repo.am(Path::new("/p/0002-b.patch")).unwrap_err();
        assert!(matches!(err, Error::Git { ref stderr, .. } if stderr == "conflict"));
        assert_eq!(repo.short_head().unwrap(), "abc1234");
    }

    #[test]
    fn test_once_rules_are_consumed() {
        let mock = MockGit::new();
        mock.once(&["rev-parse"], GitOutput::ok("first"))
            .on(&["rev-parse"], GitOutput::ok("rest"));
        let repo = Repo::new(&mock, "/w");
        assert_eq!(repo.short_head().unwrap(), "first");
        assert_eq!(repo.short_head().unwrap(), "rest");
        assert_eq!(repo.short_head().unwrap(), "rest");
    }

    #[test]
    fn test_remove_remote_failure_is_ignored() {
        let mock = MockGit::new();
        mock.on(&["remote", "remove"], GitOutput::failed("No such remote"));
        let repo = Repo::new(&mock, "/w");
        assert!(repo.set_remote("upstream", "/u").is_ok());
    }

    #[test]
    fn test_conflicted_files_parses_lines() {
        let mock = MockGit::new();
        mock.on(&["diff"], GitOutput::ok("src/A.java\n\nsrc/B.java\n"));
        let repo = Repo::new(&mock, "/w");
        assert_eq!(
            repo.conflicted_files().unwrap(),
            vec!["src/A.java".to_string(), "src/B.java".to_string()]
        );
    }

    #[test]
    fn test_is_dirty() {
        let mock = MockGit::new();
        let repo = Repo::new(&mock, "/w");
        assert!(!repo.is_dirty().unwrap());
        mock.on(&["status"], GitOutput::ok(" M file.txt"));
        assert!(repo.is_dirty().unwrap());
    }
}
