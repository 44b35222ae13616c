//! Error types for patch-stack operations.
//!
//! Errors are categorized so the CLI can pick an exit message and a hint
//! without matching on every variant.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for patchkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad categories of patchkit errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The fork descriptor is missing, unreadable or invalid.
    Config,
    /// A directory, module or tool could not be found.
    NotFound,
    /// A patch did not apply cleanly.
    Conflict,
    /// A git command failed.
    Git,
    /// Filesystem error.
    Io,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Invalid fork descriptor",
            Self::NotFound => "Not found",
            Self::Conflict => "Patch conflict",
            Self::Git => "Git command failed",
            Self::Io => "Filesystem error",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => "Fix patchstack.toml and run 'patchstack check'",
            Self::NotFound => "Run 'patchstack upstream update' or 'patchstack init' first",
            Self::Conflict => {
                "Resolve the conflict in the module working copy, run 'git am --continue', then 'patchstack rebuild'"
            }
            Self::Git => "Inspect the git output above; run with -vv to see every git command",
            Self::Io => "Check file permissions and free disk space",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while managing a patch stack.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No `patchstack.toml` in the start directory or any parent.
    #[error("no patchstack.toml found in {start} or any parent directory")]
    DescriptorNotFound {
        /// Directory the search started from.
        start: PathBuf,
    },

    /// The descriptor could not be parsed.
    #[error("invalid descriptor{}: {message}", path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
    DescriptorParse {
        /// File being parsed, if it came from disk.
        path: Option<PathBuf>,
        /// Parser message.
        message: String,
    },

    /// A descriptor value failed validation.
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Dotted path of the offending field (e.g. `modules[1].patches`).
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A module name that is not declared in the descriptor.
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    /// A module's patch directory does not exist.
    #[error("patch directory missing: {0}")]
    PatchDirMissing(PathBuf),

    /// The upstream checkout or upstream module directory does not exist.
    #[error("upstream source missing: {0}")]
    UpstreamMissing(PathBuf),

    /// The module working copy has not been created yet.
    #[error("working copy missing: {0} (run 'patchstack apply' first)")]
    WorkingCopyMissing(PathBuf),

    /// A patch failed to apply.
    #[error("{module}: patch {index} ({patch}) does not apply{}", format_files(files))]
    PatchConflict {
        /// Module the patch belongs to.
        module: String,
        /// 1-based position in the patch set.
        index: usize,
        /// Patch file name.
        patch: String,
        /// Paths left with conflict markers.
        files: Vec<String>,
    },

    /// The working copy is stopped in the middle of `git am`.
    #[error(
        "{0} has an unfinished 'git am'; run 'git am --continue' or 'git am --abort' there first"
    )]
    AmInProgress(PathBuf),

    /// `git` is not on PATH.
    #[error("git not found in PATH")]
    GitNotFound,

    /// A git command exited unsuccessfully.
    #[error("git {command} failed: {stderr}")]
    Git {
        /// Arguments passed to git.
        command: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The short revision for the version tag could not be determined.
    #[error("could not determine source revision: {0}")]
    RevisionLookup(String),

    /// IO error with path context.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

fn format_files(files: &[String]) -> String {
    if files.is_empty() {
        String::new()
    } else {
        format!(" (conflicts in {})", files.join(", "))
    }
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a validation error for a descriptor field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::DescriptorNotFound { .. }
            | Error::DescriptorParse { .. }
            | Error::Invalid { .. }
            | Error::UnknownModule(_) => ErrorCategory::Config,
            Error::PatchDirMissing(_)
            | Error::UpstreamMissing(_)
            | Error::WorkingCopyMissing(_)
            | Error::GitNotFound => ErrorCategory::NotFound,
            Error::PatchConflict { .. } | Error::AmInProgress(_) => ErrorCategory::Conflict,
            Error::Git { .. } | Error::RevisionLookup(_) => ErrorCategory::Git,
            Error::Io { .. } => ErrorCategory::Io,
            Error::Other(_) => ErrorCategory::Other,
        }
    }
}
