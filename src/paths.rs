//! Project root and state path resolution.
//!
//! # Environment Variables
//!
//! - `PATCHSTACK_ROOT` - Project root, skipping discovery (`~` and `$VAR`
//!   are expanded)
//!
//! Without the override the root is the nearest ancestor of the current
//! directory that contains `patchstack.toml`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for project root override
pub const ENV_ROOT: &str = "PATCHSTACK_ROOT";

/// Directory under the project root holding local state
pub const STATE_DIR: &str = ".patchstack";

/// Starting point for project discovery.
///
/// An explicit root (from `--root` or `PATCHSTACK_ROOT`) wins over the
/// current directory. The result is always absolute.
pub fn search_start(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        let expanded = expand(dir);
        let path = std::path::absolute(&expanded)
            .with_context(|| format!("Could not resolve {}", expanded.display()))?;
        log::debug!("Using project root override: {}", path.display());
        return Ok(path);
    }
    std::env::current_dir().context("Could not determine current directory")
}

/// State directory of a project.
pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Render `path` relative to `root` when it lies inside it.
pub fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
