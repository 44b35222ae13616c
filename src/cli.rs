use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::paths::ENV_ROOT;

#[derive(Parser)]
#[command(name = "patchstack")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Maintain a fork as a stack of patches on top of an upstream project", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Project root (defaults to the nearest directory containing patchstack.toml)
    #[arg(long, global = true, env = ENV_ROOT)]
    pub root: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a template patchstack.toml and create the patch directories
    Init(InitArgs),

    /// Reset module working copies onto upstream and apply their patches
    Apply(ApplyArgs),

    /// Regenerate patch files from working copy commits
    Rebuild {
        /// Module to rebuild (default: all)
        module: Option<String>,
    },

    /// Show fork, version and module status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the derived build version
    Version {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List dependency repositories in precedence order
    Repos,

    /// Run sanity checks on the project
    Check,

    /// Manage the upstream checkout
    #[command(subcommand)]
    Upstream(UpstreamCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
pub struct InitArgs {
    /// Fork name (default: name of the target directory)
    #[arg(long)]
    pub name: Option<String>,

    /// Overwrite an existing patchstack.toml
    #[arg(long)]
    pub force: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Directory to initialize (default: current directory)
    pub path: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ApplyArgs {
    /// Module to apply (default: all)
    pub module: Option<String>,

    /// Number of modules to apply in parallel
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,

    /// Abort `git am` after a conflict instead of leaving it for resolution
    #[arg(long)]
    pub abort_on_conflict: bool,

    /// List the patches that would be applied
    #[arg(long)]
    pub dry_run: bool,

    /// Discard uncommitted working copy changes without asking
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum UpstreamCommand {
    /// Show the upstream checkout revision
    Status,

    /// Fetch and hard-reset the upstream checkout to its tracked branch
    Update {
        /// Commit the new upstream revision in the project root
        #[arg(long)]
        commit: bool,
    },
}
