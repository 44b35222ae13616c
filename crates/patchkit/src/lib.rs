//! # patchkit
//!
//! Library for maintaining a fork as a stack of patches on top of an
//! upstream project.
//!
//! This crate provides:
//! - **Descriptors**: the `patchstack.toml` fork descriptor and its validation
//! - **Patch sets**: ordered `*.patch` files per module, header parsing
//! - **Applier**: resets a module working copy onto upstream and applies
//!   patches with `git am --3way`, reporting the first conflict
//! - **Rebuilder**: regenerates patch files from working copy commits
//! - **Versions**: `git-<fork>-<BUILD_NUMBER or "rev">`
//! - **Repositories**: the ordered dependency repository list
//!
//! ## Example
//!
//! ```no_run
//! use patchkit::{ApplyOptions, CliGit, ForkProject, NoProgress, PatchApplier};
//!
//! let project = ForkProject::discover(std::path::Path::new(".")).unwrap();
//! project.descriptor().validate().unwrap();
//!
//! let git = CliGit::new().unwrap();
//! let applier = PatchApplier::new(&git, &project);
//! for module in project.modules() {
//!     let report = applier
//!         .apply_module(&module.name, ApplyOptions::default(), &mut NoProgress)
//!         .unwrap();
//!     println!("{}: {:?}", report.module, report.outcome);
//! }
//! ```
//!
//! ## Testing
//!
//! Every git call goes through the [`GitBackend`] trait. [`MockGit`]
//! records calls and replays scripted output, so the applier, rebuilder and
//! upstream manager can be exercised without a repository.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod applier;
pub mod backend;
pub mod descriptor;
pub mod error;
pub mod patches;
pub mod rebuild;
pub mod repositories;
pub mod types;
pub mod upstream;
pub mod version;

pub use applier::{ApplyOptions, ApplyOutcome, ApplyProgress, ApplyReport, NoProgress, PatchApplier};
pub use backend::git::CliGit;
pub use backend::{GitBackend, GitOutput, MockGit, Repo};
pub use descriptor::{DESCRIPTOR_FILE, ForkProject};
pub use error::{Error, ErrorCategory, Result};
pub use patches::{PatchFile, PatchSet};
pub use rebuild::{PatchRebuilder, RebuildReport, RebuildSummary};
pub use repositories::{Repository, RepositoryKind};
pub use types::{
    BuildTarget, ForkDescriptor, ForkIdentity, GitSettings, LauncherArtifact, ModuleBinding,
    UpstreamRef,
};
pub use upstream::{UpstreamManager, UpstreamStatus, UpstreamUpdate};
pub use version::{ResolvedVersion, RevisionSource, VersionSource};
