//! Core building blocks shared by every pkgrel command
//!
//! - **config**: `rel-eng/pkgrel.toml`, per-package overrides, package metadata, user config
//! - **context**: project identity, run options and per-run state
//! - **error**: error types with contextual help messages and exit codes
//! - **interrupt**: Ctrl-C flag checked between blocking steps
//! - **plan**: record of outward-facing commands (dry-run review)
//! - **process**: external tool invocation
//! - **vcs**: git operations (SystemGit)

pub mod config;
pub mod context;
pub mod error;
pub mod interrupt;
pub mod plan;
pub mod process;
pub mod vcs;
