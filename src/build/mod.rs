//! Turning a git commit into packages
//!
//! - **naming**: artifact and directory names
//! - **archive** / **export**: deterministic source archives from git
//! - **descriptor**: `.spec` patching and test-build rewrite
//! - **rpmbuild**: rpmbuild command lines and output parsing
//! - **strategy**: package types and the registry that picks one
//! - **upstream**, **legacy**: the upstream-patch and CVS package types
//! - **builder**: the staged pipeline

pub mod archive;
pub mod builder;
pub mod descriptor;
pub mod export;
pub mod legacy;
pub mod naming;
pub mod rpmbuild;
pub mod strategy;
pub mod upstream;
