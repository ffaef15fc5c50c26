//! CLI commands
//!
//! - **build**: tarball, source package and binary packages for a tagged
//!   (or `--test`) commit
//! - **release**: build and hand off to CVS, dist-git and the build farm
//! - **tags**: list the build farm tags a package is eligible for

pub mod build;
pub mod session;
pub mod tags;

pub use build::{run_build, run_release};
pub use tags::run_tags;
