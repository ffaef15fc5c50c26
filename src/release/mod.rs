//! Release targets
//!
//! - **coordinator**: runs the selected targets in order
//! - **legacy**: CVS checkout, commit, tag and `make build`
//! - **distgit**: dist-git clone and `fedpkg` commit
//! - **farm**: build farm tag eligibility and submission
//! - **sync**: copying exported files into a downstream checkout
//! - **prompt**: operator confirmation

pub mod coordinator;
pub mod distgit;
pub mod farm;
pub mod legacy;
pub mod prompt;
pub mod sync;
