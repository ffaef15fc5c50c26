//! Ctrl-C handling
//!
//! The handler only raises a flag. [`Runner`](super::process::Runner) checks
//! it around every external command and the terminal prompt checks it after
//! each answer, so an interrupted run returns [`PkgError::Interrupted`]
//! through the normal error path and the build still cleans up.

use crate::core::error::{PkgError, PkgResult};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Route SIGINT to the process-wide flag
pub fn install_handler() -> PkgResult<()> {
  ctrlc::set_handler(|| {
    INTERRUPTED.store(true, Ordering::SeqCst);
  })
  .map_err(|e| PkgError::message(format!("Failed to install Ctrl-C handler: {}", e)))?;
  debug!("installed Ctrl-C handler");
  Ok(())
}

/// The process-wide flag
pub fn flag() -> &'static AtomicBool {
  &INTERRUPTED
}

/// Fail with `Interrupted` if `flag` was raised
pub fn check_flag(flag: &AtomicBool, during: &str) -> PkgResult<()> {
  if flag.load(Ordering::SeqCst) {
    return Err(PkgError::Interrupted {
      during: during.to_string(),
    });
  }
  Ok(())
}

/// Fail with `Interrupted` if Ctrl-C was pressed
pub fn check(during: &str) -> PkgResult<()> {
  check_flag(flag(), during)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_raised_flag_is_an_error() {
    let raised = AtomicBool::new(true);
    let err = check_flag(&raised, "cvs commit").unwrap_err();
    assert!(matches!(err, PkgError::Interrupted { ref during } if during == "cvs commit"));

    assert!(check_flag(&AtomicBool::new(false), "cvs commit").is_ok());
  }
}
