//! `pkgrel tags`: build farm tags the package would be submitted to

use crate::commands::session::Session;
use crate::core::error::PkgResult;
use crate::release::farm::{farm_targets, render_targets};

pub fn run_tags(package: Option<String>, only_tags: Vec<String>, verbose: bool, json: bool) -> PkgResult<()> {
  let session = Session::open(package.as_deref(), None, false)?;
  let targets = farm_targets(&session.config, &session.identity.name, &only_tags);

  let output = render_targets(&targets, verbose, json)?;
  if !output.is_empty() {
    println!("{}", output);
  }
  Ok(())
}
