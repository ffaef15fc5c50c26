//! `pkgrel build` and `pkgrel release`

use crate::build::builder::PackageBuilder;
use crate::build::strategy::{BuildEnv, select_strategy};
use crate::commands::session::Session;
use crate::core::context::{RunContext, RunOptions, Workspace};
use crate::core::error::{PkgError, PkgResult};
use crate::core::process::Runner;
use crate::release::prompt::TerminalPrompt;
use tracing::debug;

/// Build the requested artifacts, then release if asked to
pub fn run_build(options: RunOptions, package: Option<String>, tag: Option<String>) -> PkgResult<()> {
  if !(options.tgz || options.srpm || options.rpm || options.release.any()) {
    return Err(PkgError::message("Nothing to do: specify --tgz, --srpm or --rpm"));
  }

  let session = Session::open(package.as_deref(), tag.as_deref(), options.test)?;
  if !options.test {
    session.git.check_tag_exists(&session.identity.build_tag, options.offline)?;
  }

  let strategy = select_strategy(options.builder.as_deref(), &session.config)?;
  debug!(builder = strategy.kind(), "selected builder");

  let base = session.base_dir(&options);
  let workspace = Workspace::new(&base, &session.identity);
  let mut ctx = RunContext::new(session.identity.clone(), workspace, options.dry_run);

  let env = BuildEnv {
    git: &session.git,
    runner: Runner::new(options.dry_run),
    config: &session.config,
    user: &session.user,
    options: &options,
  };
  let builder = PackageBuilder::new(env, strategy);
  let artifacts = builder.run(&mut ctx, &mut TerminalPrompt)?;
  debug!(?artifacts, "run complete");
  Ok(())
}

/// Release to every configured target unless specific targets are selected
pub fn run_release(mut options: RunOptions, package: Option<String>, tag: Option<String>) -> PkgResult<()> {
  let selection = &mut options.release;
  if !(selection.cvs || selection.koji || selection.git || selection.list_tags) {
    selection.all = true;
  }
  run_build(options, package, tag)
}
