//! Packages whose sources are managed in the legacy CVS build system
//!
//! Sources come from the exported tree like [`NoArchive`], plus any files
//! passed with `--cvs-new-sources`. Packages are built with the build
//! system's own `make` targets in a fresh CVS checkout rather than with a
//! local rpmbuild.

use crate::build::rpmbuild::DirOverrides;
use crate::build::strategy::{BuildBackend, BuildEnv, BuildStrategy, NoArchive};
use crate::core::context::{RunContext, Workspace};
use crate::core::error::PkgResult;
use crate::core::process::ToolCommand;
use crate::release::legacy::LegacyCheckout;
use crate::release::sync::list_files_to_copy;
use std::path::PathBuf;
use tracing::debug;

/// make target producing a source package
pub const SOURCE_PACKAGE_TARGET: &str = "test-srpm";

#[derive(Debug, Default)]
pub struct VcsSynced;

impl BuildStrategy for VcsSynced {
  fn kind(&self) -> &'static str {
    "cvs"
  }

  fn produce_sources(&self, env: &BuildEnv<'_>, ctx: &mut RunContext) -> PkgResult<()> {
    ctx.sources.extend(env.options.cvs_new_sources.iter().cloned());
    NoArchive::adopt_sources(env, ctx)?;
    debug!(sources = ?ctx.sources, "cvs sources");
    Ok(())
  }

  fn test_rewrite_args(&self, ctx: &RunContext) -> Vec<String> {
    NoArchive::short_test_rewrite_args(ctx)
  }

  fn rpmbuild_dir_overrides(&self, workspace: &Workspace) -> DirOverrides {
    NoArchive::gitcopy_dir_overrides(workspace)
  }

  fn copy_extensions(&self) -> &'static [&'static str] {
    &[""]
  }

  fn backend(&self) -> BuildBackend {
    BuildBackend::LegacyMake
  }
}

/// make target producing binary packages: the machine's hardware platform
pub fn binary_package_target(env: &BuildEnv<'_>) -> PkgResult<String> {
  let arch = env.runner.run(&ToolCommand::new("uname").arg("-i"))?;
  Ok(arch.trim().to_string())
}

/// Check out the package, sync the current descriptor and sources into it,
/// and run `target` in the last branch.
///
/// A checkout created earlier in the same run is reused.
pub fn build_with_make(
  env: &BuildEnv<'_>,
  ctx: &mut RunContext,
  strategy: &dyn BuildStrategy,
  target: &str,
  dist: Option<&str>,
) -> PkgResult<Vec<PathBuf>> {
  let checkout = LegacyCheckout::from_config(env.config, &ctx.workspace, &ctx.identity.name, &env.user.tools)?;

  if !ctx.checked_out {
    checkout.verify_not_checked_out()?;
  }
  ctx.checked_out = true;
  checkout.checkout(&env.runner)?;
  checkout.verify_branches()?;

  // Sync the spec we are building, even if it was never committed to CVS
  let files = list_files_to_copy(ctx.descriptor()?, &ctx.workspace.gitcopy, strategy.copy_extensions())?;
  checkout.sync_files(&env.runner, &files)?;
  checkout.upload_sources(&env.runner, &mut ctx.plan, &ctx.sources)?;

  let dist = env.options.dist.as_deref().or(dist);
  let packages = checkout.make_packages(&env.runner, target, dist, &ctx.workspace.base)?;

  if !env.options.test {
    println!("Please be sure to run --release to commit/tag/build this package in CVS.");
  }
  Ok(packages)
}
