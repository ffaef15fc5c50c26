//! The staged build pipeline
//!
//! ```text
//! Init -> SourcesReady -> SourcePkgReady -> BinaryPkgReady
//!      -> Released | NotReleased -> CleanedUp
//! ```
//!
//! Stages are entered lazily: building a binary package produces sources
//! first, a release builds whatever it needs. Cleanup runs on every exit.

use crate::build::legacy::{SOURCE_PACKAGE_TARGET, binary_package_target, build_with_make};
use crate::build::rpmbuild::{RpmbuildMode, require_wrote_lines, rpmbuild_command};
use crate::build::strategy::{BuildBackend, BuildEnv, BuildStrategy};
use crate::core::context::{RunContext, RunStage};
use crate::core::error::{BuildError, PkgResult, ResultExt};
use crate::core::plan::OperationKind;
use crate::core::process::ToolCommand;
use crate::release::coordinator::ReleaseCoordinator;
use crate::release::prompt::Prompt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct PackageBuilder<'a> {
  env: BuildEnv<'a>,
  strategy: Box<dyn BuildStrategy>,
}

impl<'a> PackageBuilder<'a> {
  pub fn new(env: BuildEnv<'a>, strategy: Box<dyn BuildStrategy>) -> Self {
    Self { env, strategy }
  }

  pub fn env(&self) -> &BuildEnv<'a> {
    &self.env
  }

  pub fn strategy(&self) -> &dyn BuildStrategy {
    self.strategy.as_ref()
  }

  /// Run every stage the options ask for, then clean up.
  ///
  /// Returns the artifacts produced, in order.
  pub fn run(&self, ctx: &mut RunContext, prompt: &mut dyn Prompt) -> PkgResult<Vec<PathBuf>> {
    println!("Building package [{}]", ctx.identity.build_tag);
    info!(builder = self.strategy.kind(), commit = %ctx.identity.commit, "starting build");

    match self.run_stages(ctx, prompt) {
      Ok(()) => {
        self.cleanup(ctx)?;
        Ok(ctx.artifacts.clone())
      }
      Err(err) => {
        if let Err(cleanup_err) = self.cleanup(ctx) {
          warn!("cleanup after failure also failed: {}", cleanup_err);
        }
        Err(err)
      }
    }
  }

  fn run_stages(&self, ctx: &mut RunContext, prompt: &mut dyn Prompt) -> PkgResult<()> {
    ctx.workspace.claim()?;
    let options = self.env.options;
    if options.tgz {
      self.produce_sources(ctx)?;
    }
    if options.srpm {
      self.build_source_package(ctx, None)?;
    }
    if options.rpm {
      self.build_binary_packages(ctx)?;
    }

    if options.release.any() {
      let mut coordinator = ReleaseCoordinator::new(self, prompt);
      let released = coordinator.run(ctx, &options.release)?;
      ctx.advance(if released { RunStage::Released } else { RunStage::NotReleased });
    }
    Ok(())
  }

  /// Produce the sources the package needs. Runs at most once per run.
  pub fn produce_sources(&self, ctx: &mut RunContext) -> PkgResult<()> {
    if ctx.sources_ready {
      debug!("sources already produced");
      return Ok(());
    }
    ctx.workspace.create_dirs()?;
    self.strategy.produce_sources(&self.env, ctx)?;
    ctx.sources_ready = true;
    ctx.advance(RunStage::SourcesReady);
    Ok(())
  }

  /// Rewrite the descriptor for a test build, once
  fn prepare_test_descriptor(&self, ctx: &mut RunContext) -> PkgResult<()> {
    if !self.env.options.test || ctx.test_spec_rewritten {
      return Ok(());
    }
    self.strategy.prepare_descriptor_for_test(&self.env, ctx)?;
    ctx.test_spec_rewritten = true;
    Ok(())
  }

  /// Build a source package. A `--dist` given on the command line wins
  /// over `dist`.
  pub fn build_source_package(&self, ctx: &mut RunContext, dist: Option<&str>) -> PkgResult<PathBuf> {
    self.produce_sources(ctx)?;
    self.prepare_test_descriptor(ctx)?;
    let dist = self.env.options.dist.as_deref().or(dist);

    let srpm = match self.strategy.backend() {
      BuildBackend::Rpmbuild => {
        println!("Building srpm...");
        let output = self.rpmbuild(ctx, dist, RpmbuildMode::Source)?;
        require_wrote_lines(&output, 1)?.remove(0)
      }
      BuildBackend::LegacyMake => build_with_make(&self.env, ctx, self.strategy(), SOURCE_PACKAGE_TARGET, dist)?
        .into_iter()
        .next()
        .ok_or(BuildError::BuildOutputParse { expected: 1, found: 0 })?,
    };

    ctx.artifacts.push(srpm.clone());
    ctx.advance(RunStage::SourcePkgReady);
    Ok(srpm)
  }

  /// Build the source package and every binary package
  pub fn build_binary_packages(&self, ctx: &mut RunContext) -> PkgResult<Vec<PathBuf>> {
    self.produce_sources(ctx)?;
    self.prepare_test_descriptor(ctx)?;

    let written = match self.strategy.backend() {
      BuildBackend::Rpmbuild => {
        let dist = self.env.options.dist.as_deref();
        let output = self.rpmbuild(ctx, dist, RpmbuildMode::Binary)?;
        require_wrote_lines(&output, 2)?
      }
      BuildBackend::LegacyMake => {
        let target = binary_package_target(&self.env)?;
        build_with_make(&self.env, ctx, self.strategy(), &target, None)?
      }
    };
    ctx.artifacts.extend(written.iter().cloned());
    ctx.advance(RunStage::BinaryPkgReady);

    println!("Successfully built: {}", join_paths(&written));

    if self.env.options.auto_install {
      self.auto_install(ctx, &written)?;
    }
    Ok(written)
  }

  fn rpmbuild(&self, ctx: &RunContext, dist: Option<&str>, mode: RpmbuildMode) -> PkgResult<String> {
    let cmd = rpmbuild_command(
      &self.env.user.tools.rpmbuild,
      &self.env.options.rpmbuild_options,
      &self.strategy.rpmbuild_dir_overrides(&ctx.workspace),
      dist,
      mode,
      ctx.descriptor()?,
    );
    debug!("{}", cmd);
    let output = self.env.runner.run(&cmd)?;
    println!("{}", output);
    Ok(output)
  }

  /// Install the freshly built binary packages on this machine
  fn auto_install(&self, ctx: &mut RunContext, written: &[PathBuf]) -> PkgResult<()> {
    let to_install = installable_packages(written, &self.env.user.no_auto_install);
    if to_install.is_empty() {
      return Ok(());
    }

    println!("Auto-installing packages:");
    println!("{}", join_paths(&to_install));
    let cmd = ToolCommand::new("sudo")
      .args(["rpm", "-Uvh", "--force"])
      .args(to_install.iter().map(|p| p.to_string_lossy().to_string()));
    println!("   {}", cmd);
    self.env.runner.run_effect(&mut ctx.plan, OperationKind::Install, "localhost", &cmd)?;
    Ok(())
  }

  /// Remove the workspace, and the downstream checkout if this run created
  /// it, unless `--no-cleanup`. A stale checkout found at the start of a
  /// release is left for the operator.
  pub fn cleanup(&self, ctx: &mut RunContext) -> PkgResult<()> {
    if ctx.stage == RunStage::CleanedUp {
      return Ok(());
    }

    if self.env.options.no_cleanup {
      println!("Leaving rpmbuild files in: {}", ctx.workspace.root.display());
    } else {
      remove_dir_if_exists(&ctx.workspace.root)?;
      if ctx.checked_out {
        remove_dir_if_exists(&ctx.workspace.cvs_package_dir(&ctx.identity.name))?;
      }
    }
    ctx.advance(RunStage::CleanedUp);
    Ok(())
  }
}

/// Binary packages (not source packages) not matching any skip pattern
fn installable_packages(written: &[PathBuf], skip: &[String]) -> Vec<PathBuf> {
  written
    .iter()
    .filter(|path| {
      let name = path.to_string_lossy();
      if skip.iter().any(|pattern| name.contains(pattern.as_str())) {
        println!("Skipping install of: {}", name);
        return false;
      }
      name.ends_with(".rpm") && !name.ends_with(".src.rpm")
    })
    .cloned()
    .collect()
}

fn remove_dir_if_exists(dir: &Path) -> PkgResult<()> {
  if dir.exists() {
    debug!("removing {}", dir.display());
    fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
  }
  Ok(())
}

fn join_paths(paths: &[PathBuf]) -> String {
  paths
    .iter()
    .map(|p| p.to_string_lossy().to_string())
    .collect::<Vec<_>>()
    .join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_installable_packages() {
    let written = vec![
      PathBuf::from("/b/foo-1.0-1.src.rpm"),
      PathBuf::from("/b/noarch/foo-1.0-1.noarch.rpm"),
      PathBuf::from("/b/noarch/foo-devel-1.0-1.noarch.rpm"),
      PathBuf::from("/b/noarch/foo-debuginfo-1.0-1.noarch.rpm"),
    ];
    let skip = vec!["debuginfo".to_string()];
    assert_eq!(
      installable_packages(&written, &skip),
      vec![
        PathBuf::from("/b/noarch/foo-1.0-1.noarch.rpm"),
        PathBuf::from("/b/noarch/foo-devel-1.0-1.noarch.rpm"),
      ]
    );
  }
}
