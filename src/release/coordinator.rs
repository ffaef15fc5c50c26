//! Release orchestration across the configured targets

use crate::build::builder::PackageBuilder;
use crate::core::context::{ReleaseSelection, RunContext};
use crate::core::error::{ConfigError, PkgResult};
use crate::core::plan::OperationKind;
use crate::release::distgit::DistGitCheckout;
use crate::release::farm::{Eligibility, build_options, farm_targets, farm_unconfigured_reason, render_targets, submit_command};
use crate::release::legacy::{LegacyCheckout, cvs_unconfigured_reason};
use crate::release::prompt::Prompt;
use crate::release::sync::list_files_to_copy;
use tracing::{debug, info};

pub struct ReleaseCoordinator<'r, 'a> {
  builder: &'r PackageBuilder<'a>,
  prompt: &'r mut dyn Prompt,
}

impl<'r, 'a> ReleaseCoordinator<'r, 'a> {
  pub fn new(builder: &'r PackageBuilder<'a>, prompt: &'r mut dyn Prompt) -> Self {
    Self { builder, prompt }
  }

  /// Release to the selected targets. Returns whether anything was released.
  pub fn run(&mut self, ctx: &mut RunContext, selection: &ReleaseSelection) -> PkgResult<bool> {
    let env = *self.builder.env();

    if selection.list_tags {
      let targets = farm_targets(env.config, &ctx.identity.name, &env.options.only_tags);
      println!("{}", render_targets(&targets, false, false)?);
    }

    let mut released = false;
    if selection.all {
      released |= self.release(ctx)?;
    } else {
      if selection.cvs {
        self.cvs_release(ctx)?;
        released = true;
      }
      if selection.git {
        self.distgit_release(ctx)?;
        released = true;
      }
      if selection.koji {
        released |= self.farm_release(ctx)?;
      }
    }

    if env.runner.is_dry_run() && !ctx.plan.is_empty() {
      if env.options.plan_json {
        println!("{}", ctx.plan.to_json()?);
      } else {
        println!("{}", ctx.plan.to_human_readable());
      }
    }
    Ok(released)
  }

  /// Every configured target: CVS, then the build farm
  pub fn release(&mut self, ctx: &mut RunContext) -> PkgResult<bool> {
    let config = self.builder.env().config;
    let mut released = false;

    match cvs_unconfigured_reason(config) {
      None => {
        self.cvs_release(ctx)?;
        released = true;
      }
      Some(reason) => debug!("skipping CVS release: {}", reason),
    }

    match farm_unconfigured_reason(config) {
      None => released |= self.farm_release(ctx)?,
      Some(reason) => debug!("skipping build farm release: {}", reason),
    }
    Ok(released)
  }

  /// Sync into a fresh CVS checkout, commit, tag, and submit builds
  pub fn cvs_release(&mut self, ctx: &mut RunContext) -> PkgResult<()> {
    let env = *self.builder.env();
    let checkout = LegacyCheckout::from_config(env.config, &ctx.workspace, &ctx.identity.name, &env.user.tools)?;
    info!(branches = ?checkout.branches, "releasing to CVS");

    if !ctx.checked_out {
      checkout.verify_not_checked_out()?;
    }
    ctx.checked_out = true;
    checkout.checkout(&env.runner)?;
    checkout.verify_branches()?;

    self.builder.produce_sources(ctx)?;
    let files = list_files_to_copy(
      ctx.descriptor()?,
      &ctx.workspace.gitcopy,
      self.builder.strategy().copy_extensions(),
    )?;
    checkout.sync_files(&env.runner, &files)?;
    checkout.upload_sources(&env.runner, &mut ctx.plan, &ctx.sources)?;
    checkout.confirm_and_commit(&env.runner, &mut ctx.plan, &mut *self.prompt, &ctx.identity.build_version)?;
    checkout.make_tag(&env.runner, &mut ctx.plan)?;
    checkout.make_build(&env.runner, &mut ctx.plan)?;
    Ok(())
  }

  /// Sync into a dist-git clone and commit through fedpkg
  pub fn distgit_release(&mut self, ctx: &mut RunContext) -> PkgResult<()> {
    let env = *self.builder.env();
    let checkout = DistGitCheckout::from_config(env.config, &ctx.workspace, &ctx.identity.name, &env.user.tools)?;
    info!("releasing to dist-git");

    checkout.verify_not_checked_out()?;
    ctx.checked_out = true;
    checkout.clone_package(&env.runner)?;

    self.builder.produce_sources(ctx)?;
    let files = list_files_to_copy(
      ctx.descriptor()?,
      &ctx.workspace.gitcopy,
      self.builder.strategy().copy_extensions(),
    )?;
    checkout.sync_files(&env.runner, &files)?;
    checkout.upload_sources(&env.runner, &mut ctx.plan, &ctx.sources)?;
    checkout.confirm_and_commit(&env.runner, &mut ctx.plan, &mut *self.prompt, &ctx.identity.build_version)?;
    Ok(())
  }

  /// Build a source package per eligible tag and submit it to the build farm.
  ///
  /// Returns whether any build was submitted.
  pub fn farm_release(&mut self, ctx: &mut RunContext) -> PkgResult<bool> {
    let env = *self.builder.env();
    if let Some(reason) = farm_unconfigured_reason(env.config) {
      return Err(
        ConfigError::NotConfigured {
          target: "koji".to_string(),
          reason: reason.to_string(),
        }
        .into(),
      );
    }

    let options = build_options(env.user, env.options.scratch)?;
    let targets = farm_targets(env.config, &ctx.identity.name, &env.options.only_tags);
    let mut submitted = false;

    for target in targets {
      match target.eligibility {
        Eligibility::Blacklisted => {
          println!("WARNING: {} is blacklisted for tag {}, skipping", ctx.identity.name, target.tag);
          continue;
        }
        Eligibility::NotWhitelisted => {
          println!("WARNING: {} is not whitelisted for tag {}, skipping", ctx.identity.name, target.tag);
          continue;
        }
        Eligibility::Eligible | Eligibility::Whitelisted => {}
      }

      println!("Building {} for tag {}", ctx.identity.build_tag, target.tag);
      let srpm = self.builder.build_source_package(ctx, target.disttag.as_deref())?;

      let cmd = submit_command(&env.user.tools.build_client, &options, &target.tag, &srpm);
      println!("   {}", cmd);
      if let Some(output) = env.runner.run_effect(&mut ctx.plan, OperationKind::Submit, &target.tag, &cmd)? {
        println!("{}", output);
      }
      submitted = true;
    }
    Ok(submitted)
  }
}
