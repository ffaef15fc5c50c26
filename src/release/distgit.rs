//! dist-git release target, driven through `fedpkg`

use crate::core::config::{BuildConfig, ToolsConfig};
use crate::core::context::Workspace;
use crate::core::error::{ConfigError, PkgResult, ReleaseError, ResultExt};
use crate::core::plan::{OperationKind, ReleasePlan};
use crate::core::process::{Runner, ToolCommand};
use crate::release::prompt::Prompt;
use crate::release::sync::{SyncPlan, sync_files};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Config section enabling the dist-git target
pub const DISTGIT_SECTION: &str = "distgit";

pub struct DistGitCheckout {
  pub name: String,
  /// Shared with CVS: `<base>/cvswork`
  pub workdir: PathBuf,
  pub package_dir: PathBuf,
  fedpkg: String,
}

impl DistGitCheckout {
  pub fn from_config(config: &BuildConfig, workspace: &Workspace, name: &str, tools: &ToolsConfig) -> PkgResult<Self> {
    if !config.has_section(DISTGIT_SECTION) {
      return Err(
        ConfigError::NotConfigured {
          target: "git".to_string(),
          reason: format!("no [{}] section", DISTGIT_SECTION),
        }
        .into(),
      );
    }

    Ok(Self {
      name: name.to_string(),
      workdir: workspace.cvs_workdir(),
      package_dir: workspace.cvs_package_dir(name),
      fedpkg: tools.fedpkg.clone(),
    })
  }

  /// Fail if a clone (or CVS checkout) is already in the way
  pub fn verify_not_checked_out(&self) -> PkgResult<()> {
    if self.package_dir.exists() {
      return Err(
        ReleaseError::AlreadyCheckedOut {
          path: self.package_dir.clone(),
        }
        .into(),
      );
    }
    Ok(())
  }

  /// `fedpkg clone <name>` into the work directory
  pub fn clone_package(&self, runner: &Runner) -> PkgResult<()> {
    fs::create_dir_all(&self.workdir).with_context(|| format!("Failed to create {}", self.workdir.display()))?;

    println!("Cloning dist-git module [{}]", self.name);
    let cmd = ToolCommand::new(&self.fedpkg)
      .args(["clone", self.name.as_str()])
      .current_dir(&self.workdir);
    runner.run(&cmd)?;
    Ok(())
  }

  /// Copy `files` in, `git add` new and updated files, `git rm` obsolete ones
  pub fn sync_files(&self, runner: &Runner, files: &[PathBuf]) -> PkgResult<SyncPlan> {
    println!("Syncing files with dist-git checkout [{}]", self.package_dir.display());
    let plan = sync_files(files, &self.package_dir)?;

    for file in plan.new.iter().chain(&plan.updated) {
      let cmd = ToolCommand::new("git")
        .args(["add", file.as_str()])
        .current_dir(&self.package_dir);
      let output = runner.run_status(&cmd)?;
      debug!(status = ?output.status, "git add {}", file);
    }

    for file in &plan.obsolete {
      let cmd = ToolCommand::new("git")
        .args(["rm", file.as_str()])
        .current_dir(&self.package_dir);
      runner.run(&cmd)?;
    }
    Ok(plan)
  }

  /// `fedpkg new-sources <sources...>`
  pub fn upload_sources(&self, runner: &Runner, plan: &mut ReleasePlan, sources: &[PathBuf]) -> PkgResult<()> {
    if sources.is_empty() {
      debug!("No sources need to be uploaded.");
      return Ok(());
    }

    println!("Uploading sources to lookaside:");
    let cmd = ToolCommand::new(&self.fedpkg)
      .arg("new-sources")
      .args(sources.iter().map(|s| s.to_string_lossy().to_string()))
      .current_dir(&self.package_dir);
    if let Some(output) = runner.run_effect(plan, OperationKind::UploadSources, "dist-git", &cmd)? {
      debug!("{}", output);
    }
    Ok(())
  }

  /// Review `fedpkg diff`, confirm, and commit
  pub fn confirm_and_commit(
    &self,
    runner: &Runner,
    plan: &mut ReleasePlan,
    prompt: &mut dyn Prompt,
    build_version: &str,
  ) -> PkgResult<()> {
    let diff_cmd = ToolCommand::new(&self.fedpkg).arg("diff").current_dir(&self.package_dir);
    let diff = runner.run_status(&diff_cmd)?.stdout;
    prompt.show_diff(
      &format!("Running 'fedpkg diff' in: {}", self.package_dir.display()),
      &diff,
    );

    if !prompt.confirm("Do you wish to proceed with commit?")? {
      println!("Fine, you're on your own!");
      return Err(ReleaseError::UserDeclined.into());
    }

    let cmd = ToolCommand::new(&self.fedpkg)
      .args(["commit", "-m"])
      .arg(format!("Update {} to {}", self.name, build_version))
      .current_dir(&self.package_dir);
    debug!("git commit command: {}", cmd);
    if !runner.is_dry_run() {
      println!("Proceeding with commit.");
    }
    runner.run_effect(plan, OperationKind::Commit, "dist-git", &cmd)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::context::tests::identity;
  use crate::core::error::PkgError;
  use crate::release::prompt::ScriptedPrompt;

  fn checkout(dir: &std::path::Path) -> DistGitCheckout {
    let mut config = BuildConfig::default();
    config.set(DISTGIT_SECTION, "enabled", "true");
    let ws = Workspace::new(dir, &identity());
    DistGitCheckout::from_config(&config, &ws, "foo", &ToolsConfig::default()).unwrap()
  }

  #[test]
  fn test_requires_section() {
    let ws = Workspace::new(std::path::Path::new("/b"), &identity());
    let err = DistGitCheckout::from_config(&BuildConfig::default(), &ws, "foo", &ToolsConfig::default())
      .err()
      .unwrap();
    assert!(matches!(err, PkgError::Config(ConfigError::NotConfigured { .. })));
  }

  #[test]
  fn test_stale_checkout_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let checkout = checkout(dir.path());
    fs::create_dir_all(&checkout.package_dir).unwrap();

    let err = checkout.verify_not_checked_out().unwrap_err();
    assert!(matches!(err, PkgError::Release(ReleaseError::AlreadyCheckedOut { .. })));
  }

  #[test]
  fn test_declined_commit() {
    let dir = tempfile::tempdir().unwrap();
    let checkout = DistGitCheckout {
      fedpkg: "true".to_string(),
      ..checkout(dir.path())
    };
    fs::create_dir_all(&checkout.package_dir).unwrap();

    let mut plan = ReleasePlan::new("foo", true);
    let mut prompt = ScriptedPrompt::new([false]);
    let err = checkout
      .confirm_and_commit(&Runner::new(true), &mut plan, &mut prompt, "1.0-1")
      .unwrap_err();
    assert!(matches!(err, PkgError::Release(ReleaseError::UserDeclined)));
    assert!(plan.is_empty());
    assert_eq!(prompt.diffs.len(), 1);
  }
}
