//! Legacy CVS build system checkout
//!
//! Layout: `<base>/cvswork/<name>/<branch>/`, one directory per configured
//! branch, each driven through the build system's `make` targets.

use crate::core::config::{BuildConfig, ToolsConfig};
use crate::core::context::Workspace;
use crate::core::error::{ConfigError, PkgError, PkgResult, ReleaseError, ResultExt, ToolError};
use crate::core::plan::{OperationKind, ReleasePlan};
use crate::core::process::{Runner, ToolCommand, print_dry_run_warning};
use crate::release::prompt::Prompt;
use crate::release::sync::{SyncPlan, sync_files};
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// `+- 123456: summary` lines in a changelog diff
static BUG_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+-\s*(\d+)\s*:\s*(.+)$").expect("valid regex"));

/// `Resolves: #N - summary` for every bug referenced by added changelog lines
pub fn extract_bug_references(diff: &str) -> Vec<String> {
  let mut seen = Vec::new();
  for line in diff.lines() {
    if let Some(caps) = BUG_LINE.captures(line) {
      let entry = format!("Resolves: #{} - {}", &caps[1], caps[2].trim());
      if !seen.contains(&entry) {
        seen.push(entry);
      }
    }
  }
  seen
}

/// Commit message for a release: summary line plus bug references
pub fn commit_message(name: &str, build_version: &str, diff: &str) -> String {
  let mut message = format!("Update {} to {}\n", name, build_version);
  for line in extract_bug_references(diff) {
    message.push_str(&line);
    message.push('\n');
  }
  message
}

/// Why CVS cannot be used, or `None` when it is fully configured
pub fn cvs_unconfigured_reason(config: &BuildConfig) -> Option<&'static str> {
  if !config.has_section("cvs") {
    Some("no [cvs] section")
  } else if !config.has_option("cvs", "cvsroot") {
    Some("no cvsroot defined in [cvs]")
  } else if !config.has_option("cvs", "branches") {
    Some("no branches defined in [cvs]")
  } else {
    None
  }
}

/// One package checked out from the CVS build system
#[derive(Debug, Clone)]
pub struct LegacyCheckout {
  pub name: String,
  pub root: String,
  pub branches: Vec<String>,
  /// `<base>/cvswork`
  pub workdir: PathBuf,
  /// `<base>/cvswork/<name>`
  pub package_dir: PathBuf,
  cvs: String,
  make: String,
}

impl LegacyCheckout {
  /// Checkout description from `[cvs] cvsroot, branches`; `NotConfigured` when absent
  pub fn from_config(config: &BuildConfig, workspace: &Workspace, name: &str, tools: &ToolsConfig) -> PkgResult<Self> {
    if let Some(reason) = cvs_unconfigured_reason(config) {
      debug!("cannot build in CVS: {}", reason);
      return Err(
        ConfigError::NotConfigured {
          target: "cvs".to_string(),
          reason: reason.to_string(),
        }
        .into(),
      );
    }

    let root = config.require("cvs", "cvsroot")?.to_string();
    let branches = config.get_list("cvs", "branches");
    if branches.is_empty() {
      return Err(
        ConfigError::NotConfigured {
          target: "cvs".to_string(),
          reason: "[cvs] branches is empty".to_string(),
        }
        .into(),
      );
    }
    debug!(cvs_root = %root, ?branches, "cvs configuration");

    Ok(Self {
      name: name.to_string(),
      root,
      branches,
      workdir: workspace.cvs_workdir(),
      package_dir: workspace.cvs_package_dir(name),
      cvs: tools.cvs.clone(),
      make: tools.make.clone(),
    })
  }

  pub fn branch_dir(&self, branch: &str) -> PathBuf {
    self.package_dir.join(branch)
  }

  /// Fail if a checkout from an earlier run is still around
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

  /// `cvs -d <root> co <name>` inside the work directory
  pub fn checkout(&self, runner: &Runner) -> PkgResult<()> {
    fs::create_dir_all(&self.workdir).with_context(|| format!("Failed to create {}", self.workdir.display()))?;
    println!("Checking out cvs module [{}]", self.name);
    let cmd = ToolCommand::new(&self.cvs)
      .args(["-d", self.root.as_str(), "co", self.name.as_str()])
      .current_dir(&self.workdir);
    runner.run(&cmd)?;
    Ok(())
  }

  pub fn verify_branches(&self) -> PkgResult<()> {
    for branch in &self.branches {
      if !self.branch_dir(branch).exists() {
        return Err(
          ReleaseError::MissingBranch {
            project: self.name.clone(),
            branch: branch.clone(),
          }
          .into(),
        );
      }
    }
    Ok(())
  }

  /// Copy `files` into every branch, `cvs add` new files and `cvs rm` obsolete ones
  pub fn sync_files(&self, runner: &Runner, files: &[PathBuf]) -> PkgResult<Vec<SyncPlan>> {
    let mut plans = Vec::with_capacity(self.branches.len());
    for branch in &self.branches {
      println!("Syncing files with CVS branch [{}]", branch);
      let branch_dir = self.branch_dir(branch);
      let plan = sync_files(files, &branch_dir)?;

      for file in &plan.new {
        // Re-adding a known file fails harmlessly
        let cmd = ToolCommand::new(&self.cvs).args(["add", file.as_str()]).current_dir(&branch_dir);
        let output = runner.run_status(&cmd)?;
        debug!(status = ?output.status, "cvs add {}", file);
      }

      for file in &plan.obsolete {
        let cmd = ToolCommand::new(&self.cvs)
          .args(["rm", "-Rf", file.as_str()])
          .current_dir(&branch_dir);
        runner.run(&cmd)?;
      }
      plans.push(plan);
    }
    Ok(plans)
  }

  /// `make new-sources FILES="..."` in every branch
  pub fn upload_sources(&self, runner: &Runner, plan: &mut ReleasePlan, sources: &[PathBuf]) -> PkgResult<()> {
    if sources.is_empty() {
      debug!("No sources need to be uploaded.");
      return Ok(());
    }

    println!("Uploading sources to dist-cvs lookaside:");
    let files = join_paths(sources);
    for branch in &self.branches {
      let cmd = ToolCommand::new(&self.make)
        .arg("new-sources")
        .arg(format!("FILES={}", files))
        .current_dir(self.branch_dir(branch));
      if let Some(output) = runner.run_effect(plan, OperationKind::UploadSources, branch, &cmd)? {
        debug!("{}", output);
      }
    }
    Ok(())
  }

  /// Review the pending changes, confirm, and commit with a generated message
  pub fn confirm_and_commit(
    &self,
    runner: &Runner,
    plan: &mut ReleasePlan,
    prompt: &mut dyn Prompt,
    build_version: &str,
  ) -> PkgResult<()> {
    let diff_cmd = ToolCommand::new(&self.cvs).args(["diff", "-u"]).current_dir(&self.package_dir);
    // cvs diff exits 1 when there are differences
    let diff = runner.run_status(&diff_cmd)?.stdout;
    prompt.show_diff(
      &format!("Running 'cvs diff -u' in: {}", self.package_dir.display()),
      &diff,
    );

    if !prompt.confirm("Do you wish to proceed with commit?")? {
      println!("Fine, you're on your own!");
      return Err(ReleaseError::UserDeclined.into());
    }

    let mut message_file = tempfile::NamedTempFile::new().context("Failed to create commit message file")?;
    let message = commit_message(&self.name, build_version, &diff);
    message_file.write_all(message.as_bytes())?;
    message_file.flush()?;
    debug!("Storing CVS commit message in temp file: {}", message_file.path().display());

    println!();
    println!("##### CVS commit message: #####");
    println!();
    println!("{}", message);
    println!("###############################");
    println!();

    if prompt.confirm("Would you like to edit this commit message?")? {
      prompt.edit_message(message_file.path())?;
    }

    let cmd = ToolCommand::new(&self.cvs)
      .arg("commit")
      .arg("-F")
      .arg(message_file.path().to_string_lossy())
      .current_dir(&self.package_dir);
    if !runner.is_dry_run() {
      println!("Proceeding with commit.");
    }
    runner.run_effect(plan, OperationKind::Commit, "cvs", &cmd)?;
    Ok(())
  }

  /// `make tag` in every branch; exit status 1 (tag exists) is tolerated
  pub fn make_tag(&self, runner: &Runner, plan: &mut ReleasePlan) -> PkgResult<()> {
    if !runner.is_dry_run() {
      println!("Creating CVS tags...");
    }
    for branch in &self.branches {
      let cmd = ToolCommand::new(&self.make).arg("tag").current_dir(self.branch_dir(branch));
      if runner.is_dry_run() {
        print_dry_run_warning(&cmd.to_string());
        plan.record(OperationKind::Tag, branch, cmd.to_string(), false);
        continue;
      }

      let output = runner.run_status(&cmd)?;
      println!("{}", output.stdout);
      if output.status.is_none_or(|status| status > 1) {
        return Err(
          ToolError::CommandFailed {
            command: cmd.to_string(),
            status: output.status,
            stderr: output.stderr,
          }
          .into(),
        );
      }
      plan.record(OperationKind::Tag, branch, cmd.to_string(), true);
    }
    Ok(())
  }

  /// `BUILD_FLAGS=--nowait make build` in every branch
  pub fn make_build(&self, runner: &Runner, plan: &mut ReleasePlan) -> PkgResult<()> {
    if !runner.is_dry_run() {
      println!("Submitting CVS builds...");
    }
    for branch in &self.branches {
      let cmd = ToolCommand::new(&self.make)
        .env("BUILD_FLAGS", "--nowait")
        .arg("build")
        .current_dir(self.branch_dir(branch));
      if let Some(output) = runner.run_effect(plan, OperationKind::Submit, branch, &cmd)? {
        println!("{}", output);
      }
    }
    Ok(())
  }

  /// Run `make [DIST=<dist>] <target>` in the last branch and move every
  /// written artifact into `dest_dir`
  pub fn make_packages(&self, runner: &Runner, target: &str, dist: Option<&str>, dest_dir: &Path) -> PkgResult<Vec<PathBuf>> {
    let branch = self
      .branches
      .last()
      .ok_or_else(|| PkgError::message("No CVS branches configured"))?;
    println!("Building with CVS make {}...", target);

    let mut cmd = ToolCommand::new(&self.make).current_dir(self.branch_dir(branch));
    if let Some(dist) = dist {
      cmd = cmd.arg(format!("DIST={}", dist));
    }
    let output = runner.run(&cmd.arg(target))?;
    debug!("{}", output);

    let mut moved = Vec::new();
    for written in crate::build::rpmbuild::parse_wrote_lines(&output) {
      let Some(file_name) = written.file_name() else {
        continue;
      };
      let dest = dest_dir.join(file_name);
      move_file(&written, &dest)?;
      println!("Wrote: {}", dest.display());
      moved.push(dest);
    }
    Ok(moved)
  }
}

fn join_paths(paths: &[PathBuf]) -> String {
  paths
    .iter()
    .map(|p| p.to_string_lossy().to_string())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Rename, falling back to copy+remove across filesystems
fn move_file(from: &Path, to: &Path) -> PkgResult<()> {
  if fs::rename(from, to).is_ok() {
    return Ok(());
  }
  fs::copy(from, to).with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
  fs::remove_file(from).with_context(|| format!("Failed to remove {}", from.display()))?;
  Ok(())
}
