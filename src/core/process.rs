//! External tool invocation
//!
//! Every process pkgrel starts (rpmbuild, cvs, make, koji, fedpkg, helper
//! scripts) goes through [`Runner`]. Commands carry their own working
//! directory; the pkgrel process never changes its current directory.
//!
//! Commands that reach outside the build workspace (uploads, commits, tags,
//! build submissions, installs) go through [`Runner::run_effect`], which
//! honours `--dry-run` and records the command in the run's [`ReleasePlan`].

use crate::core::error::{PkgError, PkgResult, ToolError};
use crate::core::interrupt;
use crate::core::plan::{OperationKind, ReleasePlan};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::AtomicBool;
use tracing::debug;

/// Split a user supplied option string the way a shell would, expanding a
/// leading `~` in each word
pub fn split_options(line: &str) -> PkgResult<Vec<String>> {
  let words = shell_words::split(line)
    .map_err(|e| PkgError::message(format!("Cannot parse options '{}': {}", line, e)))?;
  Ok(words.iter().map(|word| expand_home(word)).collect())
}

/// `~` and `~/...` relative to `$HOME`; anything else unchanged
fn expand_home(word: &str) -> String {
  let rest = match word.strip_prefix('~') {
    Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
    _ => return word.to_string(),
  };
  match std::env::var("HOME") {
    Ok(home) => format!("{}{}", home.trim_end_matches('/'), rest),
    Err(_) => word.to_string(),
  }
}

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
  program: String,
  args: Vec<String>,
  cwd: Option<PathBuf>,
  envs: Vec<(String, String)>,
}

impl ToolCommand {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      envs: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.envs.push((key.into(), value.into()));
    self
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  #[cfg(test)]
  pub fn get_args(&self) -> &[String] {
    &self.args
  }

  pub fn get_cwd(&self) -> Option<&Path> {
    self.cwd.as_deref()
  }

  fn to_command(&self) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd.args(&self.args);
    if let Some(dir) = &self.cwd {
      cmd.current_dir(dir);
    }
    for (key, value) in &self.envs {
      cmd.env(key, value);
    }
    cmd
  }
}

impl fmt::Display for ToolCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (key, value) in &self.envs {
      write!(f, "{}={} ", key, quote(value))?;
    }
    write!(f, "{}", quote(&self.program))?;
    for arg in &self.args {
      write!(f, " {}", quote(arg))?;
    }
    Ok(())
  }
}

/// Quote a word for display if a shell would split it
fn quote(word: &str) -> String {
  if !word.is_empty() && !word.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
    return word.to_string();
  }
  format!("'{}'", word.replace('\'', "'\\''"))
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct ToolOutput {
  pub status: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.status == Some(0)
  }
}

/// Executes external commands, blocking until each one finishes.
///
/// A Ctrl-C before or during a command fails it with `Interrupted`.
#[derive(Debug, Clone, Copy)]
pub struct Runner {
  dry_run: bool,
  interrupted: &'static AtomicBool,
}

impl Runner {
  pub fn new(dry_run: bool) -> Self {
    Self {
      dry_run,
      interrupted: interrupt::flag(),
    }
  }

  #[cfg(test)]
  pub fn with_interrupt_flag(dry_run: bool, interrupted: &'static AtomicBool) -> Self {
    Self { dry_run, interrupted }
  }

  pub fn is_dry_run(&self) -> bool {
    self.dry_run
  }

  /// Run a command and return its stdout, failing on a non-zero exit
  pub fn run(&self, cmd: &ToolCommand) -> PkgResult<String> {
    let output = self.run_status(cmd)?;
    if !output.success() {
      return Err(
        ToolError::CommandFailed {
          command: cmd.to_string(),
          status: output.status,
          stderr: output.stderr,
        }
        .into(),
      );
    }
    Ok(output.stdout)
  }

  /// Run a command and hand the exit status back to the caller
  pub fn run_status(&self, cmd: &ToolCommand) -> PkgResult<ToolOutput> {
    debug!(command = %cmd, cwd = ?cmd.get_cwd(), "running");
    interrupt::check_flag(self.interrupted, &cmd.to_string())?;

    let output = cmd.to_command().output().map_err(|e| ToolError::Spawn {
      command: cmd.to_string(),
      reason: e.to_string(),
    })?;
    interrupt::check_flag(self.interrupted, &cmd.to_string())?;

    let result = ToolOutput {
      status: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    debug!(status = ?result.status, "finished: {}", cmd.program());
    Ok(result)
  }

  /// Run a command attached to the terminal (editors, sudo prompts)
  pub fn run_interactive(&self, cmd: &ToolCommand) -> PkgResult<()> {
    debug!(command = %cmd, "running interactively");
    interrupt::check_flag(self.interrupted, &cmd.to_string())?;

    let status = cmd
      .to_command()
      .stdin(Stdio::inherit())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit())
      .status()
      .map_err(|e| ToolError::Spawn {
        command: cmd.to_string(),
        reason: e.to_string(),
      })?;
    interrupt::check_flag(self.interrupted, &cmd.to_string())?;

    if !status.success() {
      return Err(
        ToolError::CommandFailed {
          command: cmd.to_string(),
          status: status.code(),
          stderr: String::new(),
        }
        .into(),
      );
    }
    Ok(())
  }

  /// Run a command with effects outside the build workspace.
  ///
  /// In dry-run mode the command is printed and recorded but not executed,
  /// and `None` is returned.
  pub fn run_effect(
    &self,
    plan: &mut ReleasePlan,
    kind: OperationKind,
    target: &str,
    cmd: &ToolCommand,
  ) -> PkgResult<Option<String>> {
    if self.dry_run {
      print_dry_run_warning(&cmd.to_string());
      plan.record(kind, target, cmd.to_string(), false);
      return Ok(None);
    }

    let output = self.run(cmd)?;
    plan.record(kind, target, cmd.to_string(), true);
    Ok(Some(output))
  }
}

pub fn print_dry_run_warning(command: &str) {
  println!();
  println!("WARNING: Skipping command due to --dry-run: {}", command);
  println!();
}
