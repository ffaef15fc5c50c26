//! Record of the outward-facing commands a release run performs
//!
//! Uploads, commits, tags, build submissions and installs are recorded as
//! they happen (or as they are skipped under `--dry-run`). At the end of a
//! dry run the plan is printed so the operator can review exactly what a
//! real run would do.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut plan = ReleasePlan::new("spacewalk-java", true);
//! plan.record(OperationKind::Submit, "dist-f12", "koji build --nowait dist-f12 foo.src.rpm", false);
//! println!("{}", plan.to_human_readable());
//! ```

use crate::core::error::PkgResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of outward-facing operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
  UploadSources,
  Commit,
  Tag,
  Build,
  Submit,
  Install,
}

impl fmt::Display for OperationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OperationKind::UploadSources => write!(f, "upload"),
      OperationKind::Commit => write!(f, "commit"),
      OperationKind::Tag => write!(f, "tag"),
      OperationKind::Build => write!(f, "build"),
      OperationKind::Submit => write!(f, "submit"),
      OperationKind::Install => write!(f, "install"),
    }
  }
}

/// One recorded command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedCommand {
  pub kind: OperationKind,
  /// CVS branch, koji tag or checkout the command applies to
  pub target: String,
  pub command: String,
  /// False when the command was skipped by --dry-run
  pub executed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleasePlan {
  pub project: String,
  pub dry_run: bool,
  pub created_at: DateTime<Utc>,
  pub operations: Vec<PlannedCommand>,
}

impl ReleasePlan {
  pub fn new(project: impl Into<String>, dry_run: bool) -> Self {
    Self {
      project: project.into(),
      dry_run,
      created_at: Utc::now(),
      operations: Vec::new(),
    }
  }

  pub fn record(&mut self, kind: OperationKind, target: &str, command: impl Into<String>, executed: bool) {
    self.operations.push(PlannedCommand {
      kind,
      target: target.to_string(),
      command: command.into(),
      executed,
    });
  }

  /// Commands that were not executed
  pub fn skipped(&self) -> impl Iterator<Item = &PlannedCommand> {
    self.operations.iter().filter(|op| !op.executed)
  }

  pub fn to_json(&self) -> PkgResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn to_human_readable(&self) -> String {
    let mut output = String::new();

    let mode = if self.dry_run { "dry-run" } else { "release" };
    output.push_str(&format!(
      "📋 Plan: {} {} ({})\n",
      mode,
      self.project,
      self.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
      "\n   Operations ({}, {} skipped):\n",
      self.len(),
      self.skipped().count()
    ));

    for (i, op) in self.operations.iter().enumerate() {
      let marker = if op.executed { "done" } else { "skipped" };
      output.push_str(&format!(
        "   {}. [{}] {} {}: {}\n",
        i + 1,
        marker,
        op.kind,
        op.target,
        op.command
      ));
    }

    output
  }

  pub fn len(&self) -> usize {
    self.operations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.operations.is_empty()
  }
}
