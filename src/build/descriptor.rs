//! Package descriptor (`.spec`) editing
//!
//! Only the handful of directives pkgrel needs are recognised; the file is
//! otherwise treated as opaque lines. Edits only ever insert lines, and only
//! into the temporary copy inside the build workspace.

use crate::core::error::{BuildError, PkgResult, ResultExt};
use crate::core::process::{Runner, ToolCommand};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static SOURCE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Source\d+:").expect("valid regex"));
static PATCH_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Patch(\d+):").expect("valid regex"));
static NAME_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Name:\s*(\S+)").expect("valid regex"));
static UPSTREAM_VERSION: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\s*%(?:define|global)\s+upstreamversion\s+(\S+)").expect("valid regex"));

/// Where a new patch goes in a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPoints {
  /// N for the new `PatchN:` directive
  pub patch_number: u32,
  /// Index for the `PatchN:` line
  pub insert_index: usize,
  /// Index for the `%patchN -p1` line, assuming the `PatchN:` line was
  /// inserted first
  pub apply_index: usize,
}

/// Scan descriptor lines once for patch insertion points.
///
/// The directive goes after the last `SourceN:`/`PatchN:` line; the apply
/// line goes after `%setup`, or after the line following `%prep` when there
/// is no `%setup`.
pub fn compute_patch_insertion_points<S: AsRef<str>>(lines: &[S], descriptor: &Path) -> PkgResult<InsertionPoints> {
  let mut patch_number = 0u32;
  let mut insert_index = 0usize;
  let mut apply_index = 0usize;
  let mut seen_setup = false;

  for (i, line) in lines.iter().enumerate() {
    let line = line.as_ref();

    if SOURCE_DIRECTIVE.is_match(line) {
      insert_index = i + 1;
    }

    if let Some(caps) = PATCH_DIRECTIVE.captures(line) {
      insert_index = i + 1;
      let next = caps[1].parse::<u32>().ok().and_then(|n| n.checked_add(1));
      let Some(next) = next else {
        return Err(
          BuildError::DescriptorParse {
            descriptor: descriptor.to_path_buf(),
            line: i + 1,
            reason: format!("patch number out of range: {}", line),
          }
          .into(),
        );
      };
      patch_number = patch_number.max(next);
    }

    if line.starts_with("%prep") {
      if !seen_setup {
        apply_index = i + 2;
      }
    } else if line.starts_with("%setup") {
      seen_setup = true;
      apply_index = i + 2;
    }
  }

  debug!(patch_number, insert_index, apply_index, "patch insertion points");
  if insert_index == 0 || apply_index == 0 {
    return Err(
      BuildError::InsertionPointNotFound {
        descriptor: descriptor.to_path_buf(),
      }
      .into(),
    );
  }

  Ok(InsertionPoints {
    patch_number,
    insert_index,
    apply_index,
  })
}

/// Insert `PatchN: <filename>` and `%patchN -p1` at the given points
pub fn apply_patch_insertion(lines: &mut Vec<String>, points: InsertionPoints, patch_filename: &str) {
  let directive = format!("Patch{}: {}", points.patch_number, patch_filename);
  let apply = format!("%patch{} -p1", points.patch_number);
  let insert = points.insert_index.min(lines.len());

  // Larger index first so the earlier insertion cannot move the later one
  if insert < points.apply_index {
    let apply_at = (points.apply_index - 1).min(lines.len());
    lines.insert(apply_at, apply);
    lines.insert(insert, directive);
  } else {
    lines.insert(insert, directive);
    lines.insert(points.apply_index.min(lines.len()), apply);
  }
}

/// Value of a `%define upstreamversion X` line, if any
pub fn find_upstream_version<S: AsRef<str>>(lines: &[S]) -> Option<String> {
  lines
    .iter()
    .find_map(|line| UPSTREAM_VERSION.captures(line.as_ref()).map(|caps| caps[1].to_string()))
}

/// Value of the `Name:` directive
pub fn find_package_name<S: AsRef<str>>(lines: &[S]) -> Option<String> {
  lines
    .iter()
    .find_map(|line| NAME_DIRECTIVE.captures(line.as_ref()).map(|caps| caps[1].to_string()))
}

pub fn read_lines(descriptor: &Path) -> PkgResult<Vec<String>> {
  let content =
    fs::read_to_string(descriptor).with_context(|| format!("Failed to read {}", descriptor.display()))?;
  Ok(content.lines().map(str::to_string).collect())
}

pub fn write_lines(descriptor: &Path, lines: &[String]) -> PkgResult<()> {
  let mut content = lines.join("\n");
  content.push('\n');
  fs::write(descriptor, content).with_context(|| format!("Failed to write {}", descriptor.display()))
}

/// Insert a patch into the descriptor file on disk
pub fn insert_patch(descriptor: &Path, patch_filename: &str) -> PkgResult<InsertionPoints> {
  let mut lines = read_lines(descriptor)?;
  let points = compute_patch_insertion_points(&lines, descriptor)?;
  apply_patch_insertion(&mut lines, points, patch_filename);
  write_lines(descriptor, &lines)?;
  Ok(points)
}

/// Rewrite the descriptor's version/release for a test build with the
/// external helper. `args` follow the descriptor path.
pub fn rewrite_for_test(runner: &Runner, helper: &str, descriptor: &Path, args: &[String]) -> PkgResult<()> {
  let cmd = ToolCommand::new(helper)
    .arg(descriptor.to_string_lossy())
    .args(args.iter().cloned());
  runner.run(&cmd)?;
  Ok(())
}
