//! Syncing build files (spec, patches, ...) into a downstream checkout
//!
//! The caller owns version control: [`sync_files`] copies and classifies,
//! then the CVS or dist-git target adds new files and removes obsolete ones
//! with its own client.

use crate::core::error::{PkgResult, ResultExt};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Build-system files that are never overwritten or removed
pub const PROTECTED_FILES: &[&str] = &["branch", "CVS", ".cvsignore", "Makefile", "sources", ".git", ".gitignore"];

/// Outcome of syncing one destination, by basename
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
  /// Did not exist in the destination before the copy
  pub new: Vec<String>,
  /// Existed and were overwritten
  pub updated: Vec<String>,
  /// Present in the destination but no longer produced; the caller removes them
  pub obsolete: Vec<String>,
}

/// Files to sync: the descriptor plus every top-level file of the exported
/// tree matching `extensions` (`""` matches everything).
///
/// Protected names and other `*.spec` files are skipped.
pub fn list_files_to_copy(descriptor: &Path, gitcopy: &Path, extensions: &[&str]) -> PkgResult<Vec<PathBuf>> {
  let mut files = vec![descriptor.to_path_buf()];

  let mut entries: Vec<PathBuf> = fs::read_dir(gitcopy)
    .with_context(|| format!("Failed to list {}", gitcopy.display()))?
    .filter_map(|entry| entry.ok())
    .map(|entry| entry.path())
    .filter(|path| !path.is_dir())
    .collect();
  entries.sort();

  for path in entries {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
      continue;
    };
    if PROTECTED_FILES.contains(&name.as_str()) {
      debug!("   skipping:  {} (protected file)", name);
      continue;
    }
    if name.ends_with(".spec") {
      continue;
    }
    if extensions.iter().any(|ext| name.ends_with(ext)) {
      debug!("   copying:   {}", name);
      files.push(path);
    }
  }

  Ok(files)
}

/// Copy `files` into `dest_dir` and classify every affected basename
pub fn sync_files(files: &[PathBuf], dest_dir: &Path) -> PkgResult<SyncPlan> {
  debug!(files = ?files, dest = %dest_dir.display(), "syncing files");
  let mut plan = SyncPlan::default();

  let wanted: BTreeSet<String> = files
    .iter()
    .filter_map(|f| f.file_name())
    .map(|n| n.to_string_lossy().to_string())
    .collect();

  for source in files {
    let Some(name) = source.file_name() else {
      continue;
    };
    let base = name.to_string_lossy().to_string();
    let dest = dest_dir.join(name);

    if dest.exists() {
      println!("   copying: {}", base);
      plan.updated.push(base);
    } else {
      println!("   adding: {}", base);
      plan.new.push(base);
    }

    fs::copy(source, &dest).with_context(|| format!("Failed to copy {} to {}", source.display(), dest.display()))?;
  }

  let mut existing: Vec<String> = fs::read_dir(dest_dir)
    .with_context(|| format!("Failed to list {}", dest_dir.display()))?
    .filter_map(|entry| entry.ok())
    .map(|entry| entry.file_name().to_string_lossy().to_string())
    .collect();
  existing.sort();

  for name in existing {
    if !PROTECTED_FILES.contains(&name.as_str()) && !wanted.contains(&name) {
      println!("   deleting: {}", name);
      plan.obsolete.push(name);
    }
  }

  Ok(plan)
}
