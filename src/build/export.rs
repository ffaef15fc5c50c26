//! Source export: a snapshot of the project tree at the build commit
//!
//! Archives carry the commit timestamp on every entry (see [`archive`](super::archive)).

use crate::core::context::RunContext;
use crate::core::error::{BuildError, PkgResult, ResultExt};
use crate::core::vcs::SystemGit;
use crate::build::archive::{normalize_archive, unpack_archive};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write `<dest_dir>/<prefix>.tar.gz` holding `commit:relative_dir` under `prefix/`
pub fn write_archive(
  git: &SystemGit,
  commit: &str,
  relative_dir: &str,
  prefix: &str,
  dest_dir: &Path,
) -> PkgResult<PathBuf> {
  let raw = git.archive_tree(commit, relative_dir, prefix)?;
  let mtime = git.commit_timestamp(commit)?;
  let gz = normalize_archive(&raw, mtime)?;

  let path = dest_dir.join(format!("{}.tar.gz", prefix));
  fs::write(&path, gz).with_context(|| format!("Failed to write {}", path.display()))?;
  debug!(archive = %path.display(), %commit, "wrote source archive");
  Ok(path)
}

/// The single top-level `*.spec` file in `dir`
pub fn find_descriptor(dir: &Path) -> PkgResult<PathBuf> {
  let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
    .with_context(|| format!("Failed to list {}", dir.display()))?
    .filter_map(|entry| entry.ok())
    .map(|entry| entry.path())
    .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "spec"))
    .collect();
  candidates.sort();

  match candidates.len() {
    0 => Err(
      BuildError::DescriptorNotFound {
        dir: dir.to_path_buf(),
      }
      .into(),
    ),
    1 => Ok(candidates.remove(0)),
    _ => Err(
      BuildError::AmbiguousDescriptor {
        dir: dir.to_path_buf(),
        candidates: candidates
          .iter()
          .filter_map(|p| p.file_name())
          .map(|name| name.to_string_lossy().to_string())
          .collect(),
      }
      .into(),
    ),
  }
}

/// Export the project tree at the build commit into the workspace.
///
/// Writes `SOURCES/<name>-<display>.tar.gz`, unpacks it to the gitcopy and
/// locates the descriptor. Runs once per run; later calls return the
/// existing paths.
pub fn export_sources(git: &SystemGit, ctx: &mut RunContext) -> PkgResult<(PathBuf, PathBuf)> {
  if ctx.exported {
    let descriptor = ctx.descriptor()?.to_path_buf();
    return Ok((ctx.workspace.gitcopy.clone(), descriptor));
  }

  ctx.workspace.create_dirs()?;

  let identity = &ctx.identity;
  debug!(
    "Creating {} from git commit: {}",
    identity.archive_filename(),
    identity.commit
  );
  let archive = write_archive(
    git,
    &identity.commit,
    &identity.relative_dir,
    &identity.archive_base(),
    &ctx.workspace.sources,
  )?;

  unpack_archive(&archive, &ctx.workspace.sources)?;
  let descriptor = find_descriptor(&ctx.workspace.gitcopy)?;
  debug!(descriptor = %descriptor.display(), "located descriptor");

  ctx.exported = true;
  ctx.descriptor = Some(descriptor.clone());
  Ok((ctx.workspace.gitcopy.clone(), descriptor))
}
