//! System git backend
//!
//! Uses git plumbing commands for all operations:
//! - One subprocess per query, no caching of mutable state
//! - Safe subprocess execution (isolated environment)
//! - Raw byte output where content matters (archives, patches)

use crate::core::error::{GitError, PkgError, PkgResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Git backend using system git
pub struct SystemGit {
  /// Repository working directory
  pub(crate) repo_path: PathBuf,

  /// Working tree root
  pub(crate) work_tree: PathBuf,
}

impl SystemGit {
  /// Open a git repository
  ///
  /// This performs ONE subprocess call to get the repository metadata.
  pub fn open(path: &Path) -> PkgResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(PkgError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(PkgError::message(format!("Failed to open git repository: {}", stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let work_tree = stdout.trim();

    Ok(Self {
      repo_path: path.to_path_buf(),
      work_tree: PathBuf::from(work_tree),
    })
  }

  /// Root of the working tree
  pub fn work_tree(&self) -> &Path {
    &self.work_tree
  }

  /// Read a file at a specific commit
  ///
  /// Returns `None` if the file doesn't exist at that commit.
  pub fn read_file_at_commit(&self, commit_sha: &str, path: &Path) -> PkgResult<Option<Vec<u8>>> {
    let spec = format!("{}:{}", commit_sha, git_path(path));

    let output = self
      .git_cmd()
      .args(["show", &spec])
      .output()
      .context("Failed to read file from commit")?;

    if !output.status.success() {
      return Ok(None);
    }

    Ok(Some(output.stdout))
  }

  /// Run git with `args`, returning raw stdout or a `CommandFailed` error
  pub(crate) fn checked_output(&self, args: &[&str]) -> PkgResult<Vec<u8>> {
    debug!("git {}", args.join(" "));

    let output = self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

    if !output.status.success() {
      return Err(PkgError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(output.stdout)
  }

  /// Like `checked_output`, trimmed to a single line of text
  pub(crate) fn checked_line(&self, args: &[&str]) -> PkgResult<String> {
    let stdout = self.checked_output(args)?;
    Ok(String::from_utf8_lossy(&stdout).trim().to_string())
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Sets working directory to repo path
  /// - Clears environment variables
  /// - Whitelists only PATH, HOME and the ssh agent socket
  /// - Adds safe configuration overrides
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.repo_path);

    // Isolated environment (don't trust global config)
    cmd.env_clear();
    for key in ["PATH", "HOME", "SSH_AUTH_SOCK"] {
      if let Ok(value) = std::env::var(key) {
        cmd.env(key, value);
      }
    }

    // Force safe behavior (override user config)
    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false");

    cmd
  }
}

/// Git wants forward slashes and no leading "./"
pub(crate) fn git_path(path: &Path) -> String {
  let s = path.to_string_lossy().replace('\\', "/");
  s.trim_start_matches("./").to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_git_path() {
    assert_eq!(git_path(Path::new("./rel-eng/packages/foo")), "rel-eng/packages/foo");
    assert_eq!(git_path(Path::new("java/pkgrel.toml")), "java/pkgrel.toml");
  }

  #[test]
  fn test_open_outside_repo_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(SystemGit::open(dir.path()).is_err());
  }
}
