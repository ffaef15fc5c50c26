//! Additional operations for SystemGit (commit resolution, tags, archives, diffs)

use super::system_git::{SystemGit, git_path};
use crate::core::error::{GitError, PkgError, PkgResult};
use std::path::Path;

impl SystemGit {
  /// Resolve a tag, branch or sha to the commit it points at
  pub fn resolve_commit(&self, rev: &str) -> PkgResult<String> {
    let sha = self.checked_line(&["rev-list", "--max-count=1", rev])?;
    if sha.is_empty() {
      return Err(PkgError::message(format!("Unable to resolve commit for '{}'", rev)));
    }
    Ok(sha)
  }

  /// Latest commit touching `path` (the whole repository when empty)
  pub fn latest_commit_for_path(&self, path: &str) -> PkgResult<String> {
    let mut args = vec!["log", "-1", "--format=%H", "HEAD"];
    if !path.is_empty() {
      args.push("--");
      args.push(path);
    }
    let sha = self.checked_line(&args)?;
    if sha.is_empty() {
      return Err(PkgError::message(format!("No commits touch '{}'", path)));
    }
    Ok(sha)
  }

  /// Number of commits reachable from `to` but not from `from`, limited to `path`
  pub fn commit_count(&self, from: &str, to: &str, path: &str) -> PkgResult<u64> {
    let range = format!("{}..{}", from, to);
    let mut args = vec!["rev-list", "--count", range.as_str()];
    if !path.is_empty() {
      args.push("--");
      args.push(path);
    }
    let count = self.checked_line(&args)?;
    Ok(count.parse::<u64>()?)
  }

  /// Committer timestamp (seconds since epoch) of a commit
  pub fn commit_timestamp(&self, sha: &str) -> PkgResult<u64> {
    let ts = self.checked_line(&["log", "-1", "--format=%ct", sha])?;
    Ok(ts.parse::<u64>()?)
  }

  /// Sha of the local tag ref, or `None` if the tag does not exist
  pub fn local_tag_sha(&self, tag: &str) -> PkgResult<Option<String>> {
    let refname = format!("refs/tags/{}", tag);
    let output = self
      .git_cmd()
      .args(["rev-parse", "-q", "--verify", &refname])
      .output()?;

    if !output.status.success() {
      return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
  }

  /// URL of a configured remote
  pub fn remote_url(&self, remote: &str) -> PkgResult<Option<String>> {
    let key = format!("remote.{}.url", remote);
    let output = self.git_cmd().args(["config", "--get", &key]).output()?;
    if !output.status.success() {
      return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
  }

  /// Sha of a tag in a remote repository, via `git ls-remote`
  pub fn remote_tag_sha(&self, url: &str, tag: &str) -> PkgResult<Option<String>> {
    let refname = format!("refs/tags/{}", tag);
    let stdout = self.checked_output(&["ls-remote", url, &refname])?;
    Ok(parse_ls_remote_sha(&String::from_utf8_lossy(&stdout)))
  }

  /// Verify a tag exists locally and, unless offline, upstream at the same sha
  pub fn check_tag_exists(&self, tag: &str, offline: bool) -> PkgResult<()> {
    let local = self
      .local_tag_sha(tag)?
      .ok_or_else(|| GitError::TagNotFound { tag: tag.to_string() })?;

    if offline {
      return Ok(());
    }

    let url = self
      .remote_url("origin")?
      .ok_or_else(|| PkgError::message("No 'origin' remote configured; use --offline to skip the upstream tag check"))?;
    println!("Checking for tag [{}] in git repo [{}]", tag, url);

    let upstream = self.remote_tag_sha(&url, tag)?.ok_or_else(|| GitError::TagNotPushed {
      tag: tag.to_string(),
      remote: url.clone(),
    })?;

    if upstream != local {
      return Err(
        GitError::TagMismatch {
          tag: tag.to_string(),
          local,
          upstream,
        }
        .into(),
      );
    }
    Ok(())
  }

  /// Uncompressed tar of the tree at `commit:relative_dir`, paths prefixed with `prefix/`
  pub fn archive_tree(&self, commit: &str, relative_dir: &str, prefix: &str) -> PkgResult<Vec<u8>> {
    let tree = if relative_dir.is_empty() {
      commit.to_string()
    } else {
      format!("{}:{}", commit, relative_dir)
    };
    let prefix_arg = format!("--prefix={}/", prefix);
    self.checked_output(&["archive", "--format=tar", &prefix_arg, &tree])
  }

  /// Unified diff between two revisions, restricted to and relative to `dir`
  pub fn diff_relative(&self, from: &str, to: &str, dir: &Path) -> PkgResult<Vec<u8>> {
    let range = format!("{}..{}", from, to);
    let dir = git_path(dir);
    if dir.is_empty() {
      return self.checked_output(&["diff", "--no-color", &range]);
    }
    let relative = format!("--relative={}", dir);
    self.checked_output(&["diff", "--no-color", &relative, &range])
  }
}

/// First sha column of `git ls-remote` output
fn parse_ls_remote_sha(output: &str) -> Option<String> {
  output
    .lines()
    .filter_map(|line| line.split_whitespace().next())
    .find(|sha| !sha.is_empty())
    .map(str::to_string)
}
