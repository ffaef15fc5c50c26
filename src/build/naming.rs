//! Artifact and directory names
//!
//! Pure functions; no I/O.

/// `<name>-<version>`
pub fn archive_base(name: &str, version: &str) -> String {
  format!("{}-{}", name, version)
}

/// `<name>-<version>.tar.gz`
pub fn archive_filename(name: &str, version: &str) -> String {
  format!("{}.tar.gz", archive_base(name, version))
}

/// `rpmbuild-<name>-<commit>`
pub fn workspace_dir_name(name: &str, commit: &str) -> String {
  format!("rpmbuild-{}-{}", name, commit)
}

/// Tag of an upstream release: `<upstream_name>-<upstream_version>-1`
pub fn upstream_tag(upstream_name: &str, upstream_version: &str) -> String {
  format!("{}-{}-1", upstream_name, upstream_version)
}

/// `<upstream_tag>-to-<name>-<build_version>.patch`
pub fn patch_filename(upstream_tag: &str, name: &str, build_version: &str) -> String {
  format!("{}-to-{}-{}.patch", upstream_tag, name, build_version)
}

/// Version used in artifact names for a tagged build: the part of
/// `build_version` before the release suffix
pub fn display_version(build_version: &str) -> String {
  build_version.split('-').next().unwrap_or(build_version).to_string()
}

/// Version used in artifact names for a test build.
///
/// Always starts with `git-` so it can never collide with a tagged version.
pub fn test_display_version(commit_count: u64, latest_commit: &str) -> String {
  let short = &latest_commit[..7.min(latest_commit.len())];
  format!("git-{}.{}", commit_count, short)
}

/// Package name of a `<name>-<version>-<release>` tag
pub fn package_from_tag(tag: &str) -> Option<&str> {
  let mut parts = tag.rsplitn(3, '-');
  let _release = parts.next()?;
  let _version = parts.next()?;
  parts.next().filter(|name| !name.is_empty())
}
