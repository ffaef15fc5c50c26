//! Packages built from an upstream release tag plus downstream patches
//!
//! e.g. `satellite-java-0.8.1-4` is built from the `spacewalk-java-0.8.1-1`
//! tarball with every downstream change since that tag applied as one patch.

use crate::build::descriptor;
use crate::build::export::{export_sources, write_archive};
use crate::build::naming;
use crate::build::rpmbuild::DirOverrides;
use crate::build::strategy::{BuildEnv, BuildStrategy, NoArchive};
use crate::core::config::PackageMetadata;
use crate::core::context::{ProjectIdentity, RunContext, Workspace};
use crate::core::error::{ConfigError, PkgResult, ResultExt};
use crate::core::vcs::SystemGit;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Default)]
pub struct UpstreamPatch {
  /// `[buildconfig] upstream_name`; the project's own name when unset
  upstream_name: Option<String>,
}

impl UpstreamPatch {
  pub fn new(upstream_name: Option<String>) -> Self {
    Self { upstream_name }
  }

  fn upstream_name<'a>(&'a self, identity: &'a ProjectIdentity) -> &'a str {
    self.upstream_name.as_deref().unwrap_or(&identity.name)
  }
}

/// Upstream version: the descriptor's `upstreamversion` macro, else the
/// version being built
pub fn resolve_upstream_version<S: AsRef<str>>(lines: &[S], identity: &ProjectIdentity, test: bool) -> String {
  if let Some(version) = descriptor::find_upstream_version(lines) {
    return version;
  }
  if test {
    naming::display_version(&identity.build_version)
  } else {
    identity.display_version.clone()
  }
}

/// Project directory of `name` as recorded at `commit`
fn relative_dir_at(git: &SystemGit, name: &str, commit: &str) -> PkgResult<String> {
  let path = PackageMetadata::path_for(name);
  let bytes = git
    .read_file_at_commit(commit, &path)?
    .ok_or_else(|| ConfigError::PackageMetadata {
      name: name.to_string(),
      reason: format!("{} does not exist at {}", path.display(), commit),
    })?;
  Ok(PackageMetadata::parse(name, &String::from_utf8_lossy(&bytes))?.relative_dir)
}

/// Diff upstream tag..build commit, stage it in the gitcopy and SOURCES, and
/// reference it from the descriptor
fn generate_patch(env: &BuildEnv<'_>, ctx: &RunContext, upstream_tag: &str) -> PkgResult<()> {
  let identity = &ctx.identity;
  let filename = naming::patch_filename(upstream_tag, &identity.name, &identity.build_version);
  let patch_path = ctx.workspace.gitcopy.join(&filename);

  println!("Generating patch [{}]", filename);
  let diff = env
    .git
    .diff_relative(upstream_tag, &identity.commit, Path::new(&identity.relative_dir))?;
  fs::write(&patch_path, &diff).with_context(|| format!("Failed to write {}", patch_path.display()))?;

  let staged = ctx.workspace.sources.join(&filename);
  fs::copy(&patch_path, &staged).with_context(|| format!("Failed to copy patch to {}", staged.display()))?;

  let points = descriptor::insert_patch(ctx.descriptor()?, &filename)?;
  debug!(?points, patch = %filename, "inserted upstream patch");
  Ok(())
}

impl BuildStrategy for UpstreamPatch {
  fn kind(&self) -> &'static str {
    "upstream"
  }

  fn produce_sources(&self, env: &BuildEnv<'_>, ctx: &mut RunContext) -> PkgResult<()> {
    let (_, exported) = export_sources(env.git, ctx)?;
    ctx.workspace.create_dirs()?;

    let upstream_name = self.upstream_name(&ctx.identity).to_string();
    let lines = descriptor::read_lines(&exported)?;
    let upstream_version = resolve_upstream_version(&lines, &ctx.identity, env.options.test);
    let upstream_tag = naming::upstream_tag(&upstream_name, &upstream_version);

    println!("Building upstream tgz for tag [{}]", upstream_tag);
    if upstream_tag != ctx.identity.build_tag {
      env.git.check_tag_exists(&upstream_tag, env.options.offline)?;
    }

    // Build from a copy so the exported tree keeps the pristine descriptor
    let file_name = exported.file_name().unwrap_or_default();
    let descriptor_copy = ctx.workspace.sources.join(file_name);
    fs::copy(&exported, &descriptor_copy)
      .with_context(|| format!("Failed to copy {} into SOURCES", exported.display()))?;
    ctx.descriptor = Some(descriptor_copy);

    let upstream_commit = env.git.resolve_commit(&upstream_tag)?;
    let upstream_dir = relative_dir_at(env.git, &upstream_name, &upstream_commit)?;
    let prefix = naming::archive_base(&upstream_name, &upstream_version);
    println!(
      "Creating {} from git tag: {}...",
      naming::archive_filename(&upstream_name, &upstream_version),
      upstream_commit
    );
    let archive = write_archive(
      env.git,
      &upstream_commit,
      &upstream_dir,
      &prefix,
      &ctx.workspace.sources,
    )?;
    ctx.sources.push(archive);

    // The release was tagged upstream itself; nothing to patch
    if upstream_tag == ctx.identity.build_tag && !env.options.test {
      return Ok(());
    }

    generate_patch(env, ctx, &upstream_tag)
  }

  fn test_rewrite_args(&self, ctx: &RunContext) -> Vec<String> {
    NoArchive::short_test_rewrite_args(ctx)
  }

  fn rpmbuild_dir_overrides(&self, workspace: &Workspace) -> DirOverrides {
    DirOverrides {
      source_dir: workspace.sources.clone(),
      build_dir: workspace.build.clone(),
      srpm_dir: workspace.base.clone(),
      rpm_dir: workspace.base.clone(),
    }
  }

  fn copy_extensions(&self) -> &'static [&'static str] {
    &[".spec", ".patch"]
  }
}
