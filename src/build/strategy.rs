//! Package-type strategies and the registry that selects them
//!
//! Every package type shares the same staged pipeline; a strategy only
//! decides how sources are obtained, how a test build rewrites the
//! descriptor, which directories rpmbuild is pointed at, and which files are
//! synced into downstream checkouts. The strategy is chosen once per run:
//!
//! 1. `--builder <kind>` on the command line
//! 2. `[buildconfig] builder` in the merged config
//! 3. `standard`

use crate::build::descriptor;
use crate::build::export::export_sources;
use crate::build::legacy::VcsSynced;
use crate::build::rpmbuild::DirOverrides;
use crate::build::upstream::UpstreamPatch;
use crate::core::config::{BuildConfig, UserConfig};
use crate::core::context::{RunContext, RunOptions, Workspace};
use crate::core::error::{ConfigError, PkgResult, ResultExt};
use crate::core::process::Runner;
use crate::core::vcs::SystemGit;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffixes of pre-built sources adopted by archive-less package types
pub const SOURCE_SUFFIXES: &[&str] = &[".tar.gz", ".tar", ".zip", ".jar", ".gem"];

/// Registered kinds, canonical name first, then aliases
pub const BUILDER_KINDS: &[(&str, &[&str])] = &[
  ("standard", &["tgz"]),
  ("no-archive", &["no-tgz", "notgz"]),
  ("cvs", &[]),
  ("upstream", &["satellite"]),
];

/// Collaborators every stage needs, borrowed for the length of a run
#[derive(Clone, Copy)]
pub struct BuildEnv<'a> {
  pub git: &'a SystemGit,
  pub runner: Runner,
  pub config: &'a BuildConfig,
  pub user: &'a UserConfig,
  pub options: &'a RunOptions,
}

/// How packages are built once sources and descriptor are ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildBackend {
  /// rpmbuild against the workspace
  Rpmbuild,
  /// `make` targets inside a legacy CVS checkout
  LegacyMake,
}

pub trait BuildStrategy {
  /// Canonical registry name
  fn kind(&self) -> &'static str;

  /// Populate `ctx.sources` (and the descriptor). Called at most once per run.
  fn produce_sources(&self, env: &BuildEnv<'_>, ctx: &mut RunContext) -> PkgResult<()>;

  /// Arguments for the test-build rewrite helper, after the descriptor path
  fn test_rewrite_args(&self, ctx: &RunContext) -> Vec<String>;

  /// Rewrite the descriptor copy for a test build
  fn prepare_descriptor_for_test(&self, env: &BuildEnv<'_>, ctx: &RunContext) -> PkgResult<()> {
    let args = self.test_rewrite_args(ctx);
    descriptor::rewrite_for_test(&env.runner, &env.user.tools.spec_rewrite_helper, ctx.descriptor()?, &args)
  }

  fn rpmbuild_dir_overrides(&self, workspace: &Workspace) -> DirOverrides;

  /// Suffixes of exported files synced into downstream checkouts; `""` matches all
  fn copy_extensions(&self) -> &'static [&'static str];

  fn backend(&self) -> BuildBackend {
    BuildBackend::Rpmbuild
  }
}

/// Tarball built from the project tree at the build commit
#[derive(Debug, Default)]
pub struct Standard;

impl BuildStrategy for Standard {
  fn kind(&self) -> &'static str {
    "standard"
  }

  fn produce_sources(&self, env: &BuildEnv<'_>, ctx: &mut RunContext) -> PkgResult<()> {
    export_sources(env.git, ctx)?;

    let filename = ctx.identity.archive_filename();
    let archive = ctx.workspace.sources.join(&filename);
    let published = ctx.workspace.base.join(&filename);
    fs::copy(&archive, &published).with_context(|| format!("Failed to copy {}", archive.display()))?;

    println!("Wrote: {}", published.display());
    ctx.sources.push(published.clone());
    ctx.artifacts.push(published);
    Ok(())
  }

  fn test_rewrite_args(&self, ctx: &RunContext) -> Vec<String> {
    let identity = &ctx.identity;
    vec![
      identity.short_commit().to_string(),
      identity.commit_count.unwrap_or(0).to_string(),
      identity.archive_base(),
      identity.archive_filename(),
    ]
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

/// Sources (tarballs, jars, ...) are checked into git; nothing is archived
#[derive(Debug, Default)]
pub struct NoArchive;

/// Pre-built source files (not directories) at the top level of `dir`, sorted
pub fn checked_in_sources(dir: &Path) -> PkgResult<Vec<PathBuf>> {
  let mut found: Vec<PathBuf> = fs::read_dir(dir)
    .with_context(|| format!("Failed to list {}", dir.display()))?
    .filter_map(|entry| entry.ok())
    .map(|entry| entry.path())
    .filter(|path| path.is_file())
    .filter(|path| {
      path
        .file_name()
        .map(|name| name.to_string_lossy())
        .is_some_and(|name| SOURCE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
    })
    .collect();
  found.sort();
  Ok(found)
}

impl NoArchive {
  /// Export the tree and adopt every pre-built source found at its top level
  pub(crate) fn adopt_sources(env: &BuildEnv<'_>, ctx: &mut RunContext) -> PkgResult<()> {
    let (gitcopy, _) = export_sources(env.git, ctx)?;
    let found = checked_in_sources(&gitcopy)?;
    debug!(sources = ?found, "adopted checked-in sources");
    ctx.sources.extend(found);
    Ok(())
  }

  pub(crate) fn short_test_rewrite_args(ctx: &RunContext) -> Vec<String> {
    vec![
      ctx.identity.short_commit().to_string(),
      ctx.identity.commit_count.unwrap_or(0).to_string(),
    ]
  }

  /// Sources live in the exported tree itself
  pub(crate) fn gitcopy_dir_overrides(workspace: &Workspace) -> DirOverrides {
    DirOverrides {
      source_dir: workspace.gitcopy.clone(),
      build_dir: workspace.build.clone(),
      srpm_dir: workspace.base.clone(),
      rpm_dir: workspace.base.clone(),
    }
  }
}

impl BuildStrategy for NoArchive {
  fn kind(&self) -> &'static str {
    "no-archive"
  }

  fn produce_sources(&self, env: &BuildEnv<'_>, ctx: &mut RunContext) -> PkgResult<()> {
    Self::adopt_sources(env, ctx)
  }

  fn test_rewrite_args(&self, ctx: &RunContext) -> Vec<String> {
    Self::short_test_rewrite_args(ctx)
  }

  fn rpmbuild_dir_overrides(&self, workspace: &Workspace) -> DirOverrides {
    Self::gitcopy_dir_overrides(workspace)
  }

  fn copy_extensions(&self) -> &'static [&'static str] {
    &[""]
  }
}

/// Canonical name for a registered kind or alias
pub fn canonical_kind(kind: &str) -> Option<&'static str> {
  let kind = kind.trim().to_ascii_lowercase();
  BUILDER_KINDS
    .iter()
    .find(|(name, aliases)| *name == kind || aliases.contains(&kind.as_str()))
    .map(|(name, _)| *name)
}

/// Instantiate the strategy registered under `kind`
pub fn strategy_for(kind: &str, config: &BuildConfig) -> PkgResult<Box<dyn BuildStrategy>> {
  let strategy: Box<dyn BuildStrategy> = match canonical_kind(kind) {
    Some("standard") => Box::new(Standard),
    Some("no-archive") => Box::new(NoArchive),
    Some("cvs") => Box::new(VcsSynced),
    Some("upstream") => Box::new(UpstreamPatch::new(
      config.get("buildconfig", "upstream_name").map(str::to_string),
    )),
    _ => {
      return Err(
        ConfigError::UnknownBuilder {
          kind: kind.to_string(),
        }
        .into(),
      );
    }
  };
  Ok(strategy)
}

/// Pick the strategy for this run
pub fn select_strategy(requested: Option<&str>, config: &BuildConfig) -> PkgResult<Box<dyn BuildStrategy>> {
  let kind = requested
    .or_else(|| config.get("buildconfig", "builder"))
    .unwrap_or("standard");
  let strategy = strategy_for(kind, config)?;
  debug!(kind = strategy.kind(), "selected build strategy");
  Ok(strategy)
}
