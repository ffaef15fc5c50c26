//! Run context - resolved once, threaded through every stage
//!
//! # Design
//!
//! A build run resolves the project identity (name, version, tag, commit)
//! exactly once. Everything derived from it (workspace paths, archive name)
//! and everything the stages produce (exported sources, spec file location,
//! artifacts) lives in a [`RunContext`] value that is passed to each stage
//! explicitly.
//!
//! ```text
//! main.rs / commands:
//!   ProjectIdentity::resolve() -> RunContext::new()
//!   |
//!   v
//! PackageBuilder::{produce_sources, build_source_package, ...}(&mut RunContext)
//! ```

use crate::build::naming;
use crate::core::config::PackageMetadata;
use crate::core::error::{BuildError, ConfigError, PkgError, PkgResult, ResultExt};
use crate::core::plan::ReleasePlan;
use crate::core::vcs::SystemGit;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the legacy VCS work directory under the build base
pub const CVS_WORKDIR: &str = "cvswork";

/// Which release targets the caller asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSelection {
  /// Every configured target (CVS, then koji)
  pub all: bool,
  pub cvs: bool,
  pub koji: bool,
  pub git: bool,
  pub list_tags: bool,
}

impl ReleaseSelection {
  pub fn any(&self) -> bool {
    self.all || self.cvs || self.koji || self.git || self.list_tags
  }
}

/// Caller options, captured once at the start of a run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
  pub tgz: bool,
  pub srpm: bool,
  pub rpm: bool,
  pub release: ReleaseSelection,
  pub test: bool,
  /// Overrides every per-tag disttag
  pub dist: Option<String>,
  pub offline: bool,
  pub auto_install: bool,
  /// Extra words passed to rpmbuild
  pub rpmbuild_options: Vec<String>,
  pub no_cleanup: bool,
  pub scratch: bool,
  pub dry_run: bool,
  /// Print the dry-run plan as JSON
  pub plan_json: bool,
  pub only_tags: Vec<String>,
  pub cvs_new_sources: Vec<PathBuf>,
  /// Build base directory; falls back to the user config, then a temp dir
  pub output_dir: Option<PathBuf>,
  /// Builder kind; falls back to `[buildconfig] builder`
  pub builder: Option<String>,
}

/// Who and what is being built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
  pub name: String,
  /// Full version-release, e.g. "1.2.3-4"
  pub build_version: String,
  /// Tag of the release being built, e.g. "foo-1.2.3-4"
  pub build_tag: String,
  /// Resolved commit; never changes after resolution
  pub commit: String,
  /// Project directory relative to the git root ("" for the root)
  pub relative_dir: String,
  /// Version used in artifact names
  pub display_version: String,
  /// Commits since the build tag, for test builds
  pub commit_count: Option<u64>,
}

impl ProjectIdentity {
  /// Resolve the identity of `name` from the repository.
  ///
  /// Without an explicit tag the latest tagged version from
  /// `rel-eng/packages/<name>` is built. Test builds use the latest commit
  /// touching the project directory instead of the tagged commit.
  pub fn resolve(git: &SystemGit, name: &str, tag: Option<&str>, test: bool) -> PkgResult<Self> {
    if name.is_empty() {
      return Err(PkgError::message("Package name must not be empty"));
    }

    let metadata_path = git.work_tree().join(PackageMetadata::path_for(name));
    let content = fs::read_to_string(&metadata_path).map_err(|e| ConfigError::PackageMetadata {
      name: name.to_string(),
      reason: format!("cannot read {}: {}", metadata_path.display(), e),
    })?;
    let metadata = PackageMetadata::parse(name, &content)?;

    let (build_tag, build_version) = match tag {
      Some(tag) => {
        let prefix = format!("{}-", name);
        let version = tag.strip_prefix(&prefix).ok_or_else(|| {
          PkgError::message(format!("Tag '{}' does not belong to package '{}'", tag, name))
        })?;
        (tag.to_string(), version.to_string())
      }
      None => (format!("{}-{}", name, metadata.version), metadata.version.clone()),
    };

    if build_version.is_empty() {
      return Err(PkgError::message(format!("Empty version for package '{}'", name)));
    }

    let (commit, display_version, commit_count) = if test {
      let latest = git.latest_commit_for_path(&metadata.relative_dir)?;
      let count = git
        .commit_count(&build_tag, &latest, &metadata.relative_dir)
        .with_context(|| format!("Failed to count commits since tag {}", build_tag))?;
      let display = naming::test_display_version(count, &latest);
      (latest, display, Some(count))
    } else {
      let commit = git
        .resolve_commit(&build_tag)
        .with_context(|| format!("Tag {} not found; has it been created?", build_tag))?;
      (commit, naming::display_version(&build_version), None)
    };

    // The project may have moved since; trust the metadata as of the build commit
    let relative_dir = match git.read_file_at_commit(&commit, &PackageMetadata::path_for(name))? {
      Some(bytes) => PackageMetadata::parse(name, &String::from_utf8_lossy(&bytes))?.relative_dir,
      None => metadata.relative_dir,
    };

    debug!(%name, %build_tag, %commit, %relative_dir, %display_version, "resolved project identity");

    Ok(Self {
      name: name.to_string(),
      build_version,
      build_tag,
      commit,
      relative_dir,
      display_version,
      commit_count,
    })
  }

  pub fn short_commit(&self) -> &str {
    &self.commit[..7.min(self.commit.len())]
  }

  /// `<name>-<display version>`
  pub fn archive_base(&self) -> String {
    naming::archive_base(&self.name, &self.display_version)
  }

  pub fn archive_filename(&self) -> String {
    naming::archive_filename(&self.name, &self.display_version)
  }
}

/// Per-run directory layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
  /// Build base; artifacts end up here
  pub base: PathBuf,
  /// `<base>/rpmbuild-<name>-<commit>`
  pub root: PathBuf,
  /// `<root>/SOURCES`
  pub sources: PathBuf,
  /// `<root>/BUILD`
  pub build: PathBuf,
  /// `<root>/SOURCES/<name>-<display version>`: the exported source copy
  pub gitcopy: PathBuf,
}

impl Workspace {
  pub fn new(base: &Path, identity: &ProjectIdentity) -> Self {
    let root = base.join(naming::workspace_dir_name(&identity.name, &identity.commit));
    let sources = root.join("SOURCES");
    let build = root.join("BUILD");
    let gitcopy = sources.join(identity.archive_base());
    Self {
      base: base.to_path_buf(),
      root,
      sources,
      build,
      gitcopy,
    }
  }

  /// Take ownership of the workspace root for this run.
  ///
  /// A leftover root from an earlier run of the same commit is removed with
  /// a warning.
  pub fn claim(&self) -> PkgResult<()> {
    if self.root.exists() {
      println!("WARNING: rpmbuild directory already exists, removing...");
      fs::remove_dir_all(&self.root)
        .with_context(|| format!("Failed to remove stale workspace {}", self.root.display()))?;
    }
    Ok(())
  }

  /// Create the build directories. Safe to call any number of times.
  pub fn create_dirs(&self) -> PkgResult<()> {
    for dir in [&self.base, &self.root, &self.sources, &self.build] {
      fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
  }

  /// `<base>/cvswork`
  pub fn cvs_workdir(&self) -> PathBuf {
    self.base.join(CVS_WORKDIR)
  }

  /// `<base>/cvswork/<name>`
  pub fn cvs_package_dir(&self, name: &str) -> PathBuf {
    self.cvs_workdir().join(name)
  }
}

/// Pipeline stages, in order. A run only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
  Init,
  SourcesReady,
  SourcePkgReady,
  BinaryPkgReady,
  NotReleased,
  Released,
  CleanedUp,
}

/// Mutable state of one build run
#[derive(Debug)]
pub struct RunContext {
  pub identity: ProjectIdentity,
  pub workspace: Workspace,
  pub stage: RunStage,
  /// Sources exported from git into the workspace
  pub exported: bool,
  /// `produce_sources` has completed
  pub sources_ready: bool,
  /// The test-build spec rewrite helper has run
  pub test_spec_rewritten: bool,
  /// A downstream checkout under `cvswork` was created by this run
  pub checked_out: bool,
  /// Spec file the package is built from (a temp copy, never the checked in file)
  pub descriptor: Option<PathBuf>,
  /// Full paths of every source the package needs
  pub sources: Vec<PathBuf>,
  /// Every artifact produced during this run, in order
  pub artifacts: Vec<PathBuf>,
  /// Outward-facing commands run (or skipped) during release
  pub plan: ReleasePlan,
}

impl RunContext {
  pub fn new(identity: ProjectIdentity, workspace: Workspace, dry_run: bool) -> Self {
    let plan = ReleasePlan::new(identity.name.clone(), dry_run);
    Self {
      identity,
      workspace,
      stage: RunStage::Init,
      exported: false,
      sources_ready: false,
      test_spec_rewritten: false,
      checked_out: false,
      descriptor: None,
      sources: Vec::new(),
      artifacts: Vec::new(),
      plan,
    }
  }

  /// Move to `stage` unless the run is already past it
  pub fn advance(&mut self, stage: RunStage) {
    if stage > self.stage {
      debug!(from = ?self.stage, to = ?stage, "stage transition");
      self.stage = stage;
    }
  }

  /// Spec file location; only valid after sources are exported
  pub fn descriptor(&self) -> PkgResult<&Path> {
    self.descriptor.as_deref().ok_or_else(|| {
      PkgError::Build(BuildError::DescriptorNotFound {
        dir: self.workspace.gitcopy.clone(),
      })
    })
  }
}
