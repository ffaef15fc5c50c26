//! Everything a command needs to know about the package before building

use crate::build::descriptor::{find_package_name, read_lines};
use crate::build::naming::package_from_tag;
use crate::core::config::{BuildConfig, PACKAGE_CONFIG_FILE, UserConfig};
use crate::core::context::{ProjectIdentity, RunOptions};
use crate::core::error::{BuildError, PkgError, PkgResult, ResultExt};
use crate::core::vcs::SystemGit;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Installed pkgrel version, checked against `[requirements] pkgrel`
pub const PKGREL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default build base under the system temp directory
const DEFAULT_BASE_DIR: &str = "pkgrel";

pub struct Session {
  pub git: SystemGit,
  pub identity: ProjectIdentity,
  /// Global config with the package's own config merged over it
  pub config: BuildConfig,
  pub user: UserConfig,
}

impl Session {
  /// Resolve the package being built from the current directory.
  ///
  /// The package name comes from `package`, else from the `<name>-<v>-<r>`
  /// tag, else from the `Name:` of the single spec file in the current
  /// directory.
  pub fn open(package: Option<&str>, tag: Option<&str>, test: bool) -> PkgResult<Self> {
    let cwd = env::current_dir()?;
    let git = SystemGit::open(&cwd)?;

    let name = match (package, tag) {
      (Some(package), _) => package.to_string(),
      (None, Some(tag)) => package_from_tag(tag)
        .map(str::to_string)
        .ok_or_else(|| PkgError::message(format!("Cannot derive a package name from tag '{}'", tag)))?,
      (None, None) => detect_package_name(&cwd)?,
    };
    debug!(%name, "package name");

    let identity = ProjectIdentity::resolve(&git, &name, tag, test)?;

    let mut config = BuildConfig::load_global(git.work_tree())?;
    let package_config_path = Path::new(&identity.relative_dir).join(PACKAGE_CONFIG_FILE);
    if let Some(bytes) = git.read_file_at_commit(&identity.commit, &package_config_path)? {
      let package_config = BuildConfig::parse(&String::from_utf8_lossy(&bytes))
        .with_context(|| format!("Failed to parse {} at {}", package_config_path.display(), identity.short_commit()))?;
      config.merge(&package_config);
    }
    config.check_version_gate(PKGREL_VERSION)?;

    let user = UserConfig::load_default()?;

    Ok(Self {
      git,
      identity,
      config,
      user,
    })
  }

  /// `--output`, else the user's `build_dir`, else `<tmp>/pkgrel`
  pub fn base_dir(&self, options: &RunOptions) -> PathBuf {
    options
      .output_dir
      .clone()
      .or_else(|| self.user.build_dir.clone())
      .unwrap_or_else(|| env::temp_dir().join(DEFAULT_BASE_DIR))
  }
}

/// Name of the package whose spec file sits in `dir`
fn detect_package_name(dir: &Path) -> PkgResult<String> {
  let mut specs: Vec<PathBuf> = std::fs::read_dir(dir)
    .with_context(|| format!("Failed to read {}", dir.display()))?
    .filter_map(|entry| entry.ok().map(|e| e.path()))
    .filter(|path| path.extension().is_some_and(|ext| ext == "spec"))
    .collect();
  specs.sort();

  let spec = match specs.as_slice() {
    [] => {
      return Err(
        BuildError::DescriptorNotFound {
          dir: dir.to_path_buf(),
        }
        .into(),
      );
    }
    [spec] => spec,
    _ => {
      return Err(
        BuildError::AmbiguousDescriptor {
          dir: dir.to_path_buf(),
          candidates: specs
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect(),
        }
        .into(),
      );
    }
  };

  match find_package_name(&read_lines(spec)?) {
    Some(name) => Ok(name),
    None => spec
      .file_stem()
      .map(|stem| stem.to_string_lossy().to_string())
      .ok_or_else(|| PkgError::message(format!("Cannot derive a package name from {}", spec.display()))),
  }
}

/// Absolute form of a user supplied path, with a leading `~` expanded
pub fn absolutize(path: &Path) -> PkgResult<PathBuf> {
  let expanded = match path.strip_prefix("~") {
    Ok(rest) => {
      let home = env::var("HOME").map_err(|_| PkgError::message("HOME is not set; cannot expand '~'"))?;
      PathBuf::from(home).join(rest)
    }
    Err(_) => path.to_path_buf(),
  };

  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(env::current_dir()?.join(expanded))
  }
}
