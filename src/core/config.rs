//! Configuration for pkgrel
//!
//! Three sources are read:
//!
//! - `rel-eng/pkgrel.toml` in the git root: global, section based
//!   (`[cvs]`, `[koji]`, one table per koji tag, `[buildconfig]`,
//!   `[requirements]`)
//! - `pkgrel.toml` in the project directory at the build commit: same shape,
//!   overrides the global values
//! - `~/.config/pkgrel/config.toml`: per-user settings (koji options,
//!   auto-install exclusions, tool overrides)
//!
//! A missing section or option means "feature not configured". Callers ask
//! with [`BuildConfig::has_section`] / [`BuildConfig::has_option`] and skip the
//! feature rather than failing.

use crate::core::error::{ConfigError, PkgError, PkgResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Value};
use tracing::{debug, warn};

/// Global configuration file, relative to the git root
pub const GLOBAL_CONFIG_PATH: &str = "rel-eng/pkgrel.toml";

/// Per-package configuration file, relative to the project directory
pub const PACKAGE_CONFIG_FILE: &str = "pkgrel.toml";

/// Directory holding one metadata file per package, relative to the git root
pub const PACKAGES_DIR: &str = "rel-eng/packages";

/// Merged section/option configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
  sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl BuildConfig {
  /// Parse a TOML document of tables into sections.
  ///
  /// Arrays are flattened to space separated strings so that
  /// `branches = ["RHEL-5", "RHEL-6"]` and `branches = "RHEL-5 RHEL-6"`
  /// read the same.
  pub fn parse(content: &str) -> PkgResult<Self> {
    let doc: DocumentMut = content.parse()?;
    let mut config = BuildConfig::default();

    for (section, item) in doc.iter() {
      let Some(table) = item.as_table_like() else {
        warn!("ignoring top-level key '{}' outside of any section", section);
        continue;
      };

      let options = config.sections.entry(section.to_string()).or_default();
      for (option, value) in table.iter() {
        match value.as_value().and_then(value_to_string) {
          Some(v) => {
            options.insert(option.to_string(), v);
          }
          None => warn!("ignoring unsupported value for [{}] {}", section, option),
        }
      }
    }

    Ok(config)
  }

  /// Load the global configuration from `rel-eng/pkgrel.toml`
  pub fn load_global(git_root: &Path) -> PkgResult<Self> {
    let path = git_root.join(GLOBAL_CONFIG_PATH);
    if !path.exists() {
      return Err(
        ConfigError::NotFound {
          git_root: git_root.to_path_buf(),
        }
        .into(),
      );
    }

    let content = fs::read_to_string(&path).with_context(|| format!("Failed to read config from {}", path.display()))?;
    Self::parse(&content).with_context(|| format!("Failed to parse config from {}", path.display()))
  }

  /// Override values in `self` with every value present in `overrides`
  pub fn merge(&mut self, overrides: &BuildConfig) {
    for (section, options) in &overrides.sections {
      let target = self.sections.entry(section.clone()).or_default();
      for (option, value) in options {
        target.insert(option.clone(), value.clone());
      }
    }
  }

  #[cfg(test)]
  pub fn set(&mut self, section: &str, option: &str, value: impl Into<String>) {
    self
      .sections
      .entry(section.to_string())
      .or_default()
      .insert(option.to_string(), value.into());
  }

  pub fn has_section(&self, section: &str) -> bool {
    self.sections.contains_key(section)
  }

  pub fn has_option(&self, section: &str, option: &str) -> bool {
    self.get(section, option).is_some()
  }

  pub fn get(&self, section: &str, option: &str) -> Option<&str> {
    self
      .sections
      .get(section)
      .and_then(|options| options.get(option))
      .map(String::as_str)
  }

  /// Space separated list option; empty when absent
  pub fn get_list(&self, section: &str, option: &str) -> Vec<String> {
    self
      .get(section, option)
      .map(|v| v.split_whitespace().map(str::to_string).collect())
      .unwrap_or_default()
  }

  /// Get an option that the caller cannot do without
  pub fn require(&self, section: &str, option: &str) -> PkgResult<&str> {
    self.get(section, option).ok_or_else(|| {
      PkgError::Config(ConfigError::MissingOption {
        section: section.to_string(),
        option: option.to_string(),
      })
    })
  }

  /// Fail if `[requirements] pkgrel` asks for a newer pkgrel than `installed`
  pub fn check_version_gate(&self, installed: &str) -> PkgResult<()> {
    let Some(required) = self.get("requirements", "pkgrel") else {
      return Ok(());
    };

    let required_version = parse_loose_version(required)
      .ok_or_else(|| PkgError::message(format!("Invalid [requirements] pkgrel version '{}'", required)))?;
    let installed_version = parse_loose_version(installed)
      .ok_or_else(|| PkgError::message(format!("Invalid installed pkgrel version '{}'", installed)))?;

    debug!(%required_version, %installed_version, "checking version gate");
    if required_version > installed_version {
      return Err(
        ConfigError::VersionGate {
          required: required.to_string(),
          installed: installed.to_string(),
        }
        .into(),
      );
    }
    Ok(())
  }
}

fn value_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.value().clone()),
    Value::Integer(i) => Some(i.value().to_string()),
    Value::Float(f) => Some(f.value().to_string()),
    Value::Boolean(b) => Some(b.value().to_string()),
    Value::Datetime(d) => Some(d.value().to_string()),
    Value::Array(array) => {
      let items: Option<Vec<String>> = array.iter().map(value_to_string).collect();
      items.map(|items| items.join(" "))
    }
    Value::InlineTable(_) => None,
  }
}

/// Parse "1", "1.2" or "1.2.3" (with optional pre-release) as semver
fn parse_loose_version(version: &str) -> Option<semver::Version> {
  let version = version.trim();
  if let Ok(v) = semver::Version::parse(version) {
    return Some(v);
  }

  let mut parts = version.split('.').map(|p| p.parse::<u64>().ok());
  let major = parts.next()??;
  let minor = parts.next().unwrap_or(Some(0))?;
  let patch = parts.next().unwrap_or(Some(0))?;
  if parts.next().is_some() {
    return None;
  }
  Some(semver::Version::new(major, minor, patch))
}

/// Contents of `rel-eng/packages/<name>`: "<version>-<release> <relative dir>"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
  /// Full version-release of the last tagged build, e.g. "0.4.15-1"
  pub version: String,
  /// Project directory relative to the git root; empty for the root itself
  pub relative_dir: String,
}

impl PackageMetadata {
  pub fn parse(name: &str, content: &str) -> PkgResult<Self> {
    let mut words = content.split_whitespace();
    let version = words.next().ok_or_else(|| ConfigError::PackageMetadata {
      name: name.to_string(),
      reason: "file is empty".to_string(),
    })?;
    let relative_dir = words.next().unwrap_or("/");

    Ok(Self {
      version: version.to_string(),
      relative_dir: normalize_relative_dir(relative_dir),
    })
  }

  /// Path of the metadata file for a package, relative to the git root
  pub fn path_for(name: &str) -> PathBuf {
    Path::new(PACKAGES_DIR).join(name)
  }
}

/// "/", "./" and "" all mean the repository root
fn normalize_relative_dir(dir: &str) -> String {
  let trimmed = dir.trim().trim_start_matches("./").trim_matches('/');
  if trimmed == "." { String::new() } else { trimmed.to_string() }
}

/// Executables pkgrel drives; overridable for unusual hosts and for tests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolsConfig {
  #[serde(default = "default_rpmbuild")]
  pub rpmbuild: String,
  #[serde(default = "default_build_client")]
  pub build_client: String,
  #[serde(default = "default_spec_rewrite_helper")]
  pub spec_rewrite_helper: String,
  #[serde(default = "default_cvs")]
  pub cvs: String,
  #[serde(default = "default_make")]
  pub make: String,
  #[serde(default = "default_fedpkg")]
  pub fedpkg: String,
}

fn default_rpmbuild() -> String {
  "rpmbuild".to_string()
}

fn default_build_client() -> String {
  "koji".to_string()
}

fn default_spec_rewrite_helper() -> String {
  "test-setup-specfile.pl".to_string()
}

fn default_cvs() -> String {
  "cvs".to_string()
}

fn default_make() -> String {
  "make".to_string()
}

fn default_fedpkg() -> String {
  "fedpkg".to_string()
}

impl Default for ToolsConfig {
  fn default() -> Self {
    Self {
      rpmbuild: default_rpmbuild(),
      build_client: default_build_client(),
      spec_rewrite_helper: default_spec_rewrite_helper(),
      cvs: default_cvs(),
      make: default_make(),
      fedpkg: default_fedpkg(),
    }
  }
}

/// Per-user settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserConfig {
  /// Replaces the default "build --nowait" koji options
  #[serde(default)]
  pub koji_options: Option<String>,

  /// Binary packages whose path contains any of these are never auto-installed
  #[serde(default)]
  pub no_auto_install: Vec<String>,

  /// Base directory for workspaces and produced artifacts
  #[serde(default)]
  pub build_dir: Option<PathBuf>,

  #[serde(default)]
  pub tools: ToolsConfig,
}

impl UserConfig {
  /// `$PKGREL_USER_CONFIG`, else `~/.config/pkgrel/config.toml`
  pub fn default_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PKGREL_USER_CONFIG") {
      return Some(PathBuf::from(path));
    }
    std::env::var("HOME")
      .ok()
      .map(|home| PathBuf::from(home).join(".config").join("pkgrel").join("config.toml"))
  }

  pub fn load(path: &Path) -> PkgResult<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("Failed to read user config from {}", path.display()))?;
    let config: UserConfig = toml_edit::de::from_str(&content)
      .with_context(|| format!("Failed to parse user config from {}", path.display()))?;
    Ok(config)
  }

  /// Load the user config if one exists, defaults otherwise
  pub fn load_default() -> PkgResult<Self> {
    match Self::default_path() {
      Some(path) if path.exists() => Self::load(&path),
      _ => Ok(Self::default()),
    }
  }
}
