//! Build farm (koji) targets
//!
//! ```toml
//! [koji]
//! autobuild_tags = "dist-5E-sw-1.0-candidate dist-f12-sw-1.0-candidate"
//!
//! ["dist-f12-sw-1.0-candidate"]
//! disttag = ".fc12"
//! blacklist = "oracle-server"
//! ```
//!
//! A tag with a `whitelist` accepts only the listed packages, whatever its
//! `blacklist` says.

use crate::core::config::{BuildConfig, UserConfig};
use crate::core::error::PkgResult;
use crate::core::process::{ToolCommand, split_options};
use serde::Serialize;
use std::path::Path;

pub const DEFAULT_BUILD_OPTIONS: &str = "build --nowait";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
  /// No whitelist, not blacklisted
  Eligible,
  Whitelisted,
  /// The tag has a whitelist without this package
  NotWhitelisted,
  Blacklisted,
}

impl Eligibility {
  pub fn is_eligible(self) -> bool {
    matches!(self, Eligibility::Eligible | Eligibility::Whitelisted)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FarmTarget {
  pub tag: String,
  pub disttag: Option<String>,
  pub eligibility: Eligibility,
}

/// Why the build farm cannot be used, or `None` when it is configured
pub fn farm_unconfigured_reason(config: &BuildConfig) -> Option<&'static str> {
  if !config.has_section("koji") {
    Some("no [koji] section")
  } else if !config.has_option("koji", "autobuild_tags") {
    Some("no autobuild_tags defined in [koji]")
  } else {
    None
  }
}

pub fn eligibility(config: &BuildConfig, tag: &str, package: &str) -> Eligibility {
  if config.has_option(tag, "whitelist") {
    if config.get_list(tag, "whitelist").iter().any(|p| p == package) {
      Eligibility::Whitelisted
    } else {
      Eligibility::NotWhitelisted
    }
  } else if config.get_list(tag, "blacklist").iter().any(|p| p == package) {
    Eligibility::Blacklisted
  } else {
    Eligibility::Eligible
  }
}

/// Every autobuild tag (restricted to `only_tags` when non-empty), in config order
pub fn farm_targets(config: &BuildConfig, package: &str, only_tags: &[String]) -> Vec<FarmTarget> {
  config
    .get_list("koji", "autobuild_tags")
    .into_iter()
    .filter(|tag| only_tags.is_empty() || only_tags.contains(tag))
    .map(|tag| FarmTarget {
      disttag: config.get(&tag, "disttag").map(str::to_string),
      eligibility: eligibility(config, &tag, package),
      tag,
    })
    .collect()
}

/// Build client options: the user's override or the default, plus `--scratch`
pub fn build_options(user: &UserConfig, scratch: bool) -> PkgResult<Vec<String>> {
  let base = user.koji_options.as_deref().unwrap_or(DEFAULT_BUILD_OPTIONS);
  let mut options = split_options(base)?;
  if scratch {
    options.push("--scratch".to_string());
  }
  Ok(options)
}

/// `<client> <options> <tag> <srpm>`
pub fn submit_command(client: &str, options: &[String], tag: &str, srpm: &Path) -> ToolCommand {
  ToolCommand::new(client)
    .args(options.iter().cloned())
    .arg(tag)
    .arg(srpm.to_string_lossy())
}

/// Listing of `targets`: eligible tags only, or every tag annotated with
/// its eligibility when `verbose`
pub fn render_targets(targets: &[FarmTarget], verbose: bool, json: bool) -> PkgResult<String> {
  let shown: Vec<&FarmTarget> = targets
    .iter()
    .filter(|t| verbose || t.eligibility.is_eligible())
    .collect();

  if json {
    return Ok(serde_json::to_string_pretty(&shown)?);
  }

  let lines: Vec<String> = shown
    .iter()
    .map(|t| match (verbose, t.eligibility) {
      (false, _) | (true, Eligibility::Eligible) => t.tag.clone(),
      (true, Eligibility::Whitelisted) => format!("{} whitelisted", t.tag),
      (true, Eligibility::NotWhitelisted) => format!("{} not whitelisted", t.tag),
      (true, Eligibility::Blacklisted) => format!("{} blacklisted", t.tag),
    })
    .collect();
  Ok(lines.join("\n"))
}
