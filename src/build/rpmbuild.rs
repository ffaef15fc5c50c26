//! rpmbuild invocation and output parsing

use crate::core::error::{BuildError, PkgResult};
use crate::core::process::ToolCommand;
use std::path::{Path, PathBuf};
use tracing::debug;

const WROTE_PREFIX: &str = "Wrote: ";

/// Directory macros passed to rpmbuild so it never touches `~/rpmbuild`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirOverrides {
  pub source_dir: PathBuf,
  pub build_dir: PathBuf,
  pub srpm_dir: PathBuf,
  pub rpm_dir: PathBuf,
}

impl DirOverrides {
  pub fn to_args(&self) -> Vec<String> {
    [
      ("_sourcedir", &self.source_dir),
      ("_builddir", &self.build_dir),
      ("_srcrpmdir", &self.srpm_dir),
      ("_rpmdir", &self.rpm_dir),
    ]
    .into_iter()
    .flat_map(|(name, dir)| ["--define".to_string(), format!("{} {}", name, dir.display())])
    .collect()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpmbuildMode {
  /// `--nodeps -bs`
  Source,
  /// `--clean -ba`
  Binary,
}

/// Build the rpmbuild command line for `descriptor`
pub fn rpmbuild_command(
  program: &str,
  extra_options: &[String],
  dirs: &DirOverrides,
  dist: Option<&str>,
  mode: RpmbuildMode,
  descriptor: &Path,
) -> ToolCommand {
  let mut cmd = ToolCommand::new(program)
    .env("LC_ALL", "C")
    .args(["--define", "_source_filedigest_algorithm md5"])
    .args(["--define", "_binary_filedigest_algorithm md5"])
    .args(extra_options.iter().cloned())
    .args(dirs.to_args());

  if let Some(dist) = dist {
    cmd = cmd.arg("--define").arg(format!("dist {}", dist));
  }

  cmd = match mode {
    RpmbuildMode::Source => cmd.args(["--nodeps", "-bs"]),
    RpmbuildMode::Binary => cmd.args(["--clean", "-ba"]),
  };
  cmd.arg(descriptor.to_string_lossy())
}

/// Paths from every `Wrote: <path>` line, in order
pub fn parse_wrote_lines(output: &str) -> Vec<PathBuf> {
  output
    .lines()
    .filter_map(|line| line.strip_prefix(WROTE_PREFIX))
    .map(|path| {
      debug!("found wrote line: {}", path);
      PathBuf::from(path.trim())
    })
    .collect()
}

/// Like [`parse_wrote_lines`], failing when fewer than `min` paths are found
pub fn require_wrote_lines(output: &str, min: usize) -> PkgResult<Vec<PathBuf>> {
  let paths = parse_wrote_lines(output);
  if paths.len() < min.max(1) {
    return Err(
      BuildError::BuildOutputParse {
        expected: min.max(1),
        found: paths.len(),
      }
      .into(),
    );
  }
  Ok(paths)
}
