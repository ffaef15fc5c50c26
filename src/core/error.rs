//! Error types for pkgrel with contextual messages and exit codes
//!
//! Every fatal condition in a build or release run ends up as a `PkgError`.
//! Categories map onto exit codes, and most variants carry a help message
//! pointing the user at the fix.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for pkgrel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, rpmbuild, koji, I/O)
  System = 2,
  /// A precondition of the run was violated (stale checkout, bad spec file)
  Validation = 3,
  /// The user answered "no" at a confirmation prompt
  Declined = 4,
  /// Interrupted with Ctrl-C
  Interrupted = 130,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for pkgrel
#[derive(Debug)]
pub enum PkgError {
  /// Configuration errors
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// External tool (rpmbuild, cvs, koji, make) errors
  Tool(ToolError),

  /// Package build errors (spec file, rpmbuild output)
  Build(BuildError),

  /// Release target errors (CVS checkout, prompts)
  Release(ReleaseError),

  /// I/O errors
  Io(io::Error),

  /// Ctrl-C arrived while `during` was running
  Interrupted { during: String },

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl PkgError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    PkgError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      PkgError::Message { message, context, help } => PkgError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      PkgError::Io(err) => PkgError::Message {
        message: format!("I/O error: {}", err),
        context: Some(ctx_str),
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      PkgError::Config(_) => ExitCode::User,
      PkgError::Git(_) => ExitCode::System,
      PkgError::Tool(_) => ExitCode::System,
      PkgError::Build(BuildError::BuildOutputParse { .. }) => ExitCode::System,
      PkgError::Build(_) => ExitCode::Validation,
      PkgError::Release(ReleaseError::UserDeclined) => ExitCode::Declined,
      PkgError::Release(_) => ExitCode::Validation,
      PkgError::Io(_) => ExitCode::System,
      PkgError::Interrupted { .. } => ExitCode::Interrupted,
      PkgError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      PkgError::Config(e) => e.help_message(),
      PkgError::Git(e) => e.help_message(),
      PkgError::Build(e) => e.help_message(),
      PkgError::Release(e) => e.help_message(),
      PkgError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for PkgError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PkgError::Config(e) => write!(f, "{}", e),
      PkgError::Git(e) => write!(f, "{}", e),
      PkgError::Tool(e) => write!(f, "{}", e),
      PkgError::Build(e) => write!(f, "{}", e),
      PkgError::Release(e) => write!(f, "{}", e),
      PkgError::Io(e) => write!(f, "I/O error: {}", e),
      PkgError::Interrupted { during } => write!(f, "Interrupted during: {}", during),
      PkgError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for PkgError {}

impl From<io::Error> for PkgError {
  fn from(err: io::Error) -> Self {
    PkgError::Io(err)
  }
}

impl From<String> for PkgError {
  fn from(msg: String) -> Self {
    PkgError::message(msg)
  }
}

impl From<&str> for PkgError {
  fn from(msg: &str) -> Self {
    PkgError::message(msg)
  }
}

impl From<toml_edit::TomlError> for PkgError {
  fn from(err: toml_edit::TomlError) -> Self {
    PkgError::message(format!("TOML parse error: {}", err))
  }
}

impl From<toml_edit::de::Error> for PkgError {
  fn from(err: toml_edit::de::Error) -> Self {
    PkgError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for PkgError {
  fn from(err: serde_json::Error) -> Self {
    PkgError::message(format!("JSON error: {}", err))
  }
}

impl From<std::num::ParseIntError> for PkgError {
  fn from(err: std::num::ParseIntError) -> Self {
    PkgError::message(format!("Parse error: {}", err))
  }
}

impl From<ConfigError> for PkgError {
  fn from(err: ConfigError) -> Self {
    PkgError::Config(err)
  }
}

impl From<GitError> for PkgError {
  fn from(err: GitError) -> Self {
    PkgError::Git(err)
  }
}

impl From<ToolError> for PkgError {
  fn from(err: ToolError) -> Self {
    PkgError::Tool(err)
  }
}

impl From<BuildError> for PkgError {
  fn from(err: BuildError) -> Self {
    PkgError::Build(err)
  }
}

impl From<ReleaseError> for PkgError {
  fn from(err: ReleaseError) -> Self {
    PkgError::Release(err)
  }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
  /// Global rel-eng configuration not found
  NotFound { git_root: PathBuf },

  /// Package metadata file (rel-eng/packages/<name>) missing or malformed
  PackageMetadata { name: String, reason: String },

  /// Required option missing from a section
  MissingOption { section: String, option: String },

  /// A release target was explicitly requested but is not configured
  NotConfigured { target: String, reason: String },

  /// Unknown builder kind in --builder or [buildconfig] builder
  UnknownBuilder { kind: String },

  /// Installed pkgrel is older than the project requires
  VersionGate { required: String, installed: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { git_root } => Some(format!(
        "Create {} with at least an empty [buildconfig] table.",
        git_root.join("rel-eng").join("pkgrel.toml").display()
      )),
      ConfigError::PackageMetadata { name, .. } => Some(format!(
        "rel-eng/packages/{} must contain \"<version>-<release> <relative dir>\".",
        name
      )),
      ConfigError::NotConfigured { target, .. } => Some(format!(
        "Add the '{}' settings to rel-eng/pkgrel.toml or drop the flag.",
        target
      )),
      ConfigError::UnknownBuilder { .. } => Some("Known builders: standard, no-tgz, cvs, upstream.".to_string()),
      ConfigError::VersionGate { required, .. } => Some(format!("Upgrade pkgrel to {} or later.", required)),
      ConfigError::MissingOption { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { git_root } => {
        write!(
          f,
          "No pkgrel configuration found.\nExpected file: {}/rel-eng/pkgrel.toml",
          git_root.display()
        )
      }
      ConfigError::PackageMetadata { name, reason } => {
        write!(f, "Invalid package metadata for '{}': {}", name, reason)
      }
      ConfigError::MissingOption { section, option } => {
        write!(f, "Missing option '{}' in section [{}]", option, section)
      }
      ConfigError::NotConfigured { target, reason } => {
        write!(f, "Release target '{}' is not configured: {}", target, reason)
      }
      ConfigError::UnknownBuilder { kind } => {
        write!(f, "Unknown builder '{}'", kind)
      }
      ConfigError::VersionGate { required, installed } => {
        write!(
          f,
          "pkgrel version {} or later is needed to build this project (installed: {})",
          required, installed
        )
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Tag does not exist in the local repository
  TagNotFound { tag: String },

  /// Tag exists locally but was never pushed
  TagNotPushed { tag: String, remote: String },

  /// Tag points at different commits locally and upstream
  TagMismatch { tag: String, local: String, upstream: String },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::TagNotFound { tag } => Some(format!("Tag the release first, e.g. `git tag {}`.", tag)),
      GitError::TagNotPushed { .. } => Some("You must tag, then `git push` and `git push --tags`.".to_string()),
      GitError::TagMismatch { .. } => Some("Re-tag locally or upstream so both point at the same commit.".to_string()),
      GitError::RepoNotFound { path } => Some(format!(
        "Run pkgrel from inside a git checkout (looked in {}).",
        path.display()
      )),
      GitError::CommandFailed { .. } => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::TagNotFound { tag } => {
        write!(f, "Tag does not exist locally: [{}]", tag)
      }
      GitError::TagNotPushed { tag, remote } => {
        write!(f, "Tag does not exist in remote git repo {}: {}", remote, tag)
      }
      GitError::TagMismatch { tag, local, upstream } => {
        write!(f, "Tag {} references {} locally but {} upstream", tag, local, upstream)
      }
    }
  }
}

/// External tool errors
#[derive(Debug)]
pub enum ToolError {
  /// The tool could not be started at all
  Spawn { command: String, reason: String },

  /// The tool exited with a failure status
  CommandFailed {
    command: String,
    status: Option<i32>,
    stderr: String,
  },
}

impl fmt::Display for ToolError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ToolError::Spawn { command, reason } => {
        write!(f, "Failed to execute: {}\n{}", command, reason)
      }
      ToolError::CommandFailed { command, status, stderr } => {
        match status {
          Some(code) => write!(f, "Command failed with status {}: {}", code, command)?,
          None => write!(f, "Command terminated by signal: {}", command)?,
        }
        if !stderr.trim().is_empty() {
          write!(f, "\n{}", stderr.trim_end())?;
        }
        Ok(())
      }
    }
  }
}

/// Package build errors
#[derive(Debug)]
pub enum BuildError {
  /// No spec file in the exported sources
  DescriptorNotFound { dir: PathBuf },

  /// More than one spec file in the exported sources
  AmbiguousDescriptor { dir: PathBuf, candidates: Vec<String> },

  /// Spec file lacks a Source/Patch anchor or a %prep/%setup anchor
  InsertionPointNotFound { descriptor: PathBuf },

  /// A spec file directive pkgrel relies on could not be understood
  DescriptorParse {
    descriptor: PathBuf,
    line: usize,
    reason: String,
  },

  /// rpmbuild (or make) output lacked the expected "Wrote:" lines
  BuildOutputParse { expected: usize, found: usize },
}

impl BuildError {
  fn help_message(&self) -> Option<String> {
    match self {
      BuildError::DescriptorNotFound { .. } => {
        Some("The project directory must contain exactly one .spec file at the build commit.".to_string())
      }
      BuildError::AmbiguousDescriptor { .. } => Some("Remove the extra .spec files from the project directory.".to_string()),
      BuildError::InsertionPointNotFound { .. } => {
        Some("The spec file needs a SourceN:/PatchN: line and a %prep or %setup section.".to_string())
      }
      BuildError::DescriptorParse { .. } => None,
      BuildError::BuildOutputParse { .. } => None,
    }
  }
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::DescriptorNotFound { dir } => {
        write!(f, "No spec file found in: {}", dir.display())
      }
      BuildError::AmbiguousDescriptor { dir, candidates } => {
        write!(
          f,
          "Multiple spec files found in {}: {}",
          dir.display(),
          candidates.join(", ")
        )
      }
      BuildError::InsertionPointNotFound { descriptor } => {
        write!(
          f,
          "Unable to insert PatchX or %patchX lines in spec file: {}",
          descriptor.display()
        )
      }
      BuildError::DescriptorParse {
        descriptor,
        line,
        reason,
      } => {
        write!(f, "{}:{}: {}", descriptor.display(), line, reason)
      }
      BuildError::BuildOutputParse { expected, found } => {
        write!(
          f,
          "Error parsing rpmbuild output: expected at least {} 'Wrote: ' line(s), found {}",
          expected, found
        )
      }
    }
  }
}

/// Release target errors
#[derive(Debug)]
pub enum ReleaseError {
  /// A previous CVS/dist-git checkout was left behind
  AlreadyCheckedOut { path: PathBuf },

  /// A configured CVS branch is missing from the checkout
  MissingBranch { project: String, branch: String },

  /// The user declined a confirmation prompt
  UserDeclined,
}

impl ReleaseError {
  fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::AlreadyCheckedOut { path } => {
        Some(format!("Remove the stale checkout and try again: rm -rf {}", path.display()))
      }
      ReleaseError::MissingBranch { branch, .. } => Some(format!(
        "Create the '{}' branch in CVS or remove it from [cvs] branches.",
        branch
      )),
      ReleaseError::UserDeclined => None,
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::AlreadyCheckedOut { path } => {
        write!(f, "Checkout directory already exists: {}", path.display())
      }
      ReleaseError::MissingBranch { project, branch } => {
        write!(f, "{} CVS checkout is missing branch: {}", project, branch)
      }
      ReleaseError::UserDeclined => write!(f, "Fine, you're on your own!"),
    }
  }
}

/// Result type alias for pkgrel
pub type PkgResult<T> = Result<T, PkgError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> PkgResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> PkgResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<PkgError>,
{
  fn context(self, ctx: impl Into<String>) -> PkgResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> PkgResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &PkgError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}

/// Convert anyhow::Error from helper modules into PkgError
impl From<anyhow::Error> for PkgError {
  fn from(err: anyhow::Error) -> Self {
    PkgError::message(format!("{:#}", err))
  }
}
