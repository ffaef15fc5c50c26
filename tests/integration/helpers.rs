//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

pub const SPEC: &str = r#"Name: foo
Version: 1.0
Release: 1
Summary: A test package
License: MIT
Source0: foo-1.0.tar.gz

%description
A test package.

%prep
%setup -q

%files
/usr/share/foo/hello.txt
"#;

/// A git repository holding one package `foo` in `foo/`, tagged `foo-1.0-1`
pub struct TestRepo {
  _root: TempDir,
  pub path: PathBuf,
  /// Build base passed with `--output`
  pub output: PathBuf,
}

impl TestRepo {
  /// Create the repository with `global_config` as `rel-eng/pkgrel.toml`
  pub fn new(global_config: &str) -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("repo");
    let output = root.path().join("out");
    std::fs::create_dir_all(path.join("rel-eng/packages"))?;
    std::fs::create_dir_all(path.join("foo"))?;

    // Initialize git repo with main as default branch
    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    std::fs::write(path.join("rel-eng/pkgrel.toml"), global_config)?;
    std::fs::write(path.join("rel-eng/packages/foo"), "1.0-1 foo/\n")?;
    std::fs::write(path.join("foo/foo.spec"), SPEC)?;
    std::fs::write(path.join("foo/hello.txt"), "hello\n")?;

    let repo = Self {
      _root: root,
      path,
      output,
    };
    repo.commit("Initial foo package")?;
    repo.tag("foo-1.0-1")?;
    Ok(repo)
  }

  /// Directory of the package, where pkgrel is run from
  pub fn package_dir(&self) -> PathBuf {
    self.path.join("foo")
  }

  pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
    let file = self.path.join(relative);
    if let Some(parent) = file.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file, content)?;
    Ok(())
  }

  /// Commit current changes
  pub fn commit(&self, message: &str) -> Result<String> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;

    let output = git(&self.path, &["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  pub fn tag(&self, tag: &str) -> Result<()> {
    git(&self.path, &["tag", "-a", tag, "-m", tag])?;
    Ok(())
  }

  /// Bump the package to `version` (a version-release) and tag it
  pub fn release_version(&self, version: &str) -> Result<()> {
    self.write_file("rel-eng/packages/foo", &format!("{} foo/\n", version))?;
    self.commit(&format!("Automatic commit of package [foo] release [{}].", version))?;
    self.tag(&format!("foo-{}", version))
  }

  /// Directory holding fake tools and what they record
  pub fn tools_dir(&self) -> Result<PathBuf> {
    let tools = self.path.parent().context("repo has no parent")?.join("tools");
    std::fs::create_dir_all(&tools)?;
    Ok(tools)
  }

  /// Install an executable shell script `name` in the tools directory
  #[cfg(unix)]
  pub fn install_tool(&self, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let script = self.tools_dir()?.join(name);
    std::fs::write(&script, format!("#!/bin/sh\n{}", body))?;
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
    Ok(script)
  }

  /// Write a user config with `tools` as its `[tools]` table
  pub fn user_config(&self, tools: &str) -> Result<PathBuf> {
    let user_config = self.tools_dir()?.join("config.toml");
    std::fs::write(&user_config, format!("[tools]\n{}", tools))?;
    Ok(user_config)
  }

  /// Install an executable fake `rpmbuild` that records its arguments and a
  /// copy of the spec it was given, and reports a source package.
  ///
  /// Returns the user config pointing pkgrel at it.
  #[cfg(unix)]
  pub fn fake_rpmbuild(&self, extra_tools: &str) -> Result<PathBuf> {
    let tools = self.tools_dir()?;
    let script = self.install_tool(
      "rpmbuild",
      &format!(
        r#"printf '%s\n' "$@" > "{tools}/rpmbuild.args"
echo "$*" >> "{tools}/rpmbuild.log"
for arg; do last="$arg"; done
cp "$last" "{tools}/built.spec"
touch "{out}/foo-1.0-1.src.rpm"
echo "Wrote: {out}/foo-1.0-1.src.rpm"
"#,
        tools = tools.display(),
        out = self.output.display()
      ),
    )?;
    self.user_config(&format!("rpmbuild = \"{}\"\n{}", script.display(), extra_tools))
  }

  /// Install fake `cvs` and `make` for a CVS module `foo` with the given
  /// branches. Each branch starts with the build system's own files
  /// (`Makefile`, `sources`, `CVS/`) and an `old.patch` no longer shipped.
  ///
  /// Returns the `[tools]` lines pointing pkgrel at them.
  #[cfg(unix)]
  pub fn fake_cvs(&self, branches: &[&str]) -> Result<String> {
    let tools = self.tools_dir()?;
    let cvs = self.install_tool(
      "cvs",
      &format!(
        r#"echo "$*" >> "{tools}/cvs.log"
if [ "$3" = "co" ]; then
  for b in {branches}; do
    mkdir -p "$4/$b/CVS"
    echo "include ../common/Makefile" > "$4/$b/Makefile"
    echo "abc123  foo-0.9.tar.gz" > "$4/$b/sources"
    echo "stale" > "$4/$b/old.patch"
  done
  exit 0
fi
case "$1" in
  diff) echo "+- 123456: fix crash on startup"; exit 1 ;;
  commit) cp "$3" "{tools}/commit.msg" ;;
esac
"#,
        tools = tools.display(),
        branches = branches.join(" ")
      ),
    )?;
    let make = self.install_tool(
      "make",
      &format!(
        r#"echo "$(basename "$PWD") $*" >> "{tools}/make.log"
"#,
        tools = tools.display()
      ),
    )?;
    Ok(format!("cvs = \"{}\"\nmake = \"{}\"\n", cvs.display(), make.display()))
  }

  /// Contents of a file a fake tool recorded, empty if never written
  pub fn recorded(&self, name: &str) -> Result<String> {
    let path = self.tools_dir()?.join(name);
    if !path.exists() {
      return Ok(String::new());
    }
    Ok(std::fs::read_to_string(path)?)
  }

  /// Arguments the fake rpmbuild was last called with, one per line
  pub fn rpmbuild_args(&self) -> Result<String> {
    self.recorded("rpmbuild.args")
  }

  /// Spec the fake rpmbuild was last given
  pub fn built_spec(&self) -> Result<String> {
    self.recorded("built.spec")
  }

  /// Workspace directories left in the output directory
  pub fn leftover_workspaces(&self) -> Result<Vec<String>> {
    if !self.output.exists() {
      return Ok(Vec::new());
    }
    Ok(
      std::fs::read_dir(&self.output)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("rpmbuild-"))
        .collect(),
    )
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

fn pkgrel_command(cwd: &Path, user_config: Option<&Path>, args: &[&str]) -> Command {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_pkgrel"));
  cmd.current_dir(cwd).args(args).env_remove("PKGREL_LOG");
  match user_config {
    Some(config) => cmd.env("PKGREL_USER_CONFIG", config),
    None => cmd.env("PKGREL_USER_CONFIG", cwd.join("no-such-user-config.toml")),
  };
  cmd
}

/// Run pkgrel in `cwd` without touching the caller's user config
pub fn pkgrel(cwd: &Path, user_config: Option<&Path>, args: &[&str]) -> Result<Output> {
  pkgrel_command(cwd, user_config, args)
    .output()
    .context("Failed to run pkgrel")
}

/// Run pkgrel answering its prompts with `input`
pub fn pkgrel_with_input(cwd: &Path, user_config: Option<&Path>, args: &[&str], input: &str) -> Result<Output> {
  let mut child = pkgrel_command(cwd, user_config, args)
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .context("Failed to start pkgrel")?;
  child
    .stdin
    .take()
    .context("pkgrel stdin not captured")?
    .write_all(input.as_bytes())?;
  child.wait_with_output().context("Failed to wait for pkgrel")
}

/// Run pkgrel and fail unless it exits successfully
pub fn run_pkgrel(cwd: &Path, user_config: Option<&Path>, args: &[&str]) -> Result<Output> {
  let output = pkgrel(cwd, user_config, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "pkgrel command failed: pkgrel {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}
