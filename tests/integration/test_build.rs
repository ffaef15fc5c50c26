//! Integration tests for `pkgrel build`

use crate::helpers::{TestRepo, pkgrel, run_pkgrel};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::io::Read;

const CONFIG: &str = r#"
[buildconfig]
builder = "standard"
"#;

fn archive_entries(bytes: &[u8]) -> Result<Vec<String>> {
  let mut archive = tar::Archive::new(GzDecoder::new(bytes));
  let mut names = Vec::new();
  for entry in archive.entries()? {
    names.push(entry?.path()?.to_string_lossy().to_string());
  }
  names.sort();
  Ok(names)
}

#[test]
fn test_tgz_writes_tagged_archive() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let output = repo.output.to_string_lossy().to_string();

  let result = run_pkgrel(&repo.package_dir(), None, &["build", "--tgz", "--offline", "--output", &output])?;
  let stdout = String::from_utf8_lossy(&result.stdout);
  assert!(stdout.contains("Building package [foo-1.0-1]"), "{stdout}");

  let archive = repo.output.join("foo-1.0.tar.gz");
  assert!(stdout.contains(&format!("Wrote: {}", archive.display())), "{stdout}");

  let entries = archive_entries(&std::fs::read(&archive)?)?;
  assert!(entries.iter().any(|e| e == "foo-1.0/foo.spec"), "{entries:?}");
  assert!(entries.iter().any(|e| e == "foo-1.0/hello.txt"), "{entries:?}");
  assert!(!entries.iter().any(|e| e.contains("rel-eng")), "{entries:?}");

  // The workspace is removed after the run
  assert!(repo.leftover_workspaces()?.is_empty());
  Ok(())
}

#[test]
fn test_tgz_is_reproducible() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let output = repo.output.to_string_lossy().to_string();
  let archive = repo.output.join("foo-1.0.tar.gz");

  run_pkgrel(&repo.package_dir(), None, &["build", "--tgz", "--offline", "--output", &output])?;
  let first = std::fs::read(&archive)?;
  std::thread::sleep(std::time::Duration::from_millis(1100));
  run_pkgrel(&repo.package_dir(), None, &["build", "--tgz", "--offline", "--output", &output])?;
  let second = std::fs::read(&archive)?;

  assert_eq!(first, second);
  Ok(())
}

#[test]
fn test_test_build_uses_git_version() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  repo.write_file("foo/hello.txt", "hello again\n")?;
  let sha = repo.commit("Change hello")?;
  let output = repo.output.to_string_lossy().to_string();

  run_pkgrel(&repo.package_dir(), None, &["build", "--tgz", "--test", "--output", &output])?;

  let archive = repo.output.join(format!("foo-git-1.{}.tar.gz", &sha[..7]));
  assert!(archive.exists(), "missing {}", archive.display());

  let mut contents = String::new();
  let mut tar = tar::Archive::new(GzDecoder::new(std::fs::File::open(&archive)?));
  for entry in tar.entries()? {
    let mut entry = entry?;
    if entry.path()?.ends_with("hello.txt") {
      entry.read_to_string(&mut contents)?;
    }
  }
  assert_eq!(contents, "hello again\n");
  Ok(())
}

#[test]
fn test_unpushed_tag_is_rejected_online() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let output = repo.output.to_string_lossy().to_string();

  let result = pkgrel(&repo.package_dir(), None, &["build", "--tgz", "--output", &output])?;
  assert!(!result.status.success());
  let stderr = String::from_utf8_lossy(&result.stderr);
  assert!(stderr.contains("origin"), "{stderr}");
  Ok(())
}

#[test]
fn test_nothing_to_do() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let result = pkgrel(&repo.package_dir(), None, &["build", "--offline"])?;
  assert_eq!(result.status.code(), Some(1));
  Ok(())
}

#[test]
fn test_version_gate() -> Result<()> {
  let repo = TestRepo::new("[requirements]\npkgrel = \"99.0.0\"\n")?;
  let output = repo.output.to_string_lossy().to_string();

  let result = pkgrel(&repo.package_dir(), None, &["build", "--tgz", "--offline", "--output", &output])?;
  assert!(!result.status.success());
  let stderr = String::from_utf8_lossy(&result.stderr);
  assert!(stderr.contains("99.0.0"), "{stderr}");
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_srpm_passes_directories_and_dist() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let user_config = repo.fake_rpmbuild("")?;
  let output = repo.output.to_string_lossy().to_string();

  let result = run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["build", "--srpm", "--offline", "--dist", ".el9", "--output", &output],
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);
  assert!(stdout.contains("foo-1.0-1.src.rpm"), "{stdout}");

  let args = repo.rpmbuild_args()?;
  let lines: Vec<&str> = args.lines().collect();
  assert!(lines.contains(&"dist .el9"), "{args}");
  assert!(lines.contains(&"-bs"), "{args}");
  assert!(lines.iter().any(|l| l.starts_with("_sourcedir ") && l.ends_with("/SOURCES")), "{args}");
  assert!(lines.last().is_some_and(|l| l.ends_with("foo.spec")), "{args}");
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_no_archive_builds_from_exported_tree() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let user_config = repo.fake_rpmbuild("")?;
  let output = repo.output.to_string_lossy().to_string();

  run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["build", "--srpm", "--offline", "--builder", "no-tgz", "--output", &output],
  )?;

  let args = repo.rpmbuild_args()?;
  assert!(
    args.lines().any(|l| l.starts_with("_sourcedir ") && l.ends_with("/SOURCES/foo-1.0")),
    "{args}"
  );
  assert!(!repo.output.join("foo-1.0.tar.gz").exists());
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_upstream_builder_without_patch_for_upstream_release() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let user_config = repo.fake_rpmbuild("")?;
  let output = repo.output.to_string_lossy().to_string();

  let result = run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["build", "--srpm", "--offline", "--builder", "upstream", "--output", &output],
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);
  assert!(stdout.contains("Building upstream tgz for tag [foo-1.0-1]"), "{stdout}");
  assert!(!stdout.contains("Generating patch"), "{stdout}");

  assert_eq!(repo.built_spec()?, crate::helpers::SPEC);
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_upstream_builder_patches_downstream_changes() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  repo.write_file("foo/hello.txt", "hello downstream\n")?;
  repo.commit("Downstream change")?;
  repo.release_version("1.0-2")?;
  let user_config = repo.fake_rpmbuild("")?;
  let output = repo.output.to_string_lossy().to_string();

  let result = run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["build", "--srpm", "--offline", "--builder", "upstream", "--output", &output],
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);
  assert!(stdout.contains("Building package [foo-1.0-2]"), "{stdout}");
  assert!(stdout.contains("Generating patch [foo-1.0-1-to-foo-1.0-2.patch]"), "{stdout}");

  let spec = repo.built_spec()?;
  assert!(spec.contains("Source0: foo-1.0.tar.gz\nPatch0: foo-1.0-1-to-foo-1.0-2.patch\n"), "{spec}");
  assert!(spec.contains("%setup -q\n%patch0 -p1\n"), "{spec}");
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_no_archive_adopts_checked_in_tarball() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  repo.write_file("foo/foo-1.0.tar.gz", "not really a tarball\n")?;
  repo.write_file("foo/x.tar/readme", "a directory, not a source\n")?;
  repo.release_version("1.0-2")?;
  let user_config = repo.fake_rpmbuild("")?;
  let output = repo.output.to_string_lossy().to_string();

  run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["build", "--srpm", "--offline", "--builder", "no-tgz", "--output", &output],
  )?;

  let args = repo.rpmbuild_args()?;
  assert!(
    args.lines().any(|l| l.starts_with("_sourcedir ") && l.ends_with("/SOURCES/foo-1.0")),
    "{args}"
  );
  // The checked-in tarball is used as is, nothing new is archived
  assert!(!repo.output.join("foo-1.0.tar.gz").exists());
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_sources_are_produced_once_per_run() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let user_config = repo.fake_rpmbuild("")?;
  let output = repo.output.to_string_lossy().to_string();

  let result = run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["build", "--tgz", "--srpm", "--offline", "--output", &output],
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);

  let wrote = format!("Wrote: {}", repo.output.join("foo-1.0.tar.gz").display());
  assert_eq!(stdout.lines().filter(|l| *l == wrote).count(), 1, "{stdout}");
  assert!(stdout.contains("foo-1.0-1.src.rpm"), "{stdout}");
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_rpmbuild_options_keep_quoted_words() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let user_config = repo.fake_rpmbuild("")?;
  let output = repo.output.to_string_lossy().to_string();

  run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &[
      "build",
      "--srpm",
      "--offline",
      "--rpmbuild-options",
      "--define 'packager Jane Doe'",
      "--output",
      &output,
    ],
  )?;

  let args = repo.rpmbuild_args()?;
  let lines: Vec<&str> = args.lines().collect();
  let define = lines
    .iter()
    .position(|l| *l == "packager Jane Doe")
    .with_context(|| format!("packager define not passed as one word: {args}"))?;
  assert_eq!(lines[define - 1], "--define", "{args}");
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_interrupt_cleans_up_workspace() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  // Stands in for the operator pressing Ctrl-C while rpmbuild runs
  let rpmbuild = repo.install_tool("rpmbuild", "kill -INT $PPID\nsleep 1\n")?;
  let user_config = repo.user_config(&format!("rpmbuild = \"{}\"\n", rpmbuild.display()))?;
  let output = repo.output.to_string_lossy().to_string();

  let result = pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["build", "--srpm", "--offline", "--output", &output],
  )?;
  assert_eq!(result.status.code(), Some(130));
  let stderr = String::from_utf8_lossy(&result.stderr);
  assert!(stderr.contains("Interrupted"), "{stderr}");
  assert!(repo.leftover_workspaces()?.is_empty());
  Ok(())
}
