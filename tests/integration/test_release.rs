//! Integration tests for `pkgrel release`

use crate::helpers::{TestRepo, pkgrel, pkgrel_with_input, run_pkgrel};
use anyhow::{Context, Result};

const FARM_CONFIG: &str = r#"
[koji]
autobuild_tags = "dist-f12 dist-el5 dist-el6"

["dist-f12"]
disttag = ".fc12"

["dist-el5"]
disttag = ".el5"
blacklist = "foo"

["dist-el6"]
disttag = ".el6"
whitelist = "bar baz"
"#;

#[cfg(unix)]
#[test]
fn test_farm_release_dry_run() -> Result<()> {
  let repo = TestRepo::new(FARM_CONFIG)?;
  let user_config = repo.fake_rpmbuild("build_client = \"farm-client-not-installed\"\n")?;
  let output = repo.output.to_string_lossy().to_string();

  let result = run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["release", "--koji", "--dry-run", "--scratch", "--offline", "--output", &output],
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);

  let srpm = repo.output.join("foo-1.0-1.src.rpm");
  let expected = format!(
    "WARNING: Skipping command due to --dry-run: farm-client-not-installed build --nowait --scratch dist-f12 {}",
    srpm.display()
  );
  assert!(stdout.contains(&expected), "{stdout}");
  assert!(stdout.contains("blacklisted for tag dist-el5"), "{stdout}");
  assert!(stdout.contains("not whitelisted for tag dist-el6"), "{stdout}");
  assert!(!stdout.contains("--scratch dist-el5"), "{stdout}");

  // The source package was built with the tag's disttag
  let args = repo.rpmbuild_args()?;
  assert!(args.lines().any(|l| l == "dist .fc12"), "{args}");
  Ok(())
}

const TWO_TAG_CONFIG: &str = r#"
[koji]
autobuild_tags = "dist-f12 dist-f13"

["dist-f12"]
disttag = ".fc12"

["dist-f13"]
disttag = ".fc13"
"#;

const CVS_CONFIG: &str = r#"
[cvs]
cvsroot = ":ext:cvs.example.com:/cvs/dist"
branches = "RHEL-5 RHEL-6"
"#;

#[cfg(unix)]
#[test]
fn test_farm_release_rebuilds_source_package_per_tag() -> Result<()> {
  let repo = TestRepo::new(TWO_TAG_CONFIG)?;
  let user_config = repo.fake_rpmbuild("build_client = \"farm-client-not-installed\"\n")?;
  let output = repo.output.to_string_lossy().to_string();

  let result = run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["release", "--koji", "--dry-run", "--offline", "--output", &output],
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);

  let log = repo.recorded("rpmbuild.log")?;
  let calls: Vec<&str> = log.lines().collect();
  assert_eq!(calls.len(), 2, "{log}");
  assert!(calls[0].contains("dist .fc12"), "{log}");
  assert!(calls[1].contains("dist .fc13"), "{log}");

  for tag in ["dist-f12", "dist-f13"] {
    let submit = format!("farm-client-not-installed build --nowait {} ", tag);
    assert!(
      stdout
        .lines()
        .any(|l| l.starts_with("WARNING: Skipping command due to --dry-run:") && l.contains(&submit)),
      "{stdout}"
    );
  }
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_farm_release_only_tags() -> Result<()> {
  let repo = TestRepo::new(FARM_CONFIG)?;
  let user_config = repo.fake_rpmbuild("build_client = \"farm-client-not-installed\"\n")?;
  let output = repo.output.to_string_lossy().to_string();

  let result = run_pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["release", "--koji", "--dry-run", "--offline", "--only-tags", "dist-el5", "--output", &output],
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);
  assert!(!stdout.contains("Skipping command due to --dry-run"), "{stdout}");
  assert!(!stdout.contains("dist-f12"), "{stdout}");
  Ok(())
}

#[test]
fn test_explicit_cvs_release_requires_config() -> Result<()> {
  let repo = TestRepo::new(FARM_CONFIG)?;
  let output = repo.output.to_string_lossy().to_string();

  let result = pkgrel(
    &repo.package_dir(),
    None,
    &["release", "--cvs", "--dry-run", "--offline", "--output", &output],
  )?;
  assert_eq!(result.status.code(), Some(1));
  let stderr = String::from_utf8_lossy(&result.stderr);
  assert!(stderr.contains("cvs"), "{stderr}");
  Ok(())
}

#[test]
fn test_explicit_git_release_requires_config() -> Result<()> {
  let repo = TestRepo::new(FARM_CONFIG)?;
  let output = repo.output.to_string_lossy().to_string();

  let result = pkgrel(
    &repo.package_dir(),
    None,
    &["release", "--git", "--dry-run", "--offline", "--output", &output],
  )?;
  assert_eq!(result.status.code(), Some(1));
  Ok(())
}

#[test]
fn test_list_tags_during_release() -> Result<()> {
  let repo = TestRepo::new(FARM_CONFIG)?;
  let output = repo.output.to_string_lossy().to_string();

  let result = run_pkgrel(
    &repo.package_dir(),
    None,
    &["release", "--list-tags", "--offline", "--output", &output],
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);
  assert!(stdout.lines().any(|l| l == "dist-f12"), "{stdout}");
  assert!(!stdout.lines().any(|l| l == "dist-el5"), "{stdout}");
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_cvs_release_syncs_commits_and_builds() -> Result<()> {
  let repo = TestRepo::new(CVS_CONFIG)?;
  let user_config = repo.user_config(&repo.fake_cvs(&["RHEL-5", "RHEL-6"])?)?;
  let output = repo.output.to_string_lossy().to_string();

  // Commit, then leave the message alone
  let result = pkgrel_with_input(
    &repo.package_dir(),
    Some(&user_config),
    &["release", "--cvs", "--offline", "--no-cleanup", "--output", &output],
    "y\nn\n",
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);
  assert!(result.status.success(), "{stdout}\n{}", String::from_utf8_lossy(&result.stderr));

  let cvs_log = repo.recorded("cvs.log")?;
  assert_eq!(cvs_log.lines().filter(|l| *l == "add foo.spec").count(), 2, "{cvs_log}");
  assert_eq!(cvs_log.lines().filter(|l| *l == "rm -Rf old.patch").count(), 2, "{cvs_log}");
  for protected in ["Makefile", "sources", "CVS"] {
    assert!(!cvs_log.contains(&format!("rm -Rf {}", protected)), "{cvs_log}");
  }

  let branch = repo.output.join("cvswork/foo/RHEL-5");
  assert_eq!(std::fs::read_to_string(branch.join("Makefile"))?, "include ../common/Makefile\n");
  assert!(branch.join("foo.spec").exists());

  assert_eq!(
    repo.recorded("commit.msg")?,
    "Update foo to 1.0-1\nResolves: #123456 - fix crash on startup\n"
  );

  let make_log = repo.recorded("make.log")?;
  let tarball = repo.output.join("foo-1.0.tar.gz");
  for branch in ["RHEL-5", "RHEL-6"] {
    let upload = format!("{} new-sources FILES={}", branch, tarball.display());
    assert!(make_log.lines().any(|l| l == upload), "{make_log}");
    assert!(make_log.lines().any(|l| l == format!("{} tag", branch)), "{make_log}");
    assert!(make_log.lines().any(|l| l == format!("{} build", branch)), "{make_log}");
  }
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_declined_cvs_commit_removes_checkout() -> Result<()> {
  let repo = TestRepo::new(CVS_CONFIG)?;
  let user_config = repo.user_config(&repo.fake_cvs(&["RHEL-5", "RHEL-6"])?)?;
  let output = repo.output.to_string_lossy().to_string();

  let result = pkgrel_with_input(
    &repo.package_dir(),
    Some(&user_config),
    &["release", "--cvs", "--offline", "--output", &output],
    "n\n",
  )?;
  let stdout = String::from_utf8_lossy(&result.stdout);
  assert_eq!(result.status.code(), Some(4), "{stdout}");
  assert!(stdout.contains("Fine, you're on your own!"), "{stdout}");

  assert!(repo.recorded("commit.msg")?.is_empty());
  assert!(repo.recorded("make.log")?.lines().all(|l| !l.ends_with(" tag")));
  assert!(!repo.output.join("cvswork/foo").exists());
  assert!(repo.leftover_workspaces()?.is_empty());
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_stale_cvs_checkout_is_left_alone() -> Result<()> {
  let repo = TestRepo::new(CVS_CONFIG)?;
  let user_config = repo.user_config(&repo.fake_cvs(&["RHEL-5", "RHEL-6"])?)?;
  let output = repo.output.to_string_lossy().to_string();

  let stale = repo.output.join("cvswork/foo");
  std::fs::create_dir_all(&stale)?;
  std::fs::write(stale.join("marker"), "uncommitted work\n")?;

  let result = pkgrel(
    &repo.package_dir(),
    Some(&user_config),
    &["release", "--cvs", "--offline", "--output", &output],
  )?;
  assert_eq!(result.status.code(), Some(3));
  let stderr = String::from_utf8_lossy(&result.stderr);
  assert!(stderr.contains("cvswork"), "{stderr}");

  // Not ours to delete
  assert_eq!(std::fs::read_to_string(stale.join("marker"))?, "uncommitted work\n");
  assert!(repo.recorded("cvs.log")?.is_empty());
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_cvs_release_uploads_checked_in_tarball() -> Result<()> {
  let repo = TestRepo::new(CVS_CONFIG)?;
  repo.write_file("foo/foo-1.0.tar.gz", "not really a tarball\n")?;
  repo.write_file("foo/x.tar/readme", "a directory, not a source\n")?;
  repo.release_version("1.0-2")?;
  let user_config = repo.user_config(&repo.fake_cvs(&["RHEL-5", "RHEL-6"])?)?;
  let output = repo.output.to_string_lossy().to_string();

  let result = pkgrel_with_input(
    &repo.package_dir(),
    Some(&user_config),
    &["release", "--cvs", "--offline", "--builder", "no-tgz", "--output", &output],
    "y\nn\n",
  )?;
  assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

  let make_log = repo.recorded("make.log")?;
  let upload = make_log
    .lines()
    .find(|l| l.starts_with("RHEL-5 new-sources FILES="))
    .with_context(|| format!("no upload: {make_log}"))?;
  let files = upload.trim_start_matches("RHEL-5 new-sources FILES=");
  assert_eq!(files.split(' ').count(), 1, "{upload}");
  assert!(files.ends_with("/SOURCES/foo-1.0/foo-1.0.tar.gz"), "{upload}");

  let cvs_log = repo.recorded("cvs.log")?;
  assert!(cvs_log.lines().any(|l| l == "add foo-1.0.tar.gz"), "{cvs_log}");
  assert!(!cvs_log.contains("x.tar"), "{cvs_log}");
  Ok(())
}
