//! Integration tests for `pkgrel tags`

use crate::helpers::{TestRepo, run_pkgrel};
use anyhow::Result;

const CONFIG: &str = r#"
[koji]
autobuild_tags = ["dist-f12", "dist-el5"]

["dist-f12"]
disttag = ".fc12"

["dist-el5"]
blacklist = "foo"
"#;

#[test]
fn test_tags_lists_eligible() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let output = run_pkgrel(&repo.package_dir(), None, &["tags"])?;
  assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "dist-f12");
  Ok(())
}

#[test]
fn test_tags_verbose_annotates() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let output = run_pkgrel(&repo.package_dir(), None, &["tags", "--verbose"])?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.lines().any(|l| l == "dist-el5 blacklisted"), "{stdout}");
  Ok(())
}

#[test]
fn test_tags_json() -> Result<()> {
  let repo = TestRepo::new(CONFIG)?;
  let output = run_pkgrel(&repo.path, None, &["tags", "--json", "--package", "foo"])?;

  let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  let tags = json.as_array().expect("json array");
  assert_eq!(tags.len(), 1);
  assert_eq!(tags[0]["tag"], "dist-f12");
  assert_eq!(tags[0]["disttag"], ".fc12");
  Ok(())
}
