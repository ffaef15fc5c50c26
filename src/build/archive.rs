//! Deterministic `.tar.gz` packing for `git archive` output
//!
//! Every entry carries the same mtime and the gzip header is empty, so the
//! same commit always yields a byte-identical archive.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tar::EntryType;

/// Re-pack an uncompressed tar with fixed mtimes and gzip it.
///
/// pax global headers (git stores the commit id there) are dropped.
pub fn normalize_archive(raw_tar: &[u8], mtime: u64) -> Result<Vec<u8>> {
  let mut archive = tar::Archive::new(raw_tar);
  let mut builder = tar::Builder::new(Vec::new());
  builder.follow_symlinks(false);

  for entry in archive.entries().context("failed to read git archive output")? {
    let mut entry = entry.context("corrupt entry in git archive output")?;
    let entry_type = entry.header().entry_type();
    if matches!(entry_type, EntryType::XGlobalHeader | EntryType::XHeader) {
      continue;
    }

    let path = entry.path().context("invalid path in git archive output")?.into_owned();
    let mut header = entry.header().clone();
    header.set_mtime(mtime);

    match entry_type {
      EntryType::Symlink => {
        let target = entry
          .link_name()?
          .map(|t| t.into_owned())
          .with_context(|| format!("symlink without target: {}", path.display()))?;
        builder.append_link(&mut header, &path, &target)?;
      }
      EntryType::Regular | EntryType::Continuous => {
        let mut data = Vec::with_capacity(header.size().unwrap_or(0) as usize);
        entry.read_to_end(&mut data)?;
        builder.append_data(&mut header, &path, data.as_slice())?;
      }
      _ => {
        builder.append_data(&mut header, &path, std::io::empty())?;
      }
    }
  }

  builder.finish()?;
  let tar_bytes = builder.into_inner()?;

  let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(&tar_bytes)?;
  Ok(encoder.finish()?)
}

/// Unpack a `.tar.gz` into `dest`
pub fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
  let bytes = fs::read(archive).with_context(|| format!("failed to read {}", archive.display()))?;
  let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
  archive.set_preserve_mtime(true);
  archive
    .unpack(dest)
    .with_context(|| format!("failed to unpack into {}", dest.display()))?;
  Ok(())
}
