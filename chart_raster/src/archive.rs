//! Opens `<archive-root>/<zip_file>.zip` and extracts `<input_file>` to a
//! temp-output path so GDAL can open it as a plain file.

use anyhow::{Context, Result};
use chart_derive::context;
use std::fs::File;
use std::io::copy;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Extracts `member` from the ZIP archive at `archive_path` into `dest_path`,
/// creating parent directories as needed. Returns `dest_path` on success.
#[context("extracting {member} from {archive_path:?} into {dest_path:?}")]
pub fn extract_member(archive_path: &Path, member: &str, dest_path: &Path) -> Result<PathBuf> {
	let file = File::open(archive_path).with_context(|| format!("failed to open archive {archive_path:?}"))?;
	let mut archive = ZipArchive::new(file).with_context(|| format!("failed to read ZIP archive {archive_path:?}"))?;
	let mut entry = archive
		.by_name(member)
		.with_context(|| format!("archive {archive_path:?} has no member {member:?}"))?;

	if let Some(parent) = dest_path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	let mut out = File::create(dest_path).with_context(|| format!("failed to create {dest_path:?}"))?;
	copy(&mut entry, &mut out).with_context(|| format!("failed to extract {member} to {dest_path:?}"))?;

	Ok(dest_path.to_path_buf())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use zip::write::{FileOptions, ZipWriter};

	fn make_test_zip(path: &Path, member: &str, contents: &[u8]) {
		let file = File::create(path).unwrap();
		let mut zip = ZipWriter::new(file);
		zip.start_file(member, FileOptions::<()>::default()).unwrap();
		zip.write_all(contents).unwrap();
		zip.finish().unwrap();
	}

	#[test]
	fn extracts_a_named_member() {
		let dir = tempfile::tempdir().unwrap();
		let zip_path = dir.path().join("chart.zip");
		make_test_zip(&zip_path, "chart.tif", b"fake geotiff bytes");

		let dest = dir.path().join("out.tif");
		let result = extract_member(&zip_path, "chart.tif", &dest).unwrap();
		assert_eq!(std::fs::read(result).unwrap(), b"fake geotiff bytes");
	}

	#[test]
	fn errors_on_missing_member() {
		let dir = tempfile::tempdir().unwrap();
		let zip_path = dir.path().join("chart.zip");
		make_test_zip(&zip_path, "chart.tif", b"data");

		let dest = dir.path().join("out.tif");
		assert!(extract_member(&zip_path, "missing.tif", &dest).is_err());
	}
}
