//! Builds, for a single zoom level, a GDAL VRT virtual mosaic of every
//! dataset whose `max_lod >= z`, ordered so the largest-detail dataset paints
//! underneath and the most-appropriate-for-this-zoom dataset paints on top.

use anyhow::{Context, Result, bail, ensure};
use chart_derive::context;
use gdal::Dataset;
use std::ffi::CString;
use std::path::{Path, PathBuf};

pub struct ZoomMosaicEntry {
	pub path: PathBuf,
	pub max_lod: u8,
}

/// Every source reprojected GeoTIFF is assumed 4-band RGBA in the same CRS
/// (guaranteed by the `Warp`/`Save` stages), so building the mosaic is a
/// plain `gdalbuildvrt`-style union-and-stack: `GDALBuildVRT` detects each
/// source's alpha band and blends through it automatically (`UseMaskBand`),
/// so transparent padding in a higher-detail source lets the coarser source
/// underneath show through rather than painting over it with empty pixels.
#[context("building zoom mosaic VRT for z={z}")]
pub fn build_zoom_mosaic_vrt(entries: &[ZoomMosaicEntry], z: u8, vrt_path: &Path) -> Result<PathBuf> {
	let mut selected: Vec<&ZoomMosaicEntry> = entries.iter().filter(|e| e.max_lod >= z).collect();
	// Largest-detail (highest max_lod) first so it paints underneath; the
	// dataset closest to this zoom is listed last and paints on top.
	selected.sort_by(|a, b| b.max_lod.cmp(&a.max_lod));
	ensure!(!selected.is_empty(), "no datasets cover zoom {z}");

	let dest = path_to_cstring(vrt_path)?;
	let src_names = selected.iter().map(|e| path_to_cstring(&e.path)).collect::<Result<Vec<_>>>()?;
	let mut src_name_ptrs: Vec<*mut std::ffi::c_char> = src_names.iter().map(|s| s.as_ptr() as *mut std::ffi::c_char).collect();

	unsafe {
		use gdal_sys::*;
		let options = GDALBuildVRTOptionsNew(std::ptr::null_mut(), std::ptr::null_mut());
		if options.is_null() {
			bail!("GDALBuildVRTOptionsNew failed");
		}
		let mut usage_error = 0;
		let vrt = GDALBuildVRT(
			dest.as_ptr(),
			src_name_ptrs.len() as i32,
			std::ptr::null_mut(),
			src_name_ptrs.as_mut_ptr(),
			options,
			&mut usage_error,
		);
		GDALBuildVRTOptionsFree(options);
		if vrt.is_null() || usage_error != 0 {
			bail!("GDALBuildVRT failed: {:?}", CPLGetLastErrorMsg());
		}
		GDALClose(vrt);
	}

	Ok(vrt_path.to_path_buf())
}

fn path_to_cstring(path: &Path) -> Result<CString> {
	CString::new(path.to_string_lossy().into_owned()).with_context(|| format!("path {path:?} contains a NUL byte"))
}

pub fn open_zoom_mosaic(vrt_path: &Path) -> Result<Dataset> {
	Dataset::open(vrt_path).with_context(|| format!("failed to open zoom mosaic VRT {vrt_path:?}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_entries_by_descending_max_lod() {
		let mut entries = vec![
			ZoomMosaicEntry {
				path: PathBuf::from("a.tif"),
				max_lod: 3,
			},
			ZoomMosaicEntry {
				path: PathBuf::from("b.tif"),
				max_lod: 7,
			},
			ZoomMosaicEntry {
				path: PathBuf::from("c.tif"),
				max_lod: 5,
			},
		];
		entries.sort_by(|a, b| b.max_lod.cmp(&a.max_lod));
		let order: Vec<_> = entries.iter().map(|e| e.max_lod).collect();
		assert_eq!(order, vec![7, 5, 3]);
	}
}
