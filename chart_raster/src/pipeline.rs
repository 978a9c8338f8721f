//! `RasterHandle → RasterHandle` pipeline stages, composed by `DatasetPipeline`
//! into `ExpandRGB → ApplyMask → ApplyGCP → Warp → Clip → Save`.

use crate::bandmapping::BandMapping;
use crate::gcp::{GcpSet, solve_affine};
use crate::mask::{Mask, rasterize_alpha};
use crate::resample::ResampleAlg;
use crate::spatial_ref::get_spatial_ref;
use anyhow::{Context, Result, bail, ensure};
use chart_core::GeoBBox;
use chart_derive::context;
use gdal::raster::{ColorInterpretation, RasterCreationOptions};
use gdal::{Dataset, DriverManager, GeoTransform};
use std::path::Path;

/// An owned GDAL dataset plus the pixel offset accumulated by stages that
/// narrow the working raster to a sub-window of the original source.
pub struct RasterHandle {
	pub dataset: Dataset,
	pub offset_x: f64,
	pub offset_y: f64,
}

impl RasterHandle {
	#[must_use]
	pub fn new(dataset: Dataset) -> Self {
		Self {
			dataset,
			offset_x: 0.0,
			offset_y: 0.0,
		}
	}
}

/// Outcome of a single pipeline stage: either a fresh handle replacing the
/// input, or an explicit no-op (the input is reused unchanged).
pub enum StageOutcome {
	Fresh(RasterHandle),
	NoOp,
}

fn has_color_table(dataset: &Dataset) -> Result<bool> {
	Ok(dataset.rasterband(1)?.color_interpretation() == ColorInterpretation::PaletteIndex)
}

/// If band 1 has a palette color table, decodes it into three 8-bit bands; the
/// destination geotransform is unchanged since the full raster is kept. If a
/// `mask` is given, only its bounding-box window is materialized, and the
/// returned offset is that window's top-left pixel coordinate.
#[context("expanding palette raster to RGB")]
pub fn expand_rgb(handle: &RasterHandle, mask: Option<&Mask>) -> Result<StageOutcome> {
	let dataset = &handle.dataset;
	let is_paletted = has_color_table(dataset)?;

	let (width, height) = dataset.raster_size();
	let (window_x, window_y, window_w, window_h) = match mask {
		Some(mask) => {
			let (x_min, y_min, x_max, y_max) = mask.outer_bbox()?;
			let x0 = x_min.floor().max(0.0) as usize;
			let y0 = y_min.floor().max(0.0) as usize;
			let x1 = x_max.ceil().min(width as f64) as usize;
			let y1 = y_max.ceil().min(height as f64) as usize;
			ensure!(x1 > x0 && y1 > y0, "mask bounding box does not intersect the raster");
			(x0, y0, x1 - x0, y1 - y0)
		}
		None => (0, 0, width, height),
	};

	if !is_paletted && mask.is_none() {
		return Ok(StageOutcome::NoOp);
	}

	let driver = DriverManager::get_driver_by_name("MEM").context("failed to get GDAL MEM driver")?;
	let band_count = if is_paletted { 3 } else { dataset.raster_count() };
	let mut dst = driver.create_with_band_type::<u8, _>("mem", window_w, window_h, band_count)?;

	if is_paletted {
		let src_band = dataset.rasterband(1)?;
		let table = src_band
			.color_table()
			.context("palette band has no color table despite PaletteIndex interpretation")?;
		let indices = src_band.read_as::<u8>((window_x as isize, window_y as isize), (window_w, window_h), (window_w, window_h), None)?;
		let mut rgb = vec![vec![0u8; window_w * window_h]; 3];
		for (i, &idx) in indices.data().iter().enumerate() {
			let entry = table.entry_as_rgb(idx as usize).unwrap_or_default();
			rgb[0][i] = entry.r as u8;
			rgb[1][i] = entry.g as u8;
			rgb[2][i] = entry.b as u8;
		}
		for (band_idx, channel) in [ColorInterpretation::RedBand, ColorInterpretation::GreenBand, ColorInterpretation::BlueBand]
			.into_iter()
			.enumerate()
		{
			let mut band = dst.rasterband(band_idx + 1)?;
			band.set_color_interpretation(channel)?;
			band.write((0, 0), (window_w, window_h), &gdal::raster::Buffer::new((window_w, window_h), rgb[band_idx].clone()))?;
		}
	} else {
		for band_idx in 1..=band_count {
			let src_band = dataset.rasterband(band_idx)?;
			let data = src_band.read_as::<u8>((window_x as isize, window_y as isize), (window_w, window_h), (window_w, window_h), None)?;
			let mut dst_band = dst.rasterband(band_idx)?;
			dst_band.set_color_interpretation(src_band.color_interpretation())?;
			dst_band.write((0, 0), (window_w, window_h), &data)?;
		}
	}

	if let Some(gt) = dataset.geo_transform().ok() {
		let shifted: GeoTransform = [
			gt[0] + window_x as f64 * gt[1] + window_y as f64 * gt[2],
			gt[1],
			gt[2],
			gt[3] + window_x as f64 * gt[4] + window_y as f64 * gt[5],
			gt[4],
			gt[5],
		];
		dst.set_geo_transform(&shifted)?;
	}
	if let Some(srs) = dataset.spatial_ref() {
		dst.set_spatial_ref(&srs)?;
	}

	Ok(StageOutcome::Fresh(RasterHandle {
		dataset: dst,
		offset_x: handle.offset_x + window_x as f64,
		offset_y: handle.offset_y + window_y as f64,
	}))
}

/// Rasterizes `mask`'s polygon into a fresh RGBA raster window; the burn is
/// done with an identity geotransform then the spatial geotransform is
/// restored on the output dataset.
#[context("applying mask")]
pub fn apply_mask(handle: &RasterHandle, mask: Option<&Mask>) -> Result<StageOutcome> {
	let Some(mask) = mask else {
		return Ok(StageOutcome::NoOp);
	};

	let dataset = &handle.dataset;
	let (width, height) = dataset.raster_size();
	let mask = mask.translated(handle.offset_x, handle.offset_y);
	let (x_min, y_min, x_max, y_max) = mask.outer_bbox()?;
	let x0 = x_min.floor().max(0.0) as usize;
	let y0 = y_min.floor().max(0.0) as usize;
	let x1 = x_max.ceil().min(width as f64) as usize;
	let y1 = y_max.ceil().min(height as f64) as usize;
	ensure!(x1 > x0 && y1 > y0, "mask bounding box is degenerate after clamping to the raster");
	let (window_w, window_h) = (x1 - x0, y1 - y0);

	let translated_mask = mask.translated(x0 as f64, y0 as f64);
	let alpha = rasterize_alpha(&translated_mask, window_w, window_h)?;

	let source_bands = dataset.raster_count();
	let band_mapping = BandMapping::try_from_dataset(dataset)?;
	let has_alpha = band_mapping.len() == 4 || band_mapping.len() == 2;

	let driver = DriverManager::get_driver_by_name("MEM").context("failed to get GDAL MEM driver")?;
	let out_bands = if has_alpha { source_bands } else { source_bands + 1 };
	let mut dst = driver.create_with_band_type::<u8, _>("mem", window_w, window_h, out_bands)?;

	for band_idx in 1..=source_bands {
		let src_band = dataset.rasterband(band_idx)?;
		let data = src_band.read_as::<u8>((x0 as isize, y0 as isize), (window_w, window_h), (window_w, window_h), None)?;
		let mut dst_band = dst.rasterband(band_idx)?;
		dst_band.set_color_interpretation(src_band.color_interpretation())?;
		dst_band.write((0, 0), (window_w, window_h), &data)?;
	}
	let alpha_band_index = out_bands;
	let mut alpha_band = dst.rasterband(alpha_band_index)?;
	alpha_band.set_color_interpretation(ColorInterpretation::AlphaBand)?;
	alpha_band.write((0, 0), (window_w, window_h), &gdal::raster::Buffer::new((window_w, window_h), alpha))?;

	if let Ok(gt) = dataset.geo_transform() {
		let shifted: GeoTransform = [
			gt[0] + x0 as f64 * gt[1] + y0 as f64 * gt[2],
			gt[1],
			gt[2],
			gt[3] + x0 as f64 * gt[4] + y0 as f64 * gt[5],
			gt[4],
			gt[5],
		];
		dst.set_geo_transform(&shifted)?;
	}
	if let Some(srs) = dataset.spatial_ref() {
		dst.set_spatial_ref(&srs)?;
	}

	Ok(StageOutcome::Fresh(RasterHandle {
		dataset: dst,
		offset_x: handle.offset_x + x0 as f64,
		offset_y: handle.offset_y + y0 as f64,
	}))
}

/// Translates GCP pixel coordinates by the accumulated offset, solves a
/// best-fit affine geotransform, and attaches it (with the source CRS, or
/// WGS-84 if the source has none) to a copy of the dataset.
#[context("applying GCPs")]
pub fn apply_gcp(handle: &RasterHandle, gcps: Option<&GcpSet>) -> Result<StageOutcome> {
	let Some(gcps) = gcps else {
		return Ok(StageOutcome::NoOp);
	};
	if gcps.is_empty() {
		return Ok(StageOutcome::NoOp);
	}

	let dataset = &handle.dataset;
	let srs = dataset.spatial_ref().unwrap_or(get_spatial_ref(4326)?);
	let adjusted = gcps.translated(handle.offset_x, handle.offset_y).to_crs(&srs)?;
	let geo_transform = solve_affine(&adjusted)?;

	let driver_name = dataset.driver().short_name();
	let driver = DriverManager::get_driver_by_name(&driver_name).unwrap_or(DriverManager::get_driver_by_name("MEM")?);
	let (width, height) = dataset.raster_size();
	let mut dst = driver.create_with_band_type::<u8, _>("mem", width, height, dataset.raster_count())?;
	for band_idx in 1..=dataset.raster_count() {
		let src_band = dataset.rasterband(band_idx)?;
		let data = src_band.read_as::<u8>((0, 0), (width, height), (width, height), None)?;
		let mut dst_band = dst.rasterband(band_idx)?;
		dst_band.set_color_interpretation(src_band.color_interpretation())?;
		dst_band.write((0, 0), (width, height), &data)?;
	}

	dst.set_geo_transform(&geo_transform)?;
	dst.set_spatial_ref(&srs)?;

	Ok(StageOutcome::Fresh(RasterHandle {
		dataset: dst,
		offset_x: handle.offset_x,
		offset_y: handle.offset_y,
	}))
}

/// Reprojects to `EPSG:<epsg>` at `(resolution, resolution)` meters/pixel,
/// adjusting the equatorial resolution for the source's center latitude so
/// pixels are not up-sampled near the poles. Never a no-op.
#[context("warping to EPSG:{epsg} at {resolution}m/px")]
pub fn warp(handle: &RasterHandle, resolution: f64, epsg: u32, resampling: ResampleAlg, threads: usize) -> Result<StageOutcome> {
	let dataset = &handle.dataset;
	let src_srs = dataset.spatial_ref().context("source dataset has no spatial reference")?;

	let gt = dataset.geo_transform().context("source dataset has no geotransform")?;
	let (width, height) = dataset.raster_size();
	let center_x = gt[0] + (width as f64 / 2.0) * gt[1];
	let center_y = gt[3] + (height as f64 / 2.0) * gt[5];
	let to_wgs84 = gdal::spatial_ref::CoordTransform::new(&src_srs, &get_spatial_ref(4326)?)?;
	let center = to_wgs84.transform_bounds(&[center_x, center_y, center_x, center_y], 21)?;
	let center_lat = center[1];
	let effective_resolution = resolution / center_lat.to_radians().cos().max(1e-6);

	let dst_srs = get_spatial_ref(epsg)?;
	let band_mapping = BandMapping::try_from_dataset(dataset)?;

	let bbox = crate::instance::Instance::new(clone_dataset_handle(dataset)?).get_bbox()?;
	let bbox_mer = bbox.to_mercator();
	let out_width = ((bbox_mer[2] - bbox_mer[0]) / effective_resolution).ceil().max(1.0) as usize;
	let out_height = ((bbox_mer[3] - bbox_mer[1]) / effective_resolution).ceil().max(1.0) as usize;

	let mut dst = band_mapping.create_mem_dataset(out_width, out_height)?;
	dst.set_spatial_ref(&dst_srs)?;
	let geo_transform: GeoTransform = [
		bbox_mer[0],
		effective_resolution,
		0.0,
		bbox_mer[3],
		0.0,
		-effective_resolution,
	];
	dst.set_geo_transform(&geo_transform)?;

	let h_src_ds = dataset.c_dataset();
	let h_dst_ds = dst.c_dataset();
	unsafe {
		use gdal_sys::*;
		let mut options: GDALWarpOptions = *GDALCreateWarpOptions();
		options.hSrcDS = h_src_ds;
		options.hDstDS = h_dst_ds;
		let threads_str = std::ffi::CString::new(threads.max(1).to_string())?;
		CSLSetNameValue(options.papszWarpOptions, c"NUM_THREADS".as_ptr(), threads_str.as_ptr());
		band_mapping.setup_gdal_warp_options(&mut options);
		options.eResampleAlg = resampling.as_gdal();
		options.dfWarpMemoryLimit = 512.0 * 1024.0 * 1024.0;
		options.pTransformerArg = GDALCreateGenImgProjTransformer2(h_src_ds, h_dst_ds, core::ptr::null_mut());
		options.pfnTransformer = Some(GDALGenImgProjTransform);
		let operation: GDALWarpOperationH = GDALCreateWarpOperation(&options);
		let rv = GDALChunkAndWarpMulti(operation, 0, 0, out_width as i32, out_height as i32);
		GDALDestroyWarpOperation(operation);
		GDALDestroyGenImgProjTransformer(options.pTransformerArg);
		if rv != CPLErr::CE_None {
			bail!("{:?}", CPLGetLastErrorMsg());
		}
	}

	Ok(StageOutcome::Fresh(RasterHandle {
		dataset: dst,
		offset_x: 0.0,
		offset_y: 0.0,
	}))
}

fn clone_dataset_handle(dataset: &Dataset) -> Result<Dataset> {
	let driver = DriverManager::get_driver_by_name("MEM").context("failed to get GDAL MEM driver")?;
	let (width, height) = dataset.raster_size();
	let mut dst = driver.create_with_band_type::<u8, _>("mem", width, height, dataset.raster_count())?;
	for band_idx in 1..=dataset.raster_count() {
		let data = dataset.rasterband(band_idx)?.read_as::<u8>((0, 0), (width, height), (width, height), None)?;
		dst.rasterband(band_idx)?.write((0, 0), (width, height), &data)?;
	}
	if let Ok(gt) = dataset.geo_transform() {
		dst.set_geo_transform(&gt)?;
	}
	if let Some(srs) = dataset.spatial_ref() {
		dst.set_spatial_ref(&srs)?;
	}
	Ok(dst)
}

/// If all four bounds are absent, a no-op. Otherwise intersects the dataset's
/// extent with `bounds` (projected into the dataset's CRS), producing a
/// cropped window — or a no-op if the intersection equals the source extent.
#[context("clipping to bounds {bounds:?}")]
pub fn clip(handle: &RasterHandle, bounds: &GeoBBox, epsg: u32) -> Result<StageOutcome> {
	let dataset = &handle.dataset;
	let gt = dataset.geo_transform().context("dataset has no geotransform")?;
	let (width, height) = dataset.raster_size();

	let dst_srs = get_spatial_ref(epsg)?;
	let to_dst = gdal::spatial_ref::CoordTransform::new(&get_spatial_ref(4326)?, &dst_srs)?;
	let projected = to_dst.transform_bounds(&[bounds.x_min, bounds.y_min, bounds.x_max, bounds.y_max], 21)?;

	let src_x_min = gt[0];
	let src_y_max = gt[3];
	let src_x_max = gt[0] + gt[1] * width as f64;
	let src_y_min = gt[3] + gt[5] * height as f64;

	let clip_x_min = projected[0].max(src_x_min);
	let clip_y_min = projected[1].max(src_y_min);
	let clip_x_max = projected[2].min(src_x_max);
	let clip_y_max = projected[3].min(src_y_max);

	if (clip_x_min - src_x_min).abs() < 1e-9
		&& (clip_y_min - src_y_min).abs() < 1e-9
		&& (clip_x_max - src_x_max).abs() < 1e-9
		&& (clip_y_max - src_y_max).abs() < 1e-9
	{
		return Ok(StageOutcome::NoOp);
	}

	ensure!(clip_x_max > clip_x_min && clip_y_max > clip_y_min, "clip bounds do not intersect the dataset");

	let px_x0 = ((clip_x_min - gt[0]) / gt[1]).floor().max(0.0) as usize;
	let px_x1 = ((clip_x_max - gt[0]) / gt[1]).ceil().min(width as f64) as usize;
	let px_y0 = ((clip_y_max - gt[3]) / gt[5]).floor().max(0.0) as usize;
	let px_y1 = ((clip_y_min - gt[3]) / gt[5]).ceil().min(height as f64) as usize;
	let (window_w, window_h) = (px_x1 - px_x0, px_y1 - px_y0);

	let driver = DriverManager::get_driver_by_name("MEM").context("failed to get GDAL MEM driver")?;
	let mut dst = driver.create_with_band_type::<u8, _>("mem", window_w, window_h, dataset.raster_count())?;
	for band_idx in 1..=dataset.raster_count() {
		let src_band = dataset.rasterband(band_idx)?;
		let data = src_band.read_as::<u8>((px_x0 as isize, px_y0 as isize), (window_w, window_h), (window_w, window_h), None)?;
		let mut dst_band = dst.rasterband(band_idx)?;
		dst_band.set_color_interpretation(src_band.color_interpretation())?;
		dst_band.write((0, 0), (window_w, window_h), &data)?;
	}
	dst.set_geo_transform(&[
		gt[0] + px_x0 as f64 * gt[1],
		gt[1],
		0.0,
		gt[3] + px_y0 as f64 * gt[5],
		0.0,
		gt[5],
	])?;
	dst.set_spatial_ref(&dst_srs)?;

	Ok(StageOutcome::Fresh(RasterHandle {
		dataset: dst,
		offset_x: handle.offset_x,
		offset_y: handle.offset_y,
	}))
}

/// Writes a tiled, LZW-compressed GeoTIFF with `BIGTIFF=IF_SAFER`, then builds
/// `[2, 4, 8, 16, 32, 64]` AVERAGE-resampled LZW overviews before closing.
#[context("saving GeoTIFF to {path:?}")]
pub fn save(handle: &RasterHandle, path: &Path) -> Result<()> {
	let driver = DriverManager::get_driver_by_name("GTiff").context("failed to get GDAL GTiff driver")?;
	let options = RasterCreationOptions::from_iter(["TILED=YES", "COMPRESS=LZW", "BIGTIFF=IF_SAFER"]);
	let mut dst = handle
		.dataset
		.create_copy(&driver, path.to_string_lossy().as_ref(), &options)
		.with_context(|| format!("failed to write GeoTIFF to {path:?}"))?;

	dst.build_overviews("AVERAGE", &[2, 4, 8, 16, 32, 64], &[])
		.context("failed to build overviews")?;

	dst.flush_cache()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use gdal::DriverManager as DM;

	fn mem_dataset(w: usize, h: usize, bands: usize) -> Dataset {
		let driver = DM::get_driver_by_name("MEM").unwrap();
		driver.create_with_band_type::<u8, _>("", w, h, bands).unwrap()
	}

	#[test]
	fn expand_rgb_is_noop_without_palette_or_mask() {
		let ds = mem_dataset(4, 4, 3);
		ds.rasterband(1).unwrap().set_color_interpretation(ColorInterpretation::RedBand).unwrap();
		let handle = RasterHandle::new(ds);
		let outcome = expand_rgb(&handle, None).unwrap();
		assert!(matches!(outcome, StageOutcome::NoOp));
	}

	#[test]
	fn apply_mask_is_noop_without_a_mask() {
		let handle = RasterHandle::new(mem_dataset(4, 4, 3));
		let outcome = apply_mask(&handle, None).unwrap();
		assert!(matches!(outcome, StageOutcome::NoOp));
	}

	/// Mirrors a mask ring recorded in the *original* source's pixel space
	/// being applied to a handle already windowed (and offset) by an earlier
	/// stage such as `expand_rgb`. The mask must be translated by the
	/// handle's accumulated offset before its bounding box is computed, or
	/// the window gets clamped against the wrong coordinates and the result
	/// is spuriously cropped.
	#[test]
	fn apply_mask_accounts_for_the_handles_accumulated_offset() {
		let ds = mem_dataset(8, 8, 3);
		for band_idx in 1..=3 {
			ds.rasterband(band_idx).unwrap().set_color_interpretation(ColorInterpretation::RedBand).unwrap();
		}
		let handle = RasterHandle {
			dataset: ds,
			offset_x: 2.0,
			offset_y: 2.0,
		};
		// In source-pixel space this ring spans (2,2)-(10,10): exactly the
		// handle's 8x8 window once translated by the offset.
		let mask = Mask {
			rings: vec![crate::mask::Ring {
				points: vec![(2.0, 2.0), (10.0, 2.0), (10.0, 10.0), (2.0, 10.0)],
			}],
		};
		let outcome = apply_mask(&handle, Some(&mask)).unwrap();
		let StageOutcome::Fresh(out) = outcome else {
			panic!("expected a fresh handle");
		};
		assert_eq!(out.dataset.raster_size(), (8, 8));
		let alpha_band = out.dataset.rasterband(out.dataset.raster_count()).unwrap();
		let alpha = alpha_band.read_as::<u8>((0, 0), (8, 8), (8, 8), None).unwrap();
		assert!(alpha.data().iter().all(|&a| a == 255));
	}

	#[test]
	fn apply_gcp_is_noop_without_gcps() {
		let handle = RasterHandle::new(mem_dataset(4, 4, 3));
		let outcome = apply_gcp(&handle, None).unwrap();
		assert!(matches!(outcome, StageOutcome::NoOp));
	}
}
