//! Generates a single 256x256 base tile by warping a zoom mosaic directly
//! into the tile's Web Mercator extent and encoding the result.

use anyhow::{Context, Result};
use chart_core::constants::TILE_SIZE;
use chart_core::tile_math::tile_bounds_mercator;
use chart_derive::context;
use chart_image::{DynamicImage, DynamicImageTraitConvert, DynamicImageTraitOperation, TileFormat};
use chart_raster::{BandMapping, ResampleAlg};
use gdal::{Dataset, DriverManager, GeoTransform};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	NoOverlap,
	Existing,
	Empty,
}

#[derive(Debug)]
pub enum TileOutcome {
	Generated(PathBuf),
	Skipped(SkipReason),
}

fn mosaic_extent(dataset: &Dataset) -> Result<[f64; 4]> {
	let gt = dataset.geo_transform().context("zoom mosaic has no geotransform")?;
	let (width, height) = dataset.raster_size();
	Ok([gt[0], gt[3] + height as f64 * gt[5], gt[0] + width as f64 * gt[1], gt[3]])
}

/// Warps `src` (already in the target CRS) into a fresh in-memory dataset
/// covering exactly `bounds` at `tile_size x tile_size`, via the same
/// `gdal_sys` chunk-and-warp call the dataset pipeline uses.
fn warp_into_tile_window(src: &Dataset, bounds: [f64; 4], tile_size: usize, band_mapping: &BandMapping, resampling: ResampleAlg) -> Result<Dataset> {
	let [x_min, y_min, x_max, y_max] = bounds;
	let mut dst = band_mapping.create_mem_dataset(tile_size, tile_size)?;
	let geo_transform: GeoTransform = [
		x_min,
		(x_max - x_min) / tile_size as f64,
		0.0,
		y_max,
		0.0,
		(y_min - y_max) / tile_size as f64,
	];
	dst.set_geo_transform(&geo_transform)?;

	let h_src_ds = src.c_dataset();
	let h_dst_ds = dst.c_dataset();

	unsafe {
		use gdal_sys::*;

		let mut options: GDALWarpOptions = *GDALCreateWarpOptions();
		options.hSrcDS = h_src_ds;
		options.hDstDS = h_dst_ds;

		CSLSetNameValue(options.papszWarpOptions, c"NUM_THREADS".as_ptr(), c"ALL_CPUS".as_ptr());

		band_mapping.setup_gdal_warp_options(&mut options);

		options.eResampleAlg = resampling.as_gdal();
		options.dfWarpMemoryLimit = 512.0 * 1024.0 * 1024.0;

		options.pTransformerArg = GDALCreateGenImgProjTransformer2(h_src_ds, h_dst_ds, core::ptr::null_mut());
		options.pfnTransformer = Some(GDALGenImgProjTransform);

		let operation: GDALWarpOperationH = GDALCreateWarpOperation(&options);
		let rv = GDALChunkAndWarpMulti(operation, 0, 0, tile_size as i32, tile_size as i32);

		GDALDestroyWarpOperation(operation);
		GDALDestroyGenImgProjTransformer(options.pTransformerArg);

		if rv != CPLErr::CE_None {
			anyhow::bail!("{:?}", CPLGetLastErrorMsg());
		}
	}

	Ok(dst)
}

fn read_rgba(dataset: &Dataset, band_mapping: &BandMapping, tile_size: usize) -> Result<Vec<u8>> {
	let has_alpha = band_mapping.len() == 4 || band_mapping.len() == 2;
	let channel_count = if has_alpha { band_mapping.len() } else { 4 };
	let mut buf = vec![0u8; tile_size * tile_size * channel_count];
	for item in band_mapping.iter() {
		let band = dataset.rasterband(item.band_index)?;
		let data = band.read_as::<u8>((0, 0), (tile_size, tile_size), (tile_size, tile_size), None)?;
		for (i, &px) in data.data().iter().enumerate() {
			buf[i * channel_count + item.channel_index] = px;
		}
	}
	if !has_alpha {
		for i in 0..tile_size * tile_size {
			buf[i * 4 + 3] = 255;
		}
	}
	Ok(buf)
}

#[context("generating base tile z={z} x={x} y={y}")]
pub fn generate_base_tile(
	mosaic: &Dataset,
	z: u8,
	x: u32,
	y: u32,
	out_dir: &Path,
	format: TileFormat,
	resampling: ResampleAlg,
) -> Result<TileOutcome> {
	let [tx_min, ty_min, tx_max, ty_max] = tile_bounds_mercator(z, x, y);
	let [mx_min, my_min, mx_max, my_max] = mosaic_extent(mosaic)?;

	if tx_min >= mx_max || tx_max <= mx_min || ty_min >= my_max || ty_max <= my_min {
		return Ok(TileOutcome::Skipped(SkipReason::NoOverlap));
	}

	let tile_dir = out_dir.join(z.to_string()).join(x.to_string());
	let tile_path = tile_dir.join(format!("{y}.{}", format.extension()));
	if tile_path.exists() {
		return Ok(TileOutcome::Skipped(SkipReason::Existing));
	}

	let tile_size = TILE_SIZE as usize;
	let band_mapping = BandMapping::try_from_dataset(mosaic)?;
	let warped = warp_into_tile_window(mosaic, [tx_min, ty_min, tx_max, ty_max], tile_size, &band_mapping, resampling)?;
	let rgba = read_rgba(&warped, &band_mapping, tile_size)?;

	if rgba.chunks_exact(4).all(|px| px[3] == 0) {
		return Ok(TileOutcome::Skipped(SkipReason::Empty));
	}

	let image = DynamicImage::from_raw(tile_size as u32, tile_size as u32, rgba)?;
	let image = if format.supports_alpha() { image } else { image.as_no_alpha()? };
	let bytes = image.to_bytes(format)?;

	std::fs::create_dir_all(&tile_dir).with_context(|| format!("failed to create tile directory {tile_dir:?}"))?;
	std::fs::write(&tile_path, bytes).with_context(|| format!("failed to write tile {tile_path:?}"))?;

	Ok(TileOutcome::Generated(tile_path))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn skips_tiles_with_no_mosaic_overlap() {
		let driver = DriverManager::get_driver_by_name("MEM").unwrap();
		let mut ds = driver.create_with_band_type::<u8, _>("", 4, 4, 4).unwrap();
		ds.set_geo_transform(&[0.0, 1.0, 0.0, 4.0, 0.0, -1.0]).unwrap();
		let tmp = tempfile::tempdir().unwrap();
		let outcome = generate_base_tile(&ds, 0, 0, 0, tmp.path(), TileFormat::Png, ResampleAlg::Bilinear).unwrap();
		assert!(matches!(outcome, TileOutcome::Skipped(SkipReason::NoOverlap)));
	}

	#[test]
	fn skips_tiles_that_already_exist_on_disk() {
		let [tx_min, ty_min, tx_max, ty_max] = tile_bounds_mercator(4, 3, 3);
		let driver = DriverManager::get_driver_by_name("MEM").unwrap();
		let mut ds = driver.create_with_band_type::<u8, _>("", 4, 4, 4).unwrap();
		let gt = [tx_min, (tx_max - tx_min) / 4.0, 0.0, ty_max, 0.0, (ty_min - ty_max) / 4.0];
		ds.set_geo_transform(&gt).unwrap();

		let tmp = tempfile::tempdir().unwrap();
		let tile_dir = tmp.path().join("4").join("3");
		std::fs::create_dir_all(&tile_dir).unwrap();
		std::fs::write(tile_dir.join("3.png"), b"existing").unwrap();

		let outcome = generate_base_tile(&ds, 4, 3, 3, tmp.path(), TileFormat::Png, ResampleAlg::Bilinear).unwrap();
		assert!(matches!(outcome, TileOutcome::Skipped(SkipReason::Existing)));
	}
}
