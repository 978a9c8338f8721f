//! Phase 2: builds overview tiles bottom-up from `zmax-1` down to `zmin` by
//! compositing four child tiles into one parent, strictly sequential per
//! zoom since each level depends on the one below it already being on disk.

use anyhow::{Context, Result};
use chart_derive::context;
use chart_image::{DynamicImage, DynamicImageTraitConvert, DynamicImageTraitOperation, TileFormat};
use image::{Rgba, RgbaImage, imageops::overlay};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewOutcome {
	Generated,
	SkippedExisting,
}

/// Scans `<out_dir>/<z>/` for numerically-named `x/y.<ext>` tile files.
fn scan_children(out_dir: &Path, z: u8, ext: &str) -> Vec<(u32, u32)> {
	let mut children = Vec::new();
	let zoom_dir = out_dir.join(z.to_string());
	let Ok(x_entries) = std::fs::read_dir(&zoom_dir) else {
		return children;
	};
	for x_entry in x_entries.flatten() {
		let Some(x) = x_entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
			continue;
		};
		let Ok(y_entries) = std::fs::read_dir(x_entry.path()) else {
			continue;
		};
		for y_entry in y_entries.flatten() {
			let name = y_entry.file_name();
			let Some(stem) = name.to_str().and_then(|s| s.strip_suffix(&format!(".{ext}"))) else {
				continue;
			};
			if let Ok(y) = stem.parse::<u32>() {
				children.push((x, y));
			}
		}
	}
	children
}

fn load_tile(path: &Path, format: TileFormat) -> Result<Option<DynamicImage>> {
	if !path.exists() {
		return Ok(None);
	}
	let bytes = std::fs::read(path).with_context(|| format!("failed to read tile {path:?}"))?;
	Ok(Some(DynamicImage::from_bytes(&bytes, format)?))
}

fn transparent_quadrant(tile_size: u32) -> DynamicImage {
	DynamicImage::ImageRgba8(RgbaImage::from_pixel(tile_size, tile_size, Rgba([0, 0, 0, 0])))
}

/// Builds every overview tile at zoom `z` whose children exist at `z+1`,
/// skipping parents that already have a base tile on disk from Phase 1.
#[context("building overview tiles at z={z}")]
pub fn build_overview_zoom(out_dir: &Path, z: u8, format: TileFormat, resampling_downscale: u32) -> Result<Vec<OverviewOutcome>> {
	let ext = format.extension();
	let children = scan_children(out_dir, z + 1, ext);
	let parents: HashSet<(u32, u32)> = children.iter().map(|&(cx, cy)| (cx / 2, cy / 2)).collect();

	let mut outcomes = Vec::with_capacity(parents.len());
	for (x, y) in parents {
		let tile_dir = out_dir.join(z.to_string()).join(x.to_string());
		let tile_path = tile_dir.join(format!("{y}.{ext}"));
		if tile_path.exists() {
			outcomes.push(OverviewOutcome::SkippedExisting);
			continue;
		}

		let tile_size = 256u32;
		let quadrant_paths = [
			(out_dir.join((z + 1).to_string()).join((2 * x).to_string()).join(format!("{}.{ext}", 2 * y)), 0u32, 0u32),
			(
				out_dir.join((z + 1).to_string()).join((2 * x + 1).to_string()).join(format!("{}.{ext}", 2 * y)),
				tile_size,
				0u32,
			),
			(
				out_dir.join((z + 1).to_string()).join((2 * x).to_string()).join(format!("{}.{ext}", 2 * y + 1)),
				0u32,
				tile_size,
			),
			(
				out_dir.join((z + 1).to_string()).join((2 * x + 1).to_string()).join(format!("{}.{ext}", 2 * y + 1)),
				tile_size,
				tile_size,
			),
		];

		let mut composed = DynamicImage::ImageRgba8(RgbaImage::new(tile_size * 2, tile_size * 2));
		for (path, ox, oy) in &quadrant_paths {
			let quadrant = load_tile(path, format)?.unwrap_or_else(|| transparent_quadrant(tile_size));
			if let DynamicImage::ImageRgba8(ref mut dst) = composed {
				overlay(dst, &quadrant.to_rgba8(), i64::from(*ox), i64::from(*oy));
			}
		}

		let downsampled = composed.get_scaled_down(resampling_downscale)?;
		let bytes = downsampled.to_bytes(format)?;

		std::fs::create_dir_all(&tile_dir).with_context(|| format!("failed to create tile directory {tile_dir:?}"))?;
		std::fs::write(&tile_path, bytes).with_context(|| format!("failed to write overview tile {tile_path:?}"))?;
		outcomes.push(OverviewOutcome::Generated);
	}
	Ok(outcomes)
}

/// Runs Phase 2 over the whole pyramid, strictly from `zmax - 1` down to `zmin`.
pub fn run_overview_phase(out_dir: &Path, zoom_min: u8, zoom_max: u8, format: TileFormat) -> Result<()> {
	if zoom_max == 0 {
		return Ok(());
	}
	for z in (zoom_min..zoom_max).rev() {
		let outcomes = build_overview_zoom(out_dir, z, format, 2)?;
		let generated = outcomes.iter().filter(|o| **o == OverviewOutcome::Generated).count();
		log::info!("overview z={z}: {generated} tiles generated, {} already present", outcomes.len() - generated);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	fn write_tile(dir: &Path, z: u8, x: u32, y: u32, color: [u8; 4]) {
		let tile_dir = dir.join(z.to_string()).join(x.to_string());
		std::fs::create_dir_all(&tile_dir).unwrap();
		let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(256, 256, Rgba(color)));
		std::fs::write(tile_dir.join(format!("{y}.png")), img.to_bytes(TileFormat::Png).unwrap()).unwrap();
	}

	#[test]
	fn composes_four_children_into_one_parent() {
		let tmp = tempdir().unwrap();
		write_tile(tmp.path(), 2, 0, 0, [255, 0, 0, 255]);
		write_tile(tmp.path(), 2, 1, 0, [0, 255, 0, 255]);
		write_tile(tmp.path(), 2, 0, 1, [0, 0, 255, 255]);
		write_tile(tmp.path(), 2, 1, 1, [255, 255, 0, 255]);

		let outcomes = build_overview_zoom(tmp.path(), 1, TileFormat::Png, 2).unwrap();
		assert_eq!(outcomes, vec![OverviewOutcome::Generated]);
		assert!(tmp.path().join("1").join("0").join("0.png").exists());
	}

	#[test]
	fn skips_a_parent_that_already_has_a_base_tile() {
		let tmp = tempdir().unwrap();
		write_tile(tmp.path(), 2, 0, 0, [255, 0, 0, 255]);
		write_tile(tmp.path(), 1, 0, 0, [9, 9, 9, 255]);

		let outcomes = build_overview_zoom(tmp.path(), 1, TileFormat::Png, 2).unwrap();
		assert_eq!(outcomes, vec![OverviewOutcome::SkippedExisting]);
	}

	#[test]
	fn missing_children_contribute_transparent_quadrants() {
		let tmp = tempdir().unwrap();
		write_tile(tmp.path(), 2, 5, 5, [10, 20, 30, 255]);

		let outcomes = build_overview_zoom(tmp.path(), 1, TileFormat::Png, 2).unwrap();
		assert_eq!(outcomes, vec![OverviewOutcome::Generated]);
	}

	#[test]
	fn rerunning_an_unchanged_tree_writes_no_new_files() {
		let tmp = tempdir().unwrap();
		write_tile(tmp.path(), 2, 0, 0, [1, 2, 3, 255]);
		write_tile(tmp.path(), 2, 1, 0, [1, 2, 3, 255]);
		write_tile(tmp.path(), 2, 0, 1, [1, 2, 3, 255]);
		write_tile(tmp.path(), 2, 1, 1, [1, 2, 3, 255]);

		build_overview_zoom(tmp.path(), 1, TileFormat::Png, 2).unwrap();
		let modified_before = std::fs::metadata(tmp.path().join("1").join("0").join("0.png")).unwrap().modified().unwrap();

		let outcomes = build_overview_zoom(tmp.path(), 1, TileFormat::Png, 2).unwrap();
		assert_eq!(outcomes, vec![OverviewOutcome::SkippedExisting]);
		let modified_after = std::fs::metadata(tmp.path().join("1").join("0").join("0.png")).unwrap().modified().unwrap();
		assert_eq!(modified_before, modified_after);
	}
}
