//! Per-zoom sets of packed tile keys covering a tileset's datasets.
//!
//! A tile exists in the manifest iff at least one dataset whose `max_lod >= z`
//! geographically covers it, so Phase 1 draws every tile a dataset
//! contributes to and Phase 2 reaches every coarser aggregate from those.

use chart_core::GeoBBox;
use chart_core::tile_math::{lonlat_to_tile, pack_tile_key, unpack_tile_key};
use std::collections::HashMap;

/// One dataset's contribution to the manifest: its WGS-84 extent (as read by
/// back-projecting the reprojected GeoTIFF's corners — `lon_min` may exceed
/// `lon_max` for an antimeridian crossing) and the highest zoom it should be
/// tiled at.
pub struct DatasetExtent {
	pub lon_min: f64,
	pub lat_min: f64,
	pub lon_max: f64,
	pub lat_max: f64,
	pub max_lod: u8,
}

#[derive(Debug, Default)]
pub struct TileManifest {
	levels: HashMap<u8, Vec<u32>>,
}

impl TileManifest {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds the manifest for a tileset from its dataset extents, covering
	/// `[zoom_min, zoom_max]` clamped per-dataset to `max_lod`. Antimeridian
	/// crossings (`lon_min > lon_max`) are split into two WGS-84-range pieces;
	/// latitudes are clamped to the Web Mercator domain by `GeoBBox`.
	pub fn build(extents: &[DatasetExtent], zoom_min: u8, zoom_max: u8) -> TileManifest {
		let mut manifest = TileManifest::new();
		for extent in extents {
			let zmax_ds = extent.max_lod.clamp(zoom_min, zoom_max);
			for piece in split_at_antimeridian(extent) {
				for z in zoom_min..=zmax_ds {
					manifest.add_bbox_at_zoom(z, &piece);
				}
			}
		}
		manifest.sort_and_dedupe();
		manifest
	}

	fn add_bbox_at_zoom(&mut self, z: u8, bbox: &GeoBBox) {
		let (x_min, y_min) = lonlat_to_tile(z, bbox.x_min, bbox.y_max);
		let (x_max, y_max) = lonlat_to_tile(z, bbox.x_max, bbox.y_min);
		let entry = self.levels.entry(z).or_default();
		for x in x_min..=x_max {
			for y in y_min..=y_max {
				entry.push(pack_tile_key(x, y));
			}
		}
	}

	fn sort_and_dedupe(&mut self) {
		for keys in self.levels.values_mut() {
			keys.sort_unstable();
			keys.dedup();
		}
	}

	/// O(log n) membership test via binary search on the packed keys.
	#[must_use]
	pub fn contains(&self, z: u8, x: u32, y: u32) -> bool {
		self
			.levels
			.get(&z)
			.is_some_and(|keys| keys.binary_search(&pack_tile_key(x, y)).is_ok())
	}

	/// The flat `(z,x,y)` list for a single zoom level, in ascending key order.
	#[must_use]
	pub fn tiles_at(&self, z: u8) -> Vec<(u8, u32, u32)> {
		self
			.levels
			.get(&z)
			.map(|keys| keys.iter().map(|&k| (z, unpack_tile_key(k).0, unpack_tile_key(k).1)).collect())
			.unwrap_or_default()
	}

	#[must_use]
	pub fn tile_count(&self, z: u8) -> usize {
		self.levels.get(&z).map_or(0, Vec::len)
	}
}

fn split_at_antimeridian(extent: &DatasetExtent) -> Vec<GeoBBox> {
	if extent.lon_min <= extent.lon_max {
		return vec![GeoBBox::new_save(extent.lon_min, extent.lat_min, extent.lon_max, extent.lat_max)];
	}
	vec![
		GeoBBox::new_save(extent.lon_min, extent.lat_min, 180.0, extent.lat_max),
		GeoBBox::new_save(-180.0, extent.lat_min, extent.lon_max, extent.lat_max),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn extent(x0: f64, y0: f64, x1: f64, y1: f64, max_lod: u8) -> DatasetExtent {
		DatasetExtent {
			lon_min: x0,
			lat_min: y0,
			lon_max: x1,
			lat_max: y1,
			max_lod,
		}
	}

	#[test]
	fn manifest_membership_matches_dataset_coverage() {
		let manifest = TileManifest::build(&[extent(-10.0, -10.0, 10.0, 10.0, 3)], 0, 3);
		assert!(manifest.contains(0, 0, 0));
		let (x, y) = lonlat_to_tile(3, 0.0, 0.0);
		assert!(manifest.contains(3, x, y));
	}

	#[test]
	fn tiles_outside_any_dataset_are_absent() {
		let manifest = TileManifest::build(&[extent(-10.0, -10.0, 10.0, 10.0, 3)], 0, 3);
		let (x, y) = lonlat_to_tile(3, 170.0, 80.0);
		assert!(!manifest.contains(3, x, y));
	}

	#[test]
	fn packed_keys_stay_sorted_and_deduped() {
		let manifest = TileManifest::build(
			&[extent(-10.0, -10.0, 10.0, 10.0, 3), extent(-5.0, -5.0, 5.0, 5.0, 3)],
			2,
			3,
		);
		for z in [2, 3] {
			let keys: Vec<u32> = manifest.levels.get(&z).cloned().unwrap_or_default();
			let mut sorted = keys.clone();
			sorted.sort_unstable();
			sorted.dedup();
			assert_eq!(keys, sorted);
		}
	}

	#[test]
	fn zoom_is_clamped_to_dataset_max_lod() {
		let manifest = TileManifest::build(&[extent(-10.0, -10.0, 10.0, 10.0, 1)], 0, 5);
		assert_eq!(manifest.tile_count(5), 0);
		assert!(manifest.tile_count(1) > 0);
	}

	#[test]
	fn antimeridian_crossing_splits_into_two_pieces() {
		let pieces = split_at_antimeridian(&extent(170.0, -10.0, -170.0, 10.0, 5));
		assert_eq!(pieces.len(), 2);
	}
}
