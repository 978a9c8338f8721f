//! Pixel-space polygon masks: ring 0 is the outer boundary (CCW), rings 1..n
//! are holes (CW). The output alpha channel is 255 inside (outer − holes), 0
//! elsewhere.

use anyhow::{Context, Result, bail, ensure};
use chart_derive::context;
use gdal::raster::RasterizeOptions;
use gdal::vector::{Geometry, OGRwkbGeometryType};
use gdal::{Dataset, DriverManager};

#[derive(Debug, Clone)]
pub struct Ring {
	pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct Mask {
	pub rings: Vec<Ring>,
}

impl Mask {
	/// Bounding box of the outer ring (ring 0), in the coordinate space the
	/// mask's points were recorded in.
	pub fn outer_bbox(&self) -> Result<(f64, f64, f64, f64)> {
		let outer = self.rings.first().context("mask has no outer ring")?;
		ensure!(!outer.points.is_empty(), "mask outer ring has no points");
		let mut x_min = f64::MAX;
		let mut y_min = f64::MAX;
		let mut x_max = f64::MIN;
		let mut y_max = f64::MIN;
		for &(x, y) in &outer.points {
			x_min = x_min.min(x);
			y_min = y_min.min(y);
			x_max = x_max.max(x);
			y_max = y_max.max(y);
		}
		Ok((x_min, y_min, x_max, y_max))
	}

	/// Shifts every ring point by `(-ox, -oy)`, e.g. to move a mask recorded in
	/// the original source's pixel space into a window-offset handle's space.
	#[must_use]
	pub fn translated(&self, ox: f64, oy: f64) -> Mask {
		Mask {
			rings: self
				.rings
				.iter()
				.map(|r| Ring {
					points: r.points.iter().map(|&(x, y)| (x - ox, y - oy)).collect(),
				})
				.collect(),
		}
	}

	fn to_polygon(&self, translate_x: f64, translate_y: f64) -> Result<Geometry> {
		let mut polygon = Geometry::empty(OGRwkbGeometryType::wkbPolygon)?;
		for ring in &self.rings {
			let mut gdal_ring = Geometry::empty(OGRwkbGeometryType::wkbLinearRing)?;
			for &(x, y) in &ring.points {
				gdal_ring.add_point_2d((x - translate_x, y - translate_y));
			}
			if let Some(&first) = ring.points.first() {
				gdal_ring.add_point_2d((first.0 - translate_x, first.1 - translate_y));
			}
			polygon.add_geometry(gdal_ring)?;
		}
		Ok(polygon)
	}
}

/// Burns `mask` (already translated into `width x height` raster pixel space)
/// into a fresh single-band `u8` in-memory dataset: 255 inside, 0 outside.
#[context("rasterizing mask into {width}x{height} alpha band")]
pub fn rasterize_alpha(mask: &Mask, width: usize, height: usize) -> Result<Vec<u8>> {
	if width == 0 || height == 0 {
		bail!("degenerate mask raster window ({width}x{height})");
	}

	let driver = DriverManager::get_driver_by_name("MEM").context("failed to get GDAL MEM driver")?;
	let mut dataset: Dataset = driver
		.create_with_band_type::<u8, _>("mem", width, height, 1)
		.context("failed to create in-memory alpha dataset")?;
	// Identity geotransform: pixel coordinates burn directly without reprojection.
	dataset.set_geo_transform(&[0.0, 1.0, 0.0, 0.0, 0.0, 1.0])?;

	let polygon = mask.to_polygon(0.0, 0.0)?;

	gdal::raster::rasterize(
		&mut dataset,
		&[1],
		&[polygon],
		&[255.0],
		Some(RasterizeOptions {
			all_touched: false,
			..Default::default()
		}),
	)
	.context("GDAL rasterize failed")?;

	let band = dataset.rasterband(1)?;
	let buffer = band.read_band_as::<u8>()?;
	ensure!(
		buffer.data().len() == width * height,
		"rasterized buffer size mismatch: expected {}, got {}",
		width * height,
		buffer.data().len()
	);
	Ok(buffer.data().to_vec())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn square_mask(x0: f64, y0: f64, x1: f64, y1: f64) -> Mask {
		Mask {
			rings: vec![Ring {
				points: vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)],
			}],
		}
	}

	#[test]
	fn outer_bbox_matches_ring_extent() {
		let mask = square_mask(2.0, 3.0, 10.0, 12.0);
		assert_eq!(mask.outer_bbox().unwrap(), (2.0, 3.0, 10.0, 12.0));
	}

	#[test]
	fn translated_shifts_points_only() {
		let mask = square_mask(100.0, 100.0, 900.0, 900.0);
		let shifted = mask.translated(100.0, 100.0);
		assert_eq!(shifted.outer_bbox().unwrap(), (0.0, 0.0, 800.0, 800.0));
	}

	#[test]
	fn rasterize_fills_interior_and_leaves_corners_empty() {
		let mask = square_mask(2.0, 2.0, 6.0, 6.0);
		let alpha = rasterize_alpha(&mask, 8, 8).unwrap();
		assert_eq!(alpha[4 * 8 + 4], 255);
		assert_eq!(alpha[0], 0);
	}
}
