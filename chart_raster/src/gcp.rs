//! Ground control points and the best-fit affine geotransform solved from them.

use crate::spatial_ref::get_spatial_ref;
use anyhow::{Context, Result, bail, ensure};
use gdal::spatial_ref::{CoordTransform, SpatialRef};

/// A single ground control point: `(pixel_x, pixel_y)` in source-raster pixel
/// coordinates mapped to `(lon, lat)` in WGS-84, as given by the config
/// document. `to_crs` reprojects the `(lon, lat)` pair into the raster's own
/// CRS before the affine solve runs.
#[derive(Debug, Clone, Copy)]
pub struct Gcp {
	pub pixel_x: f64,
	pub pixel_y: f64,
	pub crs_x: f64,
	pub crs_y: f64,
}

#[derive(Debug, Clone)]
pub struct GcpSet {
	pub points: Vec<Gcp>,
}

impl GcpSet {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.points.is_empty()
	}

	/// Translates every GCP's pixel coordinate by `(-ox, -oy)`, e.g. after
	/// `ExpandRGB`/`ApplyMask` narrowed the working raster to a sub-window.
	#[must_use]
	pub fn translated(&self, ox: f64, oy: f64) -> GcpSet {
		GcpSet {
			points: self
				.points
				.iter()
				.map(|g| Gcp {
					pixel_x: g.pixel_x - ox,
					pixel_y: g.pixel_y - oy,
					..*g
				})
				.collect(),
		}
	}

	/// Reprojects every GCP's `(crs_x, crs_y)` from WGS-84 into `target`.
	#[context("transforming GCPs into the dataset's spatial reference")]
	pub fn to_crs(&self, target: &SpatialRef) -> Result<GcpSet> {
		let wgs84 = get_spatial_ref(4326)?;
		let transform = CoordTransform::new(&wgs84, target).context("failed to create WGS-84 to source-CRS transform")?;
		let points = self
			.points
			.iter()
			.map(|g| {
				let bounds = transform.transform_bounds(&[g.crs_x, g.crs_y, g.crs_x, g.crs_y], 21)?;
				Ok(Gcp { crs_x: bounds[0], crs_y: bounds[1], ..*g })
			})
			.collect::<Result<Vec<_>>>()?;
		Ok(GcpSet { points })
	}
}

/// Solves the best-fit affine geotransform `[c0, c1, c2, c3, c4, c5]` mapping
/// pixel `(x,y)` to CRS `(crs_x, crs_y) = (c0 + c1*x + c2*y, c3 + c4*x + c5*y)`,
/// via ordinary least squares on two independent 3-unknown linear systems.
///
/// Equivalent in contract to GDAL's `GDALGCPsToGeoTransform`, reproduced in
/// plain `f64` arithmetic rather than hand-rolling anything GDAL doesn't
/// already expose as a numeric primitive.
pub fn solve_affine(gcps: &GcpSet) -> Result<[f64; 6]> {
	ensure!(gcps.points.len() >= 3, "at least 3 GCPs are required to solve an affine transform");
	ensure!(gcps.points.len() <= 16, "at most 16 GCPs are supported");

	// Normal equations for [c0 + c1*x + c2*y = v], solved independently for v = crs_x and v = crs_y.
	let mut ata = [[0f64; 3]; 3];
	let mut atb_x = [0f64; 3];
	let mut atb_y = [0f64; 3];

	for g in &gcps.points {
		let row = [1.0, g.pixel_x, g.pixel_y];
		for i in 0..3 {
			for j in 0..3 {
				ata[i][j] += row[i] * row[j];
			}
			atb_x[i] += row[i] * g.crs_x;
			atb_y[i] += row[i] * g.crs_y;
		}
	}

	let cx = solve_3x3(ata, atb_x)?;
	let cy = solve_3x3(ata, atb_y)?;

	Ok([cx[0], cx[1], cx[2], cy[0], cy[1], cy[2]])
}

/// Solves `a * x = b` for a 3x3 system via Gaussian elimination with partial pivoting.
fn solve_3x3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Result<[f64; 3]> {
	for col in 0..3 {
		let pivot_row = (col..3)
			.max_by(|&r1, &r2| a[r1][col].abs().partial_cmp(&a[r2][col].abs()).unwrap())
			.unwrap();
		if a[pivot_row][col].abs() < 1e-12 {
			bail!("GCP system is singular (points may be collinear)");
		}
		a.swap(col, pivot_row);
		b.swap(col, pivot_row);

		for row in (col + 1)..3 {
			let factor = a[row][col] / a[col][col];
			for k in col..3 {
				a[row][k] -= factor * a[col][k];
			}
			b[row] -= factor * b[col];
		}
	}

	let mut x = [0f64; 3];
	for row in (0..3).rev() {
		let mut sum = b[row];
		for col in (row + 1)..3 {
			sum -= a[row][col] * x[col];
		}
		x[row] = sum / a[row][row];
	}
	Ok(x)
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;

	fn gcp(px: f64, py: f64, x: f64, y: f64) -> Gcp {
		Gcp {
			pixel_x: px,
			pixel_y: py,
			crs_x: x,
			crs_y: y,
		}
	}

	#[test]
	fn solves_exact_affine_from_three_points() {
		// crs_x = 10 + 2*px, crs_y = -5 + 3*py
		let set = GcpSet {
			points: vec![gcp(0.0, 0.0, 10.0, -5.0), gcp(1.0, 0.0, 12.0, -5.0), gcp(0.0, 1.0, 10.0, -2.0)],
		};
		let t = solve_affine(&set).unwrap();
		assert_abs_diff_eq!(t[0], 10.0, epsilon = 1e-9);
		assert_abs_diff_eq!(t[1], 2.0, epsilon = 1e-9);
		assert_abs_diff_eq!(t[2], 0.0, epsilon = 1e-9);
		assert_abs_diff_eq!(t[3], -5.0, epsilon = 1e-9);
		assert_abs_diff_eq!(t[4], 0.0, epsilon = 1e-9);
		assert_abs_diff_eq!(t[5], 3.0, epsilon = 1e-9);
	}

	#[test]
	fn least_squares_fits_four_noisy_points() {
		let set = GcpSet {
			points: vec![
				gcp(0.0, 0.0, 10.01, -4.99),
				gcp(1.0, 0.0, 12.0, -5.0),
				gcp(0.0, 1.0, 10.0, -2.02),
				gcp(1.0, 1.0, 12.02, -1.99),
			],
		};
		let t = solve_affine(&set).unwrap();
		assert_abs_diff_eq!(t[0], 10.0, epsilon = 0.1);
		assert_abs_diff_eq!(t[3], -5.0, epsilon = 0.1);
	}

	#[test]
	fn rejects_fewer_than_three_points() {
		let set = GcpSet {
			points: vec![gcp(0.0, 0.0, 0.0, 0.0), gcp(1.0, 0.0, 1.0, 0.0)],
		};
		assert!(solve_affine(&set).is_err());
	}

	#[test]
	fn rejects_collinear_points() {
		let set = GcpSet {
			points: vec![gcp(0.0, 0.0, 0.0, 0.0), gcp(1.0, 0.0, 1.0, 0.0), gcp(2.0, 0.0, 2.0, 0.0)],
		};
		assert!(solve_affine(&set).is_err());
	}

	#[test]
	fn to_crs_is_identity_when_the_target_is_also_wgs84() {
		let set = GcpSet {
			points: vec![gcp(0.0, 0.0, -122.5, 37.7), gcp(10.0, 0.0, -122.4, 37.7)],
		};
		let wgs84 = get_spatial_ref(4326).unwrap();
		let reprojected = set.to_crs(&wgs84).unwrap();
		assert_abs_diff_eq!(reprojected.points[0].crs_x, -122.5, epsilon = 1e-6);
		assert_abs_diff_eq!(reprojected.points[0].crs_y, 37.7, epsilon = 1e-6);
	}

	#[test]
	fn translated_shifts_pixel_coordinates_only() {
		let set = GcpSet {
			points: vec![gcp(5.0, 5.0, 1.0, 1.0)],
		};
		let shifted = set.translated(2.0, 3.0);
		assert_abs_diff_eq!(shifted.points[0].pixel_x, 3.0);
		assert_abs_diff_eq!(shifted.points[0].pixel_y, 2.0);
		assert_abs_diff_eq!(shifted.points[0].crs_x, 1.0);
	}
}
