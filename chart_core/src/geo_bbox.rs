use crate::constants::{MAX_MERCATOR_LAT, MAX_MERCATOR_LON};
use anyhow::{Result, ensure};
use chart_derive::context;
use std::fmt::Debug;

/// A geographic bounding box `[west, south, east, north]` in WGS-84 degrees.
///
/// Used for dataset `GeoBounds`, per-dataset extents computed by back-projecting
/// a reprojected GeoTIFF's corners, and the tileset/manifest coverage tests.
#[derive(Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct GeoBBox {
	pub x_min: f64,
	pub y_min: f64,
	pub x_max: f64,
	pub y_max: f64,
}

impl GeoBBox {
	#[must_use = "GeoBBox::new returns a Result; handle the error or unwrap"]
	pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<GeoBBox> {
		GeoBBox {
			x_min,
			y_min,
			x_max,
			y_max,
		}
		.checked()
	}

	/// Builds a bbox from two arbitrary corner points, sorting and clamping to
	/// the valid WGS-84 domain rather than failing.
	pub fn new_save(x0: f64, y0: f64, x1: f64, y1: f64) -> GeoBBox {
		GeoBBox {
			x_min: x0.min(x1).clamp(-180.0, 180.0),
			y_min: y0.min(y1).clamp(-90.0, 90.0),
			x_max: x0.max(x1).clamp(-180.0, 180.0),
			y_max: y0.max(y1).clamp(-90.0, 90.0),
		}
	}

	/// Builds a bbox from the spec's `GeoBounds` record, where any of the four
	/// edges may be absent. Missing edges fall back to the full WGS-84 range on
	/// that axis so callers can always intersect against a concrete `GeoBBox`.
	pub fn from_optional_edges(
		lon_min: Option<f64>,
		lat_min: Option<f64>,
		lon_max: Option<f64>,
		lat_max: Option<f64>,
	) -> Result<GeoBBox> {
		GeoBBox::new(
			lon_min.unwrap_or(-180.0),
			lat_min.unwrap_or(-90.0),
			lon_max.unwrap_or(180.0),
			lat_max.unwrap_or(90.0),
		)
	}

	/// Clamps this bbox in place to the Web Mercator valid domain
	/// (`|lat| <= 85.05112877980659`, `|lon| <= 180`).
	pub fn limit_to_mercator(&mut self) {
		self.x_min = self.x_min.clamp(-MAX_MERCATOR_LON, MAX_MERCATOR_LON);
		self.y_min = self.y_min.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
		self.x_max = self.x_max.clamp(-MAX_MERCATOR_LON, MAX_MERCATOR_LON);
		self.y_max = self.y_max.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
	}

	#[must_use]
	pub fn limited_to_mercator(mut self) -> GeoBBox {
		self.limit_to_mercator();
		self
	}

	#[must_use]
	pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
		(self.x_min, self.y_min, self.x_max, self.y_max)
	}

	/// Projects this bbox to Web Mercator meters: `[x_min, y_min, x_max, y_max]`.
	#[must_use]
	pub fn to_mercator(&self) -> [f64; 4] {
		let (x_min, y_min) = crate::tile_math::lonlat_to_mercator(self.x_min, self.y_min);
		let (x_max, y_max) = crate::tile_math::lonlat_to_mercator(self.x_max, self.y_max);
		[x_min, y_min, x_max, y_max]
	}

	/// Expands this bbox in place so that it also covers `other`.
	pub fn extend(&mut self, other: &GeoBBox) {
		self.x_min = self.x_min.min(other.x_min);
		self.y_min = self.y_min.min(other.y_min);
		self.x_max = self.x_max.max(other.x_max);
		self.y_max = self.y_max.max(other.y_max);
	}

	#[must_use]
	pub fn extended(mut self, other: &GeoBBox) -> GeoBBox {
		self.extend(other);
		self
	}

	/// Intersects this bbox in place with `other`. The result may be degenerate
	/// (`x_min > x_max` or `y_min > y_max`) if the two boxes do not overlap —
	/// callers must check [`GeoBBox::is_empty`].
	pub fn intersect(&mut self, other: &GeoBBox) {
		self.x_min = self.x_min.max(other.x_min);
		self.y_min = self.y_min.max(other.y_min);
		self.x_max = self.x_max.min(other.x_max);
		self.y_max = self.y_max.min(other.y_max);
	}

	#[must_use]
	pub fn intersected(mut self, other: &GeoBBox) -> GeoBBox {
		self.intersect(other);
		self
	}

	/// True if this bbox covers no area (possible after [`GeoBBox::intersect`]).
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.x_min > self.x_max || self.y_min > self.y_max
	}

	/// True if `other` is fully contained within this bbox.
	#[must_use]
	pub fn covers(&self, other: &GeoBBox) -> bool {
		self.x_min <= other.x_min && self.y_min <= other.y_min && self.x_max >= other.x_max && self.y_max >= other.y_max
	}

	fn checked(self) -> Result<Self> {
		ensure!(self.x_min >= -180., "x_min ({}) must be >= -180", self.x_min);
		ensure!(self.y_min >= -90., "y_min ({}) must be >= -90", self.y_min);
		ensure!(self.x_max <= 180., "x_max ({}) must be <= 180", self.x_max);
		ensure!(self.y_max <= 90., "y_max ({}) must be <= 90", self.y_max);
		ensure!(
			self.x_min <= self.x_max,
			"x_min ({}) must be <= x_max ({})",
			self.x_min,
			self.x_max
		);
		ensure!(
			self.y_min <= self.y_max,
			"y_min ({}) must be <= y_max ({})",
			self.y_min,
			self.y_max
		);
		Ok(self)
	}
}

impl Debug for GeoBBox {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "GeoBBox({}, {}, {}, {})", self.x_min, self.y_min, self.x_max, self.y_max)
	}
}

impl TryFrom<Vec<f64>> for GeoBBox {
	type Error = anyhow::Error;

	#[context("Failed to convert {input:?} to GeoBBox")]
	fn try_from(input: Vec<f64>) -> Result<Self> {
		ensure!(
			input.len() == 4,
			"GeoBBox must have 4 elements (x_min, y_min, x_max, y_max)"
		);
		GeoBBox::new(input[0], input[1], input[2], input[3])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_orders_fields() {
		let bbox = GeoBBox::new(-10.0, -5.0, 10.0, 5.0).unwrap();
		assert_eq!(bbox.as_tuple(), (-10.0, -5.0, 10.0, 5.0));
	}

	#[test]
	fn rejects_inverted_bounds() {
		assert!(GeoBBox::new(10.0, -5.0, -10.0, 5.0).is_err());
	}

	#[test]
	fn limit_to_mercator_clamps() {
		let mut bbox = GeoBBox::new(-180.0, -90.0, 180.0, 90.0).unwrap();
		bbox.limit_to_mercator();
		assert_eq!(bbox.as_tuple(), (-180.0, -MAX_MERCATOR_LAT, 180.0, MAX_MERCATOR_LAT));
	}

	#[test]
	fn extend_grows_to_union() {
		let mut a = GeoBBox::new(-10.0, -5.0, 10.0, 5.0).unwrap();
		let b = GeoBBox::new(-12.0, -3.0, 8.0, 6.0).unwrap();
		a.extend(&b);
		assert_eq!(a.as_tuple(), (-12.0, -5.0, 10.0, 6.0));
	}

	#[test]
	fn intersect_shrinks_to_overlap() {
		let a = GeoBBox::new(-10.0, -5.0, 10.0, 5.0).unwrap();
		let b = GeoBBox::new(-8.0, -4.0, 12.0, 4.0).unwrap();
		let c = a.intersected(&b);
		assert_eq!(c.as_tuple(), (-8.0, -4.0, 10.0, 4.0));
		assert!(!c.is_empty());
	}

	#[test]
	fn intersect_can_become_empty() {
		let a = GeoBBox::new(-10.0, -5.0, -2.0, 5.0).unwrap();
		let b = GeoBBox::new(0.0, -5.0, 10.0, 5.0).unwrap();
		assert!(a.intersected(&b).is_empty());
	}

	#[test]
	fn from_optional_edges_fills_missing_with_full_range() {
		let bbox = GeoBBox::from_optional_edges(Some(-10.0), None, Some(10.0), None).unwrap();
		assert_eq!(bbox.as_tuple(), (-10.0, -90.0, 10.0, 90.0));
	}
}
