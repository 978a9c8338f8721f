//! Web Mercator (EPSG:3857) tile math shared by the manifest builder and the tilers.
//!
//! XYZ addressing: origin top-left, x increases east, y increases south,
//! `2^z` tiles per side at zoom `z`.

use crate::constants::{EARTH_RADIUS, MAX_MERCATOR_LAT, TILE_SIZE, WORLD_SIZE};

/// Meters-per-pixel at zoom `z`: `2*pi*R / (256 * 2^z)`.
#[must_use]
pub fn resolution(z: u8) -> f64 {
	WORLD_SIZE / (f64::from(TILE_SIZE) * 2f64.powi(i32::from(z)))
}

/// Tile extent in Web Mercator meters: `[x_min, y_min, x_max, y_max]`.
///
/// XYZ origin is top-left, so the mercator y-extent is mirrored via
/// `tms_y = 2^z - 1 - y`.
#[must_use]
pub fn tile_bounds_mercator(z: u8, x: u32, y: u32) -> [f64; 4] {
	let res = resolution(z);
	let span = f64::from(TILE_SIZE) * res;
	let tms_y = (1u64 << z) - 1 - u64::from(y);
	let origin = std::f64::consts::PI * EARTH_RADIUS;
	let x_min = -origin + f64::from(x) * span;
	let x_max = x_min + span;
	let y_min = -origin + (tms_y as f64) * span;
	let y_max = y_min + span;
	[x_min, y_min, x_max, y_max]
}

/// WGS-84 longitude/latitude to Web Mercator meters.
#[must_use]
pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
	let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
	let x = lon.to_radians() * EARTH_RADIUS;
	let y = EARTH_RADIUS * ((std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan()).ln();
	(x, y)
}

/// Web Mercator meters to WGS-84 longitude/latitude.
#[must_use]
pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
	let lon = x.to_degrees() / EARTH_RADIUS;
	let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
	(lon, lat)
}

/// The tile `(x,y)` at zoom `z` that contains a WGS-84 point.
#[must_use]
pub fn lonlat_to_tile(z: u8, lon: f64, lat: f64) -> (u32, u32) {
	let n = (1u64 << z) as f64;
	let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
	let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, n - 1.0) as u32;
	let lat_rad = lat.to_radians();
	let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0 * n)
		.floor()
		.clamp(0.0, n - 1.0) as u32;
	(x, y)
}

/// The WGS-84 bounds covered by tile `(z,x,y)`.
#[must_use]
pub fn tile_bounds_lonlat(z: u8, x: u32, y: u32) -> (f64, f64, f64, f64) {
	let [xmin, ymin, xmax, ymax] = tile_bounds_mercator(z, x, y);
	let (lon_min, lat_min) = mercator_to_lonlat(xmin, ymin);
	let (lon_max, lat_max) = mercator_to_lonlat(xmax, ymax);
	(lon_min, lat_min, lon_max, lat_max)
}

/// Packs a tile's `(x,y)` into the 32-bit manifest key `(x<<16)|y`, valid for `z <= 16`.
#[must_use]
pub fn pack_tile_key(x: u32, y: u32) -> u32 {
	(x << 16) | (y & 0xffff)
}

/// Unpacks a manifest key back into `(x,y)`.
#[must_use]
pub fn unpack_tile_key(key: u32) -> (u32, u32) {
	(key >> 16, key & 0xffff)
}
