//! Shared Web Mercator constants.

/// WGS-84 semi-major axis, treated as the sphere radius for EPSG:3857 math.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Circumference of the Web Mercator world square, in meters.
pub const WORLD_SIZE: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS;

/// Maximum latitude representable in Web Mercator.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Longitude bound.
pub const MAX_MERCATOR_LON: f64 = 180.0;

/// Tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;
