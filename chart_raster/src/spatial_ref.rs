use anyhow::Result;
use gdal::spatial_ref::{AxisMappingStrategy, SpatialRef};

/// Looks up an EPSG spatial reference with traditional (lon,lat) axis order,
/// so coordinate math downstream never has to special-case EPSG:4326's
/// lat-first authority order.
pub fn get_spatial_ref(epsg: u32) -> Result<SpatialRef> {
	let mut srs = SpatialRef::from_epsg(epsg).map_err(|e| anyhow::anyhow!("failed to get spatial reference: {e}"))?;
	srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
	Ok(srs)
}
