//! The dataset record: a chart's archive location, optional mask/bounds/GCPs,
//! and its maximum zoom level.

use crate::gcp::GcpSet;
use crate::mask::Mask;
use chart_core::GeoBBox;

#[derive(Debug, Clone)]
pub struct DatasetRecord {
	pub name: String,
	pub archive_basename: String,
	pub member_filename: String,
	pub temp_output_filename: String,
	pub mask: Option<Mask>,
	pub bounds: Option<GeoBBox>,
	pub gcps: Option<GcpSet>,
	pub max_lod: u8,
}
