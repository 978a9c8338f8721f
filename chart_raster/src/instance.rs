use crate::spatial_ref::get_spatial_ref;
use anyhow::{Context, Result, ensure};
use chart_core::GeoBBox;
use chart_derive::context;
use gdal::{Dataset, spatial_ref::CoordTransform};
use std::fmt::Debug;

/// A single open GDAL dataset handle.
#[derive(Debug)]
pub struct Instance {
	dataset: Dataset,
}

unsafe impl Send for Instance {}

impl Instance {
	pub fn new(dataset: Dataset) -> Self {
		Self { dataset }
	}

	#[context("computing bounding box for GDAL dataset")]
	pub fn get_bbox(&self) -> Result<GeoBBox> {
		let gt = self.dataset.geo_transform().context("failed to get geo transform")?;
		ensure!(gt[2] == 0.0 && gt[4] == 0.0, "GDAL dataset must not be rotated");

		let (width, height) = self.dataset.raster_size();
		let spatial_ref = self.dataset.spatial_ref().context("dataset has no spatial reference")?;

		let coord_transform =
			CoordTransform::new(&spatial_ref, &get_spatial_ref(4326)?).context("failed to create coordinate transform")?;

		let bounds = coord_transform.transform_bounds(
			&[gt[0], gt[3], gt[0] + gt[1] * width as f64, gt[3] + gt[5] * height as f64],
			21,
		)?;

		let mut bbox = GeoBBox::new_save(bounds[0], bounds[1], bounds[2], bounds[3]);
		bbox.limit_to_mercator();
		Ok(bbox)
	}
}
