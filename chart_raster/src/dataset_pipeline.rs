//! Composes the pipeline stages into the ordered run for a single dataset:
//! `ExpandRGB -> ApplyMask -> ApplyGCP -> Warp -> Clip -> Save`. Any stage
//! failure aborts the run and releases the handle (dropping `RasterHandle`).

use crate::archive::extract_member;
use crate::dataset_record::DatasetRecord;
use crate::pipeline::{RasterHandle, StageOutcome, apply_gcp, apply_mask, clip, expand_rgb, save, warp};
use crate::resample::ResampleAlg;
use anyhow::{Context, Result};
use chart_derive::context;
use gdal::Dataset;
use std::path::Path;

pub struct DatasetPipelineParams {
	pub resolution: f64,
	pub epsg: u32,
	pub reproject_resampling: ResampleAlg,
	pub warp_threads: usize,
}

/// Runs the full per-dataset pipeline: extracts the archive member to
/// `tmp_dir`, opens it with GDAL, and threads the handle through every stage
/// in order, writing the final GeoTIFF to `record.temp_output_filename`
/// inside `tmp_dir`.
#[context("running dataset pipeline for {}", record.name)]
pub fn run_dataset_pipeline(record: &DatasetRecord, archive_root: &Path, tmp_dir: &Path, params: &DatasetPipelineParams) -> Result<()> {
	let archive_path = archive_root.join(&record.archive_basename);
	let extracted_path = tmp_dir.join(format!("{}.extracted", record.name));
	let extracted = extract_member(&archive_path, &record.member_filename, &extracted_path)?;

	let dataset = Dataset::open(&extracted).with_context(|| format!("failed to open {extracted:?} with GDAL"))?;
	let mut handle = RasterHandle::new(dataset);

	macro_rules! apply_stage {
		($outcome:expr) => {
			if let StageOutcome::Fresh(new_handle) = $outcome {
				handle = new_handle;
			}
		};
	}

	apply_stage!(expand_rgb(&handle, record.mask.as_ref())?);
	apply_stage!(apply_mask(&handle, record.mask.as_ref())?);
	apply_stage!(apply_gcp(&handle, record.gcps.as_ref())?);
	apply_stage!(warp(&handle, params.resolution, params.epsg, params.reproject_resampling, params.warp_threads)?);
	if let Some(bounds) = &record.bounds {
		apply_stage!(clip(&handle, bounds, params.epsg)?);
	}

	let output_path = tmp_dir.join(&record.temp_output_filename);
	save(&handle, &output_path)?;

	log::info!("dataset pipeline finished for {}", record.name);
	Ok(())
}

/// Estimates the work a dataset job represents, for front-loading the job
/// queue's dispatch order: the mask's outer bounding-box area in pixel space,
/// or 0 if the dataset has no mask.
#[must_use]
pub fn estimate_work(record: &DatasetRecord) -> f64 {
	record
		.mask
		.as_ref()
		.and_then(|m| m.outer_bbox().ok())
		.map(|(x0, y0, x1, y1)| (x1 - x0).max(0.0) * (y1 - y0).max(0.0))
		.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mask::{Mask, Ring};

	#[test]
	fn estimate_work_is_zero_without_a_mask() {
		let record = DatasetRecord {
			name: "a".into(),
			archive_basename: "a.zip".into(),
			member_filename: "a.tif".into(),
			temp_output_filename: "a.out.tif".into(),
			mask: None,
			bounds: None,
			gcps: None,
			max_lod: 5,
		};
		assert_eq!(estimate_work(&record), 0.0);
	}

	#[test]
	fn estimate_work_is_the_mask_bbox_area() {
		let record = DatasetRecord {
			name: "a".into(),
			archive_basename: "a.zip".into(),
			member_filename: "a.tif".into(),
			temp_output_filename: "a.out.tif".into(),
			mask: Some(Mask {
				rings: vec![Ring {
					points: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)],
				}],
			}),
			bounds: None,
			gcps: None,
			max_lod: 5,
		};
		assert_eq!(estimate_work(&record), 50.0);
	}
}
