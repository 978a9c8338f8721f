//! Drives the three phases described for a full run: the dataset pipeline
//! (Phase 0) across every dataset referenced by the selected tilesets, then
//! per tileset the base-tile phase (Phase 1) and the overview phase (Phase 2).

use crate::cli::Cli;
use crate::config::{ConfigDocument, TilesetConfig, to_dataset_record};
use anyhow::{Context, Result, bail};
use chart_core::ConcurrencyLimits;
use chart_jobqueue::run_job_queue;
use chart_raster::{DatasetPipelineParams, DatasetRecord, Instance, estimate_work, run_dataset_pipeline};
use chart_tiling::{DatasetExtent, TileManifest, ZoomMosaicEntry, build_zoom_mosaic_vrt, generate_base_tile, open_zoom_mosaic, run_overview_phase};
use gdal::Dataset;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Runs the full build described by `cli`. Per-dataset and per-tile failures
/// are logged and counted but do not abort the run; only `ErrorKind::is_fatal`
/// conditions (invalid config, every worker dying) return `Err`.
pub fn run(cli: &Cli) -> Result<()> {
	let config = ConfigDocument::from_path(&cli.config)?;

	if cli.list {
		for (name, tileset) in &config.tilesets {
			println!("{name}: zoom={}..={} tile_path={} datasets={}", tileset.zoom[0], tileset.zoom[1], tileset.tile_path, tileset.datasets.join(","));
		}
		return Ok(());
	}

	let selected_names: Vec<String> = match &cli.tilesets {
		Some(names) => names.clone(),
		None => config.tilesets.keys().cloned().collect(),
	};
	for name in &selected_names {
		if !config.tilesets.contains_key(name) {
			bail!("unknown tileset '{name}'");
		}
	}

	for name in &selected_names {
		let tileset = &config.tilesets[name];
		log::info!(
			"tileset '{name}': zoom={}..={} tile_path={} datasets=[{}]",
			tileset.zoom[0],
			tileset.zoom[1],
			tileset.tile_path,
			tileset.datasets.join(", ")
		);
	}

	let limits = ConcurrencyLimits::default();
	let dataset_jobs_workers = cli.jobs.unwrap_or(limits.mixed);
	let tile_workers = cli.tile_workers.unwrap_or(limits.cpu_bound);

	let dataset_names: HashSet<&str> = selected_names
		.iter()
		.flat_map(|name| config.tilesets[name].datasets.iter().map(String::as_str))
		.collect();
	let mut jobs: Vec<(&str, &crate::config::DatasetConfig, DatasetRecord)> = dataset_names
		.into_iter()
		.map(|name| {
			let dataset_config = &config.datasets[name];
			let record = to_dataset_record(name, dataset_config, &config.tilesets)?;
			Ok::<_, anyhow::Error>((name, dataset_config, record))
		})
		.collect::<Result<Vec<_>>>()?;
	jobs.sort_by(|a, b| estimate_work(&b.2).partial_cmp(&estimate_work(&a.2)).unwrap_or(std::cmp::Ordering::Equal));

	let mut dataset_failed: HashSet<String> = HashSet::new();

	if !cli.tile_only {
		let mut progress = chart_core::get_progress_bar(cli.quiet, "dataset pipeline", jobs.len() as u64);
		let report = run_job_queue(jobs.len(), dataset_jobs_workers, |index| {
			let (name, _cfg, record) = &jobs[index];
			let params = DatasetPipelineParams {
				resolution: native_resolution_for(&selected_names, &config, name),
				epsg: cli.epsg,
				reproject_resampling: cli.reproject_resampling,
				warp_threads: 1,
			};
			run_dataset_pipeline(record, &cli.zippath, &cli.tmppath, &params)
		})
		.map_err(|kind| anyhow::anyhow!("dataset pipeline aborted: {kind}"))?;
		progress.set_position(jobs.len() as u64);
		progress.finish();

		for index in report.failed_indices() {
			let (name, _, _) = &jobs[index];
			log::warn!("dataset '{name}' failed in the pipeline phase; it will be excluded from tiling");
			dataset_failed.insert((*name).to_string());
		}
	}

	for name in &selected_names {
		let tileset = &config.tilesets[name];
		if let Err(e) = run_tileset(cli, tileset, &config, &dataset_failed, tile_workers) {
			log::error!("tileset '{name}' failed: {e:#}");
		}
		if cli.cleanup {
			cleanup_tileset_temp_files(&cli.tmppath, tileset, &config);
		}
	}

	Ok(())
}

/// A placeholder native resolution used only when the dataset's own pixel
/// size cannot be read ahead of time; `Warp` resamples to the tileset's
/// target zoom regardless, so this only affects the reprojection's working
/// resolution, not the final tile pyramid's.
fn native_resolution_for(selected_names: &[String], config: &ConfigDocument, dataset_name: &str) -> f64 {
	let max_zoom = selected_names
		.iter()
		.map(|n| &config.tilesets[n])
		.filter(|t| t.datasets.iter().any(|d| d == dataset_name))
		.map(|t| t.zoom[1])
		.max()
		.unwrap_or(0);
	chart_core::constants::WORLD_SIZE / f64::from(256u32 * (1u32 << max_zoom.min(20)))
}

fn run_tileset(cli: &Cli, tileset: &TilesetConfig, config: &ConfigDocument, dataset_failed: &HashSet<String>, tile_workers: usize) -> Result<()> {
	let out_dir = cli.outpath.join(&tileset.tile_path);
	let live_datasets: Vec<&str> = tileset.datasets.iter().map(String::as_str).filter(|d| !dataset_failed.contains(*d)).collect();
	if live_datasets.is_empty() {
		log::warn!("tileset '{}' has no surviving datasets; skipping", tileset.tile_path);
		return Ok(());
	}

	let mut records: HashMap<&str, DatasetRecord> = HashMap::new();
	for name in &live_datasets {
		records.insert(name, to_dataset_record(name, &config.datasets[*name], &config.tilesets)?);
	}

	let mut extents = Vec::with_capacity(live_datasets.len());
	let mut mosaic_entries = Vec::with_capacity(live_datasets.len());
	for name in &live_datasets {
		let record = &records[name];
		let path = cli.tmppath.join(&record.temp_output_filename);
		let bbox = Instance::new(Dataset::open(&path).with_context(|| format!("failed to open reprojected dataset {path:?}"))?).get_bbox()?;
		extents.push(DatasetExtent {
			lon_min: bbox.x_min,
			lat_min: bbox.y_min,
			lon_max: bbox.x_max,
			lat_max: bbox.y_max,
			max_lod: record.max_lod,
		});
		mosaic_entries.push((path, record.max_lod));
	}

	let manifest = TileManifest::build(&extents, tileset.zoom[0], tileset.zoom[1]);

	let mosaic_dir = cli.tmppath.join(format!("{}_mosaics", tileset.tile_path));
	std::fs::create_dir_all(&mosaic_dir).with_context(|| format!("failed to create {mosaic_dir:?}"))?;

	for z in tileset.zoom[0]..=tileset.zoom[1] {
		let tiles = manifest.tiles_at(z);
		if tiles.is_empty() {
			continue;
		}

		let entries: Vec<ZoomMosaicEntry> = mosaic_entries
			.iter()
			.map(|(path, max_lod)| ZoomMosaicEntry { path: path.clone(), max_lod: *max_lod })
			.collect();
		let vrt_path = mosaic_dir.join(format!("z{z}.vrt"));
		build_zoom_mosaic_vrt(&entries, z, &vrt_path)?;
		let mosaic = open_zoom_mosaic(&vrt_path)?;

		let mut progress = chart_core::get_progress_bar(cli.quiet, &format!("base tiles z={z}"), tiles.len() as u64);
		let report = run_job_queue(tiles.len(), tile_workers, |index| {
			let (tz, tx, ty) = tiles[index];
			generate_base_tile(&mosaic, tz, tx, ty, &out_dir, cli.format, cli.tile_resampling)?;
			Ok(())
		})
		.map_err(|kind| anyhow::anyhow!("base tile phase aborted at z={z}: {kind}"))?;
		progress.set_position(tiles.len() as u64);
		progress.finish();

		let failed = report.failed_indices().len();
		if failed > 0 {
			log::warn!("z={z}: {failed}/{} base tiles failed", tiles.len());
		}
	}

	run_overview_phase(&out_dir, tileset.zoom[0], tileset.zoom[1], cli.format)?;

	Ok(())
}

fn cleanup_tileset_temp_files(tmp_dir: &Path, tileset: &TilesetConfig, config: &ConfigDocument) {
	for name in &tileset.datasets {
		let Ok(record) = to_dataset_record(name, &config.datasets[name], &config.tilesets) else {
			continue;
		};
		let path = tmp_dir.join(&record.temp_output_filename);
		if path.exists()
			&& let Err(e) = std::fs::remove_file(&path)
		{
			log::warn!("failed to remove intermediate file {path:?}: {e}");
		}
	}
	let mosaic_dir = tmp_dir.join(format!("{}_mosaics", tileset.tile_path));
	let _ = std::fs::remove_dir_all(mosaic_dir);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn native_resolution_uses_the_highest_referencing_zoom() {
		let config = ConfigDocument::from_reader(
			r#"{
				"datasets": { "a": { "zip_file": "a" } },
				"tilesets": {
					"low": { "tile_path": "low", "zoom": [0, 3], "datasets": ["a"] },
					"high": { "tile_path": "high", "zoom": [0, 9], "datasets": ["a"] }
				}
			}"#
			.as_bytes(),
		)
		.unwrap();
		let selected: Vec<String> = config.tilesets.keys().cloned().collect();
		let res = native_resolution_for(&selected, &config, "a");
		let expected = chart_core::constants::WORLD_SIZE / f64::from(256u32 * (1u32 << 9));
		assert!((res - expected).abs() < 1e-9);
	}
}
