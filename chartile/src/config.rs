//! Loads and validates the dataset/tileset configuration document (JSON).
//!
//! ## Shape
//!
//! ```json
//! {
//!   "datasets": {
//!     "sectional_sfo": {
//!       "zip_file": "sectional_sfo",
//!       "input_file": "sfo.tif",
//!       "mask": [[[0,0],[100,0],[100,50],[0,50]]],
//!       "geobound": [-123.0, 37.0, -121.5, 38.2],
//!       "gcps": [[0,0,-123.0,38.2]],
//!       "max_lod": 11
//!     }
//!   },
//!   "tilesets": {
//!     "sectional": {
//!       "tile_path": "sectional",
//!       "zoom": [0, 11],
//!       "datasets": ["sectional_sfo"]
//!     }
//!   }
//! }
//! ```

use anyhow::{Context, Result, ensure};
use chart_core::GeoBBox;
use chart_derive::context;
use chart_raster::{DatasetRecord, Gcp, GcpSet, Mask, Ring};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDocument {
	pub datasets: HashMap<String, DatasetConfig>,
	pub tilesets: HashMap<String, TilesetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
	pub zip_file: String,
	#[serde(default)]
	pub input_file: Option<String>,
	#[serde(default)]
	pub mask: Option<Vec<Vec<[f64; 2]>>>,
	#[serde(default)]
	pub geobound: Option<[Option<f64>; 4]>,
	#[serde(default)]
	pub gcps: Option<Vec<[f64; 4]>>,
	#[serde(default)]
	pub max_lod: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TilesetConfig {
	pub tile_path: String,
	pub zoom: [u8; 2],
	pub datasets: Vec<String>,
}

impl ConfigDocument {
	#[context("loading config document from {path:?}")]
	pub fn from_path(path: &Path) -> Result<ConfigDocument> {
		let file = File::open(path).with_context(|| format!("failed to open config file {path:?}"))?;
		ConfigDocument::from_reader(BufReader::new(file))
	}

	pub fn from_reader<R: std::io::Read>(reader: R) -> Result<ConfigDocument> {
		let doc: ConfigDocument = serde_json::from_reader(reader).context("failed to parse config document as JSON")?;
		doc.validate()?;
		Ok(doc)
	}

	fn validate(&self) -> Result<()> {
		for (tileset_name, tileset) in &self.tilesets {
			ensure!(tileset.zoom[0] <= tileset.zoom[1], "tileset '{tileset_name}' has zoom_min > zoom_max");
			for dataset_name in &tileset.datasets {
				ensure!(
					self.datasets.contains_key(dataset_name),
					"tileset '{tileset_name}' references unknown dataset '{dataset_name}'"
				);
			}
		}
		Ok(())
	}
}

/// Default `max_lod` applied when a dataset config omits it: the highest
/// zoom any tileset referencing it requests.
fn default_max_lod(name: &str, tilesets: &HashMap<String, TilesetConfig>) -> u8 {
	tilesets
		.values()
		.filter(|t| t.datasets.iter().any(|d| d == name))
		.map(|t| t.zoom[1])
		.max()
		.unwrap_or(0)
}

#[context("building dataset record for '{name}'")]
pub fn to_dataset_record(name: &str, config: &DatasetConfig, tilesets: &HashMap<String, TilesetConfig>) -> Result<DatasetRecord> {
	let input_file = config.input_file.clone().unwrap_or_else(|| format!("{name}.tif"));
	let mask = config.mask.as_ref().map(|rings| Mask {
		rings: rings
			.iter()
			.map(|ring| Ring {
				points: ring.iter().map(|&[x, y]| (x, y)).collect(),
			})
			.collect(),
	});
	let bounds = match &config.geobound {
		Some([lon_min, lat_min, lon_max, lat_max]) => Some(GeoBBox::from_optional_edges(*lon_min, *lat_min, *lon_max, *lat_max)?),
		None => None,
	};
	let gcps = config.gcps.as_ref().map(|points| GcpSet {
		points: points
			.iter()
			.map(|&[pixel_x, pixel_y, crs_x, crs_y]| Gcp { pixel_x, pixel_y, crs_x, crs_y })
			.collect(),
	});
	let max_lod = config.max_lod.unwrap_or_else(|| default_max_lod(name, tilesets));

	Ok(DatasetRecord {
		name: name.to_string(),
		archive_basename: format!("{}.zip", config.zip_file),
		member_filename: input_file,
		temp_output_filename: format!("_{name}.tif"),
		mask,
		bounds,
		gcps,
		max_lod,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_json() -> &'static str {
		r#"{
			"datasets": {
				"a": { "zip_file": "a_archive", "max_lod": 8 }
			},
			"tilesets": {
				"t1": { "tile_path": "t1", "zoom": [0, 8], "datasets": ["a"] }
			}
		}"#
	}

	#[test]
	fn parses_a_minimal_document() {
		let doc = ConfigDocument::from_reader(sample_json().as_bytes()).unwrap();
		assert_eq!(doc.datasets.len(), 1);
		assert_eq!(doc.tilesets.len(), 1);
	}

	#[test]
	fn rejects_a_tileset_referencing_an_unknown_dataset() {
		let json = r#"{
			"datasets": {},
			"tilesets": { "t1": { "tile_path": "t1", "zoom": [0, 4], "datasets": ["missing"] } }
		}"#;
		assert!(ConfigDocument::from_reader(json.as_bytes()).is_err());
	}

	#[test]
	fn rejects_inverted_zoom_range() {
		let json = r#"{
			"datasets": { "a": { "zip_file": "a" } },
			"tilesets": { "t1": { "tile_path": "t1", "zoom": [8, 2], "datasets": ["a"] } }
		}"#;
		assert!(ConfigDocument::from_reader(json.as_bytes()).is_err());
	}

	#[test]
	fn input_file_defaults_to_dataset_name_with_tif_extension() {
		let doc = ConfigDocument::from_reader(sample_json().as_bytes()).unwrap();
		let record = to_dataset_record("a", &doc.datasets["a"], &doc.tilesets).unwrap();
		assert_eq!(record.member_filename, "a.tif");
		assert_eq!(record.archive_basename, "a_archive.zip");
	}

	#[test]
	fn max_lod_defaults_to_the_highest_referencing_tileset_zoom() {
		let doc = ConfigDocument::from_reader(
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
		let record = to_dataset_record("a", &doc.datasets["a"], &doc.tilesets).unwrap();
		assert_eq!(record.max_lod, 9);
	}

	#[test]
	fn mask_and_gcps_translate_into_chart_raster_types() {
		let json = r#"{
			"datasets": {
				"a": {
					"zip_file": "a",
					"mask": [[[0,0],[10,0],[10,5],[0,5]]],
					"gcps": [[0,0,-122.0,37.0],[10,0,-121.0,37.0],[0,5,-122.0,36.5]]
				}
			},
			"tilesets": { "t1": { "tile_path": "t1", "zoom": [0, 5], "datasets": ["a"] } }
		}"#;
		let doc = ConfigDocument::from_reader(json.as_bytes()).unwrap();
		let record = to_dataset_record("a", &doc.datasets["a"], &doc.tilesets).unwrap();
		assert_eq!(record.mask.unwrap().rings[0].points.len(), 4);
		assert_eq!(record.gcps.unwrap().points.len(), 3);
	}
}
