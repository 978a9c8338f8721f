use chart_raster::ResampleAlg;
use chart_image::TileFormat;
use clap::Parser;
use std::path::PathBuf;

fn parse_resample_alg(s: &str) -> Result<ResampleAlg, String> {
	s.parse().map_err(|e: anyhow::Error| e.to_string())
}

fn parse_tile_format(s: &str) -> Result<TileFormat, String> {
	s.parse().map_err(|e: anyhow::Error| e.to_string())
}

/// Converts georeferenced aeronautical raster charts into Web Mercator XYZ tile pyramids.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
	/// Path to the dataset/tileset configuration document (JSON).
	#[arg(long)]
	pub config: PathBuf,

	/// Directory containing the input `.zip` archives.
	#[arg(long)]
	pub zippath: PathBuf,

	/// Directory for intermediate reprojected GeoTIFFs and zoom-mosaic VRTs.
	#[arg(long)]
	pub tmppath: PathBuf,

	/// Output directory for the generated tile pyramid.
	#[arg(long)]
	pub outpath: PathBuf,

	/// Comma-separated list of tileset names to build; defaults to all tilesets in the config.
	#[arg(long, value_delimiter = ',')]
	pub tilesets: Option<Vec<String>>,

	/// List the configured tilesets and exit without building anything.
	#[arg(long)]
	pub list: bool,

	/// Remove intermediate files under `tmppath` after a tileset finishes.
	#[arg(long)]
	pub cleanup: bool,

	/// Skip the dataset pipeline phase; reuse reprojected GeoTIFFs already in `tmppath`.
	#[arg(long)]
	pub tile_only: bool,

	/// Target CRS for reprojected datasets and tiles, as an EPSG code.
	#[arg(long, default_value_t = 3857)]
	pub epsg: u32,

	/// Resampling algorithm for the dataset pipeline's reprojection stage.
	#[arg(long, default_value = "bilinear", value_parser = parse_resample_alg)]
	pub reproject_resampling: ResampleAlg,

	/// Resampling algorithm for base/overview tile generation.
	#[arg(long, default_value = "bilinear", value_parser = parse_resample_alg)]
	pub tile_resampling: ResampleAlg,

	/// Suppress progress bars and non-error log output.
	#[arg(long)]
	pub quiet: bool,

	/// Worker count for the dataset pipeline phase; defaults to a CPU-derived value.
	#[arg(long)]
	pub jobs: Option<usize>,

	/// Worker count for the base-tile phase; defaults to a CPU-derived value.
	#[arg(long)]
	pub tile_workers: Option<usize>,

	/// Output tile encoding.
	#[arg(long, default_value = "png", value_parser = parse_tile_format)]
	pub format: TileFormat,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_required_paths_and_defaults() {
		let cli = Cli::try_parse_from([
			"chartile",
			"--config",
			"c.json",
			"--zippath",
			"zips",
			"--tmppath",
			"tmp",
			"--outpath",
			"out",
		])
		.unwrap();
		assert_eq!(cli.epsg, 3857);
		assert!(!cli.quiet);
		assert_eq!(cli.format, TileFormat::Png);
		assert!(cli.tilesets.is_none());
	}

	#[test]
	fn parses_comma_separated_tileset_list() {
		let cli = Cli::try_parse_from([
			"chartile",
			"--config",
			"c.json",
			"--zippath",
			"zips",
			"--tmppath",
			"tmp",
			"--outpath",
			"out",
			"--tilesets",
			"a,b,c",
		])
		.unwrap();
		assert_eq!(cli.tilesets, Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]));
	}
}
