//! Detects and reproduces band/channel mappings from GDAL raster datasets, so
//! Grey/Grey+Alpha/RGB/RGBA layouts survive warp and in-memory round-trips
//! regardless of how the source orders its bands.

use crate::spatial_ref::get_spatial_ref;
use anyhow::{Context, Result, bail, ensure};
use chart_derive::context;
use gdal::{DriverManager, raster::ColorInterpretation};
use std::fmt::Debug;

pub struct BandMappingItem {
	pub band_index: usize,
	pub channel_index: usize,
}

#[derive(Clone)]
pub struct BandMapping {
	map: Vec<usize>,
}

impl BandMapping {
	#[context("building band mapping from GDAL dataset")]
	pub fn try_from_dataset(dataset: &gdal::Dataset) -> Result<Self> {
		log::trace!("computing band mapping (raster_count={})", dataset.raster_count());

		let bands: Vec<(usize, ColorInterpretation)> = (1..=dataset.raster_count())
			.map(|i| {
				let band = dataset
					.rasterband(i)
					.with_context(|| format!("failed to get raster band {i} from GDAL dataset"))?;
				Ok((i, band.color_interpretation()))
			})
			.collect::<Result<_>>()?;

		let band_string = bands.iter().map(|(_, ci)| format!("{ci:?}")).collect::<Vec<_>>().join(", ");

		let channels = (|| {
			let mut channels: [Option<usize>; 5] = [None, None, None, None, None];
			for (band_index, ci) in &bands {
				use ColorInterpretation::{AlphaBand, BlueBand, GrayIndex, GreenBand, RedBand, Undefined};
				let channel_index = match ci {
					GrayIndex => 0,
					RedBand => 1,
					GreenBand => 2,
					BlueBand => 3,
					AlphaBand => 4,
					Undefined => {
						if band_index > &4 {
							continue;
						}
						*band_index
					}
					_ => bail!("GDAL band {band_index} has unsupported color interpretation: {ci:?}"),
				};
				ensure!(
					channels[channel_index].is_none(),
					"GDAL dataset band {band_index} uses the same channel ({}) as band {}",
					["grey", "red", "green", "blue", "alpha"][channel_index],
					channels[channel_index].unwrap()
				);
				channels[channel_index] = Some(*band_index);
			}
			Ok::<_, anyhow::Error>(channels)
		})()
		.with_context(|| format!("failed to compute channel mapping from bands [{band_string}]"))?;

		let map: Vec<usize> = match channels {
			[None, Some(red), Some(green), Some(blue), Some(alpha)] => vec![red, green, blue, alpha],
			[None, Some(red), Some(green), Some(blue), None] => vec![red, green, blue],
			[Some(gray), None, None, None, Some(alpha)]
			| [None, Some(gray), None, None, Some(alpha)]
			| [None, Some(gray), Some(alpha), None, None] => vec![gray, alpha],
			[Some(gray), None, None, None, None] | [None, Some(gray), None, None, None] => vec![gray],
			_ => bail!("the found bands ({channels:?}) cannot be interpreted as grey/RGB (+alpha)"),
		};
		log::trace!("band mapping result: {map:?}");

		Ok(BandMapping { map })
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.map.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = BandMappingItem> + '_ {
		self
			.map
			.iter()
			.enumerate()
			.map(|(channel_index, &band_index)| BandMappingItem { band_index, channel_index })
	}

	#[context("creating in-memory GDAL dataset ({width}x{height}) for band mapping")]
	pub fn create_mem_dataset(&self, width: usize, height: usize) -> Result<gdal::Dataset> {
		let driver = DriverManager::get_driver_by_name("MEM").context("failed to get GDAL MEM driver")?;
		let mut dst = driver
			.create_with_band_type::<u8, _>("mem", width, height, self.len())
			.context("failed to create in-memory dataset")?;
		dst.set_spatial_ref(&get_spatial_ref(3857)?)?;

		use ColorInterpretation::{AlphaBand, BlueBand, GrayIndex, GreenBand, RedBand};
		match self.len() {
			1 => dst.rasterband(1)?.set_color_interpretation(GrayIndex)?,
			2 => {
				dst.rasterband(1)?.set_color_interpretation(GrayIndex)?;
				dst.rasterband(2)?.set_color_interpretation(AlphaBand)?;
			}
			3 => {
				dst.rasterband(1)?.set_color_interpretation(RedBand)?;
				dst.rasterband(2)?.set_color_interpretation(GreenBand)?;
				dst.rasterband(3)?.set_color_interpretation(BlueBand)?;
			}
			4 => {
				dst.rasterband(1)?.set_color_interpretation(RedBand)?;
				dst.rasterband(2)?.set_color_interpretation(GreenBand)?;
				dst.rasterband(3)?.set_color_interpretation(BlueBand)?;
				dst.rasterband(4)?.set_color_interpretation(AlphaBand)?;
			}
			_ => bail!("unsupported number of bands in band mapping: {}", self.len()),
		}
		Ok(dst)
	}

	/// # Safety
	/// Writes `nBandCount`/`panSrcBands`/`panDstBands` into `options`; the caller owns
	/// the `GDALWarpOptions` for the lifetime of the warp operation.
	pub unsafe fn setup_gdal_warp_options(&self, options: &mut gdal_sys::GDALWarpOptions) {
		options.nBandCount = self.len() as i32;
		unsafe {
			let n = std::mem::size_of::<i32>() * self.len();
			options.panSrcBands = gdal_sys::CPLMalloc(n) as *mut i32;
			options.panDstBands = gdal_sys::CPLMalloc(n) as *mut i32;
			for (i, &band_index) in self.map.iter().enumerate() {
				options.panSrcBands.add(i).write(band_index as i32);
				options.panDstBands.add(i).write((i + 1) as i32);
			}
		}
	}
}

impl Debug for BandMapping {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "BandMapping {{ map: {:?} }}", self.map)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn mem_dataset_with_bands(cis: Vec<ColorInterpretation>) -> Result<gdal::Dataset> {
		let driver = DriverManager::get_driver_by_name("MEM")?;
		let ds = driver.create_with_band_type::<u8, _>("", 2, 2, cis.len())?;
		for (i, ci) in cis.into_iter().enumerate() {
			ds.rasterband(i + 1)?.set_color_interpretation(ci)?;
		}
		Ok(ds)
	}

	fn parse_color_interpretations(text: &str) -> Vec<ColorInterpretation> {
		use ColorInterpretation::*;
		text
			.split(',')
			.filter_map(|s| {
				let t = s.trim().to_ascii_lowercase();
				Some(match t.as_str() {
					"grey" | "gray" => GrayIndex,
					"r" | "red" => RedBand,
					"g" | "green" => GreenBand,
					"b" | "blue" => BlueBand,
					"a" | "alpha" => AlphaBand,
					"u" | "undefined" => Undefined,
					"palette" | "pal" => PaletteIndex,
					_ => return None,
				})
			})
			.collect()
	}

	#[rstest]
	#[case("Grey", "Grey", &[1])]
	#[case("R,G,B", "R,G,B", &[1,2,3])]
	#[case("B,G,R", "R,G,B", &[3,2,1])]
	#[case("R,G,B,A", "R,G,B,A", &[1,2,3,4])]
	fn bandmapping_ok_cases(#[case] colors_in: &str, #[case] colors_out: &str, #[case] mapping: &[usize]) -> Result<()> {
		let ds = mem_dataset_with_bands(parse_color_interpretations(colors_in))?;
		let bm = BandMapping::try_from_dataset(&ds)?;
		assert_eq!(bm.len(), mapping.len());
		let got: Vec<_> = bm.iter().map(|it| it.band_index).collect();
		assert_eq!(got, mapping);

		let out = bm.create_mem_dataset(8, 8)?;
		let expected_colors = parse_color_interpretations(colors_out);
		assert_eq!(out.raster_count() as usize, expected_colors.len());
		for (i, ci) in expected_colors.into_iter().enumerate() {
			assert_eq!(out.rasterband(i + 1)?.color_interpretation(), ci);
		}
		Ok(())
	}

	#[test]
	fn rejects_duplicate_channel_assignment() {
		let ds = mem_dataset_with_bands(parse_color_interpretations("Red,Red")).unwrap();
		assert!(BandMapping::try_from_dataset(&ds).is_err());
	}
}
