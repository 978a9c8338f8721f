//! Conversions between `DynamicImage` and raw/encoded tile bytes.

use crate::format::{jpeg, png, webp};
use crate::tile_format::TileFormat;
use anyhow::{Result, anyhow, bail, ensure};
use image::{DynamicImage, ImageBuffer, LumaA, Rgb, Rgba};

pub trait DynamicImageTraitConvert {
	/// Builds a `DynamicImage` from raw interleaved pixel bytes; the channel count (and
	/// therefore color model) is inferred from `data.len() / (width * height)`.
	fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<DynamicImage>;

	/// Decodes tile bytes in the given format.
	fn from_bytes(bytes: &[u8], format: TileFormat) -> Result<DynamicImage>;

	/// Encodes the image into tile bytes in the given format.
	fn to_bytes(&self, format: TileFormat) -> Result<Vec<u8>>;
}

impl DynamicImageTraitConvert for DynamicImage {
	fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<DynamicImage> {
		let channel_count = data.len() / (width * height) as usize;
		ensure!(
			channel_count * (width * height) as usize == data.len(),
			"data length ({}) does not match {width}x{height}x{channel_count}",
			data.len()
		);
		Ok(match channel_count {
			1 => DynamicImage::ImageLuma8(
				ImageBuffer::from_vec(width, height, data).ok_or_else(|| anyhow!("failed to build L8 buffer"))?,
			),
			2 => DynamicImage::ImageLumaA8(
				ImageBuffer::<LumaA<u8>, _>::from_vec(width, height, data)
					.ok_or_else(|| anyhow!("failed to build LA8 buffer"))?,
			),
			3 => DynamicImage::ImageRgb8(
				ImageBuffer::<Rgb<u8>, _>::from_vec(width, height, data).ok_or_else(|| anyhow!("failed to build RGB8 buffer"))?,
			),
			4 => DynamicImage::ImageRgba8(
				ImageBuffer::<Rgba<u8>, _>::from_vec(width, height, data)
					.ok_or_else(|| anyhow!("failed to build RGBA8 buffer"))?,
			),
			_ => bail!("unsupported channel count: {channel_count}"),
		})
	}

	fn to_bytes(&self, format: TileFormat) -> Result<Vec<u8>> {
		match format {
			TileFormat::Png => png::image2blob(self),
			TileFormat::Jpeg => jpeg::image2blob(self, None),
			TileFormat::Webp => webp::image2blob(self, None),
		}
	}

	fn from_bytes(bytes: &[u8], format: TileFormat) -> Result<DynamicImage> {
		match format {
			TileFormat::Png => png::blob2image(bytes),
			TileFormat::Jpeg => jpeg::blob2image(bytes),
			TileFormat::Webp => webp::blob2image(bytes),
		}
	}
}
