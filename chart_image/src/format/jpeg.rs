//! JPEG encoder/decoder for tile images. Only 8-bit Grey/RGB (no alpha) is supported.

use crate::traits::DynamicImageTraitInfo;
use anyhow::{Result, anyhow, bail};
use chart_derive::context;
use image::{DynamicImage, ImageEncoder, ImageFormat, codecs::jpeg::JpegEncoder, load_from_memory_with_format};

#[context("encoding {}x{} {:?} as JPEG (q={:?})", image.width(), image.height(), image.color(), quality)]
pub fn encode(image: &DynamicImage, quality: Option<u8>) -> Result<Vec<u8>> {
	if image.bits_per_value() != 8 {
		bail!("JPEG only supports 8-bit images");
	}

	let quality = quality.unwrap_or(90);
	if quality >= 100 {
		bail!("JPEG does not support lossless compression, use a quality < 100");
	}

	if !matches!(image.channel_count(), 1 | 3) {
		bail!("JPEG only supports Grey or RGB images without alpha channel");
	}

	let mut buffer: Vec<u8> = Vec::new();
	JpegEncoder::new_with_quality(&mut buffer, quality).write_image(
		image.as_bytes(),
		image.width(),
		image.height(),
		image.extended_color_type(),
	)?;

	Ok(buffer)
}

#[context("encoding image {:?} as JPEG (q={:?})", image.color(), quality)]
pub fn image2blob(image: &DynamicImage, quality: Option<u8>) -> Result<Vec<u8>> {
	encode(image, quality)
}

#[context("decoding JPEG image ({} bytes)", bytes.len())]
pub fn blob2image(bytes: &[u8]) -> Result<DynamicImage> {
	load_from_memory_with_format(bytes, ImageFormat::Jpeg).map_err(|e| anyhow!("failed to decode JPEG image: {e}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rgb() -> DynamicImage {
		DynamicImage::ImageRgb8(image::RgbImage::from_fn(8, 8, |x, y| image::Rgb([x as u8, y as u8, 0])))
	}

	fn rgba() -> DynamicImage {
		DynamicImage::ImageRgba8(image::RgbaImage::from_fn(8, 8, |x, y| image::Rgba([x as u8, y as u8, 0, 255])))
	}

	#[test]
	fn encodes_and_decodes_rgb() {
		let img = rgb();
		let blob = image2blob(&img, None).unwrap();
		let decoded = blob2image(&blob).unwrap();
		assert_eq!(decoded.width(), 8);
	}

	#[test]
	fn rejects_alpha_images() {
		assert!(image2blob(&rgba(), None).is_err());
	}

	#[test]
	fn rejects_lossless_quality() {
		assert!(image2blob(&rgb(), Some(100)).is_err());
	}
}
