//! PNG encoder/decoder for tile images.
//!
//! Lossless. Accepts 8-bit L8/La8/Rgb8/Rgba8. Fully-opaque images are saved without
//! their alpha channel to save bytes.

use crate::traits::{DynamicImageTraitInfo, DynamicImageTraitOperation};
use anyhow::{Result, anyhow, bail};
use chart_derive::context;
use image::{DynamicImage, ImageEncoder, ImageFormat, codecs::png, load_from_memory_with_format};

#[context("encoding {}x{} {:?} as PNG", image.width(), image.height(), image.color())]
pub fn encode(image: &DynamicImage) -> Result<Vec<u8>> {
	if image.bits_per_value() != 8 {
		bail!("png only supports 8-bit images");
	}
	if image.channel_count() < 1 || image.channel_count() > 4 {
		bail!("png only supports Grey, GreyA, RGB or RGBA");
	}

	let optional_image = if image.has_alpha() && image.is_opaque() { Some(image.as_no_alpha()?) } else { None };
	let image_ref = optional_image.as_ref().unwrap_or(image);

	let mut buffer: Vec<u8> = Vec::new();
	png::PngEncoder::new_with_quality(&mut buffer, png::CompressionType::Default, png::FilterType::Adaptive).write_image(
		image_ref.as_bytes(),
		image_ref.width(),
		image_ref.height(),
		image_ref.extended_color_type(),
	)?;

	Ok(buffer)
}

#[context("encoding image {:?} as PNG", image.color())]
pub fn image2blob(image: &DynamicImage) -> Result<Vec<u8>> {
	encode(image)
}

#[context("decoding PNG image ({} bytes)", bytes.len())]
pub fn blob2image(bytes: &[u8]) -> Result<DynamicImage> {
	load_from_memory_with_format(bytes, ImageFormat::Png).map_err(|e| anyhow!("failed to decode PNG image: {e}"))
}
