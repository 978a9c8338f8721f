//! WebP encoder/decoder for tile images. Only 8-bit RGB/RGBA is supported.
//!
//! `quality >= 100` selects lossless encoding via `image`'s own WebP encoder;
//! otherwise lossy encoding goes through `libwebp` via the `webp` crate.

use crate::traits::{DynamicImageTraitInfo, DynamicImageTraitOperation};
use anyhow::{Result, anyhow, bail};
use image::{DynamicImage, ImageFormat, codecs::webp::WebPEncoder, load_from_memory_with_format};

pub fn encode(image: &DynamicImage, quality: Option<u8>) -> Result<Vec<u8>> {
	if image.bits_per_value() != 8 {
		bail!("webp only supports 8-bit images");
	}
	if !matches!(image.channel_count(), 3 | 4) {
		bail!("webp only supports RGB or RGBA images");
	}

	let optional_image = if image.has_alpha() && image.is_opaque() { Some(image.as_no_alpha()?) } else { None };
	let image_ref = optional_image.as_ref().unwrap_or(image);

	let quality = quality.unwrap_or(90);
	if quality >= 100 {
		let mut result: Vec<u8> = vec![];
		let encoder = WebPEncoder::new_lossless(&mut result);
		encoder.encode(
			image_ref.as_bytes(),
			image_ref.width(),
			image_ref.height(),
			image_ref.extended_color_type(),
		)?;
		Ok(result)
	} else {
		let encoder = webp::Encoder::from_image(image_ref).map_err(|e| anyhow!("{e}"))?;
		Ok(
			encoder
				.encode_simple(false, f32::from(quality))
				.map_err(|e| anyhow!("{e:?}"))?
				.to_vec(),
		)
	}
}

pub fn image2blob(image: &DynamicImage, quality: Option<u8>) -> Result<Vec<u8>> {
	encode(image, quality)
}

pub fn blob2image(bytes: &[u8]) -> Result<DynamicImage> {
	load_from_memory_with_format(bytes, ImageFormat::WebP).map_err(|e| anyhow!("failed to decode WebP image: {e}"))
}
