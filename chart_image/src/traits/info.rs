//! Metadata and comparison helpers for `DynamicImage`, layered on top of `image`'s own API.

use anyhow::{Result, ensure};
use image::{DynamicImage, ExtendedColorType};

/// Utilities to inspect/compare tile images and reason about alpha.
pub trait DynamicImageTraitInfo {
	/// Number of bits per single channel value (always 8 for the formats this crate handles).
	fn bits_per_value(&self) -> u8;

	/// Number of channels: 1 (grey), 2 (grey+alpha), 3 (RGB) or 4 (RGBA).
	fn channel_count(&self) -> u8;

	/// Per-channel difference score against `other`: `ceil(10 * SSE_i / N) / 10`.
	/// Errors if the images differ in size or color model.
	fn diff(&self, other: &DynamicImage) -> Result<Vec<f64>>;

	/// Ensures both images share the same dimensions and color model.
	fn ensure_same_meta(&self, other: &DynamicImage) -> Result<()>;

	/// Ensures both images share the same dimensions.
	fn ensure_same_size(&self, other: &DynamicImage) -> Result<()>;

	/// Maps the color type to its `ExtendedColorType`, e.g. `L8`, `La8`, `Rgb8`, `Rgba8`.
	fn extended_color_type(&self) -> ExtendedColorType;

	/// True when the image has an alpha channel and every pixel's alpha is 0.
	fn is_empty(&self) -> bool;

	/// True when the image has no alpha channel, or every pixel's alpha is 255.
	fn is_opaque(&self) -> bool;

	/// Iterates over the raw pixel byte slices (one slice per pixel).
	fn iter_pixels(&self) -> impl Iterator<Item = &[u8]>;
}

impl DynamicImageTraitInfo for DynamicImage {
	fn bits_per_value(&self) -> u8 {
		(self.color().bits_per_pixel() / u16::from(self.color().channel_count())) as u8
	}

	fn channel_count(&self) -> u8 {
		self.color().channel_count()
	}

	fn diff(&self, other: &DynamicImage) -> Result<Vec<f64>> {
		self.ensure_same_meta(other)?;
		let channels = self.color().channel_count() as usize;
		let mut sqr_sum = vec![0u64; channels];
		for (p1, p2) in self.iter_pixels().zip(other.iter_pixels()) {
			for i in 0..channels {
				let d = i64::from(p1[i]) - i64::from(p2[i]);
				sqr_sum[i] += (d * d) as u64;
			}
		}
		let n = f64::from(self.width() * self.height());
		Ok(sqr_sum.iter().map(|v| (10.0 * (*v as f64) / n).ceil() / 10.0).collect())
	}

	fn ensure_same_meta(&self, other: &DynamicImage) -> Result<()> {
		self.ensure_same_size(other)?;
		ensure!(
			self.color() == other.color(),
			"pixel value type mismatch: self has {:?}, other has {:?}",
			self.color(),
			other.color()
		);
		Ok(())
	}

	fn ensure_same_size(&self, other: &DynamicImage) -> Result<()> {
		ensure!(
			self.width() == other.width() && self.height() == other.height(),
			"image size mismatch: self is {}x{}, other is {}x{}",
			self.width(),
			self.height(),
			other.width(),
			other.height()
		);
		Ok(())
	}

	fn extended_color_type(&self) -> ExtendedColorType {
		self.color().into()
	}

	fn is_empty(&self) -> bool {
		if !self.color().has_alpha() {
			return false;
		}
		let a = (self.color().channel_count() - 1) as usize;
		self.iter_pixels().all(|p| p[a] == 0)
	}

	fn is_opaque(&self) -> bool {
		if !self.color().has_alpha() {
			return true;
		}
		let a = (self.color().channel_count() - 1) as usize;
		self.iter_pixels().all(|p| p[a] == 255)
	}

	fn iter_pixels(&self) -> impl Iterator<Item = &[u8]> {
		use image::EncodableLayout;
		match self {
			DynamicImage::ImageLuma8(img) => img.as_bytes().chunks_exact(1),
			DynamicImage::ImageLumaA8(img) => img.as_bytes().chunks_exact(2),
			DynamicImage::ImageRgb8(img) => img.as_bytes().chunks_exact(3),
			DynamicImage::ImageRgba8(img) => img.as_bytes().chunks_exact(4),
			_ => panic!("unsupported image type for pixel iteration: {:?}", self.color()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_rgba8(alpha: u8) -> DynamicImage {
		DynamicImage::ImageRgba8(image::RgbaImage::from_fn(4, 3, |x, y| {
			image::Rgba([x as u8, y as u8, (x + y) as u8, alpha])
		}))
	}

	#[test]
	fn bits_and_channels() {
		let img = sample_rgba8(255);
		assert_eq!(img.bits_per_value(), 8);
		assert_eq!(img.channel_count(), 4);
	}

	#[test]
	fn empty_and_opaque() {
		assert!(sample_rgba8(0).is_empty());
		assert!(!sample_rgba8(0).is_opaque());
		assert!(!sample_rgba8(255).is_empty());
		assert!(sample_rgba8(255).is_opaque());
	}

	#[test]
	fn diff_is_zero_for_identical_images() {
		let a = sample_rgba8(200);
		let b = sample_rgba8(200);
		assert_eq!(a.diff(&b).unwrap(), vec![0.0; 4]);
	}

	#[test]
	fn size_mismatch_errors() {
		let a = sample_rgba8(255);
		let b = DynamicImage::ImageRgba8(image::RgbaImage::new(5, 3));
		assert!(a.ensure_same_size(&b).is_err());
	}
}
