//! Resize/crop/alpha operations used by the base and overview tilers.

use super::info::DynamicImageTraitInfo;
use anyhow::{Result, bail};
use chart_derive::context;
use fast_image_resize::{FilterType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, imageops::overlay};

pub trait DynamicImageTraitOperation: DynamicImageTraitInfo {
	/// Returns a copy without an alpha channel (`Rgba8` -> `Rgb8`, `La8` -> `L8`).
	fn as_no_alpha(&self) -> Result<DynamicImage>;

	/// Crops the source region `(x, y, w, h)` in source pixel space and resamples it
	/// into a destination image of size `width_dst x height_dst`.
	fn get_extract(&self, x: f64, y: f64, w: f64, h: f64, width_dst: u32, height_dst: u32) -> Result<DynamicImage>;

	/// Downsamples by an integer `factor` using a box filter (used for 512 -> 256 overview composition).
	fn get_scaled_down(&self, factor: u32) -> Result<DynamicImage>;

	/// Sets every alpha value to 255 in place; a no-op on images without alpha.
	fn make_opaque(&mut self) -> Result<()>;

	/// Draws `top` over `self` in place at (0,0); both images must share dimensions.
	fn overlay(&mut self, top: &DynamicImage) -> Result<()>;
}

impl DynamicImageTraitOperation for DynamicImage {
	#[context("removing alpha from {:?} image", self.color())]
	fn as_no_alpha(&self) -> Result<DynamicImage> {
		Ok(match self {
			DynamicImage::ImageRgba8(_) => DynamicImage::from(self.to_rgb8()),
			DynamicImage::ImageLumaA8(_) => DynamicImage::from(self.to_luma8()),
			DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => self.clone(),
			_ => bail!("unsupported image type for removing alpha: {:?}", self.color()),
		})
	}

	#[context("extracting region ({:.1},{:.1},{:.1},{:.1}) from {}x{} into {}x{}", x, y, w, h, self.width(), self.height(), width_dst, height_dst)]
	fn get_extract(&self, x: f64, y: f64, w: f64, h: f64, width_dst: u32, height_dst: u32) -> Result<DynamicImage> {
		let mut dst_image = DynamicImage::new(width_dst, height_dst, self.color());
		Resizer::new().resize(self, &mut dst_image, &ResizeOptions::default().crop(x, y, w, h))?;
		Ok(dst_image)
	}

	#[context("downscaling {}x{} by factor {factor}", self.width(), self.height())]
	fn get_scaled_down(&self, factor: u32) -> Result<DynamicImage> {
		assert!(factor > 0, "scaling factor must be greater than zero");
		let mut dst_image = DynamicImage::new(self.width() / factor, self.height() / factor, self.color());
		Resizer::new().resize(
			self,
			&mut dst_image,
			&ResizeOptions::default().resize_alg(ResizeAlg::Convolution(FilterType::Box)),
		)?;
		Ok(dst_image)
	}

	#[context("forcing opacity for {:?} image", self.color())]
	fn make_opaque(&mut self) -> Result<()> {
		match self {
			DynamicImage::ImageRgba8(img) => {
				for p in img.pixels_mut() {
					p[3] = 255;
				}
			}
			DynamicImage::ImageLumaA8(img) => {
				for p in img.pixels_mut() {
					p[1] = 255;
				}
			}
			DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => {}
			_ => bail!("unsupported image type for forcing opacity: {:?}", self.color()),
		}
		Ok(())
	}

	#[context("overlaying {}x{} onto {}x{}", top.width(), top.height(), self.width(), self.height())]
	fn overlay(&mut self, top: &DynamicImage) -> Result<()> {
		self.ensure_same_size(top)?;
		overlay(self, top, 0, 0);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn rgba(w: u32, h: u32) -> DynamicImage {
		DynamicImage::ImageRgba8(image::RgbaImage::from_fn(w, h, |x, y| {
			image::Rgba([x as u8, y as u8, 0, 200])
		}))
	}

	#[test]
	fn as_no_alpha_drops_alpha() {
		let out = rgba(4, 4).as_no_alpha().unwrap();
		assert!(!out.has_alpha());
	}

	#[rstest]
	#[case(2, (256, 256))]
	#[case(4, (128, 128))]
	fn get_scaled_down_reduces_dimensions(#[case] factor: u32, #[case] expect: (u32, u32)) {
		let img = rgba(512, 512);
		let out = img.get_scaled_down(factor).unwrap();
		assert_eq!((out.width(), out.height()), expect);
	}

	#[test]
	fn make_opaque_forces_alpha_255() {
		let mut img = rgba(2, 2);
		img.make_opaque().unwrap();
		assert!(img.is_opaque());
	}

	#[test]
	fn overlay_requires_matching_size() {
		let mut a = rgba(4, 4);
		let b = rgba(2, 2);
		assert!(a.overlay(&b).is_err());
	}
}
