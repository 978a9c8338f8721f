use std::str::FromStr;

/// Output tile encoder, selected by the `--format` CLI flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
	Png,
	Jpeg,
	Webp,
}

impl TileFormat {
	#[must_use]
	pub fn extension(self) -> &'static str {
		match self {
			TileFormat::Png => "png",
			TileFormat::Jpeg => "jpeg",
			TileFormat::Webp => "webp",
		}
	}

	/// JPEG has no alpha channel; the tilers must flatten/drop alpha before encoding.
	#[must_use]
	pub fn supports_alpha(self) -> bool {
		!matches!(self, TileFormat::Jpeg)
	}
}

impl FromStr for TileFormat {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"png" => Ok(TileFormat::Png),
			"jpeg" | "jpg" => Ok(TileFormat::Jpeg),
			"webp" => Ok(TileFormat::Webp),
			_ => Err(anyhow::anyhow!("unknown tile format: {s}")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn jpeg_does_not_support_alpha() {
		assert!(!TileFormat::Jpeg.supports_alpha());
		assert!(TileFormat::Png.supports_alpha());
		assert!(TileFormat::Webp.supports_alpha());
	}

	#[test]
	fn parses_known_names() {
		assert_eq!("png".parse::<TileFormat>().unwrap(), TileFormat::Png);
		assert_eq!("jpeg".parse::<TileFormat>().unwrap(), TileFormat::Jpeg);
		assert!("tiff".parse::<TileFormat>().is_err());
	}
}
