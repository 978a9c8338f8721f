use std::str::FromStr;

/// Resampling algorithms mirroring GDAL's `GDALResampleAlg` constants, as named
/// by the `--reproject-resampling`/`--tile-resampling` CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleAlg {
	NearestNeighbour,
	Bilinear,
	Cubic,
	CubicSpline,
	Lanczos,
	Average,
	Mode,
}

impl ResampleAlg {
	#[must_use]
	pub fn as_gdal(self) -> u32 {
		use ResampleAlg::*;
		use gdal_sys::GDALResampleAlg::*;
		match self {
			NearestNeighbour => GRA_NearestNeighbour,
			Bilinear => GRA_Bilinear,
			Cubic => GRA_Cubic,
			CubicSpline => GRA_CubicSpline,
			Lanczos => GRA_Lanczos,
			Average => GRA_Average,
			Mode => GRA_Mode,
		}
	}
}

impl Default for ResampleAlg {
	fn default() -> Self {
		ResampleAlg::Bilinear
	}
}

impl FromStr for ResampleAlg {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		use ResampleAlg::*;
		Ok(match s {
			"nearest" => NearestNeighbour,
			"bilinear" => Bilinear,
			"cubic" => Cubic,
			"cubicspline" => CubicSpline,
			"lanczos" => Lanczos,
			"average" => Average,
			"mode" => Mode,
			_ => anyhow::bail!("unknown resampling algorithm: {s}"),
		})
	}
}
