use anyhow::{Result, anyhow, ensure};
use num_traits::{Bounded, Float, NumCast, PrimInt};
use std::any::type_name;

/// Rounds a float and casts it to an integer type, erroring on non-finite
/// input or out-of-range results instead of silently wrapping or truncating.
pub fn float_to_int<F, I>(value: F) -> Result<I>
where
	F: Float,
	I: PrimInt + Bounded,
{
	ensure!(value.is_finite(), "Value must be finite");

	let n = value.round();

	let min_f: F = NumCast::from(I::min_value())
		.ok_or_else(|| anyhow!("Cannot represent {}::MIN in float type", type_name::<I>()))?;
	let max_f: F = NumCast::from(I::max_value())
		.ok_or_else(|| anyhow!("Cannot represent {}::MAX in float type", type_name::<I>()))?;

	ensure!(n >= min_f && n <= max_f, "Number out of range for {}", type_name::<I>());

	NumCast::from(n).ok_or_else(|| anyhow!("Failed converting rounded value to {}", type_name::<I>()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rounds_to_nearest() {
		let v: i32 = float_to_int(3.6).unwrap();
		assert_eq!(v, 4);
	}

	#[test]
	fn rejects_non_finite() {
		assert!(float_to_int::<f64, i32>(f64::NAN).is_err());
		assert!(float_to_int::<f64, i32>(f64::INFINITY).is_err());
	}

	#[test]
	fn rejects_out_of_range() {
		assert!(float_to_int::<f64, u8>(300.0).is_err());
	}
}
