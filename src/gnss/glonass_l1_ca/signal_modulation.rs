
use num_complex::Complex;

use super::CODE_LENGTH;

/// The GLONASS L1 C/A ranging code as logic levels.  Nine stage shift register, polynomial 1 + x^5 + x^9, all ones
/// at the start of each period, output taken from the seventh stage.
pub fn ca_code_bits() -> Vec<bool> {
	let mut register:[bool; 9] = [true; 9];
	(0..CODE_LENGTH).map(|_| {
		let out = register[2];
		let feedback = register[4] ^ register[0];
		for idx in 0..8 { register[idx] = register[idx+1]; }
		register[8] = feedback;
		out
	}).collect()
}

/// Logic 0 maps to +1 and logic 1 to -1
pub fn ca_code_int() -> Vec<i8> {
	ca_code_bits().into_iter().map(|b| if b { -1 } else { 1 }).collect()
}

pub fn ca_code_f64() -> Vec<f64> {
	ca_code_int().into_iter().map(|x| x as f64).collect()
}

pub fn ca_code_complex() -> Vec<Complex<f64>> {
	ca_code_int().into_iter().map(|x| Complex{ re: x as f64, im: 0.0 }).collect()
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn code_is_a_full_length_m_sequence() {
		let code = ca_code_int();
		assert_eq!(code.len(), 511);

		// 256 ones and 255 zeros
		let sum:i32 = code.iter().map(|x| *x as i32).sum();
		assert_eq!(sum, -1);

		// Two-valued periodic autocorrelation
		for shift in 1..511 {
			let r:i32 = (0..511).map(|i| (code[i] as i32) * (code[(i + shift) % 511] as i32)).sum();
			assert_eq!(r, -1, "shift {}", shift);
		}
	}

	#[test]
	fn code_starts_from_all_ones_register() {
		let bits = ca_code_bits();
		// The first seven outputs shift the initial ones out of the seventh stage
		assert!(bits[..7].iter().all(|b| *b));
		assert_eq!(ca_code_complex()[0], Complex{ re: -1.0, im: 0.0 });
	}

}
