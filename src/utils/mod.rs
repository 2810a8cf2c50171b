
/// Wraps `x` into `[0, modulus)`.  `rem_euclid` can return `modulus` itself for tiny negative inputs, so that case
/// is folded back to zero.
pub fn wrap_positive(x:f64, modulus:f64) -> f64 {
	let r = x.rem_euclid(modulus);
	if r >= modulus { 0.0 } else { r }
}

/// Wraps `x` into `[-modulus/2, modulus/2)`.  Used to compare two phases that live on the same circle.
pub fn wrap_symmetric(x:f64, modulus:f64) -> f64 {
	let half = 0.5 * modulus;
	wrap_positive(x + half, modulus) - half
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn wrap_positive_stays_in_range() {
		assert_eq!(wrap_positive(511.0, 511.0), 0.0);
		assert_eq!(wrap_positive(-1.0e-18, 511.0), 0.0);
		assert!((wrap_positive(-0.25, 1.0) - 0.75).abs() < 1.0e-12);
		assert!((wrap_positive(1022.5, 511.0) - 0.5).abs() < 1.0e-9);
	}

	#[test]
	fn wrap_symmetric_picks_shortest_distance() {
		assert!((wrap_symmetric(510.9, 511.0) + 0.1).abs() < 1.0e-9);
		assert!((wrap_symmetric(0.1, 511.0) - 0.1).abs() < 1.0e-12);
		assert!((wrap_symmetric(-0.6, 1.0) - 0.4).abs() < 1.0e-12);
	}

}
