use std::f64::consts;

use num_complex::Complex;

use crate::DigSigProcErr;

use super::correlator::CorrelationResult;

/// Folds an angle into [-pi/2, pi/2], which removes the 180 degree ambiguity caused by data modulation
pub fn costas_fold(angle:f64) -> f64 {
	if angle > consts::FRAC_PI_2 { angle - consts::PI }
	else if angle < -consts::FRAC_PI_2 { angle + consts::PI }
	else { angle }
}

/// Normalized early-minus-late envelope discriminator.  Output is the code error in chips (incoming minus local)
/// inside the linear region, for an early-late spacing of `spacing` chips either side of prompt.
pub fn dll_nelp(corr:&CorrelationResult, spacing:f64, epsilon:f64) -> Result<f64, DigSigProcErr> {
	let e:f64 = corr.early.norm();
	let l:f64 = corr.late.norm();
	if e + l < epsilon { return Err(DigSigProcErr::NumericDegeneracy); }
	Ok((1.0 - spacing) * (l - e) / (l + e))
}

/// Costas arctangent of the prompt, in radians.  Insensitive to the sign of the data bit.
pub fn pll_costas(corr:&CorrelationResult, epsilon:f64) -> Result<f64, DigSigProcErr> {
	let p = corr.prompt;
	if p.norm() < epsilon { return Err(DigSigProcErr::NumericDegeneracy); }
	Ok(costas_fold(p.im.atan2(p.re)))
}

/// Frequency error in Hz from two prompts `dt` seconds apart, using the cross and dot products.  The angle is
/// folded like the Costas discriminator so a data transition between the two prompts doesn't register as a
/// half-cycle jump.
pub fn fll_cross_dot(prev:Complex<f64>, curr:Complex<f64>, dt:f64, epsilon:f64) -> Result<f64, DigSigProcErr> {
	if prev.norm() * curr.norm() < epsilon || dt <= 0.0 { return Err(DigSigProcErr::NumericDegeneracy); }
	let cross = prev.re * curr.im - prev.im * curr.re;
	let dot   = prev.re * curr.re + prev.im * curr.im;
	Ok(costas_fold(cross.atan2(dot)) / (2.0 * consts::PI * dt))
}
