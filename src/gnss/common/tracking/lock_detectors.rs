use std::collections::VecDeque;

use num_complex::Complex;

/// Upper limit reported by the C/N0 estimator when the prompts carry no measurable noise
pub const CN0_DB_HZ_MAX:f64 = 100.0;

/// Signal-to-noise-variance C/N0 estimator over a buffer of prompts, in dB-Hz
pub fn cn0_svn_estimator(prompt_buffer:&VecDeque<Complex<f64>>, coh_integration_time_s:f64) -> f64 {
	if prompt_buffer.is_empty() || coh_integration_time_s <= 0.0 { return 0.0; }
	let n:f64 = prompt_buffer.len() as f64;
	let p_sig:f64 = {
		let sum:f64 = prompt_buffer.iter().map(|c| c.re.abs()).sum();
		(sum / n).powi(2)
	};
	let p_tot:f64 = {
		let sum:f64 = prompt_buffer.iter().map(|c| c.norm_sqr()).sum();
		sum / n
	};

	// No input at all is no signal, not a noiseless one
	if p_tot <= 0.0 { return 0.0; }
	let p_noise = p_tot - p_sig;
	if p_noise <= 0.0 { return CN0_DB_HZ_MAX; }
	let snr = p_sig / p_noise;
	if snr <= 0.0 { return 0.0; }
	(10.0 * snr.log10() - 10.0 * coh_integration_time_s.log10()).min(CN0_DB_HZ_MAX)
}

/// Cosine of twice the carrier phase error estimated over the buffer; near 1.0 when the carrier loop is locked
pub fn carrier_lock_detector(prompt_buffer:&VecDeque<Complex<f64>>) -> f64 {
	let tmp_sum_i:f64 = prompt_buffer.iter().map(|c| c.re).sum();
	let tmp_sum_q:f64 = prompt_buffer.iter().map(|c| c.im).sum();
	let nbp:f64 = tmp_sum_i * tmp_sum_i + tmp_sum_q * tmp_sum_q;
	let nbd:f64 = tmp_sum_i * tmp_sum_i - tmp_sum_q * tmp_sum_q;
	if nbp > 0.0 { nbd / nbp } else { 0.0 }
}

/// Exponentially weighted moving average.  The first value seeds the average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ewma {
	alpha: f64,
	value: Option<f64>,
}

impl Ewma {

	pub fn new(alpha:f64) -> Self { Self { alpha, value: None } }

	pub fn update(&mut self, x:f64) -> f64 {
		let next = match self.value {
			Some(v) => v + self.alpha * (x - v),
			None    => x,
		};
		self.value = Some(next);
		next
	}

	pub fn value(&self) -> Option<f64> { self.value }

	pub fn reset(&mut self) { self.value = None; }

}

#[cfg(test)]
mod tests {

	use super::*;

	use rand::prelude::*;
	use rand_distr::Normal;

	#[test]
	fn cn0_estimate_tracks_the_true_value() {
		// Prompt amplitude A and per-component noise sigma over T=1 ms: C/N0 = A^2 / (2 sigma^2 T)
		let mut rng = StdRng::seed_from_u64(1234);
		let sigma = 1.0;
		let t = 1.0e-3;
		for cn0_true in &[35.0, 40.0, 45.0] {
			let amp = (2.0 * sigma * sigma * t * 10.0_f64.powf(cn0_true / 10.0)).sqrt();
			let noise = Normal::new(0.0, sigma).unwrap();
			let mut estimates:Vec<f64> = vec![];
			for _ in 0..50 {
				let buffer:VecDeque<Complex<f64>> = (0..20).map(|k| {
					let bit = if (k / 10) % 2 == 0 { 1.0 } else { -1.0 };
					Complex{ re: bit * amp + noise.sample(&mut rng), im: noise.sample(&mut rng) }
				}).collect();
				estimates.push(cn0_svn_estimator(&buffer, t));
			}
			let mean:f64 = estimates.iter().sum::<f64>() / (estimates.len() as f64);
			assert!((mean - cn0_true).abs() < 1.5, "true={} mean={}", cn0_true, mean);
		}
	}

	#[test]
	fn noiseless_prompts_hit_the_cap() {
		let buffer:VecDeque<Complex<f64>> = (0..20).map(|k| Complex{ re: if k % 3 == 0 { -5.0 } else { 5.0 }, im: 0.0 }).collect();
		assert_eq!(cn0_svn_estimator(&buffer, 1.0e-3), CN0_DB_HZ_MAX);
		assert!((carrier_lock_detector(&buffer) - 1.0).abs() < 1.0e-12);
		assert_eq!(cn0_svn_estimator(&VecDeque::new(), 1.0e-3), 0.0);
	}

	#[test]
	fn silent_prompts_report_no_signal() {
		let zeros:VecDeque<Complex<f64>> = (0..20).map(|_| Complex{ re: 0.0, im: 0.0 }).collect();
		assert_eq!(cn0_svn_estimator(&zeros, 1.0e-3), 0.0);
		assert_eq!(carrier_lock_detector(&zeros), 0.0);
	}

	#[test]
	fn lock_detector_sees_quadrature_as_unlocked() {
		let buffer:VecDeque<Complex<f64>> = (0..20).map(|_| Complex{ re: 0.0, im: 3.0 }).collect();
		assert!((carrier_lock_detector(&buffer) + 1.0).abs() < 1.0e-12);
	}

	#[test]
	fn ewma_seeds_then_smooths() {
		let mut avg = Ewma::new(0.25);
		assert_eq!(avg.value(), None);
		assert_eq!(avg.update(8.0), 8.0);
		assert_eq!(avg.update(0.0), 6.0);
		avg.reset();
		assert_eq!(avg.update(1.0), 1.0);
	}

}
