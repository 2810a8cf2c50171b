use std::ops::{Add, AddAssign};

use num_complex::Complex;
use serde::{Serialize, Deserialize};

use crate::types::IqSample;

use super::replica::{ReplicaGenerator, ReplicaParameters};

const ZERO:Complex<f64> = Complex{ re: 0.0, im: 0.0 };

/// Correlator outputs for one integration period.  `input_power` is the summed power of the carrier-wiped input,
/// which is what the correlation power is normalized against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
	pub very_early: Option<Complex<f64>>,
	pub early:  Complex<f64>,
	pub prompt: Complex<f64>,
	pub late:   Complex<f64>,
	pub very_late: Option<Complex<f64>>,
	pub input_power: f64,
	pub num_samples: usize,
	pub num_epochs: usize,
}

impl Default for CorrelationResult {
	fn default() -> Self {
		Self { very_early: None, early: ZERO, prompt: ZERO, late: ZERO, very_late: None, input_power: 0.0, num_samples: 0, num_epochs: 0 }
	}
}

fn add_opt(a:Option<Complex<f64>>, b:Option<Complex<f64>>) -> Option<Complex<f64>> {
	match (a, b) {
		(Some(x), Some(y)) => Some(x + y),
		(x, None) => x,
		(None, y) => y,
	}
}

impl Add for CorrelationResult {
	type Output = CorrelationResult;

	fn add(self, other:CorrelationResult) -> CorrelationResult {
		CorrelationResult {
			very_early:  add_opt(self.very_early, other.very_early),
			early:       self.early  + other.early,
			prompt:      self.prompt + other.prompt,
			late:        self.late   + other.late,
			very_late:   add_opt(self.very_late, other.very_late),
			input_power: self.input_power + other.input_power,
			num_samples: self.num_samples + other.num_samples,
			num_epochs:  self.num_epochs  + other.num_epochs,
		}
	}
}

impl AddAssign for CorrelationResult {
	fn add_assign(&mut self, other:CorrelationResult) { *self = *self + other; }
}

impl CorrelationResult {

	/// Normalized correlation power |P|^2 / sum(|x|^2).  About 1.0 with noise only, about 1 + C/N0*T with a signal
	/// present, and equal to the number of samples for a clean, aligned signal.
	pub fn power_ratio(&self) -> f64 {
		if self.input_power > 0.0 { self.prompt.norm_sqr() / self.input_power } else { 0.0 }
	}

}

/// Multiplies each sample by the carrier wipe-off and the early, prompt and late (and optionally very-early and
/// very-late) code replicas, and sums over the epoch.  Per-sample phases are computed from the epoch's starting
/// phase so there is no accumulated rounding inside an epoch.
pub fn correlate<S: IqSample>(params:&ReplicaParameters, replica:&ReplicaGenerator, block:&[S]) -> CorrelationResult {
	let code_inc    = params.code_rate_cps / replica.fs();
	let carrier_inc = params.carrier_freq_hz / replica.fs();
	let d = params.early_late_spacing_chips;

	let mut early  = ZERO;
	let mut prompt = ZERO;
	let mut late   = ZERO;
	let mut very_early = ZERO;
	let mut very_late  = ZERO;
	let mut input_power:f64 = 0.0;

	for (k, s) in block.iter().enumerate() {
		let kf = k as f64;
		let code_phase = params.code_phase_chips + code_inc * kf;
		let x = s.to_complex() * ReplicaGenerator::carrier_wipeoff(params.carrier_phase_cycles + carrier_inc * kf);
		input_power += x.norm_sqr();

		early  += x * replica.code_at(code_phase - d);
		prompt += x * replica.code_at(code_phase);
		late   += x * replica.code_at(code_phase + d);

		if let Some(dv) = params.very_early_late_spacing_chips {
			very_early += x * replica.code_at(code_phase - dv);
			very_late  += x * replica.code_at(code_phase + dv);
		}
	}

	let (very_early, very_late) = match params.very_early_late_spacing_chips {
		Some(_) => (Some(very_early), Some(very_late)),
		None    => (None, None),
	};

	CorrelationResult { very_early, early, prompt, late, very_late, input_power, num_samples: block.len(), num_epochs: 1 }
}

/// Sums consecutive epochs for extended coherent integration, up to a fixed number of epochs per cycle
#[derive(Debug, Clone)]
pub struct CoherentAccumulator {
	sum: CorrelationResult,
	target_epochs: usize,
}

impl CoherentAccumulator {

	pub fn new() -> Self { Self { sum: CorrelationResult::default(), target_epochs: 1 } }

	pub fn is_empty(&self) -> bool { self.sum.num_epochs == 0 }
	pub fn len(&self) -> usize { self.sum.num_epochs }
	pub fn target_epochs(&self) -> usize { self.target_epochs }

	/// Sets the length of the next cycle.  Only takes effect between cycles.
	pub fn set_target_epochs(&mut self, n:usize) {
		if self.is_empty() { self.target_epochs = n.max(1); }
	}

	/// True if adding an epoch with this prompt would flip the sign of the in-phase sum, i.e. a symbol edge landed
	/// inside the accumulation
	pub fn sign_inconsistent(&self, epoch:&CorrelationResult) -> bool {
		!self.is_empty() && (self.sum.prompt.re > 0.0) != (epoch.prompt.re > 0.0)
	}

	/// Adds one epoch.  Returns the accumulated result once the cycle is complete.
	pub fn push(&mut self, epoch:CorrelationResult) -> Option<CorrelationResult> {
		self.sum += epoch;
		if self.sum.num_epochs >= self.target_epochs {
			Some(std::mem::take(&mut self.sum))
		} else {
			None
		}
	}

	/// Throws away a partially accumulated cycle
	pub fn discard(&mut self) {
		self.sum = CorrelationResult::default();
	}

}

impl Default for CoherentAccumulator {
	fn default() -> Self { Self::new() }
}
