use std::f64::consts;

use num_complex::Complex;
use serde::{Serialize, Deserialize};

use crate::utils::wrap_positive;

/// Everything the correlator needs to rebuild the local replicas for one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicaParameters {
	pub code_rate_cps: f64,
	pub carrier_freq_hz: f64,
	pub code_phase_chips: f64,
	pub carrier_phase_cycles: f64,
	pub early_late_spacing_chips: f64,
	pub very_early_late_spacing_chips: Option<f64>,
}

/// Code and carrier NCOs.  Phases are kept wrapped (code modulo the code length, carrier modulo one cycle) and only
/// ever move forward by whole epochs, so consecutive epochs see one continuous replica.
#[derive(Debug, Clone)]
pub struct ReplicaGenerator {
	code: Vec<f64>,
	code_len_chips: f64,
	fs: f64,
	code_phase: f64,
	carrier_phase: f64,
	code_rate_cps: f64,
	carrier_freq_hz: f64,
	early_late_spacing: f64,
	very_early_late_spacing: Option<f64>,
}

impl ReplicaGenerator {

	pub fn new(code:Vec<f64>, fs:f64, early_late_spacing:f64, very_early_late_spacing:Option<f64>) -> Self {
		let code_len_chips = code.len() as f64;
		Self { code, code_len_chips, fs, code_phase: 0.0, carrier_phase: 0.0, code_rate_cps: 0.0, carrier_freq_hz: 0.0,
			early_late_spacing, very_early_late_spacing }
	}

	pub fn code_len_chips(&self) -> f64 { self.code_len_chips }
	pub fn code_phase_chips(&self) -> f64 { self.code_phase }
	pub fn carrier_phase_cycles(&self) -> f64 { self.carrier_phase }
	pub fn code_rate_cps(&self) -> f64 { self.code_rate_cps }
	pub fn carrier_freq_hz(&self) -> f64 { self.carrier_freq_hz }

	pub fn reset(&mut self, code_phase_chips:f64, carrier_phase_cycles:f64) {
		self.code_phase    = wrap_positive(code_phase_chips, self.code_len_chips);
		self.carrier_phase = wrap_positive(carrier_phase_cycles, 1.0);
	}

	pub fn set_rates(&mut self, code_rate_cps:f64, carrier_freq_hz:f64) {
		self.code_rate_cps   = code_rate_cps;
		self.carrier_freq_hz = carrier_freq_hz;
	}

	pub fn parameters(&self) -> ReplicaParameters {
		ReplicaParameters {
			code_rate_cps: self.code_rate_cps,
			carrier_freq_hz: self.carrier_freq_hz,
			code_phase_chips: self.code_phase,
			carrier_phase_cycles: self.carrier_phase,
			early_late_spacing_chips: self.early_late_spacing,
			very_early_late_spacing_chips: self.very_early_late_spacing,
		}
	}

	/// Value of the spreading code at an arbitrary (possibly unwrapped) code phase
	pub fn code_at(&self, phase_chips:f64) -> f64 {
		let idx = wrap_positive(phase_chips, self.code_len_chips).floor() as usize;
		self.code[idx % self.code.len()]
	}

	/// Conjugate carrier used to wipe off the incoming carrier at a given carrier phase
	pub fn carrier_wipeoff(phase_cycles:f64) -> Complex<f64> {
		let (sin, cos) = (2.0 * consts::PI * phase_cycles).sin_cos();
		Complex{ re: cos, im: -sin }
	}

	/// Moves both NCOs forward by `n` samples at the current rates
	pub fn advance(&mut self, n:usize) {
		let p = self.parameters();
		let dt = (n as f64) / self.fs;
		self.code_phase    = wrap_positive(p.code_phase_chips + p.code_rate_cps * dt, self.code_len_chips);
		self.carrier_phase = wrap_positive(p.carrier_phase_cycles + p.carrier_freq_hz * dt, 1.0);
	}

	pub fn fs(&self) -> f64 { self.fs }

}
