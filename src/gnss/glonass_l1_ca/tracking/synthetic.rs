use std::f64::consts;

use byteorder::{LittleEndian, WriteBytesExt};
use num_complex::Complex;
use rand::prelude::*;
use rand_distr::Normal;

use crate::gnss::glonass_l1_ca::{self, signal_modulation};
use crate::utils::wrap_positive;

/// Baseband GLONASS L1 C/A generator centred on frequency channel zero, with complex Gaussian noise.
/// Symbol edges fall on multiples of ten epochs counted from sample zero.
pub struct SyntheticSignal {
	pub fs: f64,
	pub samples_per_epoch: usize,
	pub frequency_channel: i8,
	pub code_phase0_chips: f64,
	pub carrier_phase0_rad: f64,
	pub doppler_hz: f64,
	pub amplitude: f64,
	pub noise_sigma: f64,
	pub alternating_symbols: bool,
	code: Vec<f64>,
	sample_idx: u64,
	rng: StdRng,
}

impl SyntheticSignal {

	pub fn new(fs:f64, samples_per_epoch:usize, frequency_channel:i8, code_phase0_chips:f64, doppler_hz:f64, seed:u64) -> Self {
		Self {
			fs, samples_per_epoch, frequency_channel, code_phase0_chips, doppler_hz,
			carrier_phase0_rad: 0.7,
			amplitude: 1.0,
			noise_sigma: 0.0,
			alternating_symbols: false,
			code: signal_modulation::ca_code_f64(),
			sample_idx: 0,
			rng: StdRng::seed_from_u64(seed),
		}
	}

	/// Sets amplitude and noise for a given C/N0 with unit noise per component
	pub fn with_cn0(mut self, cn0_db_hz:f64) -> Self {
		self.noise_sigma = 1.0;
		// C/N0 = A^2 fs / (2 sigma^2)
		self.amplitude = (2.0 * 10.0_f64.powf(cn0_db_hz / 10.0) / self.fs).sqrt();
		self
	}

	pub fn code_rate_cps(&self) -> f64 {
		let carrier = glonass_l1_ca::CARRIER_FREQ_HZ + (self.frequency_channel as f64) * glonass_l1_ca::CHANNEL_SPACING_HZ;
		glonass_l1_ca::CODE_RATE_CPS * (1.0 + self.doppler_hz / carrier)
	}

	pub fn carrier_freq_hz(&self) -> f64 {
		(self.frequency_channel as f64) * glonass_l1_ca::CHANNEL_SPACING_HZ + self.doppler_hz
	}

	/// Code phase of the incoming signal at a given sample
	pub fn true_code_phase(&self, sample:u64) -> f64 {
		wrap_positive(self.code_phase0_chips + self.code_rate_cps() * (sample as f64) / self.fs, glonass_l1_ca::CODE_LENGTH as f64)
	}

	pub fn next_epoch(&mut self) -> Vec<Complex<f64>> {
		let noise = Normal::new(0.0, 1.0).unwrap();
		let code_rate = self.code_rate_cps();
		let carrier_freq = self.carrier_freq_hz();
		let symbol_samples = (self.samples_per_epoch * glonass_l1_ca::SYMBOL_PERIOD_MS) as u64;

		let mut out:Vec<Complex<f64>> = Vec::with_capacity(self.samples_per_epoch);
		for _ in 0..self.samples_per_epoch {
			let n = self.sample_idx;
			let t = (n as f64) / self.fs;
			let chip = wrap_positive(self.code_phase0_chips + code_rate * t, 511.0).floor() as usize;
			let symbol = if self.alternating_symbols && (n / symbol_samples) % 2 == 1 { -1.0 } else { 1.0 };
			let cycles = wrap_positive(carrier_freq * t, 1.0);
			let phase = 2.0 * consts::PI * cycles + self.carrier_phase0_rad;
			let mut x = Complex{ re: phase.cos(), im: phase.sin() } * (self.amplitude * symbol * self.code[chip % 511]);
			if self.noise_sigma > 0.0 {
				x += Complex{ re: noise.sample(&mut self.rng), im: noise.sample(&mut self.rng) } * self.noise_sigma;
			}
			out.push(x);
			self.sample_idx += 1;
		}
		out
	}

	pub fn next_epoch_gr_complex(&mut self) -> Vec<Complex<f32>> {
		self.next_epoch().into_iter().map(|c| Complex{ re: c.re as f32, im: c.im as f32 }).collect()
	}

	/// Little-endian interleaved float32 bytes
	pub fn next_epoch_bytes(&mut self) -> Vec<u8> {
		let mut raw:Vec<u8> = Vec::with_capacity(self.samples_per_epoch * 8);
		for c in self.next_epoch_gr_complex() {
			raw.write_f32::<LittleEndian>(c.re).unwrap();
			raw.write_f32::<LittleEndian>(c.im).unwrap();
		}
		raw
	}

	/// Little-endian interleaved int16 bytes, scaled by `scale`
	pub fn next_epoch_cshort_bytes(&mut self, scale:f64) -> Vec<u8> {
		let mut raw:Vec<u8> = Vec::with_capacity(self.samples_per_epoch * 4);
		for c in self.next_epoch() {
			raw.write_i16::<LittleEndian>((c.re * scale).round() as i16).unwrap();
			raw.write_i16::<LittleEndian>((c.im * scale).round() as i16).unwrap();
		}
		raw
	}

}
