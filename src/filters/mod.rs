use std::convert::TryFrom;

use serde::{Serialize, Deserialize};

/// A tracking loop filter.  Input is a discriminator error, output is the rate the NCO should run at, in whatever
/// units the error is expressed in per second (cycles -> Hz, chips -> chips/sec).
///
/// Memory is kept in those physical units, which means retuning the noise bandwidth only changes the gains; the
/// output for a zero error is the same before and after the switch.
pub trait ScalarFilter: Send {

	fn with_noise_bandwidth(bw_hz:f64, damping:f64) -> Self where Self: Sized;

	/// Runs one update with the given error over an update interval of `dt` seconds
	fn apply(&mut self, x:f64, dt:f64) -> f64;

	/// Output the filter would produce for zero error, i.e. its current rate estimate
	fn output(&self) -> f64;

	/// Clears the memory and presets the rate estimate
	fn initialize(&mut self, initial_output:f64);

	fn noise_bandwidth(&self) -> f64;
	fn set_noise_bandwidth(&mut self, bw_hz:f64);

	/// Adds a first-order frequency-lock correction straight into the rate memory
	fn assist(&mut self, rate_error:f64, gain:f64, dt:f64);

}

/// Natural frequency of a second order loop with noise bandwidth `bw_hz` and damping ratio `zeta`
pub fn natural_freq_2nd_order(bw_hz:f64, zeta:f64) -> f64 { (bw_hz * 8.0 * zeta) / (4.0 * zeta * zeta + 1.0) }

/// Natural frequency of the standard third order loop (a3=1.1, b3=2.4)
pub fn natural_freq_3rd_order(bw_hz:f64) -> f64 { bw_hz / 0.7845 }

pub const THIRD_ORDER_A3:f64 = 1.1;
pub const THIRD_ORDER_B3:f64 = 2.4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondOrderLoopFilter {
	pub bw_hz: f64,
	pub zeta: f64,
	pub wn: f64,
	pub rate: f64,
}

impl ScalarFilter for SecondOrderLoopFilter {

	fn with_noise_bandwidth(bw_hz:f64, zeta:f64) -> Self {
		Self{ bw_hz, zeta, wn: natural_freq_2nd_order(bw_hz, zeta), rate: 0.0 }
	}

	fn apply(&mut self, x:f64, dt:f64) -> f64 {
		self.rate += self.wn * self.wn * dt * x;
		self.rate + 2.0 * self.zeta * self.wn * x
	}

	fn output(&self) -> f64 { self.rate }

	fn initialize(&mut self, initial_output:f64) { self.rate = initial_output; }

	fn noise_bandwidth(&self) -> f64 { self.bw_hz }

	fn set_noise_bandwidth(&mut self, bw_hz:f64) {
		self.bw_hz = bw_hz;
		self.wn = natural_freq_2nd_order(bw_hz, self.zeta);
	}

	fn assist(&mut self, rate_error:f64, gain:f64, dt:f64) { self.rate += gain * dt * rate_error; }

}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThirdOrderLoopFilter {
	pub bw_hz: f64,
	pub wn: f64,
	pub rate_dot: f64,
	pub rate: f64,
}

impl ScalarFilter for ThirdOrderLoopFilter {

	fn with_noise_bandwidth(bw_hz:f64, _:f64) -> Self {
		Self{ bw_hz, wn: natural_freq_3rd_order(bw_hz), rate_dot: 0.0, rate: 0.0 }
	}

	fn apply(&mut self, x:f64, dt:f64) -> f64 {
		let wn2 = self.wn * self.wn;
		self.rate_dot += wn2 * self.wn * dt * x;
		self.rate     += dt * (self.rate_dot + THIRD_ORDER_A3 * wn2 * x);
		self.rate + THIRD_ORDER_B3 * self.wn * x
	}

	fn output(&self) -> f64 { self.rate }

	fn initialize(&mut self, initial_output:f64) {
		self.rate_dot = 0.0;
		self.rate     = initial_output;
	}

	fn noise_bandwidth(&self) -> f64 { self.bw_hz }

	fn set_noise_bandwidth(&mut self, bw_hz:f64) {
		self.bw_hz = bw_hz;
		self.wn = natural_freq_3rd_order(bw_hz);
	}

	fn assist(&mut self, rate_error:f64, gain:f64, dt:f64) { self.rate += gain * dt * rate_error; }

}

/// Order of the carrier loop filter; the code loop is always second order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LoopOrder {
	Second,
	Third,
}

impl Default for LoopOrder {
	fn default() -> Self { LoopOrder::Second }
}

impl TryFrom<u8> for LoopOrder {
	type Error = String;

	fn try_from(order:u8) -> Result<Self, Self::Error> {
		match order {
			2 => Ok(LoopOrder::Second),
			3 => Ok(LoopOrder::Third),
			n => Err(format!("loop filter order must be 2 or 3, got {}", n)),
		}
	}
}

impl From<LoopOrder> for u8 {
	fn from(order:LoopOrder) -> u8 {
		match order {
			LoopOrder::Second => 2,
			LoopOrder::Third  => 3,
		}
	}
}

#[cfg(test)]
mod tests;
