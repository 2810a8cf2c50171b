
use super::common::tracking::config::SignalSpec;

pub mod signal_modulation;
pub mod tracking;

pub const CODE_RATE_CPS:f64 = 511.0e3;
pub const CODE_LENGTH:usize = 511;
pub const CODE_PERIOD_S:f64 = 1.0e-3;
pub const CARRIER_FREQ_HZ:f64 = 1602.0e6;
pub const CHANNEL_SPACING_HZ:f64 = 562.5e3;
pub const MIN_FREQUENCY_CHANNEL:i8 = -7;
pub const MAX_FREQUENCY_CHANNEL:i8 = 6;
pub const SYMBOL_PERIOD_MS:usize = 10;

pub fn signal_spec() -> SignalSpec {
	SignalSpec {
		name: "GLONASS L1 C/A",
		code: signal_modulation::ca_code_f64(),
		code_rate_cps: CODE_RATE_CPS,
		carrier_freq_hz: CARRIER_FREQ_HZ,
		channel_spacing_hz: CHANNEL_SPACING_HZ,
		min_frequency_channel: MIN_FREQUENCY_CHANNEL,
		max_frequency_channel: MAX_FREQUENCY_CHANNEL,
		symbol_period_ms: SYMBOL_PERIOD_MS,
	}
}
