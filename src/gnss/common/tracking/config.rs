use log::{info, warn};
use serde::{Serialize, Deserialize};

use crate::DigSigProcErr;
use crate::filters::LoopOrder;
use crate::types::ItemType;

/// Per-channel tracking settings, as read from a receiver configuration file.  Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
	pub item_type: ItemType,
	pub sampling_rate_sps: f64,

	pub pll_bw_hz: f64,
	pub pll_bw_narrow_hz: f64,
	pub dll_bw_hz: f64,
	pub dll_bw_narrow_hz: f64,
	pub fll_bw_hz: f64,
	pub enable_fll_pull_in: bool,
	pub pll_order: LoopOrder,
	pub damping_ratio: f64,

	pub early_late_space_chips: f64,
	pub very_early_late_space_chips: Option<f64>,
	pub extend_correlation_ms: usize,

	pub dump: bool,
	pub dump_filename: String,

	pub lock_power_threshold: f64,
	pub loss_power_threshold: f64,
	pub lock_epochs: usize,
	pub loss_epochs: usize,
	pub transition_epochs: usize,
	pub max_pull_in_epochs: usize,
	pub power_smoothing: f64,
	pub max_code_error_chips: f64,
	pub max_carrier_error_rad: f64,
	pub cn0_samples: usize,
	pub discriminator_epsilon: f64,
	pub max_block_truncation_samples: f64,
}

impl Default for TrackingConfig {
	fn default() -> Self {
		Self {
			item_type: ItemType::GrComplex,
			sampling_rate_sps: 2_048_000.0,
			pll_bw_hz: 50.0,
			pll_bw_narrow_hz: 20.0,
			dll_bw_hz: 2.0,
			dll_bw_narrow_hz: 2.0,
			fll_bw_hz: 10.0,
			enable_fll_pull_in: false,
			pll_order: LoopOrder::Second,
			damping_ratio: 0.7,
			early_late_space_chips: 0.5,
			very_early_late_space_chips: None,
			extend_correlation_ms: 1,
			dump: false,
			dump_filename: "./track_ch".to_string(),
			lock_power_threshold: 4.0,
			loss_power_threshold: 2.5,
			lock_epochs: 20,
			loss_epochs: 50,
			transition_epochs: 20,
			max_pull_in_epochs: 3000,
			power_smoothing: 0.05,
			max_code_error_chips: 0.35,
			max_carrier_error_rad: 0.7,
			cn0_samples: 20,
			discriminator_epsilon: 1.0e-9,
			max_block_truncation_samples: 0.5,
		}
	}
}

/// Command-line overrides of the wide loop bandwidths.  `None` leaves the configured value alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigOverrides {
	pub pll_bw_hz: Option<f64>,
	pub dll_bw_hz: Option<f64>,
}

/// Signal-specific constants the generic tracking core needs
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
	pub name: &'static str,
	/// One period of the ranging code, +1/-1 per chip
	pub code: Vec<f64>,
	pub code_rate_cps: f64,
	/// Carrier of frequency channel zero
	pub carrier_freq_hz: f64,
	/// FDMA spacing between adjacent frequency channels; zero for CDMA signals
	pub channel_spacing_hz: f64,
	pub min_frequency_channel: i8,
	pub max_frequency_channel: i8,
	pub symbol_period_ms: usize,
}

impl SignalSpec {

	pub fn code_len_chips(&self) -> f64 { self.code.len() as f64 }

	pub fn code_period_s(&self) -> f64 { self.code_len_chips() / self.code_rate_cps }

	pub fn check_frequency_channel(&self, k:i8) -> Result<(), DigSigProcErr> {
		if k < self.min_frequency_channel || k > self.max_frequency_channel {
			Err(DigSigProcErr::Configuration(format!("{} frequency channel {} outside [{}, {}]",
				self.name, k, self.min_frequency_channel, self.max_frequency_channel)))
		} else { Ok(()) }
	}

	/// Carrier frequency of frequency channel `k`
	pub fn carrier_freq_for_channel_hz(&self, k:i8) -> f64 { self.carrier_freq_hz + (k as f64) * self.channel_spacing_hz }

	/// Offset of frequency channel `k` from the channel-zero carrier, i.e. where it sits in a baseband recording
	/// centred on channel zero
	pub fn channel_offset_hz(&self, k:i8) -> f64 { (k as f64) * self.channel_spacing_hz }

}

/// A validated configuration, ready to build a channel from
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
	pub config: TrackingConfig,
	pub signal: SignalSpec,
	pub samples_per_epoch: usize,
	pub epoch_duration_s: f64,
	pub max_coherent_epochs: usize,
}

fn config_err<T>(msg:String) -> Result<T, DigSigProcErr> { Err(DigSigProcErr::Configuration(msg)) }

fn require_positive(name:&str, x:f64) -> Result<(), DigSigProcErr> {
	if x > 0.0 && x.is_finite() { Ok(()) } else { config_err(format!("{} must be positive, got {}", name, x)) }
}

impl TrackingConfig {

	pub fn from_json(s:&str) -> Result<Self, DigSigProcErr> {
		serde_json::from_str(s).map_err(|e| DigSigProcErr::Configuration(format!("unable to parse tracking config: {}", e)))
	}

	/// Applies the overrides and checks everything that can be checked before a channel exists
	pub fn resolve(mut self, overrides:&ConfigOverrides, signal:SignalSpec) -> Result<ChannelConfig, DigSigProcErr> {
		if let Some(bw) = overrides.pll_bw_hz {
			info!("PLL bandwidth overridden: {} Hz -> {} Hz", self.pll_bw_hz, bw);
			self.pll_bw_hz = bw;
		}
		if let Some(bw) = overrides.dll_bw_hz {
			info!("DLL bandwidth overridden: {} Hz -> {} Hz", self.dll_bw_hz, bw);
			self.dll_bw_hz = bw;
		}

		require_positive("sampling_rate_sps", self.sampling_rate_sps)?;
		require_positive("code rate", signal.code_rate_cps)?;
		if signal.code.is_empty() { return config_err(format!("{} has an empty ranging code", signal.name)); }
		require_positive("pll_bw_hz", self.pll_bw_hz)?;
		require_positive("pll_bw_narrow_hz", self.pll_bw_narrow_hz)?;
		require_positive("dll_bw_hz", self.dll_bw_hz)?;
		require_positive("dll_bw_narrow_hz", self.dll_bw_narrow_hz)?;
		require_positive("fll_bw_hz", self.fll_bw_hz)?;
		require_positive("damping_ratio", self.damping_ratio)?;
		require_positive("early_late_space_chips", self.early_late_space_chips)?;
		if self.early_late_space_chips >= 1.0 {
			return config_err(format!("early_late_space_chips must be below one chip, got {}", self.early_late_space_chips));
		}
		if let Some(ve) = self.very_early_late_space_chips {
			if !(ve > self.early_late_space_chips) {
				return config_err(format!("very_early_late_space_chips ({}) must exceed early_late_space_chips ({})", ve, self.early_late_space_chips));
			}
		}
		// Narrowing only ever tightens the loops
		if self.pll_bw_narrow_hz > self.pll_bw_hz {
			return config_err(format!("pll_bw_narrow_hz ({}) above pll_bw_hz ({})", self.pll_bw_narrow_hz, self.pll_bw_hz));
		}
		if self.dll_bw_narrow_hz > self.dll_bw_hz {
			return config_err(format!("dll_bw_narrow_hz ({}) above dll_bw_hz ({})", self.dll_bw_narrow_hz, self.dll_bw_hz));
		}
		require_positive("lock_power_threshold", self.lock_power_threshold)?;
		require_positive("loss_power_threshold", self.loss_power_threshold)?;
		if self.loss_power_threshold > self.lock_power_threshold {
			return config_err(format!("loss_power_threshold ({}) above lock_power_threshold ({})", self.loss_power_threshold, self.lock_power_threshold));
		}
		if !(self.power_smoothing > 0.0 && self.power_smoothing <= 1.0) {
			return config_err(format!("power_smoothing must be in (0, 1], got {}", self.power_smoothing));
		}
		require_positive("max_code_error_chips", self.max_code_error_chips)?;
		require_positive("max_carrier_error_rad", self.max_carrier_error_rad)?;
		require_positive("discriminator_epsilon", self.discriminator_epsilon)?;
		if self.lock_epochs == 0 || self.loss_epochs == 0 {
			return config_err("lock_epochs and loss_epochs must be at least one".to_string());
		}
		if self.max_pull_in_epochs < self.lock_epochs {
			return config_err(format!("max_pull_in_epochs ({}) shorter than lock_epochs ({})", self.max_pull_in_epochs, self.lock_epochs));
		}
		if self.cn0_samples < 2 {
			return config_err(format!("cn0_samples must be at least 2, got {}", self.cn0_samples));
		}

		let ext = self.extend_correlation_ms;
		if ext == 0 || signal.symbol_period_ms % ext != 0 {
			return config_err(format!("extend_correlation_ms ({}) must divide the {} ms symbol", ext, signal.symbol_period_ms));
		}

		// Epoch length is fixed for the life of the channel
		let nominal_samples = self.sampling_rate_sps * signal.code_period_s();
		let samples_per_epoch = nominal_samples.round() as usize;
		if samples_per_epoch == 0 {
			return config_err(format!("sampling rate {} sps gives an empty epoch", self.sampling_rate_sps));
		}
		let truncation = (nominal_samples - samples_per_epoch as f64).abs();
		if truncation > self.max_block_truncation_samples {
			warn!("Epoch length truncated by {:.3} samples ({} sps, {} samples per epoch); code phase will be biased",
				truncation, self.sampling_rate_sps, samples_per_epoch);
		}
		let epoch_duration_s = (samples_per_epoch as f64) / self.sampling_rate_sps;

		// Loop stability: noise bandwidth times update interval well below one half
		let check_bnt = |name:&str, bw:f64, t:f64| -> Result<(), DigSigProcErr> {
			if bw * t >= 0.5 { config_err(format!("{} of {} Hz is unstable with a {} s update interval", name, bw, t)) } else { Ok(()) }
		};
		let t_ext = epoch_duration_s * (ext as f64);
		check_bnt("pll_bw_hz", self.pll_bw_hz, epoch_duration_s)?;
		check_bnt("dll_bw_hz", self.dll_bw_hz, epoch_duration_s)?;
		check_bnt("fll_bw_hz", self.fll_bw_hz, epoch_duration_s)?;
		check_bnt("pll_bw_narrow_hz", self.pll_bw_narrow_hz, t_ext)?;
		check_bnt("dll_bw_narrow_hz", self.dll_bw_narrow_hz, t_ext)?;

		Ok(ChannelConfig { config: self, signal, samples_per_epoch, epoch_duration_s, max_coherent_epochs: ext })
	}

}
