
use crate::DigSigProcErr;
use crate::gnss::common::tracking::{self, AcquisitionAssist, TrackingChannel};
use crate::gnss::common::tracking::config::{ChannelConfig, ConfigOverrides, TrackingConfig};
use crate::gnss::glonass_l1_ca;

/// Validates a tracking configuration against the GLONASS L1 C/A signal
pub fn resolve_config(cfg:TrackingConfig, overrides:&ConfigOverrides) -> Result<ChannelConfig, DigSigProcErr> {
	cfg.resolve(overrides, glonass_l1_ca::signal_spec())
}

/// Builds a GLONASS L1 C/A tracking channel with the given channel number
pub fn new_channel(cfg:TrackingConfig, overrides:&ConfigOverrides, channel:usize) -> Result<Box<dyn TrackingChannel>, DigSigProcErr> {
	let resolved = resolve_config(cfg, overrides)?;
	let mut ch = tracking::new_tracking_channel(&resolved);
	ch.set_channel(channel);
	Ok(ch)
}

/// Acquisition assist from a GLONASS acquisition result given as a code delay in samples
pub fn assist_from_acquisition(delay_samples:f64, doppler_hz:f64, sample_stamp:u64, frequency_channel:i8, fs:f64) -> AcquisitionAssist {
	AcquisitionAssist::from_delay_samples(delay_samples, doppler_hz, sample_stamp, frequency_channel, fs, &glonass_l1_ca::signal_spec())
}

#[cfg(test)]
pub(crate) mod synthetic;
