use std::collections::VecDeque;
use std::f64::consts;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use num_complex::Complex;
use serde::{Serialize, Deserialize};

use crate::DigSigProcErr;
use crate::block::{BlockFunctionality, BlockResult};
use crate::filters::{LoopOrder, ScalarFilter, SecondOrderLoopFilter, ThirdOrderLoopFilter};
use crate::types::{self, IqSample, ItemType};
use crate::utils::wrap_positive;

pub mod config;
pub mod correlator;
pub mod discriminators;
pub mod lock_detectors;
pub mod observable;
pub mod replica;
pub mod state;

use self::config::{ChannelConfig, SignalSpec};
use self::correlator::{CoherentAccumulator, CorrelationResult};
pub use self::observable::{DiagnosticsSink, EpochDiagnostics, JsonLinesSink, Observable};
use self::replica::ReplicaGenerator;
use self::state::{EpochMetrics, LockSettings, LockStateMachine, LoopErrors, TrackingPhase};

/// Coarse code phase and Doppler from acquisition, valid at `sample_stamp`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionAssist {
	pub code_phase_chips: f64,
	pub doppler_hz: f64,
	pub sample_stamp: u64,
	#[serde(default)]
	pub frequency_channel: i8,
}

impl AcquisitionAssist {

	/// Acquisition usually reports where the next code period begins, as a delay in samples from `sample_stamp`
	pub fn from_delay_samples(delay_samples:f64, doppler_hz:f64, sample_stamp:u64, frequency_channel:i8, fs:f64, signal:&SignalSpec) -> Self {
		let code_rate = aided_code_rate(signal, frequency_channel, doppler_hz);
		let code_phase_chips = wrap_positive(-delay_samples * code_rate / fs, signal.code_len_chips());
		Self { code_phase_chips, doppler_hz, sample_stamp, frequency_channel }
	}

	/// The same assist moved to another sample, assuming the Doppler holds over the gap
	pub fn propagated(&self, sample:u64, fs:f64, signal:&SignalSpec) -> Self {
		let dt = (sample as f64 - self.sample_stamp as f64) / fs;
		let code_rate = aided_code_rate(signal, self.frequency_channel, self.doppler_hz);
		let code_phase_chips = wrap_positive(self.code_phase_chips + code_rate * dt, signal.code_len_chips());
		Self { code_phase_chips, sample_stamp: sample, ..*self }
	}

}

/// Chipping rate scaled by the carrier Doppler
pub fn aided_code_rate(signal:&SignalSpec, frequency_channel:i8, doppler_hz:f64) -> f64 {
	signal.code_rate_cps * (1.0 + doppler_hz / signal.carrier_freq_for_channel_hz(frequency_channel))
}

/// Symbol synchronization status, supplied by whatever sits downstream of tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolSync {
	Unknown,
	Synchronized,
	Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackingControl {
	Start(AcquisitionAssist),
	Stop,
	SymbolSync(SymbolSync),
}

/// Snapshot of a channel's loop state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
	pub channel: usize,
	pub sample_counter: u64,
	pub frequency_channel: i8,
	pub code_phase_chips: f64,
	pub carrier_phase_rad: f64,
	pub doppler_hz: f64,
	pub coherent_ms: usize,
	pub pll_bw_hz: f64,
	pub dll_bw_hz: f64,
	pub phase: TrackingPhase,
	pub locked: bool,
}

/// Object-safe face of a tracking channel.  The sample type and loop order are fixed when the channel is built.
pub trait TrackingChannel: Send {
	fn set_channel(&mut self, channel:usize);
	fn channel(&self) -> usize;
	fn item_size(&self) -> usize;
	fn samples_per_epoch(&self) -> usize;
	fn start_tracking(&mut self, assist:&AcquisitionAssist) -> Result<(), DigSigProcErr>;
	fn stop_tracking(&mut self);
	fn report_symbol_sync(&mut self, sync:SymbolSync);
	/// Processes exactly one epoch of raw little-endian interleaved samples
	fn process_epoch_bytes(&mut self, raw:&[u8]) -> Result<Option<Observable>, DigSigProcErr>;
	fn state(&self) -> TrackingState;
	fn debug(&self) -> Option<EpochDiagnostics>;
}

/// Closed-loop code and carrier tracking of one signal.  `S` is the input sample type and `F` the carrier loop
/// filter; the code loop is always second order and carrier aided.
pub struct Tracking<S: IqSample, F: ScalarFilter> {
	channel: usize,
	cfg: ChannelConfig,

	replica: ReplicaGenerator,
	carrier_filter: F,
	code_filter: SecondOrderLoopFilter,
	lock: LockStateMachine,
	accumulator: CoherentAccumulator,
	symbol_sync: SymbolSync,

	frequency_channel: i8,
	intermediate_freq_hz: f64,
	doppler_hz: f64,
	accumulated_carrier_phase_rad: f64,
	sample_counter: u64,

	prev_prompt: Option<Complex<f64>>,
	prompt_buffer: VecDeque<Complex<f64>>,
	prompt_buffer_epochs: usize,
	cn0_db_hz: f64,
	carrier_lock_test: f64,
	last_prompt: Complex<f64>,
	last_coherent_epochs: usize,

	sink: Option<Box<dyn DiagnosticsSink>>,
	last_diagnostics: Option<EpochDiagnostics>,
	scratch: Vec<S>,
}

impl<S: IqSample, F: ScalarFilter> Tracking<S, F> {

	pub fn new(cfg:&ChannelConfig) -> Self {
		let c = &cfg.config;
		let replica = ReplicaGenerator::new(cfg.signal.code.clone(), c.sampling_rate_sps,
			c.early_late_space_chips, c.very_early_late_space_chips);
		Self {
			channel: 0,
			replica,
			carrier_filter: F::with_noise_bandwidth(c.pll_bw_hz, c.damping_ratio),
			code_filter: SecondOrderLoopFilter::with_noise_bandwidth(c.dll_bw_hz, c.damping_ratio),
			lock: LockStateMachine::new(LockSettings::from(c)),
			accumulator: CoherentAccumulator::new(),
			symbol_sync: SymbolSync::Unknown,
			frequency_channel: 0,
			intermediate_freq_hz: 0.0,
			doppler_hz: 0.0,
			accumulated_carrier_phase_rad: 0.0,
			sample_counter: 0,
			prev_prompt: None,
			prompt_buffer: VecDeque::with_capacity(c.cn0_samples),
			prompt_buffer_epochs: 1,
			cn0_db_hz: 0.0,
			carrier_lock_test: 0.0,
			last_prompt: Complex{ re: 0.0, im: 0.0 },
			last_coherent_epochs: 1,
			sink: None,
			last_diagnostics: None,
			scratch: Vec::with_capacity(cfg.samples_per_epoch),
			cfg: cfg.clone(),
		}
	}

	pub fn phase(&self) -> TrackingPhase { self.lock.phase() }
	pub fn sample_counter(&self) -> u64 { self.sample_counter }
	pub fn symbol_sync(&self) -> SymbolSync { self.symbol_sync }

	fn fs(&self) -> f64 { self.cfg.config.sampling_rate_sps }

	fn open_sink(&mut self) {
		if !self.cfg.config.dump { return; }
		let path = format!("{}{}.jsonl", self.cfg.config.dump_filename, self.channel);
		match JsonLinesSink::open(&path) {
			Ok(sink) => {
				info!("Channel {}: dumping tracking diagnostics to {}", self.channel, path);
				self.sink = Some(Box::new(sink));
			},
			Err(e) => warn!("Channel {}: unable to open dump file {}: {}", self.channel, path, e),
		}
	}

	/// Routes diagnostics to an arbitrary sink instead of the configured dump file
	pub fn set_diagnostics_sink(&mut self, sink:Box<dyn DiagnosticsSink>) { self.sink = Some(sink); }

	pub fn start(&mut self, assist:&AcquisitionAssist) -> Result<(), DigSigProcErr> {
		self.cfg.signal.check_frequency_channel(assist.frequency_channel)?;
		let fs = self.fs();
		let assist = assist.propagated(self.sample_counter, fs, &self.cfg.signal);

		self.frequency_channel = assist.frequency_channel;
		self.intermediate_freq_hz = self.cfg.signal.channel_offset_hz(assist.frequency_channel);
		self.doppler_hz = assist.doppler_hz;

		self.replica.reset(assist.code_phase_chips, 0.0);
		self.replica.set_rates(aided_code_rate(&self.cfg.signal, self.frequency_channel, self.doppler_hz),
			self.intermediate_freq_hz + self.doppler_hz);

		let c = &self.cfg.config;
		self.carrier_filter.set_noise_bandwidth(c.pll_bw_hz);
		self.carrier_filter.initialize(self.doppler_hz);
		self.code_filter.set_noise_bandwidth(c.dll_bw_hz);
		self.code_filter.initialize(0.0);

		self.accumulator.discard();
		self.accumulator.set_target_epochs(1);
		self.symbol_sync = SymbolSync::Unknown;
		self.accumulated_carrier_phase_rad = 0.0;
		self.prev_prompt = None;
		self.prompt_buffer.clear();
		self.prompt_buffer_epochs = 1;
		self.cn0_db_hz = 0.0;
		self.carrier_lock_test = 0.0;
		self.last_coherent_epochs = 1;
		self.last_diagnostics = None;

		self.lock.start();
		self.open_sink();

		info!("Channel {}: tracking started, k={} code phase {:.3} chips, Doppler {:.1} Hz at sample {}",
			self.channel, self.frequency_channel, assist.code_phase_chips, self.doppler_hz, self.sample_counter);
		Ok(())
	}

	pub fn stop(&mut self) {
		self.accumulator.discard();
		self.accumulator.set_target_epochs(1);
		self.symbol_sync = SymbolSync::Unknown;
		self.lock.stop();
		if let Some(sink) = self.sink.as_mut() {
			if let Err(e) = sink.flush() {
				warn!("Channel {}: unable to flush diagnostics: {}", self.channel, e);
			}
		}
		if self.cfg.config.dump { self.sink = None; }
		info!("Channel {}: tracking stopped at sample {}", self.channel, self.sample_counter);
	}

	pub fn set_symbol_sync(&mut self, sync:SymbolSync) {
		if sync != self.symbol_sync {
			debug!("Channel {}: symbol sync {:?} -> {:?}", self.channel, self.symbol_sync, sync);
			self.symbol_sync = sync;
		}
	}

	fn extension_allowed(&self) -> bool {
		self.lock.phase() == TrackingPhase::Locked && self.symbol_sync == SymbolSync::Synchronized
	}

	fn coherent_ms(&self, epochs:usize) -> usize {
		((epochs as f64) * self.cfg.epoch_duration_s * 1000.0).round() as usize
	}

	fn observable(&self, valid:bool) -> Observable {
		let phase = self.lock.phase();
		Observable {
			channel: self.channel,
			sample_counter: self.sample_counter,
			code_phase_chips: self.replica.code_phase_chips(),
			code_rate_cps: self.replica.code_rate_cps(),
			carrier_phase_rad: 2.0 * consts::PI * self.replica.carrier_phase_cycles(),
			accumulated_carrier_phase_rad: self.accumulated_carrier_phase_rad,
			doppler_hz: self.doppler_hz,
			prompt_i: self.last_prompt.re,
			prompt_q: self.last_prompt.im,
			power_ratio: self.lock.smoothed_power(),
			cn0_db_hz: self.cn0_db_hz,
			carrier_lock_test: self.carrier_lock_test,
			coherent_ms: self.coherent_ms(self.last_coherent_epochs),
			phase,
			locked: phase == TrackingPhase::Locked,
			valid,
		}
	}

	fn absorb_degenerate(&self, what:&str, r:Result<f64, DigSigProcErr>) -> f64 {
		match r {
			Ok(x) => x,
			Err(e) => {
				debug!("Channel {}: {} discriminator {:?} at sample {}, using zero", self.channel, what, e, self.sample_counter);
				0.0
			}
		}
	}

	/// Closes a coherent integration cycle: runs the discriminators and loop filters and retunes the NCOs
	fn close_cycle(&mut self, sum:&CorrelationResult) -> LoopErrors {
		let c = &self.cfg.config;
		let eps = c.discriminator_epsilon;
		let pdi = (sum.num_samples as f64) / c.sampling_rate_sps;

		let code_err = self.absorb_degenerate("code", discriminators::dll_nelp(sum, c.early_late_space_chips, eps));
		let carrier_err = self.absorb_degenerate("carrier", discriminators::pll_costas(sum, eps));

		if c.enable_fll_pull_in && self.lock.phase() == TrackingPhase::PullIn {
			if let Some(prev) = self.prev_prompt {
				let freq_err = self.absorb_degenerate("frequency", discriminators::fll_cross_dot(prev, sum.prompt, pdi, eps));
				self.carrier_filter.assist(freq_err, 4.0 * c.fll_bw_hz, pdi);
			}
		}
		self.prev_prompt = Some(sum.prompt);

		self.doppler_hz = self.carrier_filter.apply(carrier_err / (2.0 * consts::PI), pdi);
		let code_correction = self.code_filter.apply(code_err, pdi);
		let code_rate = aided_code_rate(&self.cfg.signal, self.frequency_channel, self.doppler_hz) + code_correction;
		self.replica.set_rates(code_rate, self.intermediate_freq_hz + self.doppler_hz);

		// C/N0 and lock test only make sense over prompts of the same length
		if sum.num_epochs != self.prompt_buffer_epochs {
			self.prompt_buffer.clear();
			self.prompt_buffer_epochs = sum.num_epochs;
		}
		self.prompt_buffer.push_back(sum.prompt);
		while self.prompt_buffer.len() > c.cn0_samples { self.prompt_buffer.pop_front(); }
		if self.prompt_buffer.len() >= c.cn0_samples {
			self.cn0_db_hz = lock_detectors::cn0_svn_estimator(&self.prompt_buffer, pdi);
			self.carrier_lock_test = lock_detectors::carrier_lock_detector(&self.prompt_buffer);
		}

		self.last_prompt = sum.prompt;
		self.last_coherent_epochs = sum.num_epochs;

		trace!("Channel {}: cycle of {} epochs, code err {:.4} chips, carrier err {:.4} rad, Doppler {:.2} Hz, code rate {:.3} cps",
			self.channel, sum.num_epochs, code_err, carrier_err, self.doppler_hz, code_rate);

		LoopErrors { code_chips: code_err, carrier_rad: carrier_err }
	}

	/// Runs one epoch.  Returns an observable whenever a coherent integration cycle completes, and on every epoch
	/// while the channel is idle or has lost lock.
	pub fn process_epoch(&mut self, block:&[S]) -> Result<Option<Observable>, DigSigProcErr> {
		let n = self.cfg.samples_per_epoch;
		if block.len() < n {
			return Err(DigSigProcErr::Underrun{ needed: n, supplied: block.len() });
		}
		if block.len() > n {
			return Err(DigSigProcErr::Other("more samples than one epoch"));
		}

		if !self.lock.phase().is_active() {
			self.sample_counter += n as u64;
			return Ok(Some(self.observable(false)));
		}

		let params = self.replica.parameters();
		let epoch = correlator::correlate(&params, &self.replica, block);
		let dt = (n as f64) / self.fs();
		self.replica.advance(n);
		self.accumulated_carrier_phase_rad += 2.0 * consts::PI * self.doppler_hz * dt;
		self.sample_counter += n as u64;

		// A symbol edge inside the accumulation means the symbol alignment is not what it was reported to be
		if self.accumulator.sign_inconsistent(&epoch) {
			debug!("Channel {}: prompt sign flipped inside a {} epoch accumulation at sample {}, dropping extension",
				self.channel, self.accumulator.len(), self.sample_counter);
			self.accumulator.discard();
			self.symbol_sync = SymbolSync::Ambiguous;
		}
		if !self.accumulator.is_empty() && !self.extension_allowed() {
			self.accumulator.discard();
		}
		if self.accumulator.is_empty() {
			let target = if self.extension_allowed() { self.cfg.max_coherent_epochs } else { 1 };
			self.accumulator.set_target_epochs(target);
		}

		let cycle = self.accumulator.push(epoch);
		let errors = match &cycle {
			Some(sum) => Some(self.close_cycle(sum)),
			None => None,
		};

		let update = self.lock.update(&EpochMetrics{ power_ratio: epoch.power_ratio(), errors });
		if update.bandwidths.pll_hz != self.carrier_filter.noise_bandwidth() {
			self.carrier_filter.set_noise_bandwidth(update.bandwidths.pll_hz);
		}
		if update.bandwidths.dll_hz != self.code_filter.noise_bandwidth() {
			self.code_filter.set_noise_bandwidth(update.bandwidths.dll_hz);
		}
		if update.changed() {
			match update.phase {
				TrackingPhase::Locked => info!("Channel {}: locked at sample {}, C/N0 {:.1} dB-Hz", self.channel, self.sample_counter, self.cn0_db_hz),
				TrackingPhase::LossOfLock => {
					warn!("Channel {}: loss of lock at sample {} (was {})", self.channel, self.sample_counter, update.previous);
					self.accumulator.discard();
				},
				_ => (),
			}
		}

		self.record_diagnostics(&epoch, errors, update.smoothed_power);

		if !update.phase.is_active() {
			Ok(Some(self.observable(false)))
		} else if cycle.is_some() {
			Ok(Some(self.observable(true)))
		} else {
			Ok(None)
		}
	}

	fn record_diagnostics(&mut self, epoch:&CorrelationResult, errors:Option<LoopErrors>, smoothed_power:f64) {
		let pair = |c:Complex<f64>| (c.re, c.im);
		let bw = self.lock.bandwidths();
		let diag = EpochDiagnostics {
			channel: self.channel,
			sample_counter: self.sample_counter,
			phase: self.lock.phase(),
			early: pair(epoch.early),
			prompt: pair(epoch.prompt),
			late: pair(epoch.late),
			very_early: epoch.very_early.map(pair),
			very_late: epoch.very_late.map(pair),
			power_ratio: epoch.power_ratio(),
			smoothed_power,
			code_error_chips: errors.map(|e| e.code_chips),
			carrier_error_rad: errors.map(|e| e.carrier_rad),
			code_freq_cps: self.replica.code_rate_cps(),
			carrier_doppler_hz: self.doppler_hz,
			pll_bw_hz: bw.pll_hz,
			dll_bw_hz: bw.dll_hz,
			coherent_epochs: self.accumulator.target_epochs(),
		};

		let failed = match self.sink.as_mut() {
			Some(sink) => sink.record(&diag).err(),
			None => None,
		};
		if let Some(e) = failed {
			warn!("Channel {}: diagnostics sink failed ({}), no further diagnostics will be written", self.channel, e);
			self.sink = None;
		}

		self.last_diagnostics = Some(diag);
	}

}

impl<S: IqSample, F: ScalarFilter> TrackingChannel for Tracking<S, F> {

	fn set_channel(&mut self, channel:usize) { self.channel = channel; }
	fn channel(&self) -> usize { self.channel }
	fn item_size(&self) -> usize { S::ITEM_SIZE }
	fn samples_per_epoch(&self) -> usize { self.cfg.samples_per_epoch }

	fn start_tracking(&mut self, assist:&AcquisitionAssist) -> Result<(), DigSigProcErr> { self.start(assist) }
	fn stop_tracking(&mut self) { self.stop() }
	fn report_symbol_sync(&mut self, sync:SymbolSync) { self.set_symbol_sync(sync) }

	fn process_epoch_bytes(&mut self, raw:&[u8]) -> Result<Option<Observable>, DigSigProcErr> {
		let needed = self.cfg.samples_per_epoch;
		let supplied = raw.len() / S::ITEM_SIZE;
		if supplied < needed {
			return Err(DigSigProcErr::Underrun{ needed, supplied });
		}
		if raw.len() > needed * S::ITEM_SIZE {
			return Err(DigSigProcErr::Other("more samples than one epoch"));
		}

		let mut scratch = std::mem::take(&mut self.scratch);
		types::decode_samples(&raw[..needed * S::ITEM_SIZE], &mut scratch);
		let result = self.process_epoch(&scratch);
		self.scratch = scratch;
		result
	}

	fn state(&self) -> TrackingState {
		let bw = self.lock.bandwidths();
		let phase = self.lock.phase();
		TrackingState {
			channel: self.channel,
			sample_counter: self.sample_counter,
			frequency_channel: self.frequency_channel,
			code_phase_chips: self.replica.code_phase_chips(),
			carrier_phase_rad: 2.0 * consts::PI * self.replica.carrier_phase_cycles(),
			doppler_hz: self.doppler_hz,
			coherent_ms: self.coherent_ms(self.accumulator.target_epochs()),
			pll_bw_hz: bw.pll_hz,
			dll_bw_hz: bw.dll_hz,
			phase,
			locked: phase == TrackingPhase::Locked,
		}
	}

	fn debug(&self) -> Option<EpochDiagnostics> { self.last_diagnostics.clone() }

}

/// Builds a channel for the configured sample type and carrier loop order
pub fn new_tracking_channel(cfg:&ChannelConfig) -> Box<dyn TrackingChannel> {
	match (cfg.config.item_type, cfg.config.pll_order) {
		(ItemType::GrComplex, LoopOrder::Second) => Box::new(Tracking::<Complex<f32>, SecondOrderLoopFilter>::new(cfg)),
		(ItemType::GrComplex, LoopOrder::Third)  => Box::new(Tracking::<Complex<f32>, ThirdOrderLoopFilter>::new(cfg)),
		(ItemType::CShort,    LoopOrder::Second) => Box::new(Tracking::<Complex<i16>, SecondOrderLoopFilter>::new(cfg)),
		(ItemType::CShort,    LoopOrder::Third)  => Box::new(Tracking::<Complex<i16>, ThirdOrderLoopFilter>::new(cfg)),
	}
}

impl BlockFunctionality<TrackingControl, (), Arc<Vec<u8>>, Observable> for Box<dyn TrackingChannel> {

	fn control(&mut self, control:&TrackingControl) -> Result<(), DigSigProcErr> {
		match control {
			TrackingControl::Start(assist) => self.start_tracking(assist),
			TrackingControl::Stop => { self.stop_tracking(); Ok(()) },
			TrackingControl::SymbolSync(sync) => { self.report_symbol_sync(*sync); Ok(()) },
		}
	}

	fn apply(&mut self, input:&Arc<Vec<u8>>) -> BlockResult<Observable> {
		match self.process_epoch_bytes(input) {
			Ok(Some(obs)) => BlockResult::Ready(obs),
			Ok(None)      => BlockResult::NotReady,
			Err(e)        => BlockResult::Err(e),
		}
	}

}
