use std::fmt;

use log::debug;
use serde::{Serialize, Deserialize};

use super::config::TrackingConfig;
use super::lock_detectors::Ewma;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingPhase {
	Idle,
	PullIn,
	NarrowTransition,
	Locked,
	LossOfLock,
}

impl TrackingPhase {
	/// Phases in which the loops are running and producing meaningful estimates
	pub fn is_active(&self) -> bool {
		match self {
			TrackingPhase::PullIn | TrackingPhase::NarrowTransition | TrackingPhase::Locked => true,
			TrackingPhase::Idle | TrackingPhase::LossOfLock => false,
		}
	}
}

impl fmt::Display for TrackingPhase {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		let s = match self {
			TrackingPhase::Idle             => "idle",
			TrackingPhase::PullIn           => "pull-in",
			TrackingPhase::NarrowTransition => "narrowing",
			TrackingPhase::Locked           => "locked",
			TrackingPhase::LossOfLock       => "loss of lock",
		};
		write!(f, "{}", s)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopBandwidths {
	pub pll_hz: f64,
	pub dll_hz: f64,
}

/// What the state machine sees of one epoch.  Discriminator errors are only present on epochs that close a
/// coherent integration cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
	pub power_ratio: f64,
	pub errors: Option<LoopErrors>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopErrors {
	pub code_chips: f64,
	pub carrier_rad: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockUpdate {
	pub phase: TrackingPhase,
	pub previous: TrackingPhase,
	pub bandwidths: LoopBandwidths,
	pub smoothed_power: f64,
}

impl LockUpdate {
	pub fn changed(&self) -> bool { self.phase != self.previous }
}

#[derive(Debug, Clone)]
pub struct LockSettings {
	pub lock_power_threshold: f64,
	pub loss_power_threshold: f64,
	pub lock_epochs: usize,
	pub loss_epochs: usize,
	pub transition_epochs: usize,
	pub max_pull_in_epochs: usize,
	pub max_code_error_chips: f64,
	pub max_carrier_error_rad: f64,
	pub smoothing: f64,
	pub wide: LoopBandwidths,
	pub narrow: LoopBandwidths,
}

impl From<&TrackingConfig> for LockSettings {
	fn from(cfg:&TrackingConfig) -> Self {
		Self {
			lock_power_threshold: cfg.lock_power_threshold,
			loss_power_threshold: cfg.loss_power_threshold,
			lock_epochs: cfg.lock_epochs,
			loss_epochs: cfg.loss_epochs,
			transition_epochs: cfg.transition_epochs,
			max_pull_in_epochs: cfg.max_pull_in_epochs,
			max_code_error_chips: cfg.max_code_error_chips,
			max_carrier_error_rad: cfg.max_carrier_error_rad,
			smoothing: cfg.power_smoothing,
			wide:   LoopBandwidths{ pll_hz: cfg.pll_bw_hz, dll_hz: cfg.dll_bw_hz },
			narrow: LoopBandwidths{ pll_hz: cfg.pll_bw_narrow_hz, dll_hz: cfg.dll_bw_narrow_hz },
		}
	}
}

/// Pull-in, bandwidth narrowing and lock/loss decisions, driven once per epoch
pub struct LockStateMachine {
	settings: LockSettings,
	phase: TrackingPhase,
	power: Ewma,
	abs_code_err: Ewma,
	abs_carrier_err: Ewma,
	strong_count: usize,
	weak_count: usize,
	pull_in_epochs: usize,
	transition_step: usize,
	bandwidths: LoopBandwidths,
}

impl LockStateMachine {

	pub fn new(settings:LockSettings) -> Self {
		let alpha = settings.smoothing;
		let bandwidths = settings.wide;
		Self {
			settings, phase: TrackingPhase::Idle,
			power: Ewma::new(alpha), abs_code_err: Ewma::new(alpha), abs_carrier_err: Ewma::new(alpha),
			strong_count: 0, weak_count: 0, pull_in_epochs: 0, transition_step: 0,
			bandwidths,
		}
	}

	pub fn phase(&self) -> TrackingPhase { self.phase }
	pub fn bandwidths(&self) -> LoopBandwidths { self.bandwidths }
	pub fn smoothed_power(&self) -> f64 { self.power.value().unwrap_or(0.0) }
	pub fn weak_count(&self) -> usize { self.weak_count }

	/// Starts a new pull-in cycle at the wide bandwidths
	pub fn start(&mut self) {
		self.clear();
		self.set_phase(TrackingPhase::PullIn);
	}

	pub fn stop(&mut self) {
		self.clear();
		self.set_phase(TrackingPhase::Idle);
	}

	fn clear(&mut self) {
		self.power.reset();
		self.abs_code_err.reset();
		self.abs_carrier_err.reset();
		self.strong_count = 0;
		self.weak_count = 0;
		self.pull_in_epochs = 0;
		self.transition_step = 0;
		self.bandwidths = self.settings.wide;
	}

	fn set_phase(&mut self, next:TrackingPhase) {
		if next != self.phase {
			debug!("Tracking phase {} -> {} (smoothed power {:.2})", self.phase, next, self.smoothed_power());
			self.phase = next;
		}
	}

	fn errors_out_of_bounds(&self) -> bool {
		let code    = self.abs_code_err.value().unwrap_or(0.0);
		let carrier = self.abs_carrier_err.value().unwrap_or(0.0);
		code > self.settings.max_code_error_chips || carrier > self.settings.max_carrier_error_rad
	}

	/// Geometric interpolation from wide to narrow; `frac` in [0, 1]
	fn interpolated(&self, frac:f64) -> LoopBandwidths {
		let (w, n) = (self.settings.wide, self.settings.narrow);
		LoopBandwidths {
			pll_hz: w.pll_hz * (n.pll_hz / w.pll_hz).powf(frac),
			dll_hz: w.dll_hz * (n.dll_hz / w.dll_hz).powf(frac),
		}
	}

	fn enter_locked(&mut self) {
		self.bandwidths = self.settings.narrow;
		self.weak_count = 0;
		self.set_phase(TrackingPhase::Locked);
	}

	pub fn update(&mut self, metrics:&EpochMetrics) -> LockUpdate {
		let previous = self.phase;

		if self.phase.is_active() {
			let smoothed = self.power.update(metrics.power_ratio);
			if let Some(err) = metrics.errors {
				self.abs_code_err.update(err.code_chips.abs());
				self.abs_carrier_err.update(err.carrier_rad.abs());
			}

			match self.phase {
				TrackingPhase::PullIn => {
					self.pull_in_epochs += 1;
					if smoothed >= self.settings.lock_power_threshold { self.strong_count += 1; } else { self.strong_count = 0; }

					if self.strong_count >= self.settings.lock_epochs {
						if self.settings.transition_epochs == 0 {
							self.enter_locked();
						} else {
							self.transition_step = 0;
							self.set_phase(TrackingPhase::NarrowTransition);
						}
					} else if self.pull_in_epochs >= self.settings.max_pull_in_epochs {
						self.set_phase(TrackingPhase::LossOfLock);
					}
				},
				TrackingPhase::NarrowTransition => {
					if self.errors_out_of_bounds() {
						self.set_phase(TrackingPhase::LossOfLock);
					} else {
						self.transition_step += 1;
						let steps = self.settings.transition_epochs;
						if self.transition_step >= steps {
							self.enter_locked();
						} else {
							self.bandwidths = self.interpolated((self.transition_step as f64) / (steps as f64));
						}
					}
				},
				TrackingPhase::Locked => {
					let weak = metrics.power_ratio < self.settings.loss_power_threshold && smoothed < self.settings.loss_power_threshold;
					if weak { self.weak_count += 1; } else { self.weak_count = 0; }

					if self.weak_count >= self.settings.loss_epochs || self.errors_out_of_bounds() {
						self.set_phase(TrackingPhase::LossOfLock);
					}
				},
				TrackingPhase::Idle | TrackingPhase::LossOfLock => (),
			}
		}

		LockUpdate { phase: self.phase, previous, bandwidths: self.bandwidths, smoothed_power: self.smoothed_power() }
	}

}
