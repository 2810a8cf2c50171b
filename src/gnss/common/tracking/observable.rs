use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Serialize, Deserialize};

use super::state::TrackingPhase;

/// Per-cycle tracking output handed to demodulation and positioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observable {
	pub channel: usize,
	/// Samples consumed by this channel up to the end of the cycle
	pub sample_counter: u64,
	pub code_phase_chips: f64,
	pub code_rate_cps: f64,
	pub carrier_phase_rad: f64,
	pub accumulated_carrier_phase_rad: f64,
	pub doppler_hz: f64,
	pub prompt_i: f64,
	pub prompt_q: f64,
	pub power_ratio: f64,
	pub cn0_db_hz: f64,
	pub carrier_lock_test: f64,
	pub coherent_ms: usize,
	pub phase: TrackingPhase,
	pub locked: bool,
	pub valid: bool,
}

/// Loop internals for one epoch, for offline analysis of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochDiagnostics {
	pub channel: usize,
	pub sample_counter: u64,
	pub phase: TrackingPhase,
	pub early: (f64, f64),
	pub prompt: (f64, f64),
	pub late: (f64, f64),
	pub very_early: Option<(f64, f64)>,
	pub very_late: Option<(f64, f64)>,
	pub power_ratio: f64,
	pub smoothed_power: f64,
	pub code_error_chips: Option<f64>,
	pub carrier_error_rad: Option<f64>,
	pub code_freq_cps: f64,
	pub carrier_doppler_hz: f64,
	pub pll_bw_hz: f64,
	pub dll_bw_hz: f64,
	pub coherent_epochs: usize,
}

/// Write-only consumer of per-epoch diagnostics
pub trait DiagnosticsSink: Send {
	fn record(&mut self, diag:&EpochDiagnostics) -> io::Result<()>;
	fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

/// One JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
	writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {

	pub fn new(writer:W) -> Self { Self { writer } }

}

impl JsonLinesSink<BufWriter<File>> {

	/// Opens `path` for appending, so a restarted channel keeps the diagnostics of its earlier runs
	pub fn open<P: AsRef<Path>>(path:P) -> io::Result<Self> {
		let file = OpenOptions::new().create(true).append(true).open(path)?;
		Ok(Self::new(BufWriter::new(file)))
	}

}

impl<W: Write + Send> DiagnosticsSink for JsonLinesSink<W> {
	fn record(&mut self, diag:&EpochDiagnostics) -> io::Result<()> {
		serde_json::to_writer(&mut self.writer, diag)?;
		self.writer.write_all(b"\n")
	}

	fn flush(&mut self) -> io::Result<()> { self.writer.flush() }
}

impl<W: Write + Send> Drop for JsonLinesSink<W> {
	fn drop(&mut self) {
		let _ = self.writer.flush();
	}
}

#[cfg(test)]
mod tests {

	use super::*;

	fn diagnostics() -> EpochDiagnostics {
		EpochDiagnostics {
			channel: 3, sample_counter: 2048, phase: TrackingPhase::PullIn,
			early: (1.0, 0.0), prompt: (2.0, 0.5), late: (1.0, 0.0), very_early: None, very_late: None,
			power_ratio: 12.0, smoothed_power: 10.0, code_error_chips: Some(0.125), carrier_error_rad: None,
			code_freq_cps: 511.0e3, carrier_doppler_hz: -1250.0, pll_bw_hz: 50.0, dll_bw_hz: 2.0, coherent_epochs: 1,
		}
	}

	#[test]
	fn writes_one_object_per_line() {
		let diag = diagnostics();

		let mut buf:Vec<u8> = vec![];
		{
			let mut sink = JsonLinesSink::new(&mut buf);
			sink.record(&diag).unwrap();
			sink.record(&diag).unwrap();
		}

		let text = String::from_utf8(buf).unwrap();
		let lines:Vec<&str> = text.lines().collect();
		assert_eq!(lines.len(), 2);
		let parsed:EpochDiagnostics = serde_json::from_str(lines[1]).unwrap();
		assert_eq!(parsed, diag);
	}

	#[test]
	fn reopening_appends() {
		let path = std::env::temp_dir().join(format!("tracking_diag_append_{}.jsonl", std::process::id()));
		let _ = std::fs::remove_file(&path);

		let mut diag = diagnostics();
		for counter in &[1000u64, 2000] {
			let mut sink = JsonLinesSink::open(&path).unwrap();
			diag.sample_counter = *counter;
			sink.record(&diag).unwrap();
			sink.flush().unwrap();
		}

		let text = std::fs::read_to_string(&path).unwrap();
		std::fs::remove_file(&path).unwrap();
		let counters:Vec<u64> = text.lines().map(|l| serde_json::from_str::<EpochDiagnostics>(l).unwrap().sample_counter).collect();
		assert_eq!(counters, vec![1000, 2000]);
	}

}
