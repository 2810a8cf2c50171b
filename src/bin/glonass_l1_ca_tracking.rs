
use std::fs::{self, File};
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Arg, App};
use colored::*;
use log::{info, warn};

use rust_radio_tracking::DigSigProcErr;
use rust_radio_tracking::block::Block;
use rust_radio_tracking::io::EpochSource;
use rust_radio_tracking::gnss::common::tracking::{AcquisitionAssist, Observable, TrackingControl};
use rust_radio_tracking::gnss::common::tracking::config::{ConfigOverrides, TrackingConfig};
use rust_radio_tracking::gnss::common::tracking::state::TrackingPhase;
use rust_radio_tracking::gnss::glonass_l1_ca::tracking;

fn report(obs:&Observable, last_phase:&mut TrackingPhase, fs:f64) {
	if obs.phase == *last_phase { return; }
	*last_phase = obs.phase;

	let s = format!("{:8.3} [sec], channel {:02}, {}, {:9.2} [Hz] Doppler, {:5.1} [dB-Hz]",
		(obs.sample_counter as f64)/fs, obs.channel, obs.phase, obs.doppler_hz, obs.cn0_db_hz);
	match obs.phase {
		TrackingPhase::Locked     => eprintln!("{}", s.green()),
		TrackingPhase::LossOfLock => eprintln!("{}", s.red()),
		TrackingPhase::Idle       => eprintln!("{}", s),
		_                         => eprintln!("{}", s.yellow()),
	}
}

#[tokio::main]
pub async fn main() -> Result<(), DigSigProcErr> {

	env_logger::init();

	let running = Arc::new(AtomicBool::new(true));
	let r = running.clone();

	let matches = App::new("GLONASS L1 C/A Tracking")
		.version("0.1.0")
		.author("John Stanford (johnwstanford@gmail.com)")
		.about("Takes IQ samples centered on 1602 MHz and tracks GLONASS L1 C/A signals from acquisition results")
		.arg(Arg::with_name("filename")
			.short("f").long("filename")
			.help("Input filename")
			.required(true).takes_value(true))
		.arg(Arg::with_name("acquisitions")
			.short("a").long("acquisitions")
			.help("JSON file with one acquisition assist per channel")
			.required(true).takes_value(true))
		.arg(Arg::with_name("config")
			.short("c").long("config")
			.help("JSON tracking configuration; defaults are used for missing keys")
			.takes_value(true))
		.arg(Arg::with_name("pll_bw_hz")
			.long("pll_bw_hz")
			.help("Overrides the wide (pull-in) PLL bandwidth")
			.takes_value(true))
		.arg(Arg::with_name("dll_bw_hz")
			.long("dll_bw_hz")
			.help("Overrides the wide (pull-in) DLL bandwidth")
			.takes_value(true))
		.arg(Arg::with_name("max_epochs")
			.long("max_epochs")
			.help("Stop after this many epochs")
			.takes_value(true))
		.arg(Arg::with_name("json_out")
			.short("o").long("json_out")
			.help("Output filename for observables; stdout if omitted")
			.takes_value(true))
		.get_matches();

	let parse_f64 = |name:&str| -> Result<Option<f64>, DigSigProcErr> {
		match matches.value_of(name) {
			Some(s) => s.parse().map(Some).map_err(|_| DigSigProcErr::Configuration(format!("unable to parse {} from {:?}", name, s))),
			None => Ok(None),
		}
	};

	let overrides = ConfigOverrides{ pll_bw_hz: parse_f64("pll_bw_hz")?, dll_bw_hz: parse_f64("dll_bw_hz")? };
	let opt_max_epochs:Option<u64> = parse_f64("max_epochs")?.map(|x| x as u64);

	let cfg:TrackingConfig = match matches.value_of("config") {
		Some(fname) => TrackingConfig::from_json(&fs::read_to_string(fname)?)?,
		None => TrackingConfig::default(),
	};
	let fs_hz = cfg.sampling_rate_sps;

	let acq_fname = matches.value_of("acquisitions").unwrap_or_default();
	let assists:Vec<AcquisitionAssist> = serde_json::from_str(&fs::read_to_string(acq_fname)?)
		.map_err(|e| DigSigProcErr::Configuration(format!("unable to parse acquisitions: {}", e)))?;
	if assists.is_empty() {
		return Err(DigSigProcErr::Configuration("no acquisitions to track".to_string()));
	}

	ctrlc::set_handler(move || {
		r.store(false, Ordering::SeqCst);
	}).expect("Error setting Ctrl-C handler");

	let mut blocks:Vec<Block<TrackingControl, Arc<Vec<u8>>, Observable>> = vec![];
	let (mut item_size, mut samples_per_epoch) = (0, 0);
	for (idx, assist) in assists.iter().enumerate() {
		let ch = tracking::new_channel(cfg.clone(), &overrides, idx)?;
		item_size = ch.item_size();
		samples_per_epoch = ch.samples_per_epoch();

		let blk = Block::from(ch);
		blk.control(TrackingControl::Start(*assist)).await?;
		blocks.push(blk);
	}

	let fname:&str = matches.value_of("filename").unwrap_or_default();
	eprintln!("Tracking {} channels in {} at {} [samples/sec]", blocks.len(), &fname, fs_hz);

	let mut last_phases:Vec<TrackingPhase> = vec![TrackingPhase::Idle; blocks.len()];
	let mut all_observables:Vec<Observable> = vec![];

	'outer: for (epoch_idx, epoch) in EpochSource::open(fname, item_size, samples_per_epoch)?.enumerate() {

		let epoch = match epoch {
			Ok(bytes) => Arc::new(bytes),
			Err(e) => {
				warn!("Stopping at epoch {}: {}", epoch_idx, e);
				break 'outer;
			}
		};

		for (blk, last_phase) in blocks.iter_mut().zip(last_phases.iter_mut()) {
			// A closed block has failed; shutdown below reports why
			if blk.apply(epoch.clone()).await.is_err() { break 'outer; }

			while let Ok(obs) = blk.rx_output.try_recv() {
				report(&obs, last_phase, fs_hz);
				all_observables.push(obs);
			}
		}

		if let Some(max_epochs) = opt_max_epochs {
			if (epoch_idx as u64) + 1 >= max_epochs { break 'outer; }
		}

		// Break out of this loop if SIGINT is detected (Ctrl-C)
		if !running.load(Ordering::SeqCst) { break 'outer; }

	}

	for blk in blocks {
		all_observables.extend(blk.shutdown().await?);
	}
	all_observables.sort_by_key(|obs| (obs.sample_counter, obs.channel));
	info!("Produced {} observables", all_observables.len());

	// Output data in JSON format
	match matches.value_of("json_out") {
		Some(out_fname) => {
			let writer = BufWriter::new(File::create(out_fname)?);
			serde_json::to_writer_pretty(writer, &all_observables).map_err(|e| DigSigProcErr::Io(e.to_string()))?;
		},
		None => println!("{}", serde_json::to_string_pretty(&all_observables).map_err(|e| DigSigProcErr::Io(e.to_string()))?),
	}

	Ok(())

}
