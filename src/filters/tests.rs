use super::*;

const DT:f64 = 1.0e-3;

// Closed loop against a synthetic phase trajectory; `truth(t)` is the incoming phase in cycles.  The filter output
// drives an NCO whose phase is integrated once per update, with the discriminator seeing the mean error over the
// update interval.  Returns the error history.
fn run_loop<F: ScalarFilter, G: Fn(f64) -> f64>(filter:&mut F, truth:G, epochs:usize) -> Vec<f64> {
	let mut nco_phase:f64 = 0.0;
	let mut rate:f64 = filter.output();
	let mut errors:Vec<f64> = Vec::with_capacity(epochs);
	for k in 0..epochs {
		let t_mid = (k as f64 + 0.5) * DT;
		let err = truth(t_mid) - (nco_phase + 0.5 * rate * DT);
		errors.push(err);

		nco_phase += rate * DT;
		rate = filter.apply(err, DT);
	}
	errors
}

fn epochs_to_converge(errors:&[f64], tol:f64) -> Option<usize> {
	// First index after which every error stays inside the tolerance
	let last_bad = errors.iter().rposition(|e| e.abs() >= tol);
	match last_bad {
		None => Some(0),
		Some(idx) if idx + 1 < errors.len() => Some(idx + 1),
		Some(_) => None,
	}
}

const BANDWIDTHS:[f64; 6] = [1.0, 2.0, 5.0, 10.0, 20.0, 50.0];

#[test]
fn second_order_converges_on_phase_and_frequency_offsets() {
	for bw in BANDWIDTHS.iter() {
		let bound:usize = (30.0 / (bw * DT)) as usize;

		let mut filter = SecondOrderLoopFilter::with_noise_bandwidth(*bw, 0.7);
		let errors = run_loop(&mut filter, |_| 0.2, bound + 100);
		assert!(epochs_to_converge(&errors, 1.0e-3).map(|n| n <= bound).unwrap_or(false), "phase offset, bw={}", bw);

		let mut filter = SecondOrderLoopFilter::with_noise_bandwidth(*bw, 0.7);
		let errors = run_loop(&mut filter, |t| 0.05 + 0.3 * bw * t, bound + 100);
		assert!(epochs_to_converge(&errors, 1.0e-3).map(|n| n <= bound).unwrap_or(false), "frequency offset, bw={}", bw);
		assert!((filter.output() - 0.3 * bw).abs() < 1.0e-2);
	}
}

#[test]
fn third_order_converges_on_frequency_and_rate_offsets() {
	for bw in BANDWIDTHS.iter() {
		// The complex pole pair of the third order loop is lightly damped, so it needs a longer settling allowance
		let bound:usize = (100.0 / (bw * DT)) as usize;

		let mut filter = ThirdOrderLoopFilter::with_noise_bandwidth(*bw, 0.7);
		let errors = run_loop(&mut filter, |t| 0.1 + 0.3 * bw * t, bound + 100);
		assert!(epochs_to_converge(&errors, 1.0e-3).map(|n| n <= bound).unwrap_or(false), "frequency offset, bw={}", bw);

		// A constant frequency rate is tracked without steady state error by a third order loop
		let mut filter = ThirdOrderLoopFilter::with_noise_bandwidth(*bw, 0.7);
		let errors = run_loop(&mut filter, |t| 0.5 * 0.05 * bw * bw * t * t, bound + 100);
		assert!(epochs_to_converge(&errors, 1.0e-3).map(|n| n <= bound).unwrap_or(false), "frequency rate, bw={}", bw);
	}
}

#[test]
fn retuning_keeps_output_continuous() {
	let mut filter = SecondOrderLoopFilter::with_noise_bandwidth(50.0, 0.7);
	filter.initialize(1234.5);
	let errors = run_loop(&mut filter, |t| 1250.0 * t, 2000);
	assert!(errors.last().unwrap().abs() < 1.0e-6);

	let before = filter.output();
	filter.set_noise_bandwidth(20.0);
	assert_eq!(filter.output(), before);
	assert_eq!(filter.noise_bandwidth(), 20.0);
	assert!((filter.apply(0.0, DT) - before).abs() < 1.0e-12);

	let mut filter = ThirdOrderLoopFilter::with_noise_bandwidth(50.0, 0.7);
	filter.initialize(-800.0);
	run_loop(&mut filter, |t| -790.0 * t, 3000);
	let before = filter.output();
	filter.set_noise_bandwidth(10.0);
	assert!((filter.apply(0.0, DT) - before).abs() < 1.0e-6);
}

#[test]
fn closed_loop_error_has_no_jump_at_bandwidth_switch() {
	let mut filter = SecondOrderLoopFilter::with_noise_bandwidth(50.0, 0.7);
	let truth = |t:f64| 0.3 + 17.0 * t;

	let mut nco_phase:f64 = 0.0;
	let mut rate:f64 = filter.output();
	let mut errors:Vec<f64> = vec![];
	for k in 0..3000 {
		if k == 2000 { filter.set_noise_bandwidth(5.0); }
		let t_mid = (k as f64 + 0.5) * DT;
		let err = truth(t_mid) - (nco_phase + 0.5 * rate * DT);
		errors.push(err);
		nco_phase += rate * DT;
		rate = filter.apply(err, DT);
	}

	let max_step = errors[1990..2010].windows(2).map(|w| (w[1] - w[0]).abs()).fold(0.0, f64::max);
	assert!(max_step < 1.0e-6, "max_step={}", max_step);
}

#[test]
fn frequency_assist_moves_the_rate_memory() {
	let mut filter = SecondOrderLoopFilter::with_noise_bandwidth(20.0, 0.7);
	filter.initialize(100.0);
	filter.assist(10.0, 40.0, DT);
	assert!((filter.output() - 100.4).abs() < 1.0e-12);
}

#[test]
fn loop_order_from_integer() {
	assert_eq!(LoopOrder::try_from(2u8), Ok(LoopOrder::Second));
	assert_eq!(LoopOrder::try_from(3u8), Ok(LoopOrder::Third));
	assert!(LoopOrder::try_from(4u8).is_err());
	let parsed:LoopOrder = serde_json::from_str("3").unwrap();
	assert_eq!(parsed, LoopOrder::Third);
}
