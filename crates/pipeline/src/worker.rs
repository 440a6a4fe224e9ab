//! Worker pool
//!
//! One job is one satellite through the whole compute chain; the working
//! set of ~200 samples stays cache-local to its worker. Workers claim jobs
//! from an atomic cursor, never touch shared mutable state beyond the
//! progress counter, and stream results back over a channel that the
//! orchestrator drains into pre-sized, input-ordered slots.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use coordinate_transforms::TransformEngine;
use link_budget::{
    assess_quality, EventEvaluator, QualityAssessment, SignalEngine, SignalSample, SystemParams,
};
use orbital_mechanics::{
    kepler_period_check, ChecksumStatus, OrbitalError, Propagator, SamplingPlan, TleRecord,
};
use pool_planner::SatelliteCandidate;
use visibility_windows::{extract_windows, VisibilityWindow, WindowConfig};

use crate::features;
use crate::report::FailureRecord;
use crate::Pipeline;

/// Per-satellite soft deadline; exceeding it marks the satellite failed.
const WATCHDOG_BUDGET_S: f64 = 30.0;

/// Sample-failure share above which the whole satellite fails.
const SAMPLE_FAILURE_BUDGET: f64 = 0.01;

/// Everything the run report needs from one succeeded satellite.
#[derive(Debug, Clone, Serialize)]
pub struct SatelliteSuccess {
    pub norad_id: u32,
    pub name: String,
    pub constellation: orbital_mechanics::Constellation,
    pub windows: Vec<VisibilityWindow>,
    #[serde(skip)]
    pub candidate: Option<SatelliteCandidate>,
    pub sample_count: usize,
    pub dropped_samples: usize,
    pub kepler_deviation: f64,
    pub max_accuracy_estimate_m: f64,
    /// TS 38.133 quality assessment of the best sample, when one exists.
    pub peak_quality: Option<QualityAssessment>,
    pub checksum_status: [ChecksumStatus; 2],
    #[serde(skip)]
    pub invariant_violation: Option<String>,
    /// Wall-clock diagnostics only; excluded from the canonical document
    /// to keep identical inputs byte-identical.
    #[serde(skip)]
    pub elapsed_ms: u64,
}

#[derive(Debug)]
pub enum SatelliteOutcome {
    Success(Box<SatelliteSuccess>),
    Failure(FailureRecord),
}

/// Run every record through the chain on `workers` OS threads. Results
/// come back in input order.
pub fn run_pool(
    pipeline: &Pipeline,
    records: &[&TleRecord],
    workers: usize,
) -> Vec<SatelliteOutcome> {
    let next_job = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, SatelliteOutcome)>();

    let mut slots: Vec<Option<SatelliteOutcome>> = Vec::with_capacity(records.len());
    slots.resize_with(records.len(), || None);

    std::thread::scope(|scope| {
        for _ in 0..workers.max(1) {
            let tx = tx.clone();
            let next_job = &next_job;
            let completed = &completed;
            scope.spawn(move || loop {
                let index = next_job.fetch_add(1, Ordering::Relaxed);
                if index >= records.len() {
                    break;
                }
                let outcome = process_satellite(pipeline, records[index]);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 500 == 0 {
                    info!(done, total = records.len(), "worker progress");
                }
                if tx.send((index, outcome)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        for (index, outcome) in rx {
            slots[index] = Some(outcome);
        }
    });

    slots
        .into_iter()
        .map(|slot| slot.expect("every job sends exactly one outcome"))
        .collect()
}

/// The C3→C4→C5→C6 chain for one satellite.
pub fn process_satellite(pipeline: &Pipeline, record: &TleRecord) -> SatelliteOutcome {
    let started = Instant::now();
    let config = pipeline.config();

    let fail = |stage: &str, reason: String| {
        SatelliteOutcome::Failure(FailureRecord {
            norad_id: record.norad_id,
            name: record.name.clone(),
            stage: stage.to_string(),
            reason,
        })
    };

    // ---- C3: propagation over the constellation cadence ----
    let plan = match SamplingPlan::for_constellation(&record.constellation) {
        Some(mut plan) => {
            plan.step_s = config.sampling_step_s;
            plan
        }
        None => SamplingPlan::for_record(record, config.sampling_step_s),
    };

    let propagator = match Propagator::new(record) {
        Ok(p) => p,
        Err(e) => return fail("propagation", propagation_reason(&e)),
    };
    let prop_samples = match propagator.propagate_series(plan) {
        Ok(samples) => samples,
        Err(e) => return fail("propagation", propagation_reason(&e)),
    };

    let kepler_deviation = kepler_period_check(
        &prop_samples[0],
        record.mean_motion_rev_per_day,
        pipeline.wgs84().gm_km3_s2(),
    );
    if kepler_deviation > 0.03 {
        return fail(
            "propagation",
            format!("kepler_deviation ({:.4})", kepler_deviation),
        );
    }

    // ---- C4: coordinate reduction ----
    let engine = TransformEngine::new(
        pipeline.eop(),
        pipeline.wgs84(),
        config.observer.observer(),
        config.elevation_mask_deg,
    );

    let mut topo_samples = Vec::with_capacity(prop_samples.len());
    let mut dropped = 0usize;
    let mut max_accuracy = 0.0f64;
    for sample in &prop_samples {
        match engine.transform(sample) {
            Ok(topo) => {
                max_accuracy = max_accuracy.max(topo.accuracy_estimate_m);
                topo_samples.push(topo);
            }
            Err(_) => dropped += 1,
        }
    }
    if (dropped as f64) > (prop_samples.len() as f64) * SAMPLE_FAILURE_BUDGET {
        return fail(
            "transform",
            format!("sample_failure_rate ({dropped}/{})", prop_samples.len()),
        );
    }

    // ---- C5: link budget + events ----
    let system = SystemParams {
        rain_rate_mm_h: config.rain_rate_mm_h,
        environment: config.observer.environment,
        sensitivity_dbm: config.usability_rsrp_dbm,
        ..SystemParams::default()
    };
    let signal_engine = SignalEngine::new(
        system,
        config.observer.latitude_deg,
        config.observer.altitude_m,
    );

    let mut signal_samples: Vec<SignalSample> = Vec::with_capacity(topo_samples.len());
    for topo in &topo_samples {
        match signal_engine.evaluate(topo, &record.constellation) {
            Ok(sample) => signal_samples.push(sample),
            Err(e) => return fail("signal", e.to_string()),
        }
    }
    let mut evaluator = EventEvaluator::new(config.events.clone(), config.sampling_step_s);
    evaluator.annotate(&mut signal_samples);

    if let Some(violation) = check_invariants(&signal_samples, config.sampling_step_s, dropped) {
        return SatelliteOutcome::Success(Box::new(SatelliteSuccess {
            norad_id: record.norad_id,
            name: record.name.clone(),
            constellation: record.constellation.clone(),
            windows: Vec::new(),
            candidate: None,
            sample_count: signal_samples.len(),
            dropped_samples: dropped,
            kepler_deviation,
            max_accuracy_estimate_m: max_accuracy,
            peak_quality: None,
            checksum_status: record.checksum_status,
            invariant_violation: Some(violation),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }));
    }

    // ---- C6: visibility windows ----
    let window_config = WindowConfig {
        usability_rsrp_dbm: config.usability_rsrp_dbm,
        ..WindowConfig::default()
    };
    let windows = extract_windows(record.norad_id, &signal_samples, &window_config);

    let candidate = features::build_candidate(record, &signal_samples, &windows);
    let peak_quality = signal_samples
        .iter()
        .filter(|s| s.reliable)
        .max_by(|a, b| a.rsrp_dbm.total_cmp(&b.rsrp_dbm))
        .map(|s| assess_quality(s.rsrp_dbm, s.rsrq_db, s.sinr_db));

    let elapsed = started.elapsed();
    if elapsed.as_secs_f64() > WATCHDOG_BUDGET_S {
        return fail(
            "watchdog",
            format!("cpu_budget_exceeded ({:.1} s)", elapsed.as_secs_f64()),
        );
    }

    debug!(
        norad_id = record.norad_id,
        windows = windows.len(),
        samples = signal_samples.len(),
        "satellite processed"
    );

    SatelliteOutcome::Success(Box::new(SatelliteSuccess {
        norad_id: record.norad_id,
        name: record.name.clone(),
        constellation: record.constellation.clone(),
        windows,
        candidate,
        sample_count: signal_samples.len(),
        dropped_samples: dropped,
        kepler_deviation,
        max_accuracy_estimate_m: max_accuracy,
        peak_quality,
        checksum_status: record.checksum_status,
        invariant_violation: None,
        elapsed_ms: elapsed.as_millis() as u64,
    }))
}

fn propagation_reason(error: &OrbitalError) -> String {
    match error {
        OrbitalError::EpochStale { .. } => "tle_epoch_stale".to_string(),
        OrbitalError::Decayed { .. } => "sgp4_decayed".to_string(),
        OrbitalError::BoundsViolation { .. } => "sgp4_bounds".to_string(),
        other => format!("sgp4_rejected ({other})"),
    }
}

/// Programming-defect checks on a finished trajectory: strict timestamp
/// cadence, angle ranges, positive range for visible samples. When samples
/// were legitimately dropped upstream the cadence check relaxes to strict
/// monotonicity, since the gaps are expected.
fn check_invariants(samples: &[SignalSample], step_s: f64, dropped: usize) -> Option<String> {
    let expected_us = (step_s * 1e6) as i64;
    for pair in samples.windows(2) {
        let dt_us = (pair[1].t_utc - pair[0].t_utc)
            .num_microseconds()
            .unwrap_or(i64::MAX);
        if dropped == 0 && (dt_us - expected_us).abs() > 1 {
            return Some(format!(
                "non-uniform timestamps: {dt_us} µs between samples"
            ));
        }
        if dt_us <= 0 {
            return Some(format!("non-monotonic timestamps: {dt_us} µs step"));
        }
    }
    for sample in samples {
        if !(-90.0..=90.0).contains(&sample.elevation_deg) {
            return Some(format!("elevation out of range: {}", sample.elevation_deg));
        }
        if !(0.0..360.0).contains(&sample.azimuth_deg) {
            return Some(format!("azimuth out of range: {}", sample.azimuth_deg));
        }
        if sample.is_visible && sample.range_km <= 0.0 {
            return Some(format!("non-positive range: {}", sample.range_km));
        }
    }
    None
}
