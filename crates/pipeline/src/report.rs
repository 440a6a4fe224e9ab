//! Run report and output document
//!
//! Assembles the canonical, self-describing JSON document a run hands to
//! the persistence stage: run metadata, per-satellite visibility windows,
//! the pool plan, the failure list, run statistics with the success grade,
//! and the validation snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orbital_mechanics::ChecksumStatus;
use pool_planner::PoolPlan;
use reference_data::{AstronomicalConstants, EopProvider, EopQualityReport};

use crate::config::PipelineConfig;
use crate::worker::SatelliteSuccess;

/// One dropped satellite: which stage rejected it and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub norad_id: u32,
    pub name: String,
    pub stage: String,
    pub reason: String,
}

/// Checksum tallies across the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksumStatistics {
    pub official: usize,
    pub legacy: usize,
    pub repaired: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub total_satellites: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub success_ratio: f64,
    pub grade: &'static str,
    pub failures_by_stage: BTreeMap<String, usize>,
    pub checksums: ChecksumStatistics,
}

/// Success grade per the run contract: A+ ≥99%, A ≥95%, B ≥85%, C ≥70%.
pub fn grade(success_ratio: f64) -> &'static str {
    if success_ratio >= 0.99 {
        "A+"
    } else if success_ratio >= 0.95 {
        "A"
    } else if success_ratio >= 0.85 {
        "B"
    } else if success_ratio >= 0.70 {
        "C"
    } else {
        "F"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub build_tag: String,
    pub started_utc: DateTime<Utc>,
    pub finished_utc: DateTime<Utc>,
    pub astronomical_unit_km: f64,
    pub config: PipelineConfig,
}

/// Sampling-rate and bounds accounting for the validation block.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSnapshot {
    pub satellites_processed: usize,
    pub total_samples: usize,
    pub mean_samples_per_satellite: f64,
    pub total_dropped_samples: usize,
    pub max_kepler_deviation: f64,
    pub max_accuracy_estimate_m: f64,
    pub bounds_checks_passed: bool,
    pub eop: EopQualityReport,
}

/// The canonical output document handed to the persistence stage.
#[derive(Debug, Serialize)]
pub struct OutputDocument {
    pub metadata: RunMetadata,
    pub satellites: Vec<SatelliteSuccess>,
    pub pool_plan: PoolPlan,
    pub failures: Vec<FailureRecord>,
    pub statistics: RunStatistics,
    pub validation: ValidationSnapshot,
}

impl OutputDocument {
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[allow(clippy::too_many_arguments)]
pub fn assemble(
    config: &PipelineConfig,
    constants: &AstronomicalConstants,
    eop: &EopProvider,
    started_utc: DateTime<Utc>,
    finished_utc: DateTime<Utc>,
    total_satellites: usize,
    successes: Vec<SatelliteSuccess>,
    failures: Vec<FailureRecord>,
    pool_plan: PoolPlan,
) -> OutputDocument {
    let succeeded = successes.len();
    let failed = failures.len();
    let success_ratio = if total_satellites == 0 {
        0.0
    } else {
        succeeded as f64 / total_satellites as f64
    };

    let mut failures_by_stage: BTreeMap<String, usize> = BTreeMap::new();
    for failure in &failures {
        *failures_by_stage.entry(failure.stage.clone()).or_default() += 1;
    }

    let mut checksums = ChecksumStatistics::default();
    for success in &successes {
        for status in success.checksum_status {
            match status {
                ChecksumStatus::Official => checksums.official += 1,
                ChecksumStatus::Legacy => checksums.legacy += 1,
                ChecksumStatus::Repaired => checksums.repaired += 1,
            }
        }
    }

    let total_samples: usize = successes.iter().map(|s| s.sample_count).sum();
    let total_dropped: usize = successes.iter().map(|s| s.dropped_samples).sum();
    let max_kepler = successes
        .iter()
        .map(|s| s.kepler_deviation)
        .fold(0.0, f64::max);
    let max_accuracy = successes
        .iter()
        .map(|s| s.max_accuracy_estimate_m)
        .fold(0.0, f64::max);

    let validation = ValidationSnapshot {
        satellites_processed: succeeded,
        total_samples,
        mean_samples_per_satellite: if succeeded == 0 {
            0.0
        } else {
            total_samples as f64 / succeeded as f64
        },
        total_dropped_samples: total_dropped,
        max_kepler_deviation: max_kepler,
        max_accuracy_estimate_m: max_accuracy,
        bounds_checks_passed: max_kepler <= 0.03,
        eop: eop.quality_report(finished_utc),
    };

    OutputDocument {
        metadata: RunMetadata {
            run_id: Uuid::new_v4(),
            build_tag: env!("CARGO_PKG_VERSION").to_string(),
            started_utc,
            finished_utc,
            astronomical_unit_km: constants.astronomical_unit_km,
            config: config.clone(),
        },
        satellites: successes,
        pool_plan,
        failures,
        statistics: RunStatistics {
            total_satellites,
            succeeded,
            failed,
            success_ratio,
            grade: grade(success_ratio),
            failures_by_stage,
            checksums,
        },
        validation,
    }
}
