//! Pipeline Orchestrator
//!
//! Sequences the per-satellite compute chain (SGP4 propagation →
//! coordinate reduction → link budget → visibility windows) across a
//! bounded worker pool of OS threads, then runs the pool planner on the
//! main thread over the satellite-sorted results. Satellite-level failures
//! are accumulated, never fatal; only missing reference data and invariant
//! violations abort a run.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use orbital_mechanics::TleRecord;
use pool_planner::{PlannerError, PoolPlan, PoolPlanner};
use reference_data::{AstronomicalConstants, EopProvider, ReferenceDataError, Wgs84Parameters};

pub mod config;
pub mod features;
pub mod report;
pub mod worker;

pub use config::{ObserverConfig, PipelineConfig, ReferenceDataPaths};
pub use report::{FailureRecord, OutputDocument, RunMetadata, RunStatistics, ValidationSnapshot};
pub use worker::{SatelliteOutcome, SatelliteSuccess};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Reference data error: {0}")]
    ReferenceData(#[from] ReferenceDataError),
    #[error("Invariant violation (programming defect): {0}")]
    InvariantViolation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// The assembled pipeline: immutable reference data plus configuration,
/// shared read-only with every worker.
pub struct Pipeline {
    config: PipelineConfig,
    constants: AstronomicalConstants,
    wgs84: Wgs84Parameters,
    eop: EopProvider,
}

impl Pipeline {
    /// Load all reference files and build the pipeline. Any missing or
    /// corrupt file is fatal for the whole run.
    pub fn initialize(config: PipelineConfig) -> Result<Self> {
        let paths = &config.reference_data;
        let constants = AstronomicalConstants::load(&paths.iau_constants)?;
        let wgs84 = Wgs84Parameters::load(&paths.wgs84_parameters)?;
        let mut eop = EopProvider::load(&paths.finals2000a)?;
        if let Some(bulletin) = &paths.bulletin_a {
            eop.merge_bulletin_a(bulletin)?;
        }

        info!(
            au_km = constants.astronomical_unit_km,
            "reference data loaded"
        );

        Ok(Self {
            config,
            constants,
            wgs84,
            eop,
        })
    }

    /// Build from already-loaded parts (fixtures and tests).
    pub fn from_parts(
        config: PipelineConfig,
        constants: AstronomicalConstants,
        wgs84: Wgs84Parameters,
        eop: EopProvider,
    ) -> Self {
        Self {
            config,
            constants,
            wgs84,
            eop,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline over validated TLE records. Always produces
    /// an output document; per-satellite failures are recorded in it.
    pub fn run(&self, records: &[TleRecord]) -> Result<OutputDocument> {
        let started_utc = Utc::now();

        // Deterministic processing order regardless of catalog order
        let mut sorted: Vec<&TleRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.norad_id);

        let workers = self.config.effective_workers();
        info!(
            satellites = sorted.len(),
            workers, "starting per-satellite pipeline"
        );

        let outcomes = worker::run_pool(self, &sorted, workers);

        // Invariant violations signal a programming defect, not bad data
        for outcome in &outcomes {
            if let SatelliteOutcome::Success(success) = outcome {
                if let Some(violation) = &success.invariant_violation {
                    return Err(PipelineError::InvariantViolation(format!(
                        "satellite {}: {violation}",
                        success.norad_id
                    )));
                }
            }
        }

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                SatelliteOutcome::Success(success) => successes.push(*success),
                SatelliteOutcome::Failure(failure) => failures.push(failure),
            }
        }

        let candidates: Vec<_> = successes
            .iter()
            .filter_map(|s| s.candidate.clone())
            .collect();

        let plan = match PoolPlanner::new(self.config.planner.clone()) {
            Ok(planner) => match planner.plan(&candidates) {
                Ok(plan) => plan,
                Err(PlannerError::NoCandidates) | Err(PlannerError::EmptyGrid) => {
                    warn!("no candidates with visibility windows; emitting empty pool plan");
                    PoolPlan {
                        instants: Vec::new(),
                        coverage_gaps: Vec::new(),
                        distinct_satellites_used: 0,
                        strategy_scores: Default::default(),
                    }
                }
                Err(PlannerError::InvalidConfig(message)) => {
                    return Err(PipelineError::Config(message))
                }
            },
            Err(PlannerError::InvalidConfig(message)) => {
                return Err(PipelineError::Config(message))
            }
            Err(other) => return Err(PipelineError::Config(other.to_string())),
        };

        let finished_utc = Utc::now();
        let document = report::assemble(
            &self.config,
            &self.constants,
            &self.eop,
            started_utc,
            finished_utc,
            records.len(),
            successes,
            failures,
            plan,
        );

        info!(
            grade = document.statistics.grade,
            succeeded = document.statistics.succeeded,
            failed = document.statistics.failed,
            "pipeline run complete"
        );

        Ok(document)
    }

    pub(crate) fn wgs84(&self) -> &Wgs84Parameters {
        &self.wgs84
    }

    pub(crate) fn eop(&self) -> &EopProvider {
        &self.eop
    }
}
