//! Pipeline configuration
//!
//! The core-visible configuration surface: observer, elevation mask,
//! usability threshold, event thresholds, pool constraints and the worker
//! override. Every key has a serde default so a partial JSON file
//! configures only what it names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use coordinate_transforms::Observer;
use link_budget::{EnvironmentClass, EventConfig};
use pool_planner::PlannerConfig;

use crate::{PipelineError, Result};

/// Observer site plus its propagation environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
    #[serde(default)]
    pub environment: EnvironmentClass,
}

impl ObserverConfig {
    pub fn observer(&self) -> Observer {
        Observer {
            latitude_deg: self.latitude_deg,
            longitude_deg: self.longitude_deg,
            altitude_m: self.altitude_m,
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        // NTPU reference site
        Self {
            latitude_deg: 24.9442,
            longitude_deg: 121.3714,
            altitude_m: 0.0,
            environment: EnvironmentClass::Clear,
        }
    }
}

/// Paths of the required reference files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDataPaths {
    pub iau_constants: PathBuf,
    pub wgs84_parameters: PathBuf,
    pub finals2000a: PathBuf,
    /// Optional Bulletin A snapshot merged into the EOP table.
    #[serde(default)]
    pub bulletin_a: Option<PathBuf>,
}

impl Default for ReferenceDataPaths {
    fn default() -> Self {
        Self {
            iau_constants: "data/astronomical_constants/iau_constants.json".into(),
            wgs84_parameters: "data/wgs84_cache/nima_tr8350_2_official.json".into(),
            finals2000a: "data/iers_cache/finals2000A.all".into(),
            bulletin_a: None,
        }
    }
}

fn default_elevation_mask() -> f64 {
    5.0
}

fn default_usability_rsrp() -> f64 {
    -110.0
}

fn default_sampling_step() -> f64 {
    30.0
}

fn default_rain_rate() -> f64 {
    22.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub reference_data: ReferenceDataPaths,
    #[serde(default = "default_elevation_mask")]
    pub elevation_mask_deg: f64,
    #[serde(default = "default_usability_rsrp")]
    pub usability_rsrp_dbm: f64,
    #[serde(default = "default_sampling_step")]
    pub sampling_step_s: f64,
    #[serde(default = "default_rain_rate")]
    pub rain_rate_mm_h: f64,
    #[serde(default)]
    pub events: EventConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    /// Worker-thread override; the `LEO_PIPELINE_WORKERS` environment
    /// variable wins over this, and the fallback is ceil(0.75·n_cpu).
    #[serde(default)]
    pub worker_count: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            observer: ObserverConfig::default(),
            reference_data: ReferenceDataPaths::default(),
            elevation_mask_deg: default_elevation_mask(),
            usability_rsrp_dbm: default_usability_rsrp(),
            sampling_step_s: default_sampling_step(),
            rain_rate_mm_h: default_rain_rate(),
            events: EventConfig::default(),
            planner: PlannerConfig::default(),
            worker_count: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: PipelineConfig = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&mut self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.observer.latitude_deg)
            || !(-180.0..=180.0).contains(&self.observer.longitude_deg)
        {
            return Err(PipelineError::Config(format!(
                "observer location out of range: {} / {}",
                self.observer.latitude_deg, self.observer.longitude_deg
            )));
        }
        if self.sampling_step_s <= 0.0 {
            return Err(PipelineError::Config("sampling step must be positive".into()));
        }
        if !(0.0..90.0).contains(&self.elevation_mask_deg) {
            return Err(PipelineError::Config(format!(
                "elevation mask {} deg out of range",
                self.elevation_mask_deg
            )));
        }
        // Keep the planner's usability threshold in lockstep
        self.planner.constraints.usability_rsrp_dbm = self.usability_rsrp_dbm;
        Ok(())
    }

    /// Effective worker count: env override, then config, then
    /// ceil(0.75·n_cpu).
    pub fn effective_workers(&self) -> usize {
        if let Ok(raw) = std::env::var("LEO_PIPELINE_WORKERS") {
            if let Ok(n) = raw.parse::<usize>() {
                if n > 0 {
                    return n;
                }
            }
        }
        if let Some(n) = self.worker_count {
            if n > 0 {
                return n;
            }
        }
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ((cpus as f64) * 0.75).ceil() as usize
    }
}
