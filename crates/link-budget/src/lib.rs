//! Signal & Link Budget Engine
//!
//! Per-sample link budget for LEO downlinks: ITU-R P.525 free-space path
//! loss, P.676-style gaseous absorption, P.618 rain attenuation, then the
//! 3GPP TS 38.133 measurement quantities (RSRP/RSRQ/SINR) and the NTN
//! measurement events A4/A5/D2 with hysteresis and time-to-trigger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use coordinate_transforms::TopocentricSample;
use orbital_mechanics::Constellation;

pub mod budget;
pub mod events;
pub mod itu;

pub use budget::{
    assess_quality, ConstellationParams, LinkBudgetBreakdown, QualityAssessment, SignalEngine,
    SystemParams,
};
pub use events::{EventConfig, EventEvaluator, EventFlags, ServingContext};
pub use itu::EnvironmentClass;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Unknown constellation '{0}': no reference parameters")]
    UnknownConstellation(String),
    #[error("Invalid geometry: distance {distance_km} km, frequency {frequency_ghz} GHz")]
    InvalidGeometry { distance_km: f64, frequency_ghz: f64 },
    #[error("Non-finite loss computed at {stage}")]
    NonFiniteLoss { stage: &'static str },
}

pub type Result<T> = std::result::Result<T, SignalError>;

/// C5 output: link-budget metrics for one sample instant.
///
/// `reliable` is false for samples below the elevation mask or with a
/// degenerate geometry; event machines ignore such samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSample {
    pub t_utc: DateTime<Utc>,
    pub constellation: Constellation,
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
    pub range_km: f64,
    pub is_visible: bool,
    pub reliable: bool,
    pub fspl_db: f64,
    pub atmo_loss_db: f64,
    pub rain_loss_db: f64,
    pub rsrp_dbm: f64,
    pub rsrq_db: f64,
    pub sinr_db: f64,
    pub link_margin_db: f64,
    pub event_flags: EventFlags,
}

impl SignalSample {
    /// Sentinel sample for instants with no usable signal.
    pub fn no_signal(topo: &TopocentricSample, constellation: Constellation) -> Self {
        Self {
            t_utc: topo.t_utc,
            constellation,
            elevation_deg: topo.elevation_deg,
            azimuth_deg: topo.azimuth_deg_from_north,
            range_km: topo.range_km,
            is_visible: topo.is_visible,
            reliable: false,
            fspl_db: f64::NAN,
            atmo_loss_db: f64::NAN,
            rain_loss_db: f64::NAN,
            rsrp_dbm: -150.0,
            rsrq_db: -25.0,
            sinr_db: -20.0,
            link_margin_db: -40.0,
            event_flags: EventFlags::default(),
        }
    }
}
