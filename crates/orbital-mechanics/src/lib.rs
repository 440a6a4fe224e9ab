//! Orbital Mechanics Library
//!
//! TLE record handling (checksum repair, epoch parsing), time-scale
//! conversions (UTC/UT1/TT/TAI) and SGP4 propagation in the TEME frame for
//! LEO catalog satellites.

use thiserror::Error;

pub mod propagation;
pub mod timescale;
pub mod tle;

pub use propagation::{
    kepler_period_check, PropagationSample, Propagator, PropagatorFlags, SamplingPlan,
};
pub use tle::{ChecksumStatus, Constellation, TleRecord};

#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("TLE checksum invalid on line {line}: computed {computed}, found '{found}'")]
    ChecksumMismatch { line: u8, computed: u8, found: char },
    #[error("NORAD id mismatch between TLE lines: {line1_id} vs {line2_id}")]
    NoradIdMismatch { line1_id: u32, line2_id: u32 },
    #[error("TLE epoch unparseable: {0}")]
    EpochUnparseable(String),
    #[error("TLE epoch stale: {age_days:.1} days between epoch and propagation window")]
    EpochStale { age_days: f64 },
    #[error("Propagation failed: {0}")]
    PropagationFailed(String),
    #[error("State vector out of LEO bounds: |r|={r_km:.1} km, |v|={v_km_s:.3} km/s")]
    BoundsViolation { r_km: f64, v_km_s: f64 },
    #[error("Satellite decayed: |r|={r_km:.1} km below the LEO band")]
    Decayed { r_km: f64 },
}

pub type Result<T> = std::result::Result<T, OrbitalError>;
