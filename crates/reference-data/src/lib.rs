//! Reference Data Library
//!
//! Read-only providers for the numerical standards the pipeline depends on:
//! IAU astronomical constants, NIMA TR 8350.2 WGS-84 parameters, and IERS
//! Earth orientation parameters from `finals2000A.all`.
//!
//! Providers fail fast when a required file is missing or malformed; no
//! defaults are fabricated.

use std::path::PathBuf;
use thiserror::Error;

pub mod constants;
pub mod eop;

pub use constants::{AstronomicalConstants, Wgs84Parameters};
pub use eop::{
    datetime_to_mjd, polar_motion_from_arcsec, EopProvider, EopQualityReport, EopRecord, EopSource,
};

#[derive(Error, Debug)]
pub enum ReferenceDataError {
    #[error("Reference file missing: {0}")]
    FileMissing(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON parse error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Required field missing in {file}: {field}")]
    FieldMissing { file: String, field: String },
    #[error("No EOP record usable for MJD {mjd:.3} (table covers {min_mjd:.1}..{max_mjd:.1})")]
    EopUnavailable {
        mjd: f64,
        min_mjd: f64,
        max_mjd: f64,
    },
    #[error("EOP table is empty after parsing {0}")]
    EopEmpty(PathBuf),
}

pub type Result<T> = std::result::Result<T, ReferenceDataError>;
