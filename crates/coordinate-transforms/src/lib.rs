//! Coordinate Transform Engine
//!
//! Full reduction chain for propagated states: TEME → GCRS (precession +
//! nutation + equation of the equinoxes), GCRS → ITRS (Earth rotation +
//! polar motion from real EOP), ITRS → WGS-84 geodetic (Bowring), and
//! topocentric look angles for a fixed observer.
//!
//! Every sample instant needs a usable EOP record; when the table has a
//! gap the sample fails rather than assuming a unit rotation.

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orbital_mechanics::PropagationSample;
use reference_data::{EopProvider, EopRecord, ReferenceDataError, Wgs84Parameters};

pub mod accuracy;
pub mod frames;
pub mod geodetic;
pub mod topocentric;

pub use geodetic::GeodeticPosition;
pub use topocentric::Observer;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("EOP unavailable for sample instant: {0}")]
    EopGap(#[from] ReferenceDataError),
    #[error("Bowring iteration did not converge after {iterations} steps (p={p_m:.3} m)")]
    BowringNonConvergence { iterations: usize, p_m: f64 },
    #[error("Non-finite intermediate state at {stage}")]
    NonFinite { stage: &'static str },
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// C4 output: one propagated state reduced to Earth-fixed and topocentric
/// coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopocentricSample {
    pub t_utc: DateTime<Utc>,
    pub position_itrs_km: Vector3<f64>,
    pub geodetic: GeodeticPosition,
    pub elevation_deg: f64,
    pub azimuth_deg_from_north: f64,
    pub range_km: f64,
    pub range_rate_km_per_s: f64,
    pub accuracy_estimate_m: f64,
    pub is_visible: bool,
}

/// Transform engine bound to one observer, one EOP table and one WGS-84
/// parameter set, all shared by reference for the run's duration.
pub struct TransformEngine<'a> {
    eop: &'a EopProvider,
    wgs84: &'a Wgs84Parameters,
    observer: Observer,
    elevation_mask_deg: f64,
    observer_itrs_km: Vector3<f64>,
    enu_rotation: nalgebra::Matrix3<f64>,
}

impl<'a> TransformEngine<'a> {
    pub fn new(
        eop: &'a EopProvider,
        wgs84: &'a Wgs84Parameters,
        observer: Observer,
        elevation_mask_deg: f64,
    ) -> Self {
        let observer_itrs_km = geodetic::geodetic_to_itrs(
            &GeodeticPosition {
                latitude_deg: observer.latitude_deg,
                longitude_deg: observer.longitude_deg,
                height_m: observer.altitude_m,
            },
            wgs84,
        ) / 1000.0;
        let enu_rotation =
            topocentric::enu_rotation(observer.latitude_deg, observer.longitude_deg);

        Self {
            eop,
            wgs84,
            observer,
            elevation_mask_deg,
            observer_itrs_km,
            enu_rotation,
        }
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Reduce one propagation sample. Fails when EOP is unavailable at the
    /// sample instant or the geodetic iteration does not converge.
    pub fn transform(&self, sample: &PropagationSample) -> Result<TopocentricSample> {
        let eop = self.eop.eop_at_utc(sample.t_utc)?;

        let (r_itrs, v_itrs) = frames::teme_to_itrs(
            sample.t_utc,
            &eop,
            &sample.position_teme_km,
            &sample.velocity_teme_km_per_s,
            self.wgs84.angular_velocity_rad_s,
        );

        if !r_itrs.iter().all(|c| c.is_finite()) {
            return Err(TransformError::NonFinite { stage: "itrs" });
        }

        let geodetic = geodetic::itrs_to_geodetic(&(r_itrs * 1000.0), self.wgs84)?;

        let look = topocentric::look_angles(
            &self.observer_itrs_km,
            &self.enu_rotation,
            &r_itrs,
            &v_itrs,
        );

        let accuracy_estimate_m = accuracy::estimate_accuracy_m(
            &eop,
            sample.t_utc,
            sample.t_from_epoch_min,
            self.wgs84.semi_major_axis_m,
        );

        Ok(TopocentricSample {
            t_utc: sample.t_utc,
            position_itrs_km: r_itrs,
            geodetic,
            elevation_deg: look.elevation_deg,
            azimuth_deg_from_north: look.azimuth_deg,
            range_km: look.range_km,
            range_rate_km_per_s: look.range_rate_km_per_s,
            accuracy_estimate_m,
            is_visible: look.elevation_deg >= self.elevation_mask_deg,
        })
    }

    /// GCRS position of a sample, used by consumers that need the inertial
    /// leg of the chain.
    pub fn teme_to_gcrs(
        &self,
        sample: &PropagationSample,
    ) -> Result<Vector3<f64>> {
        let eop: EopRecord = self.eop.eop_at_utc(sample.t_utc)?;
        Ok(frames::teme_to_gcrs_matrix(sample.t_utc, &eop) * sample.position_teme_km)
    }
}
