//! SGP4 propagation
//!
//! Propagates a validated TLE over its constellation's sampling cadence in
//! the TEME frame. t = 0 is always the TLE's own epoch; substituting
//! wall-clock time silently degrades accuracy by kilometres per day, so the
//! propagator owns the target-instant generation.

use chrono::{DateTime, Duration, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tle::{Constellation, TleRecord};
use crate::{OrbitalError, Result};

/// LEO sanity band for position magnitude, km.
pub const POSITION_BOUNDS_KM: (f64, f64) = (6_500.0, 10_000.0);

/// LEO sanity band for speed, km/s.
pub const SPEED_BOUNDS_KM_S: (f64, f64) = (6.0, 9.0);

/// Epoch age past which a warning is emitted, days.
const EPOCH_WARN_DAYS: f64 = 3.0;

/// Epoch age past which the stale flag is set, days.
const EPOCH_FLAG_DAYS: f64 = 7.0;

/// Epoch age past which propagation is refused, days.
const EPOCH_FAIL_DAYS: f64 = 14.0;

/// Deep-space switch-over: orbital period ≥ 225 min.
const DEEP_SPACE_PERIOD_S: f64 = 225.0 * 60.0;

/// Per-sample propagator condition flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagatorFlags {
    pub decayed: bool,
    pub deep_space: bool,
    pub numerical_warning: bool,
    pub stale: bool,
}

/// One propagation step in TEME.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationSample {
    pub t_utc: DateTime<Utc>,
    pub t_from_epoch_min: f64,
    pub position_teme_km: Vector3<f64>,
    pub velocity_teme_km_per_s: Vector3<f64>,
    pub flags: PropagatorFlags,
}

/// Sampling cadence: `samples` instants spaced `step_s` apart starting at
/// the TLE epoch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplingPlan {
    pub samples: usize,
    pub step_s: f64,
}

impl SamplingPlan {
    pub fn new(samples: usize, step_s: f64) -> Self {
        Self { samples, step_s }
    }

    /// Cadence covering one orbital period of the given constellation at
    /// 30 s steps (Starlink 192, OneWeb 218 samples).
    pub fn for_constellation(constellation: &Constellation) -> Option<Self> {
        match constellation {
            Constellation::Starlink => Some(Self::new(192, 30.0)),
            Constellation::Oneweb => Some(Self::new(218, 30.0)),
            Constellation::Other(_) => None,
        }
    }

    /// Cadence covering one orbital period of an arbitrary record.
    pub fn for_record(record: &TleRecord, step_s: f64) -> Self {
        let samples = (record.orbital_period_s() / step_s).ceil() as usize;
        Self::new(samples.max(2), step_s)
    }

    pub fn duration_s(&self) -> f64 {
        self.samples as f64 * self.step_s
    }
}

/// SGP4 propagator for one satellite, initialised once per TLE.
pub struct Propagator {
    constants: sgp4::Constants,
    epoch_utc: DateTime<Utc>,
    deep_space: bool,
}

impl Propagator {
    pub fn new(record: &TleRecord) -> Result<Self> {
        let elements = sgp4::Elements::from_tle(
            Some(record.name.clone()),
            record.line1.as_bytes(),
            record.line2.as_bytes(),
        )
        .map_err(|e| OrbitalError::InvalidTle(format!("{:?}", e)))?;

        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| OrbitalError::PropagationFailed(format!("{:?}", e)))?;

        Ok(Self {
            constants,
            epoch_utc: record.epoch_utc,
            deep_space: record.orbital_period_s() >= DEEP_SPACE_PERIOD_S,
        })
    }

    pub fn epoch_utc(&self) -> DateTime<Utc> {
        self.epoch_utc
    }

    /// Propagate to a single UTC instant.
    pub fn sample_at(&self, t_utc: DateTime<Utc>) -> Result<PropagationSample> {
        let micros = (t_utc - self.epoch_utc)
            .num_microseconds()
            .ok_or_else(|| OrbitalError::PropagationFailed("epoch offset overflow".into()))?;
        let minutes = micros as f64 / 60e6;
        let age_days = (micros as f64 / 86_400e6).abs();

        if age_days > EPOCH_FAIL_DAYS {
            return Err(OrbitalError::EpochStale { age_days });
        }

        let prediction = self
            .constants
            .propagate(minutes)
            .map_err(|e| OrbitalError::PropagationFailed(format!("{:?}", e)))?;

        let position = Vector3::new(
            prediction.position[0],
            prediction.position[1],
            prediction.position[2],
        );
        let velocity = Vector3::new(
            prediction.velocity[0],
            prediction.velocity[1],
            prediction.velocity[2],
        );

        let mut flags = PropagatorFlags {
            deep_space: self.deep_space,
            stale: age_days > EPOCH_FLAG_DAYS,
            ..PropagatorFlags::default()
        };

        let r = position.norm();
        let v = velocity.norm();
        if !r.is_finite() || !v.is_finite() {
            flags.numerical_warning = true;
            return Err(OrbitalError::PropagationFailed(format!(
                "non-finite state at t={minutes:.2} min"
            )));
        }
        if r < POSITION_BOUNDS_KM.0 {
            flags.decayed = true;
            return Err(OrbitalError::Decayed { r_km: r });
        }
        if r > POSITION_BOUNDS_KM.1 || !(SPEED_BOUNDS_KM_S.0..=SPEED_BOUNDS_KM_S.1).contains(&v) {
            return Err(OrbitalError::BoundsViolation { r_km: r, v_km_s: v });
        }

        Ok(PropagationSample {
            t_utc,
            t_from_epoch_min: minutes,
            position_teme_km: position,
            velocity_teme_km_per_s: velocity,
            flags,
        })
    }

    /// Propagate the full cadence starting at the TLE epoch. Timestamps are
    /// strictly increasing by exactly `step_s`.
    pub fn propagate_series(&self, plan: SamplingPlan) -> Result<Vec<PropagationSample>> {
        let span_days = plan.duration_s() / 86_400.0;
        if span_days > EPOCH_WARN_DAYS {
            warn!(
                epoch = %self.epoch_utc,
                span_days = format!("{span_days:.1}"),
                "sampling window extends more than 3 days past the TLE epoch"
            );
        }

        let step_us = (plan.step_s * 1e6).round() as i64;
        let mut series = Vec::with_capacity(plan.samples);
        for i in 0..plan.samples {
            let t = self.epoch_utc + Duration::microseconds(step_us * i as i64);
            series.push(self.sample_at(t)?);
        }
        Ok(series)
    }
}

/// Kepler third-law self-check: relative deviation between the period
/// implied by the sample's vis-viva semi-major axis and the TLE period.
pub fn kepler_period_check(
    sample: &PropagationSample,
    mean_motion_rev_per_day: f64,
    gm_km3_s2: f64,
) -> f64 {
    let r = sample.position_teme_km.norm();
    let v = sample.velocity_teme_km_per_s.norm();
    let energy = v * v / 2.0 - gm_km3_s2 / r;
    if energy >= 0.0 {
        return f64::INFINITY; // hyperbolic state, never valid for a catalog LEO
    }
    let a = -gm_km3_s2 / (2.0 * energy);
    let period_computed = 2.0 * std::f64::consts::PI * (a.powi(3) / gm_km3_s2).sqrt();
    let period_tle = 86_400.0 / mean_motion_rev_per_day;
    ((period_computed - period_tle) / period_tle).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tle::TleRecord;

    const ISS_LINE1: &str = "1 25544U 98067A   20045.18587073  .00000950  00000-0  25302-4 0  9990";
    const ISS_LINE2: &str = "2 25544  51.6443 242.0161 0004885 264.6060 207.3845 15.49165514212791";

    fn iss_record() -> TleRecord {
        TleRecord::from_lines(
            "ISS (ZARYA)",
            Constellation::Other("iss".into()),
            ISS_LINE1,
            ISS_LINE2,
        )
        .unwrap()
    }

    #[test]
    fn test_sample_at_epoch_within_leo_bounds() {
        let record = iss_record();
        let propagator = Propagator::new(&record).unwrap();
        let sample = propagator.sample_at(record.epoch_utc).unwrap();

        let r = sample.position_teme_km.norm();
        let v = sample.velocity_teme_km_per_s.norm();
        assert!((POSITION_BOUNDS_KM.0..=POSITION_BOUNDS_KM.1).contains(&r), "r = {r}");
        assert!((SPEED_BOUNDS_KM_S.0..=SPEED_BOUNDS_KM_S.1).contains(&v), "v = {v}");
        assert_eq!(sample.t_from_epoch_min, 0.0);
        assert!(!sample.flags.deep_space);
        assert!(!sample.flags.stale);
    }

    #[test]
    fn test_series_timestamps_step_exactly() {
        let record = iss_record();
        let propagator = Propagator::new(&record).unwrap();
        let plan = SamplingPlan::for_record(&record, 30.0);
        let series = propagator.propagate_series(plan).unwrap();

        // ISS period ~92.9 min → 186 samples at 30 s
        assert_eq!(series.len(), plan.samples);
        assert!(plan.samples >= 180 && plan.samples <= 190);

        for pair in series.windows(2) {
            let dt = pair[1].t_utc - pair[0].t_utc;
            assert_eq!(dt.num_microseconds().unwrap(), 30_000_000);
        }
    }

    #[test]
    fn test_stale_epoch_refused() {
        let record = iss_record();
        let propagator = Propagator::new(&record).unwrap();
        let far = record.epoch_utc + Duration::days(20);
        let err = propagator.sample_at(far).unwrap_err();
        assert!(matches!(err, OrbitalError::EpochStale { .. }));
    }

    #[test]
    fn test_stale_flag_between_7_and_14_days() {
        let record = iss_record();
        let propagator = Propagator::new(&record).unwrap();
        let aged = record.epoch_utc + Duration::days(8);
        let sample = propagator.sample_at(aged).unwrap();
        assert!(sample.flags.stale);
    }

    #[test]
    fn test_constellation_cadences() {
        let starlink = SamplingPlan::for_constellation(&Constellation::Starlink).unwrap();
        assert_eq!((starlink.samples, starlink.step_s), (192, 30.0));

        let oneweb = SamplingPlan::for_constellation(&Constellation::Oneweb).unwrap();
        assert_eq!((oneweb.samples, oneweb.step_s), (218, 30.0));

        assert!(SamplingPlan::for_constellation(&Constellation::Other("x".into())).is_none());
    }

    #[test]
    fn test_kepler_third_law_on_propagated_state() {
        let record = iss_record();
        let propagator = Propagator::new(&record).unwrap();
        let sample = propagator.sample_at(record.epoch_utc).unwrap();

        let deviation = kepler_period_check(&sample, record.mean_motion_rev_per_day, 398_600.4418);
        assert!(deviation <= 0.03, "Kepler deviation {deviation} above 3%");
    }
}
