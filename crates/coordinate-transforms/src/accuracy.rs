//! Per-sample accuracy estimate
//!
//! Combines the EOP uncertainties (polar motion sigmas mapped through the
//! Earth radius, UT1 sigma mapped through the surface rotation speed), a
//! propagation-age term and a small ephemeris floor, in quadrature.

use chrono::{DateTime, Utc};

use reference_data::{datetime_to_mjd, EopRecord, EopSource};

/// Ephemeris error floor, meters.
const EPHEMERIS_FLOOR_M: f64 = 0.01;

/// Propagation-age error growth, meters per day from epoch.
const PROPAGATION_ERROR_M_PER_DAY: f64 = 0.001;

/// Age past which the EOP contribution is treated as degraded.
const STALE_EOP_DAYS: f64 = 7.0;

pub fn estimate_accuracy_m(
    eop: &EopRecord,
    t_utc: DateTime<Utc>,
    t_from_epoch_min: f64,
    earth_radius_m: f64,
) -> f64 {
    let arcsec_to_m = earth_radius_m * std::f64::consts::PI / (180.0 * 3600.0);

    let x_error_m = eop.sigma_x_arcsec * arcsec_to_m;
    let y_error_m = eop.sigma_y_arcsec * arcsec_to_m;

    let surface_speed_m_s = 2.0 * std::f64::consts::PI * earth_radius_m / 86_400.0;
    let ut1_error_m = eop.sigma_ut1_s.abs() * surface_speed_m_s;

    let eop_error_m = (x_error_m * x_error_m + y_error_m * y_error_m + ut1_error_m * ut1_error_m)
        .sqrt();

    let propagation_age_days = (t_from_epoch_min / 1_440.0).abs();
    let propagation_error_m = propagation_age_days * PROPAGATION_ERROR_M_PER_DAY;

    let mut total = (eop_error_m * eop_error_m
        + propagation_error_m * propagation_error_m
        + EPHEMERIS_FLOOR_M * EPHEMERIS_FLOOR_M)
        .sqrt();

    let eop_age_days = (datetime_to_mjd(t_utc) - eop.mjd).abs();
    if eop_age_days > STALE_EOP_DAYS {
        total *= 3.0;
    }
    if eop.source == EopSource::Interpolated {
        total *= 1.5;
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(mjd: f64, source: EopSource) -> EopRecord {
        EopRecord {
            mjd,
            x_pm_arcsec: 0.1,
            y_pm_arcsec: 0.3,
            ut1_minus_utc_s: -0.1,
            lod_ms: 1.0,
            dx_nut_arcsec: 0.0,
            dy_nut_arcsec: 0.0,
            sigma_x_arcsec: 0.0001,
            sigma_y_arcsec: 0.0001,
            sigma_ut1_s: 0.00001,
            source,
        }
    }

    #[test]
    fn test_nominal_estimate_below_one_meter() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mjd = datetime_to_mjd(t);
        let accuracy = estimate_accuracy_m(&record(mjd, EopSource::RapidService), t, 60.0, 6.378e6);
        assert!(accuracy < 1.0, "nominal accuracy {accuracy} m");
        assert!(accuracy >= EPHEMERIS_FLOOR_M);
    }

    #[test]
    fn test_stale_and_interpolated_penalties() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mjd = datetime_to_mjd(t);

        let nominal = estimate_accuracy_m(&record(mjd, EopSource::RapidService), t, 60.0, 6.378e6);
        let stale = estimate_accuracy_m(
            &record(mjd - 10.0, EopSource::RapidService),
            t,
            60.0,
            6.378e6,
        );
        let interpolated =
            estimate_accuracy_m(&record(mjd, EopSource::Interpolated), t, 60.0, 6.378e6);

        assert!((stale / nominal - 3.0).abs() < 1e-9);
        assert!((interpolated / nominal - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_accuracy_grows_with_propagation_age() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mjd = datetime_to_mjd(t);
        let fresh = estimate_accuracy_m(&record(mjd, EopSource::RapidService), t, 0.0, 6.378e6);
        let aged = estimate_accuracy_m(
            &record(mjd, EopSource::RapidService),
            t,
            10_080.0, // 7 days
            6.378e6,
        );
        assert!(aged > fresh);
    }
}
