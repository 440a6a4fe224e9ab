//! Time scale conversions
//!
//! UTC ↔ TAI ↔ TT offsets and the Julian-date helpers the coordinate chain
//! needs. UT1 is derived from UTC plus the ΔUT1 published in the IERS EOP
//! tables; callers pass that offset in rather than reaching for a global.

use chrono::{DateTime, TimeZone, Utc};

/// TT − TAI, seconds (defined).
pub const TT_MINUS_TAI_S: f64 = 32.184;

/// J2000.0 as a Julian date (TT).
pub const JD_J2000: f64 = 2_451_545.0;

/// JD − MJD offset.
pub const MJD_OFFSET: f64 = 2_400_000.5;

/// Leap-second steps relevant to the supported catalog era. Each entry is
/// (effective UTC instant, TAI−UTC after the step).
const LEAP_SECONDS: &[(i64, f64)] = &[
    // 2012-07-01, 2015-07-01, 2017-01-01 (unix timestamps)
    (1_341_100_800, 35.0),
    (1_435_708_800, 36.0),
    (1_483_228_800, 37.0),
];

/// TAI − UTC at a UTC instant.
pub fn tai_minus_utc(t: DateTime<Utc>) -> f64 {
    let unix = t.timestamp();
    let mut offset = 34.0; // value in force before 2012-07-01
    for &(effective, value) in LEAP_SECONDS {
        if unix >= effective {
            offset = value;
        }
    }
    offset
}

/// TT − UTC at a UTC instant.
pub fn tt_minus_utc(t: DateTime<Utc>) -> f64 {
    tai_minus_utc(t) + TT_MINUS_TAI_S
}

/// Julian date of a UTC instant, on the UTC scale.
pub fn julian_date_utc(t: DateTime<Utc>) -> f64 {
    let seconds = t.timestamp() as f64 + t.timestamp_subsec_micros() as f64 * 1e-6;
    // Unix epoch is JD 2440587.5
    2_440_587.5 + seconds / 86_400.0
}

/// Julian date on the TT scale.
pub fn julian_date_tt(t: DateTime<Utc>) -> f64 {
    julian_date_utc(t) + tt_minus_utc(t) / 86_400.0
}

/// Julian date on the UT1 scale, given ΔUT1 = UT1 − UTC from the EOP table.
pub fn julian_date_ut1(t: DateTime<Utc>, ut1_minus_utc_s: f64) -> f64 {
    julian_date_utc(t) + ut1_minus_utc_s / 86_400.0
}

/// Julian centuries of TT since J2000.0.
pub fn julian_centuries_tt(t: DateTime<Utc>) -> f64 {
    (julian_date_tt(t) - JD_J2000) / 36_525.0
}

/// UTC instant from an MJD on the UTC scale.
pub fn utc_from_mjd(mjd: f64) -> DateTime<Utc> {
    let seconds = (mjd - 40_587.0) * 86_400.0;
    let whole = seconds.floor();
    let micros = ((seconds - whole) * 1e6).round() as u32;
    Utc.timestamp_opt(whole as i64, micros * 1_000)
        .single()
        .expect("MJD within chrono range")
}
