//! IERS Earth orientation parameters
//!
//! Parses the USNO/IERS rapid-service `finals2000A.all` file by its fixed
//! column offsets and serves polar motion, UT1-UTC and nutation corrections
//! at arbitrary UTC instants. Retrieval prefers a direct record hit
//! (|ΔMJD| ≤ 0.5 d) and falls back to linear interpolation between records
//! within ±2 d; outside that the lookup fails rather than fabricating a
//! unit-matrix answer.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{ReferenceDataError, Result};

/// MJD of the Unix epoch (1970-01-01T00:00:00 UTC).
const UNIX_EPOCH_MJD: f64 = 40_587.0;

/// Direct-hit window around a tabulated record.
const DIRECT_HIT_MJD: f64 = 0.5;

/// Interpolation search window.
const INTERPOLATION_MJD: f64 = 2.0;

/// Age past which a lookup logs a data-freshness warning.
const FRESHNESS_WARN_DAYS: f64 = 7.0;

/// Convert a UTC instant to Modified Julian Date.
pub fn datetime_to_mjd(t: DateTime<Utc>) -> f64 {
    let seconds = t.timestamp() as f64 + t.timestamp_subsec_micros() as f64 * 1e-6;
    UNIX_EPOCH_MJD + seconds / 86_400.0
}

/// Where an EOP answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EopSource {
    RapidService,
    BulletinA,
    Interpolated,
}

/// One Earth-orientation record, arcseconds and seconds as published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EopRecord {
    pub mjd: f64,
    pub x_pm_arcsec: f64,
    pub y_pm_arcsec: f64,
    pub ut1_minus_utc_s: f64,
    pub lod_ms: f64,
    pub dx_nut_arcsec: f64,
    pub dy_nut_arcsec: f64,
    pub sigma_x_arcsec: f64,
    pub sigma_y_arcsec: f64,
    pub sigma_ut1_s: f64,
    pub source: EopSource,
}

/// Data-quality summary over the loaded table.
#[derive(Debug, Clone, Serialize)]
pub struct EopQualityReport {
    pub record_count: usize,
    pub mjd_min: f64,
    pub mjd_max: f64,
    pub latency_hours: f64,
    pub gaps_over_1_5_days: usize,
    pub interpolation_quality: &'static str,
}

/// Immutable EOP table keyed by MJD.
///
/// Loaded once at pipeline start and shared by reference; lookups take no
/// locks.
pub struct EopProvider {
    records: Vec<EopRecord>,
}

impl EopProvider {
    /// Parse `finals2000A.all`. Unparseable lines are skipped; an empty
    /// result is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReferenceDataError::FileMissing(path.to_path_buf()));
        }

        if let Ok(meta) = fs::metadata(path) {
            if let Ok(modified) = meta.modified() {
                if let Ok(age) = modified.elapsed() {
                    let age_hours = age.as_secs_f64() / 3600.0;
                    if age_hours > 24.0 {
                        warn!(
                            file = %path.display(),
                            age_hours = format!("{age_hours:.1}"),
                            "finals2000A.all is older than 24 h; EOP may lag the rapid service"
                        );
                    }
                }
            }
        }

        let raw = fs::read_to_string(path).map_err(|source| ReferenceDataError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut records = Vec::new();
        for line in raw.lines() {
            if let Some(record) = parse_finals_line(line) {
                records.push(record);
            }
        }

        if records.is_empty() {
            return Err(ReferenceDataError::EopEmpty(path.to_path_buf()));
        }

        records.sort_by(|a, b| a.mjd.total_cmp(&b.mjd));
        records.dedup_by(|a, b| a.mjd == b.mjd);

        info!(
            records = records.len(),
            mjd_min = records.first().map(|r| r.mjd).unwrap_or(0.0),
            mjd_max = records.last().map(|r| r.mjd).unwrap_or(0.0),
            "parsed finals2000A EOP table"
        );

        Ok(Self { records })
    }

    /// Build a provider from already-parsed records (test fixtures).
    pub fn from_records(mut records: Vec<EopRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(ReferenceDataError::EopEmpty("<memory>".into()));
        }
        records.sort_by(|a, b| a.mjd.total_cmp(&b.mjd));
        Ok(Self { records })
    }

    /// Merge an optional Bulletin A JSON snapshot into the table. Bulletin
    /// entries fill MJDs the rapid service does not cover; rapid-service
    /// rows always win on conflict.
    pub fn merge_bulletin_a(&mut self, path: &Path) -> Result<usize> {
        let raw = fs::read_to_string(path).map_err(|source| ReferenceDataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: BulletinASnapshot =
            serde_json::from_str(&raw).map_err(|source| ReferenceDataError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let mut merged = 0usize;
        for entry in snapshot.data {
            if entry.mjd <= 0.0 {
                continue;
            }
            let exists = self
                .records
                .iter()
                .any(|r| (r.mjd - entry.mjd).abs() < f64::EPSILON);
            if exists {
                continue;
            }
            self.records.push(EopRecord {
                mjd: entry.mjd,
                x_pm_arcsec: entry.x,
                y_pm_arcsec: entry.y,
                ut1_minus_utc_s: entry.ut1_utc,
                lod_ms: entry.lod,
                dx_nut_arcsec: entry.dx,
                dy_nut_arcsec: entry.dy,
                sigma_x_arcsec: entry.x_err,
                sigma_y_arcsec: entry.y_err,
                sigma_ut1_s: entry.ut1_utc_err,
                source: EopSource::BulletinA,
            });
            merged += 1;
        }
        self.records.sort_by(|a, b| a.mjd.total_cmp(&b.mjd));

        info!(merged, file = %path.display(), "merged Bulletin A snapshot");
        Ok(merged)
    }

    /// EOP at a UTC instant.
    pub fn eop_at_utc(&self, t: DateTime<Utc>) -> Result<EopRecord> {
        self.eop_at_mjd(datetime_to_mjd(t))
    }

    /// EOP at an MJD. Direct hit within 0.5 d, otherwise linear
    /// interpolation between the nearest records within ±2 d.
    pub fn eop_at_mjd(&self, mjd: f64) -> Result<EopRecord> {
        let nearest = self.nearest_index(mjd);
        let nearest_distance = (self.records[nearest].mjd - mjd).abs();

        if mjd - self.records[nearest].mjd > FRESHNESS_WARN_DAYS {
            warn!(
                mjd = format!("{mjd:.2}"),
                nearest_mjd = format!("{:.2}", self.records[nearest].mjd),
                "EOP data is more than 7 days older than the requested instant"
            );
        }

        if nearest_distance <= DIRECT_HIT_MJD {
            return Ok(self.records[nearest].clone());
        }

        self.interpolate(mjd).ok_or(ReferenceDataError::EopUnavailable {
            mjd,
            min_mjd: self.records.first().map(|r| r.mjd).unwrap_or(f64::NAN),
            max_mjd: self.records.last().map(|r| r.mjd).unwrap_or(f64::NAN),
        })
    }

    /// Polar motion rotation W = R1(y)·R2(x).
    pub fn polar_motion_matrix(&self, t: DateTime<Utc>) -> Result<Matrix3<f64>> {
        let eop = self.eop_at_utc(t)?;
        Ok(polar_motion_from_arcsec(eop.x_pm_arcsec, eop.y_pm_arcsec))
    }

    pub fn quality_report(&self, now: DateTime<Utc>) -> EopQualityReport {
        let mjd_min = self.records.first().map(|r| r.mjd).unwrap_or(f64::NAN);
        let mjd_max = self.records.last().map(|r| r.mjd).unwrap_or(f64::NAN);
        let latency_hours = (datetime_to_mjd(now) - mjd_max) * 24.0;

        let gaps = self
            .records
            .windows(2)
            .filter(|pair| pair[1].mjd - pair[0].mjd > 1.5)
            .count();

        let interpolation_quality = if latency_hours < 24.0 {
            "excellent"
        } else if latency_hours < 72.0 {
            "good"
        } else {
            "poor"
        };

        EopQualityReport {
            record_count: self.records.len(),
            mjd_min,
            mjd_max,
            latency_hours,
            gaps_over_1_5_days: gaps,
            interpolation_quality,
        }
    }

    fn nearest_index(&self, mjd: f64) -> usize {
        let upper = self.records.partition_point(|r| r.mjd < mjd);
        if upper == 0 {
            return 0;
        }
        if upper >= self.records.len() {
            return self.records.len() - 1;
        }
        let below = &self.records[upper - 1];
        let above = &self.records[upper];
        if (mjd - below.mjd).abs() <= (above.mjd - mjd).abs() {
            upper - 1
        } else {
            upper
        }
    }

    fn interpolate(&self, mjd: f64) -> Option<EopRecord> {
        let in_window: Vec<&EopRecord> = self
            .records
            .iter()
            .filter(|r| (r.mjd - mjd).abs() <= INTERPOLATION_MJD)
            .collect();
        if in_window.len() < 2 {
            return None;
        }

        // Bracketing pair, clamped at the window edges.
        let upper = in_window.partition_point(|r| r.mjd < mjd);
        let (lo, hi) = if upper == 0 {
            (in_window[0], in_window[1])
        } else if upper >= in_window.len() {
            (in_window[in_window.len() - 2], in_window[in_window.len() - 1])
        } else {
            (in_window[upper - 1], in_window[upper])
        };

        let span = hi.mjd - lo.mjd;
        let frac = if span.abs() < f64::EPSILON {
            0.0
        } else {
            ((mjd - lo.mjd) / span).clamp(0.0, 1.0)
        };
        let lerp = |a: f64, b: f64| a + (b - a) * frac;

        debug!(
            mjd = format!("{mjd:.3}"),
            lo = lo.mjd,
            hi = hi.mjd,
            "interpolating EOP record"
        );

        Some(EopRecord {
            mjd,
            x_pm_arcsec: lerp(lo.x_pm_arcsec, hi.x_pm_arcsec),
            y_pm_arcsec: lerp(lo.y_pm_arcsec, hi.y_pm_arcsec),
            ut1_minus_utc_s: lerp(lo.ut1_minus_utc_s, hi.ut1_minus_utc_s),
            lod_ms: lerp(lo.lod_ms, hi.lod_ms),
            dx_nut_arcsec: lerp(lo.dx_nut_arcsec, hi.dx_nut_arcsec),
            dy_nut_arcsec: lerp(lo.dy_nut_arcsec, hi.dy_nut_arcsec),
            // Interpolated answers carry inflated uncertainty.
            sigma_x_arcsec: 0.2,
            sigma_y_arcsec: 0.2,
            sigma_ut1_s: 0.1,
            source: EopSource::Interpolated,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BulletinASnapshot {
    data: Vec<BulletinAEntry>,
}

fn default_sigma() -> f64 {
    0.1
}

#[derive(Debug, Deserialize)]
struct BulletinAEntry {
    mjd: f64,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    ut1_utc: f64,
    #[serde(default)]
    lod: f64,
    #[serde(default)]
    dx: f64,
    #[serde(default)]
    dy: f64,
    #[serde(default = "default_sigma")]
    x_err: f64,
    #[serde(default = "default_sigma")]
    y_err: f64,
    #[serde(default = "default_sigma")]
    ut1_utc_err: f64,
}

/// Polar motion matrix from published arcsecond offsets.
pub fn polar_motion_from_arcsec(x_arcsec: f64, y_arcsec: f64) -> Matrix3<f64> {
    let arcsec_to_rad = std::f64::consts::PI / (180.0 * 3600.0);
    let x = x_arcsec * arcsec_to_rad;
    let y = y_arcsec * arcsec_to_rad;

    let (sx, cx) = x.sin_cos();
    let (sy, cy) = y.sin_cos();

    // W = R1(y)·R2(x)
    Matrix3::new(
        cx,
        0.0,
        -sx,
        sy * sx,
        cy,
        sy * cx,
        cy * sx,
        -sy,
        cy * cx,
    )
}

/// Parse one Finals2000A line. Returns None for headers, predictions
/// lacking the IAU2000 columns, and malformed rows.
fn parse_finals_line(line: &str) -> Option<EopRecord> {
    if line.len() < 185 {
        return None;
    }

    let field = |start: usize, end: usize| -> Option<f64> {
        line.get(start..end)?.trim().parse::<f64>().ok()
    };

    let mjd = field(7, 15)?;
    let x_pm_arcsec = field(18, 27)?;
    let y_pm_arcsec = field(37, 46)?;
    let ut1_minus_utc_s = field(58, 68)?;

    // Published sigmas; rapid-service rows sometimes leave these blank.
    let sigma_x_arcsec = field(27, 36).unwrap_or(0.1);
    let sigma_y_arcsec = field(46, 55).unwrap_or(0.1);
    let sigma_ut1_s = field(68, 78).unwrap_or(0.1);

    let lod_ms = field(79, 86).unwrap_or(0.0);
    let dx_nut_arcsec = field(97, 106).unwrap_or(0.0);
    let dy_nut_arcsec = field(116, 125).unwrap_or(0.0);

    Some(EopRecord {
        mjd,
        x_pm_arcsec,
        y_pm_arcsec,
        ut1_minus_utc_s,
        lod_ms,
        dx_nut_arcsec,
        dy_nut_arcsec,
        sigma_x_arcsec,
        sigma_y_arcsec,
        sigma_ut1_s,
        source: EopSource::RapidService,
    })
}
