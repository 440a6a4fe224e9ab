//! TLE records
//!
//! Classical NORAD two-line element handling: Modulo-10 checksum
//! verification and repair, epoch parsing to microsecond precision, and the
//! line-consistency checks a record must pass before propagation.
//!
//! Checksum rules: digits contribute their value, '-' contributes 1,
//! everything else ('+', letters, spaces, '.') contributes 0. A legacy
//! variant circulating in older catalogs counts '+' as 1 as well; such
//! lines are accepted but tallied separately.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrbitalError, Result};

/// Exact column count of a TLE line.
pub const TLE_LINE_LEN: usize = 69;

/// Constellation tag carried through every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constellation {
    Starlink,
    Oneweb,
    Other(String),
}

impl Constellation {
    pub fn parse(tag: &str) -> Self {
        let lower = tag.to_ascii_lowercase();
        if lower.contains("starlink") {
            Constellation::Starlink
        } else if lower.contains("oneweb") {
            Constellation::Oneweb
        } else {
            Constellation::Other(lower)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Constellation::Starlink => "starlink",
            Constellation::Oneweb => "oneweb",
            Constellation::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for Constellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying a line's Modulo-10 checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumStatus {
    /// Matches the official Modulo-10 sum.
    Official,
    /// Matches only the legacy variant that counts '+' as 1.
    Legacy,
    /// Matches neither; the line was repaired.
    Repaired,
}

/// Official Modulo-10 checksum over the first 68 columns.
pub fn checksum_official(line: &str) -> u8 {
    (line
        .bytes()
        .take(68)
        .map(|b| {
            if b.is_ascii_digit() {
                (b - b'0') as u16
            } else if b == b'-' {
                1u16
            } else {
                0u16
            }
        })
        .sum::<u16>()
        % 10) as u8
}

/// Legacy checksum: official sum plus 1 per '+'.
pub fn checksum_legacy(line: &str) -> u8 {
    let plus = line.bytes().take(68).filter(|&b| b == b'+').count() as u16;
    ((checksum_official(line) as u16 + plus) % 10) as u8
}

/// Classify a line's stored checksum, repairing column 69 when it matches
/// neither rule. Returns the (possibly rewritten) line and its status.
pub fn verify_or_repair(line: &str) -> Result<(String, ChecksumStatus)> {
    if line.len() != TLE_LINE_LEN || !line.is_ascii() {
        return Err(OrbitalError::InvalidTle(format!(
            "line must be exactly {TLE_LINE_LEN} ASCII columns, got {}",
            line.len()
        )));
    }

    let stored = line.as_bytes()[68];
    let official = checksum_official(line);

    if stored == official + b'0' {
        return Ok((line.to_string(), ChecksumStatus::Official));
    }
    if stored == checksum_legacy(line) + b'0' {
        return Ok((line.to_string(), ChecksumStatus::Legacy));
    }

    let mut repaired = line[..68].to_string();
    repaired.push((official + b'0') as char);
    Ok((repaired, ChecksumStatus::Repaired))
}

/// One validated catalog entry. Immutable once inside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TleRecord {
    pub norad_id: u32,
    pub name: String,
    pub constellation: Constellation,
    pub line1: String,
    pub line2: String,
    pub epoch_utc: DateTime<Utc>,
    pub mean_motion_rev_per_day: f64,
    /// Epoch resolution implied by the fractional-day digits, in seconds.
    pub epoch_precision_s: f64,
    pub checksum_status: [ChecksumStatus; 2],
}

impl TleRecord {
    /// Build a record from a name line and the two element lines, repairing
    /// checksums and validating cross-line consistency.
    pub fn from_lines(
        name: &str,
        constellation: Constellation,
        line1: &str,
        line2: &str,
    ) -> Result<Self> {
        let (line1, status1) = verify_or_repair(line1)?;
        let (line2, status2) = verify_or_repair(line2)?;

        let id1 = parse_norad_id(&line1)?;
        let id2 = parse_norad_id(&line2)?;
        if id1 != id2 {
            return Err(OrbitalError::NoradIdMismatch {
                line1_id: id1,
                line2_id: id2,
            });
        }

        let (epoch_utc, epoch_precision_s) = parse_epoch(&line1)?;
        let mean_motion = parse_mean_motion(&line2)?;

        Ok(Self {
            norad_id: id1,
            name: name.trim().to_string(),
            constellation,
            line1,
            line2,
            epoch_utc,
            mean_motion_rev_per_day: mean_motion,
            epoch_precision_s,
            checksum_status: [status1, status2],
        })
    }

    /// Orbital period implied by the TLE mean motion, in seconds.
    pub fn orbital_period_s(&self) -> f64 {
        86_400.0 / self.mean_motion_rev_per_day
    }

    /// Epoch quality grade: resolution ladder, downgraded one step when the
    /// epoch is more than three days from the reference instant.
    pub fn epoch_quality_grade(&self, reference: DateTime<Utc>) -> &'static str {
        let grade = if self.epoch_precision_s <= 1.0 {
            "A+"
        } else if self.epoch_precision_s <= 60.0 {
            "A"
        } else if self.epoch_precision_s <= 3600.0 {
            "B"
        } else {
            "C"
        };

        let age_days = (reference - self.epoch_utc).num_seconds().abs() as f64 / 86_400.0;
        if age_days > 3.0 {
            match grade {
                "A+" | "A" => "B+",
                other => other,
            }
        } else {
            grade
        }
    }
}

/// NORAD id from columns 3-7 of either line.
fn parse_norad_id(line: &str) -> Result<u32> {
    line[2..7]
        .trim()
        .parse::<u32>()
        .map_err(|_| OrbitalError::InvalidTle(format!("unparseable NORAD id '{}'", &line[2..7])))
}

/// TLE epoch from line 1 columns 19-32 (YYDDD.dddddddd), microsecond
/// precision. Two-digit years below 57 are in the 2000s.
fn parse_epoch(line1: &str) -> Result<(DateTime<Utc>, f64)> {
    let year_field = &line1[18..20];
    let day_field = &line1[20..32];

    let yy: i32 = year_field
        .trim()
        .parse()
        .map_err(|_| OrbitalError::EpochUnparseable(format!("epoch year '{year_field}'")))?;
    let full_year = if yy < 57 { 2000 + yy } else { 1900 + yy };

    let day_of_year: f64 = day_field
        .trim()
        .parse()
        .map_err(|_| OrbitalError::EpochUnparseable(format!("epoch day '{day_field}'")))?;
    if !(1.0..367.0).contains(&day_of_year) {
        return Err(OrbitalError::EpochUnparseable(format!(
            "epoch day {day_of_year} out of range"
        )));
    }

    let whole_day = day_of_year.floor();
    let day_fraction = day_of_year - whole_day;

    let date = NaiveDate::from_yo_opt(full_year, whole_day as u32).ok_or_else(|| {
        OrbitalError::EpochUnparseable(format!("invalid ordinal day {whole_day} in {full_year}"))
    })?;

    let micros = (day_fraction * 86_400.0 * 1e6).round() as i64;
    let naive = date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        + Duration::microseconds(micros);

    let fractional_digits = day_field
        .trim()
        .split_once('.')
        .map(|(_, frac)| frac.trim_end().len())
        .unwrap_or(0);
    let precision_s = if fractional_digits > 0 {
        86_400.0 / 10f64.powi(fractional_digits as i32)
    } else {
        86_400.0
    };

    Ok((DateTime::from_naive_utc_and_offset(naive, Utc), precision_s))
}

/// Mean motion from line 2 columns 53-63, rev/day.
fn parse_mean_motion(line2: &str) -> Result<f64> {
    let field = &line2[52..63];
    let value: f64 = field
        .trim()
        .parse()
        .map_err(|_| OrbitalError::InvalidTle(format!("unparseable mean motion '{field}'")))?;
    if !(0.0..20.0).contains(&value) {
        return Err(OrbitalError::InvalidTle(format!(
            "mean motion {value} rev/day out of range"
        )));
    }
    Ok(value)
}
