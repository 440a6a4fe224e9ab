//! Candidate feature extraction
//!
//! Reduces a satellite's trajectory and windows to the scalar features the
//! pool planner consumes. Representative look angles come from the sample
//! at maximum elevation; the handover cost follows the 3GPP-style model of
//! base cost × distance factor × signal-stability factor × constellation
//! factor, capped at 100.

use link_budget::SignalSample;
use orbital_mechanics::{Constellation, TleRecord};
use pool_planner::SatelliteCandidate;
use visibility_windows::VisibilityWindow;

/// Reference slant range for the distance factor, km (Starlink shell).
const REFERENCE_DISTANCE_KM: f64 = 550.0;

/// Build the planner candidate, or None when the satellite never produced
/// a usable window.
pub fn build_candidate(
    record: &TleRecord,
    samples: &[SignalSample],
    windows: &[VisibilityWindow],
) -> Option<SatelliteCandidate> {
    if windows.is_empty() {
        return None;
    }

    // Sample-count-weighted mean RSRP across windows
    let total_samples: usize = windows.iter().map(|w| w.sample_count).sum();
    let signal_quality = windows
        .iter()
        .map(|w| w.mean_rsrp_dbm * w.sample_count as f64)
        .sum::<f64>()
        / total_samples.max(1) as f64;

    // Representative geometry: the visible sample at peak elevation
    let peak = samples
        .iter()
        .filter(|s| s.is_visible && s.reliable)
        .max_by(|a, b| a.elevation_deg.total_cmp(&b.elevation_deg))?;

    let rsrp_norm = ((signal_quality + 120.0) / 50.0).clamp(0.0, 1.0);
    let elevation_norm = (peak.elevation_deg / 90.0).clamp(0.0, 1.0);
    let coverage_score = 0.6 * rsrp_norm + 0.4 * elevation_norm;

    let handover_potential = ((90.0 - peak.elevation_deg) / 90.0).clamp(0.0, 1.0);

    let geographic_spread = azimuth_sector_spread(samples);

    Some(SatelliteCandidate {
        satellite_id: record.norad_id,
        constellation: record.constellation.clone(),
        signal_quality,
        coverage_score,
        handover_cost: handover_cost(record, signal_quality, peak.range_km),
        geographic_spread,
        handover_potential,
        elevation_deg: peak.elevation_deg,
        azimuth_deg: peak.azimuth_deg,
        range_km: peak.range_km,
        windows: windows.to_vec(),
    })
}

/// Share of the 12 azimuth sectors this satellite's visible samples touch.
fn azimuth_sector_spread(samples: &[SignalSample]) -> f64 {
    let mut sectors = [false; 12];
    for sample in samples.iter().filter(|s| s.is_visible && s.reliable) {
        let sector = (sample.azimuth_deg.rem_euclid(360.0) / 30.0) as usize % 12;
        sectors[sector] = true;
    }
    sectors.iter().filter(|&&hit| hit).count() as f64 / 12.0
}

/// Handover cost in standardised units, capped at 100.
fn handover_cost(record: &TleRecord, mean_rsrp_dbm: f64, range_km: f64) -> f64 {
    let base_cost = 10.0;

    let distance_factor = if range_km > 0.0 {
        (range_km / REFERENCE_DISTANCE_KM).sqrt().min(3.0)
    } else {
        1.0
    };

    // Fade margin relative to a −100 dBm baseline: weaker links churn more
    let fade_margin_db = mean_rsrp_dbm + 100.0;
    let stability_factor = if fade_margin_db > 0.0 {
        (1.0 + (20.0 - fade_margin_db) / 20.0).max(0.5)
    } else {
        2.0
    };

    let constellation_factor = match &record.constellation {
        Constellation::Starlink => 1.0,
        Constellation::Oneweb => 1.2,
        Constellation::Other(_) => 1.5,
    };

    (base_cost * distance_factor * stability_factor * constellation_factor).min(100.0)
}
