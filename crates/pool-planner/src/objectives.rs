//! Planning objectives
//!
//! Three objectives, each normalised to [0, 1]:
//!   O₁ mean pool RSRP mapped through (rsrp + 110) / 50,
//!   O₂ angular dispersion on the sky (circular resultant + sector/band
//!      occupancy over 12 azimuth sectors and 6 elevation bands),
//!   O₃ one minus the expected handover rate inside the look-ahead
//!      horizon, with a soft bonus for members shared with the previous
//!      pool.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::SatelliteCandidate;

pub const AZIMUTH_SECTORS: usize = 12;
pub const ELEVATION_BANDS: usize = 6;

/// Weighted-sum weights over (O₁, O₂, O₃).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    pub signal: f64,
    pub coverage: f64,
    pub handover: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            signal: 0.4,
            coverage: 0.3,
            handover: 0.3,
        }
    }
}

/// Normalised objective values of one candidate pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObjectiveScores {
    pub signal_quality: f64,
    pub angular_dispersion: f64,
    pub handover_avoidance: f64,
}

impl ObjectiveScores {
    pub fn weighted(&self, weights: &ObjectiveWeights) -> f64 {
        weights.signal * self.signal_quality
            + weights.coverage * self.angular_dispersion
            + weights.handover * self.handover_avoidance
    }

    /// Pareto dominance: at least as good on every objective, strictly
    /// better on one.
    pub fn dominates(&self, other: &ObjectiveScores) -> bool {
        let ge = self.signal_quality >= other.signal_quality
            && self.angular_dispersion >= other.angular_dispersion
            && self.handover_avoidance >= other.handover_avoidance;
        let gt = self.signal_quality > other.signal_quality
            || self.angular_dispersion > other.angular_dispersion
            || self.handover_avoidance > other.handover_avoidance;
        ge && gt
    }
}

/// Circular-resultant diversity of a set of angles in degrees:
/// 1 − |Σ e^{iθ}| / N. Uniformly spread angles score near 1, clustered
/// angles near 0.
pub fn angular_diversity(angles_deg: &[f64]) -> f64 {
    if angles_deg.len() < 2 {
        return 0.0;
    }
    let (sum_x, sum_y) = angles_deg.iter().fold((0.0, 0.0), |(x, y), a| {
        let rad = a.to_radians();
        (x + rad.cos(), y + rad.sin())
    });
    let resultant = (sum_x * sum_x + sum_y * sum_y).sqrt();
    (1.0 - resultant / angles_deg.len() as f64).clamp(0.0, 1.0)
}

/// O₁: mean RSRP of the pool mapped to [0, 1].
pub fn signal_quality_objective(pool: &[&SatelliteCandidate]) -> f64 {
    if pool.is_empty() {
        return 0.0;
    }
    let mean_rsrp = pool.iter().map(|c| c.signal_quality).sum::<f64>() / pool.len() as f64;
    ((mean_rsrp + 110.0) / 50.0).clamp(0.0, 1.0)
}

/// O₂: angular dispersion of the pool on the sky.
pub fn angular_dispersion_objective(pool: &[&SatelliteCandidate]) -> f64 {
    if pool.is_empty() {
        return 0.0;
    }

    let azimuths: Vec<f64> = pool.iter().map(|c| c.azimuth_deg).collect();
    let diversity = angular_diversity(&azimuths);

    let sectors: BTreeSet<usize> = pool
        .iter()
        .map(|c| (c.azimuth_deg.rem_euclid(360.0) / 30.0) as usize % AZIMUTH_SECTORS)
        .collect();
    let bands: BTreeSet<usize> = pool
        .iter()
        .map(|c| ((c.elevation_deg / 15.0) as usize).min(ELEVATION_BANDS - 1))
        .collect();

    let occupancy = (sectors.len() as f64 / AZIMUTH_SECTORS as f64
        + bands.len() as f64 / ELEVATION_BANDS as f64)
        / 2.0;

    ((diversity + occupancy) / 2.0).clamp(0.0, 1.0)
}

/// O₃: 1 − expected handover rate. The rate is the share of pool members
/// whose current pass ends inside the look-ahead horizon; sharing members
/// with the previous pool earns a soft coherence bonus.
pub fn handover_avoidance_objective(
    pool: &[&SatelliteCandidate],
    t: DateTime<Utc>,
    look_ahead_s: f64,
    previous_pool: Option<&BTreeSet<u32>>,
    coherence_bonus: f64,
) -> f64 {
    if pool.is_empty() {
        return 0.0;
    }

    let horizon = t + Duration::microseconds((look_ahead_s * 1e6) as i64);
    let ending = pool
        .iter()
        .filter(|c| match c.window_end_at(t) {
            Some(end) => end <= horizon,
            None => true, // not in a window: counts as an imminent handover
        })
        .count();
    let rate = ending as f64 / pool.len() as f64;
    let mut score = 1.0 - rate;

    if let Some(previous) = previous_pool {
        if !previous.is_empty() {
            let shared = pool
                .iter()
                .filter(|c| previous.contains(&c.satellite_id))
                .count();
            let overlap = shared as f64 / pool.len() as f64;
            score += coherence_bonus * overlap;
        }
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use orbital_mechanics::Constellation;
    use proptest::prelude::*;
    use visibility_windows::VisibilityWindow;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn candidate(id: u32, azimuth_deg: f64, elevation_deg: f64, rsrp: f64, window_end_s: i64) -> SatelliteCandidate {
        SatelliteCandidate {
            satellite_id: id,
            constellation: Constellation::Starlink,
            signal_quality: rsrp,
            coverage_score: 0.5,
            handover_cost: 10.0,
            geographic_spread: 0.5,
            handover_potential: 0.3,
            elevation_deg,
            azimuth_deg,
            range_km: 800.0,
            windows: vec![VisibilityWindow {
                satellite_id: id,
                start_utc: t0(),
                end_utc: t0() + chrono::Duration::seconds(window_end_s),
                duration_s: window_end_s as f64,
                max_elevation_deg: elevation_deg,
                mean_elevation_deg: elevation_deg,
                mean_rsrp_dbm: rsrp,
                min_rsrp_dbm: rsrp - 5.0,
                max_rsrp_dbm: rsrp + 5.0,
                sample_count: 10,
            }],
        }
    }

    #[test]
    fn test_angular_diversity_extremes() {
        // Opposed pair: resultant cancels → full diversity
        assert!((angular_diversity(&[0.0, 180.0]) - 1.0).abs() < 1e-12);

        // Clustered: resultant ≈ N → no diversity
        assert!(angular_diversity(&[10.0, 11.0, 12.0]) < 0.01);

        // Uniform spread of 4
        assert!((angular_diversity(&[0.0, 90.0, 180.0, 270.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_signal_objective_mapping() {
        let strong = candidate(1, 0.0, 40.0, -85.0, 600);
        let weak = candidate(2, 90.0, 40.0, -110.0, 600);

        // −85 → 0.5, −110 → 0.0
        assert!((signal_quality_objective(&[&strong]) - 0.5).abs() < 1e-12);
        assert!(signal_quality_objective(&[&weak]).abs() < 1e-12);
    }

    #[test]
    fn test_handover_objective_penalises_ending_windows() {
        let long = candidate(1, 0.0, 40.0, -100.0, 3_600);
        let short = candidate(2, 90.0, 40.0, -100.0, 120);

        let t = t0();
        let stable = handover_avoidance_objective(&[&long], t, 600.0, None, 0.0);
        let churning = handover_avoidance_objective(&[&short], t, 600.0, None, 0.0);
        assert!((stable - 1.0).abs() < 1e-12);
        assert!(churning.abs() < 1e-12);
    }

    #[test]
    fn test_coherence_bonus_applied() {
        // One stable pass, one ending inside the horizon: base score 0.5,
        // leaving headroom for the bonus before the clamp
        let a = candidate(1, 0.0, 40.0, -100.0, 3_600);
        let b = candidate(2, 90.0, 40.0, -100.0, 120);
        let previous: BTreeSet<u32> = [1, 2].into_iter().collect();

        let with_bonus =
            handover_avoidance_objective(&[&a, &b], t0(), 600.0, Some(&previous), 0.1);
        let without = handover_avoidance_objective(&[&a, &b], t0(), 600.0, None, 0.1);
        assert!((without - 0.5).abs() < 1e-9);
        assert!((with_bonus - without - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_dominance() {
        let better = ObjectiveScores {
            signal_quality: 0.8,
            angular_dispersion: 0.6,
            handover_avoidance: 0.7,
        };
        let worse = ObjectiveScores {
            signal_quality: 0.7,
            angular_dispersion: 0.6,
            handover_avoidance: 0.6,
        };
        assert!(better.dominates(&worse));
        assert!(!worse.dominates(&better));
        assert!(!better.dominates(&better));
    }

    proptest! {
        /// Diversity always lands in [0, 1].
        #[test]
        fn prop_angular_diversity_bounded(angles in prop::collection::vec(0.0_f64..360.0, 2..24)) {
            let d = angular_diversity(&angles);
            prop_assert!((0.0..=1.0).contains(&d));
        }
    }
}
