//! Pool Planner
//!
//! Multi-objective selection of a time-varying satellite pool for handover
//! research. At each instant of the planning grid, candidate pools are
//! generated by four strategies, scored against three normalised
//! objectives (signal quality, angular dispersion, expected handover
//! rate), filtered by hard constraints, and reduced to either the
//! non-dominated front or the single weighted optimum.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orbital_mechanics::Constellation;
use visibility_windows::VisibilityWindow;

pub mod objectives;
pub mod pareto;
pub mod planner;
pub mod strategies;

pub use objectives::{angular_diversity, ObjectiveScores, ObjectiveWeights};
pub use pareto::PoolEvaluation;
pub use planner::{
    PlanCoverageGap, PlanInstant, PlanOutput, PlannerConfig, PoolPlan, PoolPlanner,
    StrategyScoreSummary,
};
pub use strategies::{pool_score, RlWeights, Strategy, StrategyPool};

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("No candidates supplied to the planner")]
    NoCandidates,
    #[error("Planning grid is empty (no visibility windows)")]
    EmptyGrid,
    #[error("Invalid planner configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PlannerError>;

/// C7 input: one satellite's aggregate features plus its visibility
/// windows. Representative look angles come from the sample at maximum
/// elevation across the satellite's windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatelliteCandidate {
    pub satellite_id: u32,
    pub constellation: Constellation,
    /// Mean window RSRP, dBm.
    pub signal_quality: f64,
    /// Combined RSRP/elevation coverage feature in [0, 1].
    pub coverage_score: f64,
    /// 3GPP-style handover cost in [0, 100].
    pub handover_cost: f64,
    /// Azimuth-sector occupancy of the satellite's own passes, [0, 1].
    pub geographic_spread: f64,
    /// Predicted handover frequency in [0, 1] (low elevation → high churn).
    pub handover_potential: f64,
    /// Representative elevation, degrees.
    pub elevation_deg: f64,
    /// Representative azimuth, degrees from north.
    pub azimuth_deg: f64,
    /// Representative slant range, km.
    pub range_km: f64,
    pub windows: Vec<VisibilityWindow>,
}

impl SatelliteCandidate {
    /// Visible at `t` if any window spans the instant.
    pub fn visible_at(&self, t: DateTime<Utc>) -> bool {
        self.windows.iter().any(|w| w.start_utc <= t && t <= w.end_utc)
    }

    /// The window spanning `t`, if any.
    pub fn window_at(&self, t: DateTime<Utc>) -> Option<&VisibilityWindow> {
        self.windows.iter().find(|w| w.start_utc <= t && t <= w.end_utc)
    }

    /// End of the pass covering `t`.
    pub fn window_end_at(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window_at(t).map(|w| w.end_utc)
    }
}

/// Hard constraints; any violation rejects the pool outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConstraints {
    pub min_pool_size: usize,
    pub max_pool_size: usize,
    pub starlink_share_min: f64,
    pub starlink_share_max: f64,
    /// Cap on distinct satellites used across the whole plan.
    pub max_distinct_satellites: usize,
    /// Windows below this mean RSRP never qualify a member, dBm.
    pub usability_rsrp_dbm: f64,
}

impl Default for PoolConstraints {
    fn default() -> Self {
        Self {
            min_pool_size: 8,
            max_pool_size: 20,
            starlink_share_min: 0.3,
            starlink_share_max: 0.7,
            max_distinct_satellites: 200,
            usability_rsrp_dbm: -110.0,
        }
    }
}

/// Per-constellation composition of one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstellationBalance {
    pub starlink_count: usize,
    pub oneweb_count: usize,
    pub other_count: usize,
    pub starlink_ratio: f64,
    pub oneweb_ratio: f64,
    /// 1 at a 50:50 split, 0 at a single-constellation pool.
    pub balance_score: f64,
}

impl ConstellationBalance {
    pub fn of<'a, I>(members: &BTreeSet<u32>, candidates: I) -> Self
    where
        I: IntoIterator<Item = &'a SatelliteCandidate>,
    {
        let mut starlink = 0usize;
        let mut oneweb = 0usize;
        let mut other = 0usize;
        for candidate in candidates
            .into_iter()
            .filter(|c| members.contains(&c.satellite_id))
        {
            match candidate.constellation {
                Constellation::Starlink => starlink += 1,
                Constellation::Oneweb => oneweb += 1,
                Constellation::Other(_) => other += 1,
            }
        }
        let total = (starlink + oneweb + other).max(1) as f64;
        let starlink_ratio = starlink as f64 / total;
        Self {
            starlink_count: starlink,
            oneweb_count: oneweb,
            other_count: other,
            starlink_ratio,
            oneweb_ratio: oneweb as f64 / total,
            balance_score: 1.0 - (starlink_ratio - 0.5).abs() * 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(start_s: i64, end_s: i64) -> VisibilityWindow {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        VisibilityWindow {
            satellite_id: 1,
            start_utc: t0 + chrono::Duration::seconds(start_s),
            end_utc: t0 + chrono::Duration::seconds(end_s),
            duration_s: (end_s - start_s) as f64,
            max_elevation_deg: 40.0,
            mean_elevation_deg: 25.0,
            mean_rsrp_dbm: -100.0,
            min_rsrp_dbm: -108.0,
            max_rsrp_dbm: -95.0,
            sample_count: 10,
        }
    }

    fn candidate(id: u32, constellation: Constellation) -> SatelliteCandidate {
        SatelliteCandidate {
            satellite_id: id,
            constellation,
            signal_quality: -100.0,
            coverage_score: 0.6,
            handover_cost: 12.0,
            geographic_spread: 0.4,
            handover_potential: 0.3,
            elevation_deg: 40.0,
            azimuth_deg: (id as f64 * 37.0) % 360.0,
            range_km: 800.0,
            windows: vec![window(0, 600)],
        }
    }

    #[test]
    fn test_visibility_lookup() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let c = candidate(1, Constellation::Starlink);
        assert!(c.visible_at(t0 + chrono::Duration::seconds(300)));
        assert!(!c.visible_at(t0 + chrono::Duration::seconds(700)));
        assert_eq!(
            c.window_end_at(t0 + chrono::Duration::seconds(300)),
            Some(t0 + chrono::Duration::seconds(600))
        );
    }

    #[test]
    fn test_constellation_balance() {
        let candidates: Vec<SatelliteCandidate> = (1..=10)
            .map(|id| {
                let constellation = if id <= 5 {
                    Constellation::Starlink
                } else {
                    Constellation::Oneweb
                };
                candidate(id, constellation)
            })
            .collect();
        let members: BTreeSet<u32> = (1..=10).collect();
        let balance = ConstellationBalance::of(&members, &candidates);
        assert_eq!(balance.starlink_count, 5);
        assert_eq!(balance.oneweb_count, 5);
        assert!((balance.balance_score - 1.0).abs() < 1e-12);

        let skewed: BTreeSet<u32> = (1..=5).collect();
        let balance = ConstellationBalance::of(&skewed, &candidates);
        assert!((balance.starlink_ratio - 1.0).abs() < 1e-12);
        assert!(balance.balance_score.abs() < 1e-12);
    }
}
