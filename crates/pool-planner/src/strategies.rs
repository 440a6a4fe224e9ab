//! Pool generation strategies
//!
//! Four ways to cut an initial pool from the visible candidate set:
//! top-K by RSRP, greedy angular-spread filling, constellation-balanced
//! proportional allocation, and the learnt-composite ("RL-driven")
//! ranking whose weights are inputs, not outputs, of this crate. Every
//! generated pool carries a configuration score (0.4·rsrp_norm +
//! 0.4·coverage + 0.2·elevation_norm) so strategies can be compared on a
//! common scale independent of the planning objectives.

use serde::{Deserialize, Serialize};

use orbital_mechanics::Constellation;

use crate::SatelliteCandidate;

/// Strategy tags, serialised into the plan for traceability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    HighQuality,
    GapFilling,
    Balanced,
    RlDriven,
}

impl Strategy {
    pub fn all() -> [Strategy; 4] {
        [
            Strategy::HighQuality,
            Strategy::GapFilling,
            Strategy::Balanced,
            Strategy::RlDriven,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::HighQuality => "high_quality",
            Strategy::GapFilling => "gap_filling",
            Strategy::Balanced => "balanced",
            Strategy::RlDriven => "rl_driven",
        }
    }
}

/// Composite-score weights for the RL-driven strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RlWeights {
    pub signal: f64,
    pub elevation: f64,
    pub coverage: f64,
    pub handover: f64,
}

impl Default for RlWeights {
    fn default() -> Self {
        Self {
            signal: 0.35,
            elevation: 0.25,
            coverage: 0.25,
            handover: 0.15,
        }
    }
}

/// One generated pool: the selected members in selection order plus the
/// strategy-comparison score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPool {
    pub strategy: Strategy,
    pub members: Vec<u32>,
    /// 0.4·rsrp_norm + 0.4·coverage + 0.2·elevation_norm, in [0, 1].
    pub configuration_score: f64,
}

/// Strategy-comparison score of a pool: mean RSRP normalised through
/// (rsrp + 100) / 50, mean coverage feature, and mean elevation over 90°,
/// weighted 0.4 / 0.4 / 0.2 and clamped to [0, 1].
pub fn pool_score(pool: &[&SatelliteCandidate]) -> f64 {
    if pool.is_empty() {
        return 0.0;
    }
    let n = pool.len() as f64;
    let mean_rsrp = pool.iter().map(|c| c.signal_quality).sum::<f64>() / n;
    let mean_coverage = pool.iter().map(|c| c.coverage_score).sum::<f64>() / n;
    let mean_elevation = pool.iter().map(|c| c.elevation_deg).sum::<f64>() / n;

    let rsrp_norm = ((mean_rsrp + 100.0) / 50.0).max(0.0);
    let elevation_norm = mean_elevation / 90.0;

    (0.4 * rsrp_norm + 0.4 * mean_coverage + 0.2 * elevation_norm).clamp(0.0, 1.0)
}

/// Composite candidate score under the learnt weights, clamped to [0, 1].
pub fn rl_score(candidate: &SatelliteCandidate, weights: &RlWeights) -> f64 {
    let signal_factor = ((candidate.signal_quality + 100.0) / 50.0).max(0.0);
    let elevation_factor = candidate.elevation_deg / 90.0;
    let coverage_factor = candidate.coverage_score;
    let handover_factor = 1.0 - candidate.handover_potential;

    (weights.signal * signal_factor
        + weights.elevation * elevation_factor
        + weights.coverage * coverage_factor
        + weights.handover * handover_factor)
        .clamp(0.0, 1.0)
}

/// Generate one pool of up to `target_count` members with its
/// configuration score attached; the returned ids are in selection order.
pub fn generate_pool(
    strategy: Strategy,
    candidates: &[&SatelliteCandidate],
    target_count: usize,
    rl_weights: &RlWeights,
) -> StrategyPool {
    let members = match strategy {
        Strategy::HighQuality => high_quality(candidates, target_count),
        Strategy::GapFilling => gap_filling(candidates, target_count),
        Strategy::Balanced => balanced(candidates, target_count),
        Strategy::RlDriven => rl_driven(candidates, target_count, rl_weights),
    };

    let selected: Vec<&SatelliteCandidate> = candidates
        .iter()
        .filter(|c| members.contains(&c.satellite_id))
        .copied()
        .collect();

    StrategyPool {
        strategy,
        configuration_score: pool_score(&selected),
        members,
    }
}

/// Top-K by RSRP.
fn high_quality(candidates: &[&SatelliteCandidate], target_count: usize) -> Vec<u32> {
    let mut sorted: Vec<&&SatelliteCandidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| {
        b.signal_quality
            .total_cmp(&a.signal_quality)
            .then(a.satellite_id.cmp(&b.satellite_id))
    });
    sorted
        .into_iter()
        .take(target_count)
        .map(|c| c.satellite_id)
        .collect()
}

/// Greedy angular-spread maximisation seeded with the strongest candidate:
/// each step adds the candidate farthest (in circular azimuth distance)
/// from the members picked so far.
fn gap_filling(candidates: &[&SatelliteCandidate], target_count: usize) -> Vec<u32> {
    if candidates.is_empty() || target_count == 0 {
        return Vec::new();
    }

    let mut remaining: Vec<&&SatelliteCandidate> = candidates.iter().collect();
    remaining.sort_by(|a, b| {
        b.signal_quality
            .total_cmp(&a.signal_quality)
            .then(a.satellite_id.cmp(&b.satellite_id))
    });

    let seed = *remaining.remove(0);
    let mut selected: Vec<&SatelliteCandidate> = vec![seed];

    while selected.len() < target_count && !remaining.is_empty() {
        let (best_idx, _) = remaining
            .iter()
            .enumerate()
            .map(|(idx, candidate)| {
                let min_separation = selected
                    .iter()
                    .map(|s| circular_distance_deg(candidate.azimuth_deg, s.azimuth_deg))
                    .fold(f64::INFINITY, f64::min);
                (idx, min_separation)
            })
            .max_by(|(ia, a), (ib, b)| {
                a.total_cmp(b).then_with(|| {
                    // Deterministic tie-break on id
                    remaining[*ib]
                        .satellite_id
                        .cmp(&remaining[*ia].satellite_id)
                })
            })
            .expect("remaining is non-empty");

        selected.push(*remaining.remove(best_idx));
    }

    selected.iter().map(|c| c.satellite_id).collect()
}

/// Per-constellation proportional allocation, strongest first inside each
/// constellation.
fn balanced(candidates: &[&SatelliteCandidate], target_count: usize) -> Vec<u32> {
    let starlink: Vec<&&SatelliteCandidate> = candidates
        .iter()
        .filter(|c| c.constellation == Constellation::Starlink)
        .collect();
    let rest: Vec<&&SatelliteCandidate> = candidates
        .iter()
        .filter(|c| c.constellation != Constellation::Starlink)
        .collect();

    let total = starlink.len() + rest.len();
    if total == 0 {
        return Vec::new();
    }

    let starlink_target =
        ((target_count * starlink.len()) as f64 / total as f64).round() as usize;
    let rest_target = target_count.saturating_sub(starlink_target);

    let take_top = |mut group: Vec<&&SatelliteCandidate>, count: usize| -> Vec<u32> {
        group.sort_by(|a, b| {
            b.signal_quality
                .total_cmp(&a.signal_quality)
                .then(a.satellite_id.cmp(&b.satellite_id))
        });
        group.into_iter().take(count).map(|c| c.satellite_id).collect()
    };

    let mut members = take_top(starlink, starlink_target);
    members.extend(take_top(rest, rest_target));
    members
}

/// Top-K by the learnt composite score.
fn rl_driven(
    candidates: &[&SatelliteCandidate],
    target_count: usize,
    weights: &RlWeights,
) -> Vec<u32> {
    let mut scored: Vec<(&&SatelliteCandidate, f64)> = candidates
        .iter()
        .map(|c| (c, rl_score(c, weights)))
        .collect();
    scored.sort_by(|(a, sa), (b, sb)| {
        sb.total_cmp(sa).then(a.satellite_id.cmp(&b.satellite_id))
    });
    scored
        .into_iter()
        .take(target_count)
        .map(|(c, _)| c.satellite_id)
        .collect()
}

fn circular_distance_deg(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use visibility_windows::VisibilityWindow;

    fn candidate(
        id: u32,
        constellation: Constellation,
        rsrp: f64,
        azimuth_deg: f64,
        elevation_deg: f64,
    ) -> SatelliteCandidate {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        SatelliteCandidate {
            satellite_id: id,
            constellation,
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
                start_utc: t0,
                end_utc: t0 + chrono::Duration::seconds(600),
                duration_s: 600.0,
                max_elevation_deg: elevation_deg,
                mean_elevation_deg: elevation_deg,
                mean_rsrp_dbm: rsrp,
                min_rsrp_dbm: rsrp - 5.0,
                max_rsrp_dbm: rsrp + 5.0,
                sample_count: 20,
            }],
        }
    }

    #[test]
    fn test_high_quality_picks_strongest() {
        let pool: Vec<SatelliteCandidate> = (1..=6)
            .map(|id| {
                candidate(
                    id,
                    Constellation::Starlink,
                    -95.0 - id as f64,
                    id as f64 * 60.0,
                    40.0,
                )
            })
            .collect();
        let refs: Vec<&SatelliteCandidate> = pool.iter().collect();

        let pool = generate_pool(Strategy::HighQuality, &refs, 3, &RlWeights::default());
        assert_eq!(pool.members, vec![1, 2, 3]);
        assert!((0.0..=1.0).contains(&pool.configuration_score));
    }

    #[test]
    fn test_gap_filling_spreads_azimuth() {
        // Strongest at 0°, a cluster near it, one lone candidate at 180°
        let pool = vec![
            candidate(1, Constellation::Starlink, -90.0, 0.0, 40.0),
            candidate(2, Constellation::Starlink, -92.0, 5.0, 40.0),
            candidate(3, Constellation::Starlink, -93.0, 10.0, 40.0),
            candidate(4, Constellation::Starlink, -105.0, 180.0, 40.0),
        ];
        let refs: Vec<&SatelliteCandidate> = pool.iter().collect();

        let pool = generate_pool(Strategy::GapFilling, &refs, 2, &RlWeights::default());
        // Seeded with id 1, then the opposed candidate wins over the cluster
        assert_eq!(pool.members, vec![1, 4]);
    }

    #[test]
    fn test_balanced_proportional_allocation() {
        // 6 Starlink + 3 OneWeb → target 6 ⇒ 4 Starlink + 2 OneWeb
        let mut pool = Vec::new();
        for id in 1..=6 {
            pool.push(candidate(id, Constellation::Starlink, -95.0, id as f64 * 30.0, 40.0));
        }
        for id in 7..=9 {
            pool.push(candidate(id, Constellation::Oneweb, -97.0, id as f64 * 30.0, 40.0));
        }
        let refs: Vec<&SatelliteCandidate> = pool.iter().collect();

        let pool = generate_pool(Strategy::Balanced, &refs, 6, &RlWeights::default());
        assert_eq!(pool.members.len(), 6);
        let starlink = pool.members.iter().filter(|&&id| id <= 6).count();
        assert_eq!(starlink, 4);
    }

    #[test]
    fn test_pool_score_formula() {
        // Two members: mean RSRP −90 → 0.2, coverage 0.5, elevation 45° → 0.5
        let a = candidate(1, Constellation::Starlink, -90.0, 0.0, 45.0);
        let b = candidate(2, Constellation::Starlink, -90.0, 90.0, 45.0);
        let score = pool_score(&[&a, &b]);
        assert!((score - (0.4 * 0.2 + 0.4 * 0.5 + 0.2 * 0.5)).abs() < 1e-9);

        // Empty pool scores zero; very strong pools clamp at one
        assert_eq!(pool_score(&[]), 0.0);
        let strong = candidate(3, Constellation::Starlink, -10.0, 0.0, 90.0);
        assert_eq!(pool_score(&[&strong]), 1.0);
    }

    #[test]
    fn test_rl_score_prefers_strong_high_stable() {
        let strong = candidate(1, Constellation::Starlink, -85.0, 0.0, 80.0);
        let weak = candidate(2, Constellation::Starlink, -110.0, 0.0, 15.0);

        let weights = RlWeights::default();
        assert!(rl_score(&strong, &weights) > rl_score(&weak, &weights));
        assert!((0.0..=1.0).contains(&rl_score(&strong, &weights)));
    }

    #[test]
    fn test_strategies_deterministic_on_ties() {
        let pool: Vec<SatelliteCandidate> = (1..=5)
            .map(|id| candidate(id, Constellation::Starlink, -100.0, 72.0 * id as f64, 40.0))
            .collect();
        let refs: Vec<&SatelliteCandidate> = pool.iter().collect();

        for strategy in Strategy::all() {
            let first = generate_pool(strategy, &refs, 3, &RlWeights::default());
            let second = generate_pool(strategy, &refs, 3, &RlWeights::default());
            // Members and configuration score must both reproduce
            assert_eq!(first, second, "strategy {strategy:?} not deterministic");
        }
    }
}
