//! Per-instant pool planning
//!
//! Walks the planning grid over the union of all visibility windows. At
//! each instant the visible candidate set is enumerated, the four
//! strategies propose pools, hard constraints prune them, the Pareto front
//! is retained and the configured output (front or weighted optimum) is
//! emitted. Instants that cannot seat the minimum pool produce a
//! coverage-gap record and planning continues.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::objectives::{
    angular_dispersion_objective, handover_avoidance_objective, signal_quality_objective,
    ObjectiveScores, ObjectiveWeights,
};
use crate::pareto::{pareto_front, select_winner, PoolEvaluation};
use crate::strategies::{generate_pool, RlWeights, Strategy};
use crate::{ConstellationBalance, PlannerError, PoolConstraints, Result, SatelliteCandidate};

/// What the planner emits per instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanOutput {
    #[default]
    WeightedOptimum,
    ParetoFront,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub planning_step_s: f64,
    pub look_ahead_horizon_s: f64,
    pub constraints: PoolConstraints,
    pub weights: ObjectiveWeights,
    pub rl_weights: RlWeights,
    pub strategies: Vec<Strategy>,
    pub output: PlanOutput,
    /// Soft O₃ bonus per unit of overlap with the previous pool.
    pub coherence_bonus: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            planning_step_s: 30.0,
            look_ahead_horizon_s: 600.0,
            constraints: PoolConstraints::default(),
            weights: ObjectiveWeights::default(),
            rl_weights: RlWeights::default(),
            strategies: Strategy::all().to_vec(),
            output: PlanOutput::WeightedOptimum,
            coherence_bonus: 0.1,
        }
    }
}

/// The selected pool at one planning instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInstant {
    pub t_utc: DateTime<Utc>,
    pub members: BTreeSet<u32>,
    pub strategy: Strategy,
    pub scores: ObjectiveScores,
    pub weighted_score: f64,
    /// Strategy-comparison score of the winning pool.
    pub configuration_score: f64,
    pub balance: ConstellationBalance,
    /// The full non-dominated set, populated in Pareto-front output mode.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub front: Vec<PoolEvaluation>,
}

/// An instant where no feasible pool exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCoverageGap {
    pub t_utc: DateTime<Utc>,
    pub candidates_available: usize,
    pub required_min: usize,
    pub reason: String,
}

/// Per-strategy aggregates of the configuration scores over a whole plan,
/// for comparing how the four generators fare against each other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyScoreSummary {
    pub pools_generated: usize,
    pub pools_won: usize,
    pub mean_configuration_score: f64,
}

/// C7 output: the time-keyed pool plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolPlan {
    pub instants: Vec<PlanInstant>,
    pub coverage_gaps: Vec<PlanCoverageGap>,
    pub distinct_satellites_used: usize,
    /// Strategy comparison across all planned instants.
    pub strategy_scores: BTreeMap<String, StrategyScoreSummary>,
}

pub struct PoolPlanner {
    config: PlannerConfig,
}

impl PoolPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self> {
        let constraints = &config.constraints;
        if constraints.min_pool_size == 0 || constraints.min_pool_size > constraints.max_pool_size {
            return Err(PlannerError::InvalidConfig(format!(
                "pool size range [{}, {}] is invalid",
                constraints.min_pool_size, constraints.max_pool_size
            )));
        }
        if config.planning_step_s <= 0.0 {
            return Err(PlannerError::InvalidConfig(
                "planning step must be positive".into(),
            ));
        }
        if config.strategies.is_empty() {
            return Err(PlannerError::InvalidConfig("no strategies enabled".into()));
        }
        Ok(Self { config })
    }

    /// Plan over the union of the candidates' visibility windows.
    /// Candidates are re-sorted by id so the outcome is independent of the
    /// caller's assembly order.
    pub fn plan(&self, candidates: &[SatelliteCandidate]) -> Result<PoolPlan> {
        if candidates.is_empty() {
            return Err(PlannerError::NoCandidates);
        }

        let mut candidates: Vec<&SatelliteCandidate> = candidates.iter().collect();
        candidates.sort_by_key(|c| c.satellite_id);

        let grid = self.planning_grid(&candidates)?;
        info!(
            instants = grid.len(),
            candidates = candidates.len(),
            "planning pool over visibility horizon"
        );

        let mut instants = Vec::new();
        let mut coverage_gaps = Vec::new();
        let mut used_satellites: BTreeSet<u32> = BTreeSet::new();
        let mut previous_pool: Option<BTreeSet<u32>> = None;
        // Per-strategy (generated, won, score sum) over the whole plan
        let mut strategy_tallies: BTreeMap<String, (usize, usize, f64)> = BTreeMap::new();

        for t in grid {
            let visible: Vec<&SatelliteCandidate> = candidates
                .iter()
                .filter(|c| {
                    c.window_at(t)
                        .map(|w| w.mean_rsrp_dbm >= self.config.constraints.usability_rsrp_dbm)
                        .unwrap_or(false)
                })
                .copied()
                .collect();

            if visible.len() < self.config.constraints.min_pool_size {
                coverage_gaps.push(PlanCoverageGap {
                    t_utc: t,
                    candidates_available: visible.len(),
                    required_min: self.config.constraints.min_pool_size,
                    reason: "insufficient_candidates".into(),
                });
                previous_pool = None;
                continue;
            }

            match self.plan_instant(
                t,
                &visible,
                previous_pool.as_ref(),
                &used_satellites,
                &mut strategy_tallies,
            ) {
                Some(instant) => {
                    used_satellites.extend(instant.members.iter().copied());
                    previous_pool = Some(instant.members.clone());
                    instants.push(instant);
                }
                None => {
                    coverage_gaps.push(PlanCoverageGap {
                        t_utc: t,
                        candidates_available: visible.len(),
                        required_min: self.config.constraints.min_pool_size,
                        reason: "no_feasible_pool".into(),
                    });
                    previous_pool = None;
                }
            }
        }

        debug!(
            planned = instants.len(),
            gaps = coverage_gaps.len(),
            distinct = used_satellites.len(),
            "pool planning finished"
        );

        let strategy_scores = strategy_tallies
            .into_iter()
            .map(|(name, (generated, won, score_sum))| {
                let mean = if generated == 0 {
                    0.0
                } else {
                    score_sum / generated as f64
                };
                (
                    name,
                    StrategyScoreSummary {
                        pools_generated: generated,
                        pools_won: won,
                        mean_configuration_score: mean,
                    },
                )
            })
            .collect();

        Ok(PoolPlan {
            instants,
            coverage_gaps,
            distinct_satellites_used: used_satellites.len(),
            strategy_scores,
        })
    }

    fn planning_grid(&self, candidates: &[&SatelliteCandidate]) -> Result<Vec<DateTime<Utc>>> {
        let start = candidates
            .iter()
            .flat_map(|c| c.windows.iter().map(|w| w.start_utc))
            .min();
        let end = candidates
            .iter()
            .flat_map(|c| c.windows.iter().map(|w| w.end_utc))
            .max();

        let (Some(start), Some(end)) = (start, end) else {
            return Err(PlannerError::EmptyGrid);
        };

        let step = Duration::microseconds((self.config.planning_step_s * 1e6) as i64);
        let mut grid = Vec::new();
        let mut t = start;
        while t <= end {
            grid.push(t);
            t = t + step;
        }
        Ok(grid)
    }

    fn plan_instant(
        &self,
        t: DateTime<Utc>,
        visible: &[&SatelliteCandidate],
        previous_pool: Option<&BTreeSet<u32>>,
        used_satellites: &BTreeSet<u32>,
        strategy_tallies: &mut BTreeMap<String, (usize, usize, f64)>,
    ) -> Option<PlanInstant> {
        let constraints = &self.config.constraints;
        let target = visible.len().min(constraints.max_pool_size);

        let both_constellations_visible = {
            let starlink = visible
                .iter()
                .any(|c| c.constellation == orbital_mechanics::Constellation::Starlink);
            let non_starlink = visible
                .iter()
                .any(|c| c.constellation != orbital_mechanics::Constellation::Starlink);
            starlink && non_starlink
        };

        let mut evaluations = Vec::new();
        for &strategy in &self.config.strategies {
            let generated = generate_pool(strategy, visible, target, &self.config.rl_weights);

            // Every strategy output is tallied for comparison, feasible or not
            let tally = strategy_tallies
                .entry(strategy.as_str().to_string())
                .or_default();
            tally.0 += 1;
            tally.2 += generated.configuration_score;

            let members: BTreeSet<u32> = generated.members.iter().copied().collect();

            if !self.satisfies_constraints(
                &members,
                visible,
                both_constellations_visible,
                used_satellites,
            ) {
                continue;
            }

            let pool: Vec<&SatelliteCandidate> = visible
                .iter()
                .filter(|c| members.contains(&c.satellite_id))
                .copied()
                .collect();

            let scores = ObjectiveScores {
                signal_quality: signal_quality_objective(&pool),
                angular_dispersion: angular_dispersion_objective(&pool),
                handover_avoidance: handover_avoidance_objective(
                    &pool,
                    t,
                    self.config.look_ahead_horizon_s,
                    previous_pool,
                    self.config.coherence_bonus,
                ),
            };
            let weighted_score = scores.weighted(&self.config.weights);

            evaluations.push(PoolEvaluation {
                strategy,
                members,
                scores,
                weighted_score,
                configuration_score: generated.configuration_score,
            });
        }

        if evaluations.is_empty() {
            return None;
        }

        let front = pareto_front(evaluations);
        let winner_idx = select_winner(&front, previous_pool)?;
        let winner = front[winner_idx].clone();
        let balance = ConstellationBalance::of(&winner.members, visible.iter().copied());

        if let Some(tally) = strategy_tallies.get_mut(winner.strategy.as_str()) {
            tally.1 += 1;
        }

        Some(PlanInstant {
            t_utc: t,
            members: winner.members.clone(),
            strategy: winner.strategy,
            scores: winner.scores,
            weighted_score: winner.weighted_score,
            configuration_score: winner.configuration_score,
            balance,
            front: match self.config.output {
                PlanOutput::ParetoFront => front,
                PlanOutput::WeightedOptimum => Vec::new(),
            },
        })
    }

    fn satisfies_constraints(
        &self,
        members: &BTreeSet<u32>,
        visible: &[&SatelliteCandidate],
        both_constellations_visible: bool,
        used_satellites: &BTreeSet<u32>,
    ) -> bool {
        let constraints = &self.config.constraints;

        if members.len() < constraints.min_pool_size || members.len() > constraints.max_pool_size {
            return false;
        }

        if both_constellations_visible {
            let starlink = visible
                .iter()
                .filter(|c| {
                    members.contains(&c.satellite_id)
                        && c.constellation == orbital_mechanics::Constellation::Starlink
                })
                .count();
            let share = starlink as f64 / members.len() as f64;
            if share < constraints.starlink_share_min || share > constraints.starlink_share_max {
                return false;
            }
        }

        // Distinct-satellite budget across the whole plan
        let new_members = members
            .iter()
            .filter(|id| !used_satellites.contains(id))
            .count();
        if used_satellites.len() + new_members > constraints.max_distinct_satellites {
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use orbital_mechanics::Constellation;
    use visibility_windows::VisibilityWindow;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn candidate(
        id: u32,
        constellation: Constellation,
        rsrp: f64,
        azimuth_deg: f64,
        start_s: i64,
        end_s: i64,
    ) -> SatelliteCandidate {
        SatelliteCandidate {
            satellite_id: id,
            constellation,
            signal_quality: rsrp,
            coverage_score: 0.6,
            handover_cost: 12.0,
            geographic_spread: 0.5,
            handover_potential: 0.3,
            elevation_deg: 35.0,
            azimuth_deg,
            range_km: 800.0,
            windows: vec![VisibilityWindow {
                satellite_id: id,
                start_utc: t0() + Duration::seconds(start_s),
                end_utc: t0() + Duration::seconds(end_s),
                duration_s: (end_s - start_s) as f64,
                max_elevation_deg: 45.0,
                mean_elevation_deg: 35.0,
                mean_rsrp_dbm: rsrp,
                min_rsrp_dbm: rsrp - 5.0,
                max_rsrp_dbm: rsrp + 5.0,
                sample_count: 20,
            }],
        }
    }

    /// 12 Starlink + 6 OneWeb, all visible over the same 10 minutes.
    fn mixed_fleet() -> Vec<SatelliteCandidate> {
        let mut fleet = Vec::new();
        for id in 1..=12 {
            fleet.push(candidate(
                id,
                Constellation::Starlink,
                -95.0 - (id % 4) as f64,
                (id as f64 * 30.0) % 360.0,
                0,
                600,
            ));
        }
        for id in 13..=18 {
            fleet.push(candidate(
                id,
                Constellation::Oneweb,
                -97.0 - (id % 3) as f64,
                (id as f64 * 50.0) % 360.0,
                0,
                600,
            ));
        }
        fleet
    }

    fn config() -> PlannerConfig {
        PlannerConfig {
            constraints: PoolConstraints {
                min_pool_size: 8,
                max_pool_size: 15,
                ..PoolConstraints::default()
            },
            ..PlannerConfig::default()
        }
    }

    #[test]
    fn test_plan_respects_cardinality_and_share() {
        let planner = PoolPlanner::new(config()).unwrap();
        let plan = planner.plan(&mixed_fleet()).unwrap();

        assert!(!plan.instants.is_empty());
        for instant in &plan.instants {
            let size = instant.members.len();
            assert!((8..=15).contains(&size), "pool size {size}");

            let share = instant.balance.starlink_ratio;
            assert!(
                (0.3..=0.7).contains(&share),
                "starlink share {share} at {}",
                instant.t_utc
            );
        }
    }

    #[test]
    fn test_plan_deterministic_under_input_order() {
        let planner = PoolPlanner::new(config()).unwrap();
        let mut shuffled = mixed_fleet();
        shuffled.reverse();

        let plan_a = planner.plan(&mixed_fleet()).unwrap();
        let plan_b = planner.plan(&shuffled).unwrap();

        assert_eq!(plan_a.instants.len(), plan_b.instants.len());
        for (a, b) in plan_a.instants.iter().zip(plan_b.instants.iter()) {
            assert_eq!(a.members, b.members);
            assert_eq!(a.strategy, b.strategy);
        }
    }

    #[test]
    fn test_insufficient_candidates_yield_gap_records() {
        let planner = PoolPlanner::new(config()).unwrap();
        // Only three satellites: every instant is a coverage gap
        let sparse: Vec<SatelliteCandidate> = mixed_fleet().into_iter().take(3).collect();
        let plan = planner.plan(&sparse).unwrap();

        assert!(plan.instants.is_empty());
        assert!(!plan.coverage_gaps.is_empty());
        assert!(plan
            .coverage_gaps
            .iter()
            .all(|g| g.reason == "insufficient_candidates" && g.candidates_available == 3));
    }

    #[test]
    fn test_weak_windows_never_qualify() {
        let planner = PoolPlanner::new(config()).unwrap();
        // All RSRP below the usability threshold
        let weak: Vec<SatelliteCandidate> = (1..=18)
            .map(|id| {
                candidate(
                    id,
                    Constellation::Starlink,
                    -118.0,
                    (id as f64 * 20.0) % 360.0,
                    0,
                    600,
                )
            })
            .collect();
        let plan = planner.plan(&weak).unwrap();
        assert!(plan.instants.is_empty());
    }

    #[test]
    fn test_temporal_coherence_between_instants() {
        let planner = PoolPlanner::new(config()).unwrap();
        let plan = planner.plan(&mixed_fleet()).unwrap();

        // Static fleet: successive pools should share ≥ 70% of members
        for pair in plan.instants.windows(2) {
            let shared = pair[0].members.intersection(&pair[1].members).count();
            let share = shared as f64 / pair[1].members.len() as f64;
            assert!(share >= 0.7, "coherence {share}");
        }
    }

    #[test]
    fn test_strategy_scores_aggregate_over_plan() {
        let planner = PoolPlanner::new(config()).unwrap();
        let plan = planner.plan(&mixed_fleet()).unwrap();
        assert!(!plan.instants.is_empty());

        // Every enabled strategy was generated at every planned-or-attempted
        // instant and carries a bounded comparison score
        assert_eq!(plan.strategy_scores.len(), Strategy::all().len());
        let mut total_wins = 0;
        for (name, summary) in &plan.strategy_scores {
            assert!(summary.pools_generated > 0, "{name} never generated");
            assert!(summary.pools_won <= summary.pools_generated);
            assert!(
                (0.0..=1.0).contains(&summary.mean_configuration_score),
                "{name} score {}",
                summary.mean_configuration_score
            );
            total_wins += summary.pools_won;
        }
        // Exactly one strategy wins each planned instant
        assert_eq!(total_wins, plan.instants.len());

        // The winner's configuration score is recorded per instant
        for instant in &plan.instants {
            assert!((0.0..=1.0).contains(&instant.configuration_score));
        }
    }

    #[test]
    fn test_distinct_satellite_cap_enforced() {
        let mut cfg = config();
        cfg.constraints.max_distinct_satellites = 15;
        let planner = PoolPlanner::new(cfg).unwrap();
        let plan = planner.plan(&mixed_fleet()).unwrap();
        assert!(plan.distinct_satellites_used <= 15);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config();
        cfg.constraints.min_pool_size = 30;
        cfg.constraints.max_pool_size = 10;
        assert!(matches!(
            PoolPlanner::new(cfg),
            Err(PlannerError::InvalidConfig(_))
        ));
    }
}
