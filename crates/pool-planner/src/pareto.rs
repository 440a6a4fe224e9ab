//! Pareto filtering and winner selection
//!
//! Candidate pools from all strategies are reduced to the non-dominated
//! front; the weighted optimum is picked with the configured tie-breaks:
//! scores within 1e-4 prefer the pool sharing more members with the
//! previous instant, then the smaller pool.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::objectives::ObjectiveScores;
use crate::strategies::Strategy;

/// Weighted-score tie tolerance.
const SCORE_TIE_EPSILON: f64 = 1e-4;

/// One evaluated candidate pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEvaluation {
    pub strategy: Strategy,
    pub members: BTreeSet<u32>,
    pub scores: ObjectiveScores,
    pub weighted_score: f64,
    /// Strategy-comparison score carried over from the generator.
    pub configuration_score: f64,
}

/// Retain the non-dominated subset, preserving input order.
pub fn pareto_front(evaluations: Vec<PoolEvaluation>) -> Vec<PoolEvaluation> {
    let mut front: Vec<PoolEvaluation> = Vec::new();
    for candidate in evaluations {
        if front.iter().any(|kept| kept.scores.dominates(&candidate.scores)) {
            continue;
        }
        front.retain(|kept| !candidate.scores.dominates(&kept.scores));
        front.push(candidate);
    }
    front
}

/// Pick the weighted optimum from a front.
pub fn select_winner(
    front: &[PoolEvaluation],
    previous_pool: Option<&BTreeSet<u32>>,
) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (idx, evaluation) in front.iter().enumerate() {
        let Some(current_best) = best else {
            best = Some(idx);
            continue;
        };
        let incumbent = &front[current_best];

        let delta = evaluation.weighted_score - incumbent.weighted_score;
        if delta > SCORE_TIE_EPSILON {
            best = Some(idx);
            continue;
        }
        if delta < -SCORE_TIE_EPSILON {
            continue;
        }

        // Tied on score: prefer larger overlap with the previous pool
        let overlap = |members: &BTreeSet<u32>| -> usize {
            previous_pool
                .map(|prev| members.intersection(prev).count())
                .unwrap_or(0)
        };
        let candidate_overlap = overlap(&evaluation.members);
        let incumbent_overlap = overlap(&incumbent.members);
        if candidate_overlap > incumbent_overlap {
            best = Some(idx);
            continue;
        }
        if candidate_overlap < incumbent_overlap {
            continue;
        }

        // Still tied: prefer the smaller pool
        if evaluation.members.len() < incumbent.members.len() {
            best = Some(idx);
        }
    }

    best
}
