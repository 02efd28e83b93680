//! Pure scoring functions, one per strategy
//!
//! Every score is "lower is better". Balanced scoring normalizes each
//! dimension with min-max over the candidate set passed in, so a backend's
//! rank depends on who else is currently usable.

use super::types::{BalancedWeights, SelectionStrategy};
use crate::descriptor::BackendDescriptor;

/// Min-max normalize; zero spread maps every value to 0
fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    if !spread.is_finite() || spread <= f64::EPSILON {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / spread).collect()
}

/// Score each candidate under a strategy
#[must_use]
pub fn score(
    strategy: SelectionStrategy,
    candidates: &[BackendDescriptor],
    weights: &BalancedWeights,
) -> Vec<f64> {
    match strategy {
        SelectionStrategy::MinimizeCost => {
            candidates.iter().map(|d| d.cost_per_1k_tokens()).collect()
        }
        SelectionStrategy::MaximizeSpeed => {
            candidates.iter().map(|d| d.avg_response_time_ms).collect()
        }
        SelectionStrategy::MaximizeQuality => {
            candidates.iter().map(|d| 1.0 - d.quality_weight()).collect()
        }
        SelectionStrategy::Balanced => {
            let costs: Vec<f64> = candidates.iter().map(|d| d.cost_per_1k_tokens()).collect();
            let latencies: Vec<f64> = candidates.iter().map(|d| d.avg_response_time_ms).collect();
            let cost = normalize(&costs);
            let latency = normalize(&latencies);
            candidates
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    weights.cost * cost[i]
                        + weights.latency * latency[i]
                        + weights.quality * (1.0 - d.quality_weight())
                })
                .collect()
        }
    }
}

/// Order candidates best first; ties fall back to priority, then input order
#[must_use]
pub fn rank(
    strategy: SelectionStrategy,
    candidates: Vec<BackendDescriptor>,
    weights: &BalancedWeights,
) -> Vec<BackendDescriptor> {
    let scores = score(strategy, &candidates, weights);
    let mut scored: Vec<(f64, usize, BackendDescriptor)> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, d)| (scores[i], i, d))
        .collect();
    scored.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| a.2.priority().cmp(&b.2.priority()))
            .then_with(|| a.1.cmp(&b.1))
    });
    scored.into_iter().map(|(_, _, d)| d).collect()
}
