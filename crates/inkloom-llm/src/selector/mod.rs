//! Backend Selector - ranks usable backends for one request
//!
//! # Module Structure
//!
//! - `types`: SelectionStrategy, RequestSpec, PromptPayload
//! - `scoring`: pure per-strategy scoring functions

mod scoring;
mod types;

#[cfg(test)]
mod tests;

pub use scoring::{rank, score};
pub use types::{BalancedWeights, PromptPayload, RequestSpec, SelectionStrategy};

use crate::descriptor::BackendDescriptor;
use tracing::debug;

/// Ranks candidate backends under a selection strategy
///
/// Returns the full ordering so the dispatcher can fail over; an empty list
/// means no backend qualifies.
#[derive(Debug, Clone, Default)]
pub struct BackendSelector {
    default_strategy: SelectionStrategy,
    weights: BalancedWeights,
}

impl BackendSelector {
    /// Create a selector with a process-wide default strategy
    #[must_use]
    pub fn new(default_strategy: SelectionStrategy) -> Self {
        Self {
            default_strategy,
            weights: BalancedWeights::default(),
        }
    }

    /// Override the balanced weights
    #[must_use]
    pub fn with_weights(mut self, weights: BalancedWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Strategy used when a request does not name one
    #[must_use]
    pub fn default_strategy(&self) -> SelectionStrategy {
        self.default_strategy
    }

    /// Strategy that applies to a request
    #[must_use]
    pub fn strategy_for(&self, request: &RequestSpec) -> SelectionStrategy {
        request.strategy.unwrap_or(self.default_strategy)
    }

    /// Filter and rank `usable` for `request`
    #[must_use]
    pub fn select(
        &self,
        request: &RequestSpec,
        usable: Vec<BackendDescriptor>,
    ) -> Vec<BackendDescriptor> {
        let candidates: Vec<BackendDescriptor> = usable
            .into_iter()
            .filter(|d| request.provider.map_or(true, |p| d.provider() == p))
            .filter(|d| {
                request
                    .required_capability
                    .as_deref()
                    .map_or(true, |cap| d.config.has_capability(cap))
            })
            .collect();

        if candidates.is_empty() {
            debug!(role = ?request.role, "No backend qualifies for request");
            return candidates;
        }

        let strategy = self.strategy_for(request);
        let mut ranked = rank(strategy, candidates, &self.weights);

        if let Some(preferred) = request.preferred_backend.as_deref() {
            if let Some(pos) = ranked.iter().position(|d| d.name() == preferred) {
                let descriptor = ranked.remove(pos);
                ranked.insert(0, descriptor);
            }
        }

        debug!(
            strategy = %strategy,
            candidates = ?ranked.iter().map(|d| d.name()).collect::<Vec<_>>(),
            "Ranked candidates"
        );
        ranked
    }
}
