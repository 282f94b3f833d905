use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::router::ModelTier;

/// Model calls and estimated spend for a drafting or refinement run. Only
/// ever grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub calls: BTreeMap<ModelTier, u32>,
    pub estimated_tokens: usize,
    pub total_cost: f64,
    /// What the same tokens would have cost on the premium tier.
    pub baseline_cost: f64,
    pub cost_saved: f64,
}

impl ResourceUsage {
    pub fn record(&mut self, tier: ModelTier, tokens: usize, pricing: &PricingConfig) {
        *self.calls.entry(tier).or_insert(0) += 1;
        self.estimated_tokens += tokens;
        self.total_cost += pricing.cost(tier, tokens);
        self.baseline_cost += pricing.cost(ModelTier::PREMIUM, tokens);
        self.cost_saved = (self.baseline_cost - self.total_cost).max(0.0);
    }

    /// Fold another tally into this one.
    pub fn absorb(&mut self, other: &ResourceUsage) {
        for (tier, calls) in &other.calls {
            *self.calls.entry(*tier).or_insert(0) += calls;
        }
        self.estimated_tokens += other.estimated_tokens;
        self.total_cost += other.total_cost;
        self.baseline_cost += other.baseline_cost;
        self.cost_saved = (self.baseline_cost - self.total_cost).max(0.0);
    }

    pub fn calls_for(&self, tier: ModelTier) -> u32 {
        self.calls.get(&tier).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.values().sum()
    }
}
