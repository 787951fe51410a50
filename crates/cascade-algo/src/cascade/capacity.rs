//! Branch capacities.
//!
//! Capacities are fixed for a whole run and usually derived from the flows of
//! an unattacked baseline solve, so every branch starts with some headroom.

use cascade_core::{BranchId, Megawatts, Network};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Flow limit per branch ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchCapacities {
    limits: HashMap<BranchId, Megawatts>,
}

impl BranchCapacities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, branch: BranchId, limit: Megawatts) {
        self.limits.insert(branch, limit);
    }

    pub fn get(&self, branch: BranchId) -> Option<Megawatts> {
        self.limits.get(&branch).copied()
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BranchId, Megawatts)> + '_ {
        self.limits.iter().map(|(&id, &limit)| (id, limit))
    }
}

impl FromIterator<(BranchId, Megawatts)> for BranchCapacities {
    fn from_iter<I: IntoIterator<Item = (BranchId, Megawatts)>>(iter: I) -> Self {
        Self {
            limits: iter.into_iter().collect(),
        }
    }
}

/// How to turn baseline flows `f₀` into branch capacities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CapacityRule {
    /// `|f₀| · (1 + alpha)`
    Proportional { alpha: f64 },
    /// `|f₀| + margin_mw`
    Headroom { margin_mw: f64 },
    /// `|f₀| + factor · mean|f₀|`, the mean taken over active branches
    MeanFlowHeadroom { factor: f64 },
    /// The same limit on every branch
    Uniform { limit_mw: f64 },
}

impl CapacityRule {
    /// Capacities for every branch of `baseline`, which should carry solved flows.
    pub fn apply(&self, baseline: &Network) -> BranchCapacities {
        let mean_flow = mean_active_flow(baseline);
        baseline
            .branches()
            .into_iter()
            .map(|branch| {
                let base = branch.flow.abs();
                let limit = match self {
                    CapacityRule::Proportional { alpha } => base * (1.0 + alpha),
                    CapacityRule::Headroom { margin_mw } => base + Megawatts(*margin_mw),
                    CapacityRule::MeanFlowHeadroom { factor } => base + mean_flow * *factor,
                    CapacityRule::Uniform { limit_mw } => Megawatts(*limit_mw),
                };
                (branch.id, limit)
            })
            .collect()
    }
}

impl Default for CapacityRule {
    fn default() -> Self {
        CapacityRule::MeanFlowHeadroom { factor: 1.0 }
    }
}

/// Mean absolute flow over active branches; zero without any.
pub fn mean_active_flow(network: &Network) -> Megawatts {
    let flows: Vec<Megawatts> = network
        .branches()
        .iter()
        .filter(|b| b.is_active())
        .map(|b| b.flow.abs())
        .collect();
    if flows.is_empty() {
        return Megawatts::ZERO;
    }
    let count = flows.len() as f64;
    flows.into_iter().sum::<Megawatts>() / count
}
