//! Power rebalancing for a single island.
//!
//! A DC solve puts any generation/load mismatch on the slack bus, which after
//! a split can be arbitrarily large. Rebalancing first scales the island so
//! generation and load agree.
//!
//! Both policies compare `G` (in-service generator output) against `L` (bus
//! load) with [`is_close`]:
//!
//! | Policy | `G ≈ L` | `G ≈ 0` | otherwise |
//! |--------|---------|---------|-----------|
//! | [`RebalancePolicy::Symmetric`] | no-op | loads scaled to 0 | scale the larger side down to the smaller |
//! | [`RebalancePolicy::GenerationOnly`] | no-op | loads set to 0 | generation scaled by `L/G` |

use anyhow::anyhow;
use cascade_core::{Megawatts, Network};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Relative tolerance of [`is_close`]
pub const REL_TOL: f64 = 1e-5;
/// Absolute tolerance of [`is_close`]
pub const ABS_TOL: f64 = 1e-8;

/// `|a - b| <= ABS_TOL + REL_TOL * |b|`
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= ABS_TOL + REL_TOL * b.abs()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebalancePolicy {
    /// Scale down whichever of generation or load is larger.
    #[default]
    Symmetric,
    /// Only generation moves, in either direction; an island without
    /// generation loses all its load.
    GenerationOnly,
}

impl RebalancePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebalancePolicy::Symmetric => "symmetric",
            RebalancePolicy::GenerationOnly => "generation-only",
        }
    }
}

impl FromStr for RebalancePolicy {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> anyhow::Result<Self> {
        match input.to_ascii_lowercase().replace('_', "-").as_str() {
            "symmetric" => Ok(RebalancePolicy::Symmetric),
            "generation-only" | "gen-only" => Ok(RebalancePolicy::GenerationOnly),
            other => Err(anyhow!(
                "unknown rebalance policy '{other}'; supported values: symmetric, generation-only"
            )),
        }
    }
}

impl std::fmt::Display for RebalancePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What [`rebalance`] did to the island.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RebalanceAction {
    Unchanged,
    ScaledGeneration { factor: f64 },
    ScaledLoad { factor: f64 },
    ZeroedLoad,
}

/// Bring one island's generation and load into agreement, in place.
pub fn rebalance(island: &mut Network, policy: RebalancePolicy) -> RebalanceAction {
    let generation = island.total_generation_mw();
    let load = island.total_load_mw();

    match policy {
        RebalancePolicy::Symmetric => {
            if is_close(generation, load) {
                RebalanceAction::Unchanged
            } else if generation > load {
                let factor = load / generation;
                scale_generation(island, factor);
                RebalanceAction::ScaledGeneration { factor }
            } else {
                let factor = generation / load;
                scale_load(island, factor);
                RebalanceAction::ScaledLoad { factor }
            }
        }
        RebalancePolicy::GenerationOnly => {
            if is_close(generation, 0.0) {
                island.buses_mut().for_each(|bus| bus.load = Megawatts::ZERO);
                RebalanceAction::ZeroedLoad
            } else if is_close(generation, load) {
                RebalanceAction::Unchanged
            } else {
                let factor = load / generation;
                scale_generation(island, factor);
                RebalanceAction::ScaledGeneration { factor }
            }
        }
    }
}

fn scale_generation(island: &mut Network, factor: f64) {
    island
        .generators_mut()
        .filter(|gen| gen.status)
        .for_each(|gen| gen.active_power = gen.active_power * factor);
}

fn scale_load(island: &mut Network, factor: f64) {
    island
        .buses_mut()
        .for_each(|bus| bus.load = bus.load * factor);
}

/// Spread total load evenly over the in-service generators.
///
/// Used to prepare benchmark grids whose dispatch is not meaningful.
/// Returns the per-generator output, or `None` when there is no
/// in-service generator.
pub fn equalize_generation(network: &mut Network) -> Option<Megawatts> {
    let count = network.generators().iter().filter(|g| g.status).count();
    if count == 0 {
        return None;
    }
    let share = Megawatts(network.total_load_mw() / count as f64);
    network
        .generators_mut()
        .filter(|gen| gen.status)
        .for_each(|gen| gen.active_power = share);
    Some(share)
}
