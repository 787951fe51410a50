//! Post-run metrics. Pure functions of the original and terminal networks.

use crate::rebalance::is_close;
use cascade_core::{partition, BusId, Island, Network};
use std::collections::HashMap;

/// Fraction of the initial load that is no longer served.
///
/// Zero when the initial network had no load.
pub fn power_loss(initial: &Network, terminal: &Network) -> f64 {
    let initial_load = initial.total_load_mw();
    if initial_load == 0.0 {
        return 0.0;
    }
    (initial_load - terminal.total_load_mw()) / initial_load
}

/// Fraction of the initially active branches still active.
///
/// One when there were no active branches to begin with.
pub fn system_size(initial_active: usize, failed: usize) -> f64 {
    if initial_active == 0 {
        return 1.0;
    }
    initial_active.saturating_sub(failed) as f64 / initial_active as f64
}

/// Islands of `network` whose in-service generation adds up to zero.
pub fn isolated_components(network: &Network) -> Vec<Island> {
    let islands = partition(network);
    let mut generation = vec![0.0; islands.len()];
    let membership: HashMap<BusId, usize> = cascade_core::island_membership(&islands);
    for gen in network.generators().iter().filter(|g| g.status) {
        if let Some(&idx) = membership.get(&gen.bus) {
            generation[idx] += gen.active_power.value();
        }
    }
    islands
        .into_iter()
        .zip(generation)
        .filter(|(_, output)| is_close(*output, 0.0))
        .map(|(island, _)| island)
        .collect()
}

/// Sorted union of the buses of `components`.
pub fn isolated_buses(components: &[Island]) -> Vec<BusId> {
    let mut buses: Vec<BusId> = components.iter().flat_map(Island::iter).collect();
    buses.sort_unstable();
    buses.dedup();
    buses
}
