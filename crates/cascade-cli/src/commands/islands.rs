use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cascade_core::graph_utils::{export_graph, partition, topology_stats};
use cascade_core::island::extract;
use tracing::info;

use crate::commands::util::{join_ids, load_grid};

pub fn handle(grid_file: &Path, emit: bool, dot: Option<&Path>) -> Result<()> {
    let network = load_grid(grid_file)?;
    let stats = topology_stats(&network);
    println!("Topology of {}:", grid_file.display());
    println!("  Buses           : {}", stats.bus_count);
    println!("  Active branches : {}", stats.active_branch_count);
    println!("  Failed branches : {}", stats.failed_branch_count);
    println!("  Islands         : {}", stats.island_count);
    println!("  Largest island  : {}", stats.largest_island);
    println!("  Single-bus      : {}", stats.singleton_islands);

    for (idx, island) in partition(&network).iter().enumerate() {
        let sub = extract(island, &network);
        let generation: f64 = network
            .generators()
            .iter()
            .filter(|g| g.status && island.contains(g.bus))
            .map(|g| g.active_power.value())
            .sum();
        println!(
            "Island {}: {} bus(es), generation {:.1} MW, load {:.1} MW{}",
            idx,
            island.len(),
            generation,
            sub.network.total_load_mw(),
            if sub.has_placeholder() {
                " (no generation)"
            } else {
                ""
            }
        );
        if emit {
            println!("    buses: {}", join_ids(island.iter().map(|b| b.value())));
            if let Some(bus) = sub.promoted_slack() {
                println!("    slack: {bus} (promoted)");
            }
        }
    }

    if let Some(path) = dot {
        let dot_text = export_graph(&network, "dot")?;
        fs::write(path, dot_text)
            .with_context(|| format!("writing DOT file '{}'", path.display()))?;
        info!("Topology written to {}", path.display());
    }
    Ok(())
}
