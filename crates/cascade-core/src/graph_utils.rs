use crate::{BusId, Network, Node};
use anyhow::{anyhow, Result};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// A maximal set of buses connected through active branches.
///
/// Islands are recomputed at every cascade step. Their order in a partition
/// carries no meaning; look them up by bus membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Island {
    buses: BTreeSet<BusId>,
}

impl Island {
    pub fn new(buses: impl IntoIterator<Item = BusId>) -> Self {
        Self {
            buses: buses.into_iter().collect(),
        }
    }

    pub fn buses(&self) -> &BTreeSet<BusId> {
        &self.buses
    }

    pub fn contains(&self, bus: BusId) -> bool {
        self.buses.contains(&bus)
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    /// Lowest bus ID in the island
    pub fn first_bus(&self) -> Option<BusId> {
        self.buses.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = BusId> + '_ {
        self.buses.iter().copied()
    }
}

impl FromIterator<BusId> for Island {
    fn from_iter<I: IntoIterator<Item = BusId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Connected components of the active-branch graph, as bus-ID sets.
///
/// Every bus lands in exactly one island; a bus with no active incident
/// branch is a singleton island. Failed branches stay in the graph but are
/// not traversed, and generator nodes are never visited.
pub fn partition(network: &Network) -> Vec<Island> {
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    for start in network.graph.node_indices() {
        if visited.contains(&start) || !matches!(network.graph[start], Node::Bus(_)) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = BTreeSet::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            if let Node::Bus(bus) = &network.graph[node] {
                members.insert(bus.id);
            }
            for edge in network.graph.edges(node) {
                if !edge.weight().is_active() {
                    continue;
                }
                let neighbor = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        islands.push(Island { buses: members });
    }
    islands
}

/// Bus ID -> position of its island in `islands`.
pub fn island_membership(islands: &[Island]) -> HashMap<BusId, usize> {
    islands
        .iter()
        .enumerate()
        .flat_map(|(idx, island)| island.iter().map(move |bus| (bus, idx)))
        .collect()
}

/// Summary of the active topology, printed by `cascade islands`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopologyStats {
    pub bus_count: usize,
    pub active_branch_count: usize,
    pub failed_branch_count: usize,
    pub island_count: usize,
    pub largest_island: usize,
    pub singleton_islands: usize,
}

pub fn topology_stats(network: &Network) -> TopologyStats {
    let islands = partition(network);
    let active_branch_count = network.active_branch_count();
    TopologyStats {
        bus_count: islands.iter().map(Island::len).sum(),
        active_branch_count,
        failed_branch_count: network.graph.edge_count() - active_branch_count,
        island_count: islands.len(),
        largest_island: islands.iter().map(Island::len).max().unwrap_or(0),
        singleton_islands: islands.iter().filter(|i| i.len() == 1).count(),
    }
}

/// Export the bus/branch topology to a DOT string (Graphviz). Failed
/// branches are drawn dashed.
pub fn export_graph(network: &Network, format: &str) -> Result<String> {
    match format.to_ascii_lowercase().as_str() {
        "graphviz" | "dot" => Ok(render_dot(network)),
        other => Err(anyhow!("unsupported graph export format '{other}'")),
    }
}

fn render_dot(network: &Network) -> String {
    let mut buffer = String::new();
    buffer.push_str("graph cascade_network {\n");
    for node in network.graph.node_indices() {
        if let Node::Bus(bus) = &network.graph[node] {
            let label = if bus.name.is_empty() {
                bus.id.value().to_string()
            } else {
                sanitize_label(&bus.name)
            };
            buffer.push_str(&format!("  n{} [label=\"{}\"];\n", node.index(), label));
        }
    }
    for edge in network.graph.edge_references() {
        let source = edge.source().index();
        let target = edge.target().index();
        if edge.weight().is_failed() {
            buffer.push_str(&format!("  n{source} -- n{target} [style=dashed];\n"));
        } else {
            buffer.push_str(&format!("  n{source} -- n{target};\n"));
        }
    }
    buffer.push('}');
    buffer
}

fn sanitize_label(label: &str) -> String {
    label.replace('"', "\\\"")
}
