//! # cascade-core: Network Model for Cascading-Failure Studies
//!
//! Provides the transmission network representation that the cascade engine
//! splits, rebalances, solves and merges at every step.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **undirected multigraphs** where:
//! - **Nodes**: Buses and Generators (generators reference their bus by ID)
//! - **Edges**: Branches (transmission lines), including failed ones
//!
//! A failed branch is never removed from the graph. Failing it sets its
//! reactance to infinity and its status to [`BranchStatus::Failed`], so every
//! record keeps its identity across split/merge round trips. All lookups go
//! through the typed IDs ([`BusId`], [`GenId`], [`BranchId`]), never through
//! graph positions, which differ between a full network and its islands.
//!
//! ## Quick Start
//!
//! ```rust
//! use cascade_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus::slack(BusId::new(1)));
//! network.add_bus(Bus::new(BusId::new(2)).with_load(50.0));
//! network.add_gen(Gen::new(GenId::new(1), BusId::new(1), 50.0));
//! network
//!     .add_branch(Branch::new(BranchId::new(1), BusId::new(1), BusId::new(2), 0.1))
//!     .unwrap();
//!
//! let islands = partition(&network);
//! assert_eq!(islands.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`graph_utils`] - Topology partitioner (islands over active branches)
//! - [`island`] - Island projector (`extract` / `merge`)
//! - [`diagnostics`] - Validation reporting
//! - [`solver`] - Dense linear-system backends for the DC solve
//! - [`io`] - JSON/YAML network files

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod io;
pub mod island;
pub mod solver;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, IssueCategory, Severity};
pub use error::{GridError, GridResult, RecordKind};
pub use graph_utils::{island_membership, partition, topology_stats, Island, TopologyStats};
pub use island::{extract, extract_all, merge, zero_failed_flows, SubNetwork};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use solver::*;
pub use units::{Megawatts, Radians};

macro_rules! define_id {
    ($name:ident, $label:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} {}", $label, self.0)
            }
        }
    };
}

define_id!(BusId, "Bus");
define_id!(GenId, "Gen");
define_id!(BranchId, "Branch");

/// Role of a bus in the power-flow solve.
///
/// `Slack` is the angle reference and absorbs mismatch, `PV` buses may host
/// generation, `PQ` buses are load-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    Slack,
    PV,
    #[default]
    PQ,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bus_type: BusType,
    /// Real power demand
    #[serde(default)]
    pub load: Megawatts,
    /// Voltage angle written by the last power-flow solve
    #[serde(default)]
    pub angle_rad: Radians,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            bus_type: BusType::PQ,
            load: Megawatts::ZERO,
            angle_rad: Radians::ZERO,
        }
    }
}

impl Bus {
    pub fn new(id: BusId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn slack(id: BusId) -> Self {
        Self {
            id,
            bus_type: BusType::Slack,
            ..Self::default()
        }
    }

    pub fn with_load(mut self, load_mw: f64) -> Self {
        self.load = Megawatts(load_mw);
        self
    }

    pub fn with_type(mut self, bus_type: BusType) -> Self {
        self.bus_type = bus_type;
        self
    }

    pub fn is_slack(&self) -> bool {
        self.bus_type == BusType::Slack
    }
}

fn default_in_service() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gen {
    pub id: GenId,
    #[serde(default)]
    pub name: String,
    pub bus: BusId,
    /// Real power output, rewritten by rebalancing
    #[serde(default)]
    pub active_power: Megawatts,
    /// In-service status
    #[serde(default = "default_in_service")]
    pub status: bool,
    /// Zero-output stand-in attached to an island that has no generation.
    /// Never part of a full network.
    #[serde(default, skip_serializing_if = "is_false")]
    pub synthetic: bool,
}

impl Gen {
    /// Reserved ID carried by every placeholder generator.
    pub const PLACEHOLDER_ID: GenId = GenId(usize::MAX);

    pub fn new(id: GenId, bus: BusId, active_power_mw: f64) -> Self {
        Self {
            id,
            name: String::new(),
            bus,
            active_power: Megawatts(active_power_mw),
            status: true,
            synthetic: false,
        }
    }

    pub fn placeholder(bus: BusId) -> Self {
        Self {
            id: Self::PLACEHOLDER_ID,
            name: "placeholder".to_string(),
            bus,
            active_power: Megawatts::ZERO,
            status: true,
            synthetic: true,
        }
    }

    pub fn out_of_service(mut self) -> Self {
        self.status = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    #[default]
    Active,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    #[serde(default)]
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series reactance (per-unit); infinite once the branch has failed
    #[serde(with = "reactance_serde")]
    pub reactance: f64,
    #[serde(default)]
    pub status: BranchStatus,
    /// Signed flow from `from_bus` to `to_bus`, written by the solver
    #[serde(default)]
    pub flow: Megawatts,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: BranchId(0),
            name: String::new(),
            from_bus: BusId(0),
            to_bus: BusId(0),
            reactance: 0.0,
            status: BranchStatus::Active,
            flow: Megawatts::ZERO,
        }
    }
}

impl Branch {
    pub fn new(id: BranchId, from_bus: BusId, to_bus: BusId, reactance: f64) -> Self {
        Self {
            id,
            from_bus,
            to_bus,
            reactance,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BranchStatus::Active
    }

    pub fn is_failed(&self) -> bool {
        self.status == BranchStatus::Failed
    }

    /// Trip the branch: infinite reactance, no flow.
    pub fn fail(&mut self) {
        self.status = BranchStatus::Failed;
        self.reactance = f64::INFINITY;
        self.flow = Megawatts::ZERO;
    }

    pub fn connects(&self, bus: BusId) -> bool {
        self.from_bus == bus || self.to_bus == bus
    }
}

/// Failed branches carry `f64::INFINITY`, which JSON cannot express; it is
/// written as `null` and read back as infinity.
mod reactance_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Bus(Bus),
    Gen(Gen),
}

impl Node {
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.name,
            Node::Gen(gen) => &gen.name,
        }
    }
}

/// The transmission network: buses and generators as nodes, branches as edges.
///
/// Generator nodes have no edges; a generator belongs to the bus named by
/// [`Gen::bus`].
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub graph: Graph<Node, Branch, Undirected>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
        }
    }

    pub fn add_bus(&mut self, bus: Bus) -> NodeIndex {
        self.graph.add_node(Node::Bus(bus))
    }

    pub fn add_gen(&mut self, gen: Gen) -> NodeIndex {
        self.graph.add_node(Node::Gen(gen))
    }

    /// Connect two existing buses. Both endpoints must already be in the network.
    pub fn add_branch(&mut self, branch: Branch) -> GridResult<EdgeIndex> {
        let from = self.bus_index(branch.from_bus).ok_or_else(|| {
            GridError::Network(format!(
                "{} references unknown from-bus {}",
                branch.id,
                branch.from_bus.value()
            ))
        })?;
        let to = self.bus_index(branch.to_bus).ok_or_else(|| {
            GridError::Network(format!(
                "{} references unknown to-bus {}",
                branch.id,
                branch.to_bus.value()
            ))
        })?;
        Ok(self.graph.add_edge(from, to, branch))
    }

    pub fn bus_index(&self, id: BusId) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| matches!(&self.graph[idx], Node::Bus(bus) if bus.id == id))
    }

    /// ID -> node index map for every bus, for callers doing many lookups.
    pub fn bus_lookup(&self) -> HashMap<BusId, NodeIndex> {
        self.graph
            .node_indices()
            .filter_map(|idx| match &self.graph[idx] {
                Node::Bus(bus) => Some((bus.id, idx)),
                _ => None,
            })
            .collect()
    }

    pub fn gen_lookup(&self) -> HashMap<GenId, NodeIndex> {
        self.graph
            .node_indices()
            .filter_map(|idx| match &self.graph[idx] {
                Node::Gen(gen) => Some((gen.id, idx)),
                _ => None,
            })
            .collect()
    }

    pub fn branch_lookup(&self) -> HashMap<BranchId, EdgeIndex> {
        self.graph
            .edge_indices()
            .map(|idx| (self.graph[idx].id, idx))
            .collect()
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses().into_iter().find(|bus| bus.id == id)
    }

    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.graph.edge_weights().find(|branch| branch.id == id)
    }

    pub fn branch_mut(&mut self, id: BranchId) -> Option<&mut Branch> {
        self.graph.edge_weights_mut().find(|branch| branch.id == id)
    }

    pub fn contains_branch(&self, id: BranchId) -> bool {
        self.branch(id).is_some()
    }

    /// Fail one branch. Returns `false` when the branch is unknown or already failed.
    pub fn fail_branch(&mut self, id: BranchId) -> bool {
        match self.branch_mut(id) {
            Some(branch) if branch.is_active() => {
                branch.fail();
                true
            }
            _ => false,
        }
    }

    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn generators(&self) -> Vec<&Gen> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Gen(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn branches(&self) -> Vec<&Branch> {
        self.graph.edge_weights().collect()
    }

    pub fn buses_mut(&mut self) -> impl Iterator<Item = &mut Bus> {
        self.graph.node_weights_mut().filter_map(|n| match n {
            Node::Bus(b) => Some(b),
            _ => None,
        })
    }

    pub fn generators_mut(&mut self) -> impl Iterator<Item = &mut Gen> {
        self.graph.node_weights_mut().filter_map(|n| match n {
            Node::Gen(g) => Some(g),
            _ => None,
        })
    }

    pub fn branches_mut(&mut self) -> impl Iterator<Item = &mut Branch> {
        self.graph.edge_weights_mut()
    }

    pub fn generators_at_bus(&self, bus_id: BusId) -> Vec<&Gen> {
        self.generators()
            .into_iter()
            .filter(|g| g.bus == bus_id)
            .collect()
    }

    /// Total real power output of in-service generators (MW)
    pub fn total_generation_mw(&self) -> f64 {
        self.generators()
            .iter()
            .filter(|g| g.status)
            .map(|g| g.active_power.value())
            .sum()
    }

    /// Total real power demand over all buses (MW)
    pub fn total_load_mw(&self) -> f64 {
        self.buses().iter().map(|b| b.load.value()).sum()
    }

    pub fn active_branch_count(&self) -> usize {
        self.graph.edge_weights().filter(|b| b.is_active()).count()
    }

    pub fn failed_branch_ids(&self) -> Vec<BranchId> {
        let mut ids: Vec<BranchId> = self
            .graph
            .edge_weights()
            .filter(|b| b.is_failed())
            .map(|b| b.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn branch_ids(&self) -> Vec<BranchId> {
        let mut ids: Vec<BranchId> = self.graph.edge_weights().map(|b| b.id).collect();
        ids.sort_unstable();
        ids
    }

    /// Record-level equality: same buses, generators and branches in the same order.
    pub fn same_records(&self, other: &Network) -> bool {
        self.buses() == other.buses()
            && self.generators() == other.generators()
            && self.branches() == other.branches()
    }

    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();
        for node in self.graph.node_weights() {
            match node {
                Node::Bus(b) => {
                    stats.num_buses += 1;
                    stats.total_load_mw += b.load.value();
                }
                Node::Gen(g) => {
                    stats.num_gens += 1;
                    if g.status {
                        stats.total_generation_mw += g.active_power.value();
                    }
                }
            }
        }
        for branch in self.graph.edge_weights() {
            stats.num_branches += 1;
            if branch.is_failed() {
                stats.num_failed_branches += 1;
            }
        }
        stats
    }

    /// Check the data for problems that would corrupt a cascade run, adding
    /// one issue per problem to `diag`.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        use IssueCategory::{Physical, Reference, Structure};

        let stats = self.stats();
        if stats.num_buses == 0 {
            diag.error(Structure, "Network has no buses");
            return;
        }

        let mut bus_ids = HashSet::new();
        let mut slack_count = 0;
        for bus in self.buses() {
            if !bus_ids.insert(bus.id) {
                diag.error_on(Structure, bus.id, "Duplicate bus ID");
            }
            if bus.is_slack() {
                slack_count += 1;
            }
            if !bus.load.is_finite() {
                diag.error_on(Physical, bus.id, "Load is not finite");
            }
        }
        match slack_count {
            0 => diag.warn(
                Structure,
                "Network has no slack bus; one will be promoted per island",
            ),
            1 => {}
            n => diag.warn(
                Structure,
                format!("Network has {n} slack buses; each island keeps its lowest-ID one"),
            ),
        }

        let mut gen_ids = HashSet::new();
        for gen in self.generators() {
            if gen.synthetic {
                diag.error_on(Structure, gen.id, "Placeholder generator in a full network");
            }
            if !gen_ids.insert(gen.id) {
                diag.error_on(Structure, gen.id, "Duplicate generator ID");
            }
            if !bus_ids.contains(&gen.bus) {
                diag.error_on(
                    Reference,
                    gen.id,
                    format!("Generator references unknown bus {}", gen.bus.value()),
                );
            }
        }
        if stats.num_gens == 0 {
            diag.warn(Structure, "Network has no generators");
        }
        if stats.total_load_mw.abs() < 1e-9 {
            diag.warn(Structure, "Network has no load");
        }

        let mut branch_ids = HashSet::new();
        for edge in self.graph.edge_references() {
            let branch = edge.weight();
            if !branch_ids.insert(branch.id) {
                diag.error_on(Structure, branch.id, "Duplicate branch ID");
            }
            let mut actual = [edge.source(), edge.target()].map(|idx| match &self.graph[idx] {
                Node::Bus(bus) => Some(bus.id),
                Node::Gen(_) => None,
            });
            let mut expected = [Some(branch.from_bus), Some(branch.to_bus)];
            expected.sort();
            actual.sort();
            if expected != actual {
                diag.error_on(
                    Reference,
                    branch.id,
                    "Branch endpoints do not match its graph connection",
                );
            }
            if branch.is_active() && !(branch.reactance.is_finite() && branch.reactance > 0.0) {
                diag.error_on(
                    Physical,
                    branch.id,
                    format!("Active branch has invalid reactance {}", branch.reactance),
                );
            }
            if branch.is_failed() && branch.flow.value() != 0.0 {
                diag.warn_on(Physical, branch.id, "Failed branch carries non-zero flow");
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_gens: usize,
    pub num_branches: usize,
    pub num_failed_branches: usize,
    pub total_load_mw: f64,
    pub total_generation_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} branches ({} failed), {} gens ({:.1} MW), load {:.1} MW",
            self.num_buses,
            self.num_branches,
            self.num_failed_branches,
            self.num_gens,
            self.total_generation_mw,
            self.total_load_mw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::slack(BusId::new(1)));
        network.add_bus(Bus::new(BusId::new(2)).with_load(50.0));
        network.add_gen(Gen::new(GenId::new(1), BusId::new(1), 60.0));
        network
            .add_branch(Branch::new(
                BranchId::new(1),
                BusId::new(1),
                BusId::new(2),
                0.1,
            ))
            .unwrap();
        network
    }

    #[test]
    fn test_network_creation() {
        let network = two_bus_network();
        assert_eq!(network.graph.node_count(), 3);
        assert_eq!(network.graph.edge_count(), 1);
        assert_eq!(network.buses().len(), 2);
        assert_eq!(network.generators().len(), 1);
        assert_eq!(network.branches().len(), 1);
    }

    #[test]
    fn test_add_branch_rejects_unknown_bus() {
        let mut network = two_bus_network();
        let err = network
            .add_branch(Branch::new(
                BranchId::new(2),
                BusId::new(1),
                BusId::new(9),
                0.1,
            ))
            .unwrap_err();
        assert!(err.to_string().contains("unknown to-bus 9"));
    }

    #[test]
    fn test_fail_branch_sets_sentinel_and_zero_flow() {
        let mut network = two_bus_network();
        network.branch_mut(BranchId::new(1)).unwrap().flow = Megawatts(42.0);

        assert!(network.fail_branch(BranchId::new(1)));
        let branch = network.branch(BranchId::new(1)).unwrap();
        assert!(branch.is_failed());
        assert!(branch.reactance.is_infinite());
        assert_eq!(branch.flow, Megawatts::ZERO);

        // second failure is a no-op
        assert!(!network.fail_branch(BranchId::new(1)));
        assert!(!network.fail_branch(BranchId::new(99)));
        assert_eq!(network.failed_branch_ids(), vec![BranchId::new(1)]);
        assert_eq!(network.active_branch_count(), 0);
    }

    #[test]
    fn test_totals_skip_out_of_service_generators() {
        let mut network = two_bus_network();
        network.add_gen(Gen::new(GenId::new(2), BusId::new(2), 25.0).out_of_service());

        assert!((network.total_generation_mw() - 60.0).abs() < 1e-12);
        assert!((network.total_load_mw() - 50.0).abs() < 1e-12);
        assert_eq!(network.generators_at_bus(BusId::new(2)).len(), 1);
    }

    #[test]
    fn test_network_stats() {
        let mut network = two_bus_network();
        network.fail_branch(BranchId::new(1));
        let stats = network.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_gens, 1);
        assert_eq!(stats.num_branches, 1);
        assert_eq!(stats.num_failed_branches, 1);
        assert!(stats.to_string().starts_with("2 buses, 1 branches (1 failed)"));
    }

    #[test]
    fn test_valid_network_has_no_errors() {
        let network = two_bus_network();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(!diag.has_errors(), "{diag}");
    }

    #[test]
    fn test_validation_empty_network() {
        let network = Network::new();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.errors().any(|i| i.message.contains("no buses")));
    }

    #[test]
    fn test_validation_flags_duplicates_and_dangling_generator() {
        let mut network = two_bus_network();
        network.add_bus(Bus::new(BusId::new(2)));
        network.add_gen(Gen::new(GenId::new(1), BusId::new(7), 5.0));

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.errors().any(|i| i.message == "Duplicate bus ID"));
        assert!(diag.errors().any(|i| i.message == "Duplicate generator ID"));
        assert!(diag
            .errors()
            .any(|i| i.message.contains("unknown bus 7")));
    }

    #[test]
    fn test_validation_flags_bad_reactance() {
        let mut network = two_bus_network();
        network.branch_mut(BranchId::new(1)).unwrap().reactance = 0.0;
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag
            .errors()
            .any(|i| i.message.contains("invalid reactance")));
    }

    #[test]
    fn test_same_records_detects_changes() {
        let a = two_bus_network();
        let mut b = a.clone();
        assert!(a.same_records(&b));
        b.buses_mut().for_each(|bus| bus.load = Megawatts(1.0));
        assert!(!a.same_records(&b));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(BusId::new(4).to_string(), "Bus 4");
        assert_eq!(BranchId::new(12).to_string(), "Branch 12");
    }
}
