//! Island projection: cut a self-consistent sub-network out of a full
//! network, and write modified sub-networks back by ID.
//!
//! A sub-network always has exactly the island's buses, exactly one slack
//! bus and at least one in-service generator, so a solver can run on it
//! without special cases. What `extract` changed for that (a promoted slack,
//! demoted extra slacks, a placeholder generator) is remembered on the
//! [`SubNetwork`] and undone by [`merge`].

use crate::{
    BusId, BusType, Gen, GridError, GridResult, Island, Megawatts, Network, Node, NodeIndex,
    RecordKind,
};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SubNetwork {
    island: Island,
    pub network: Network,
    promoted_slack: Option<BusId>,
    demoted_slacks: Vec<BusId>,
}

impl SubNetwork {
    pub fn island(&self) -> &Island {
        &self.island
    }

    /// Bus switched to slack by `extract` because the island had none.
    pub fn promoted_slack(&self) -> Option<BusId> {
        self.promoted_slack
    }

    /// Slack buses switched to PV by `extract` because the island already
    /// had a lower-ID slack.
    pub fn demoted_slacks(&self) -> &[BusId] {
        &self.demoted_slacks
    }

    /// Bus type set by `extract` rather than taken from the input.
    fn retyped(&self, bus: BusId) -> bool {
        self.promoted_slack == Some(bus) || self.demoted_slacks.contains(&bus)
    }

    pub fn has_placeholder(&self) -> bool {
        self.network.generators().iter().any(|g| g.synthetic)
    }

    pub fn into_network(self) -> Network {
        self.network
    }
}

/// Copy every record whose buses all lie inside `island`.
///
/// Records keep their relative order from `network`. A branch qualifies only
/// if both endpoints are in the island.
pub fn extract(island: &Island, network: &Network) -> SubNetwork {
    let mut sub = Network::new();
    let mut node_map: HashMap<NodeIndex, NodeIndex> = HashMap::new();

    for idx in network.graph.node_indices() {
        match &network.graph[idx] {
            Node::Bus(bus) if island.contains(bus.id) => {
                node_map.insert(idx, sub.add_bus(bus.clone()));
            }
            Node::Gen(gen) if island.contains(gen.bus) => {
                sub.add_gen(gen.clone());
            }
            _ => {}
        }
    }

    for edge in network.graph.edge_references() {
        let branch = edge.weight();
        if !(island.contains(branch.from_bus) && island.contains(branch.to_bus)) {
            continue;
        }
        if let (Some(&a), Some(&b)) = (node_map.get(&edge.source()), node_map.get(&edge.target()))
        {
            sub.graph.add_edge(a, b, branch.clone());
        }
    }

    let mut promoted_slack = None;
    let mut demoted_slacks = Vec::new();
    if let Some(first) = island.first_bus() {
        let mut slacks: Vec<BusId> = sub
            .buses()
            .iter()
            .filter(|b| b.is_slack())
            .map(|b| b.id)
            .collect();
        slacks.sort_unstable();
        match slacks.split_first() {
            None => {
                if let Some(bus) = sub.buses_mut().find(|b| b.id == first) {
                    bus.bus_type = BusType::Slack;
                    promoted_slack = Some(first);
                }
            }
            Some((_, extra)) => {
                // the lowest-ID slack stays the angle reference
                for bus in sub.buses_mut().filter(|b| extra.contains(&b.id)) {
                    bus.bus_type = BusType::PV;
                }
                demoted_slacks = extra.to_vec();
            }
        }
        if !sub.generators().iter().any(|g| g.status) {
            sub.add_gen(Gen::placeholder(first));
        }
    }

    SubNetwork {
        island: island.clone(),
        network: sub,
        promoted_slack,
        demoted_slacks,
    }
}

pub fn extract_all(islands: &[Island], network: &Network) -> Vec<SubNetwork> {
    islands
        .iter()
        .map(|island| extract(island, network))
        .collect()
}

/// Overwrite records of a copy of `original` with those of `subs`, by ID.
///
/// Records not present in any sub-network pass through unchanged. Promoted
/// and demoted slack buses get their original bus type back, placeholder
/// generators are dropped, and every failed branch ends with zero flow.
///
/// # Errors
///
/// [`GridError::InconsistentMerge`] when a sub-network carries a bus,
/// generator or branch ID that `original` does not have.
pub fn merge(subs: &[SubNetwork], original: &Network) -> GridResult<Network> {
    let mut merged = original.clone();
    let buses = merged.bus_lookup();
    let gens = merged.gen_lookup();
    let branches = merged.branch_lookup();

    for sub in subs {
        for node in sub.network.graph.node_weights() {
            match node {
                Node::Bus(bus) => {
                    let idx = *buses.get(&bus.id).ok_or(GridError::InconsistentMerge {
                        kind: RecordKind::Bus,
                        id: bus.id.value(),
                    })?;
                    if let Node::Bus(target) = &mut merged.graph[idx] {
                        let bus_type = if sub.retyped(bus.id) {
                            target.bus_type
                        } else {
                            bus.bus_type
                        };
                        *target = bus.clone();
                        target.bus_type = bus_type;
                    }
                }
                Node::Gen(gen) if gen.synthetic => {}
                Node::Gen(gen) => {
                    let idx = *gens.get(&gen.id).ok_or(GridError::InconsistentMerge {
                        kind: RecordKind::Generator,
                        id: gen.id.value(),
                    })?;
                    merged.graph[idx] = Node::Gen(gen.clone());
                }
            }
        }
        for branch in sub.network.graph.edge_weights() {
            let idx = *branches
                .get(&branch.id)
                .ok_or(GridError::InconsistentMerge {
                    kind: RecordKind::Branch,
                    id: branch.id.value(),
                })?;
            merged.graph[idx] = branch.clone();
        }
    }

    zero_failed_flows(&mut merged);
    Ok(merged)
}

/// Force `flow = 0` on every failed branch.
pub fn zero_failed_flows(network: &mut Network) {
    for branch in network.branches_mut().filter(|b| b.is_failed()) {
        branch.flow = Megawatts::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{partition, Branch, BranchId, Bus, GenId};

    /// Buses 1-2-3 joined by branches 1 and 2, bus 4 joined to 3 by branch 3.
    /// Slack on bus 1, generators on buses 1 and 4.
    fn sample_network() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::slack(BusId::new(1)));
        network.add_bus(Bus::new(BusId::new(2)).with_load(30.0));
        network.add_bus(Bus::new(BusId::new(3)).with_load(20.0));
        network.add_bus(Bus::new(BusId::new(4)).with_type(BusType::PV));
        network.add_gen(Gen::new(GenId::new(1), BusId::new(1), 40.0));
        network.add_gen(Gen::new(GenId::new(2), BusId::new(4), 10.0));
        for (id, from, to) in [(1, 1, 2), (2, 2, 3), (3, 3, 4)] {
            network
                .add_branch(Branch::new(
                    BranchId::new(id),
                    BusId::new(from),
                    BusId::new(to),
                    0.1,
                ))
                .unwrap();
        }
        network
    }

    #[test]
    fn test_extract_keeps_only_island_records() {
        let network = sample_network();
        let island = Island::new([BusId::new(2), BusId::new(3)]);
        let sub = extract(&island, &network);

        let bus_ids: Vec<usize> = sub.network.buses().iter().map(|b| b.id.value()).collect();
        assert_eq!(bus_ids, vec![2, 3]);
        let branch_ids: Vec<usize> = sub
            .network
            .branches()
            .iter()
            .map(|b| b.id.value())
            .collect();
        assert_eq!(branch_ids, vec![2]);
        assert_eq!(sub.promoted_slack(), Some(BusId::new(2)));
        assert!(sub.network.bus(BusId::new(2)).unwrap().is_slack());
    }

    #[test]
    fn test_extract_adds_placeholder_when_no_generation() {
        let network = sample_network();
        let island = Island::new([BusId::new(3), BusId::new(2)]);
        let sub = extract(&island, &network);

        assert!(sub.has_placeholder());
        let gens = sub.network.generators();
        assert_eq!(gens.len(), 1);
        assert_eq!(gens[0].bus, BusId::new(2));
        assert_eq!(gens[0].active_power, Megawatts::ZERO);
    }

    #[test]
    fn test_extract_out_of_service_generator_gets_placeholder() {
        let mut network = sample_network();
        network
            .generators_mut()
            .filter(|g| g.id == GenId::new(2))
            .for_each(|g| g.status = false);
        let sub = extract(&Island::new([BusId::new(4)]), &network);
        assert_eq!(sub.network.generators().len(), 2);
        assert!(sub.has_placeholder());
    }

    #[test]
    fn test_extract_keeps_existing_slack() {
        let network = sample_network();
        let island = Island::new([BusId::new(1), BusId::new(2)]);
        let sub = extract(&island, &network);
        assert_eq!(sub.promoted_slack(), None);
        assert!(!sub.has_placeholder());
    }

    #[test]
    fn test_extract_keeps_one_slack_per_island() {
        let mut network = Network::new();
        network.add_bus(Bus::slack(BusId::new(3)));
        network.add_bus(Bus::slack(BusId::new(1)).with_load(20.0));
        network.add_gen(Gen::new(GenId::new(1), BusId::new(3), 20.0));
        network
            .add_branch(Branch::new(
                BranchId::new(1),
                BusId::new(1),
                BusId::new(3),
                0.1,
            ))
            .unwrap();

        let islands = partition(&network);
        assert_eq!(islands.len(), 1);
        let sub = extract(&islands[0], &network);
        let slacks: Vec<BusId> = sub
            .network
            .buses()
            .iter()
            .filter(|b| b.is_slack())
            .map(|b| b.id)
            .collect();
        assert_eq!(slacks, vec![BusId::new(1)]);
        assert_eq!(sub.demoted_slacks(), &[BusId::new(3)]);
        assert_eq!(sub.promoted_slack(), None);
        assert_eq!(
            sub.network.bus(BusId::new(3)).unwrap().bus_type,
            BusType::PV
        );

        let merged = merge(&[sub], &network).unwrap();
        assert!(merged.same_records(&network));
        assert!(merged.bus(BusId::new(3)).unwrap().is_slack());
    }

    #[test]
    fn test_round_trip_is_identity() {
        let mut network = sample_network();
        network.fail_branch(BranchId::new(2));
        let islands = partition(&network);
        assert_eq!(islands.len(), 2);

        let subs = extract_all(&islands, &network);
        let merged = merge(&subs, &network).unwrap();
        assert!(merged.same_records(&network));
    }

    #[test]
    fn test_merge_overwrites_by_id_and_leaves_rest() {
        let mut network = sample_network();
        network.fail_branch(BranchId::new(3));
        let island = Island::new([BusId::new(1), BusId::new(2), BusId::new(3)]);
        let mut sub = extract(&island, &network);
        sub.network
            .buses_mut()
            .for_each(|b| b.load = b.load * 0.5);

        let merged = merge(&[sub], &network).unwrap();
        assert_eq!(merged.bus(BusId::new(2)).unwrap().load, Megawatts(15.0));
        assert_eq!(merged.bus(BusId::new(4)), network.bus(BusId::new(4)));
        assert_eq!(merged.generators().len(), 2);
    }

    #[test]
    fn test_merge_zeroes_failed_flows() {
        let mut network = sample_network();
        network.fail_branch(BranchId::new(1));
        network.branch_mut(BranchId::new(1)).unwrap().flow = Megawatts(12.0);

        let merged = merge(&[], &network).unwrap();
        assert_eq!(
            merged.branch(BranchId::new(1)).unwrap().flow,
            Megawatts::ZERO
        );
    }

    #[test]
    fn test_merge_rejects_foreign_records() {
        let network = sample_network();
        let island = Island::new([BusId::new(4)]);
        let mut sub = extract(&island, &network);
        sub.network.add_bus(Bus::new(BusId::new(99)));

        let err = merge(&[sub], &network).unwrap_err();
        assert!(matches!(
            err,
            GridError::InconsistentMerge {
                kind: RecordKind::Bus,
                id: 99
            }
        ));
    }
}
