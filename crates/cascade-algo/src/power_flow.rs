//! DC power flow for a single island.
//!
//! The cascade engine hands every island to a [`PowerFlowSolver`] on its own.
//! [`DcPowerFlow`] is the stock implementation: the linearized B′θ = P system
//! with the slack row/column removed, solved by a dense backend from
//! `cascade_core::solver`.

use cascade_core::{BusId, LinearSystemBackend, Megawatts, Network, Radians, SolverKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Output of one island solve. A solve that did not converge still hands the
/// network back so the caller can report on it.
#[derive(Debug, Clone)]
pub struct SolvedIsland {
    pub network: Network,
    pub converged: bool,
    /// Why the solve failed, when it did
    pub reason: Option<String>,
}

impl SolvedIsland {
    pub fn ok(network: Network) -> Self {
        Self {
            network,
            converged: true,
            reason: None,
        }
    }

    pub fn failed(network: Network, reason: impl Into<String>) -> Self {
        Self {
            network,
            converged: false,
            reason: Some(reason.into()),
        }
    }
}

/// Solver boundary used by the cascade engine.
///
/// Implementations receive one island at a time, write a `flow` on every
/// branch (zero on failed branches) and report convergence. They must not
/// add, drop or renumber records.
pub trait PowerFlowSolver: Send + Sync {
    fn solve(&self, island: Network) -> SolvedIsland;

    fn name(&self) -> &str;
}

/// Linearized (DC) power flow.
///
/// Injections are in-service generation minus load at each bus, converted to
/// per-unit on `base_mva`. Branch flow in MW is
/// `base_mva * (θ_from - θ_to) / x`.
#[derive(Clone)]
pub struct DcPowerFlow {
    backend: Arc<dyn LinearSystemBackend>,
    base_mva: f64,
}

impl Default for DcPowerFlow {
    fn default() -> Self {
        Self::new(SolverKind::default())
    }
}

impl std::fmt::Debug for DcPowerFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DcPowerFlow")
            .field("backend", &self.backend.name())
            .field("base_mva", &self.base_mva)
            .finish()
    }
}

impl DcPowerFlow {
    pub const DEFAULT_BASE_MVA: f64 = 100.0;

    pub fn new(kind: SolverKind) -> Self {
        Self::with_backend(kind.build_solver())
    }

    pub fn with_backend(backend: Arc<dyn LinearSystemBackend>) -> Self {
        Self {
            backend,
            base_mva: Self::DEFAULT_BASE_MVA,
        }
    }

    pub fn with_base_mva(mut self, base_mva: f64) -> Self {
        self.base_mva = base_mva;
        self
    }

    /// Bus angles keyed by bus ID. The slack bus sits at zero.
    fn compute_angles(&self, network: &Network) -> anyhow::Result<HashMap<BusId, f64>> {
        let mut buses = network.buses();
        buses.sort_by_key(|bus| bus.id);
        let node_count = buses.len();
        if node_count == 0 {
            return Ok(HashMap::new());
        }

        let slack = buses.iter().position(|bus| bus.is_slack()).unwrap_or(0);
        if node_count == 1 {
            return Ok(HashMap::from([(buses[0].id, 0.0)]));
        }

        let index: HashMap<BusId, usize> = buses
            .iter()
            .enumerate()
            .map(|(idx, bus)| (bus.id, idx))
            .collect();

        let mut injections = vec![0.0; node_count];
        for (idx, bus) in buses.iter().enumerate() {
            injections[idx] -= bus.load.value();
        }
        for gen in network.generators().iter().filter(|g| g.status) {
            if let Some(&idx) = index.get(&gen.bus) {
                injections[idx] += gen.active_power.value();
            }
        }

        let mut susceptance = vec![vec![0.0; node_count]; node_count];
        for branch in network.branches().iter().filter(|b| b.is_active()) {
            if let (Some(&i), Some(&j)) = (index.get(&branch.from_bus), index.get(&branch.to_bus))
            {
                if i == j {
                    continue;
                }
                let b = 1.0 / branch.reactance.abs().max(1e-6);
                susceptance[i][j] -= b;
                susceptance[j][i] -= b;
                susceptance[i][i] += b;
                susceptance[j][j] += b;
            }
        }

        // Drop the slack row/column so B′ becomes non-singular.
        let keep: Vec<usize> = (0..node_count).filter(|&idx| idx != slack).collect();
        let reduced: Vec<Vec<f64>> = keep
            .iter()
            .map(|&i| keep.iter().map(|&j| susceptance[i][j]).collect())
            .collect();
        let reduced_rhs: Vec<f64> = keep
            .iter()
            .map(|&i| injections[i] / self.base_mva)
            .collect();

        let solution = self.backend.solve(&reduced, &reduced_rhs)?;
        let mut angles = HashMap::with_capacity(node_count);
        angles.insert(buses[slack].id, 0.0);
        for (&idx, theta) in keep.iter().zip(solution) {
            angles.insert(buses[idx].id, theta);
        }
        Ok(angles)
    }
}

impl PowerFlowSolver for DcPowerFlow {
    fn solve(&self, mut island: Network) -> SolvedIsland {
        let angles = match self.compute_angles(&island) {
            Ok(angles) => angles,
            Err(err) => return SolvedIsland::failed(island, err.to_string()),
        };

        for bus in island.buses_mut() {
            bus.angle_rad = Radians(angles.get(&bus.id).copied().unwrap_or(0.0));
        }
        let base_mva = self.base_mva;
        for branch in island.branches_mut() {
            branch.flow = if branch.is_active() {
                let theta_from = angles.get(&branch.from_bus).copied().unwrap_or(0.0);
                let theta_to = angles.get(&branch.to_bus).copied().unwrap_or(0.0);
                Megawatts(base_mva * (theta_from - theta_to) / branch.reactance.abs().max(1e-6))
            } else {
                Megawatts::ZERO
            };
        }

        if island.branches().iter().any(|b| !b.flow.is_finite()) {
            return SolvedIsland::failed(island, "non-finite branch flow");
        }
        SolvedIsland::ok(island)
    }

    fn name(&self) -> &str {
        self.backend.name()
    }
}
