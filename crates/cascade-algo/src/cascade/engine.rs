//! The cascade step loop.
//!
//! ```text
//! baseline solve
//!      │
//!      ▼
//!   Stable ──(wave empty)──────────────────────────────▶ Converged
//!      │ (wave non-empty, step limit left)
//!      ▼
//!   Faulted ──▶ Rebalancing ──▶ Solved ──(diverged)────▶ Aborted
//!                                  │
//!                     merge, detect overloads ──▶ Stable
//! ```
//!
//! Each step produces a new network value from the previous one. Islands are
//! extracted, rebalanced and solved independently (in parallel when enabled)
//! and merged back by ID.

use super::capacity::BranchCapacities;
use super::metrics;
use super::result::{CascadeResult, CascadeStatus};
use crate::error::{CascadeError, SolverDivergence};
use crate::power_flow::{DcPowerFlow, PowerFlowSolver};
use crate::rebalance::{rebalance, RebalancePolicy};
use cascade_core::{extract_all, merge, partition, BranchId, Network, SolverKind, SubNetwork};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub policy: RebalancePolicy,
    /// Maximum number of failure waves to apply; `None` runs to convergence
    pub step_limit: Option<usize>,
    /// Solve islands on the rayon pool
    pub parallel: bool,
    /// Linear backend for the stock DC solver
    pub solver: SolverKind,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            policy: RebalancePolicy::default(),
            step_limit: None,
            parallel: true,
            solver: SolverKind::default(),
        }
    }
}

impl CascadeConfig {
    pub fn with_policy(mut self, policy: RebalancePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_step_limit(mut self, step_limit: Option<usize>) -> Self {
        self.step_limit = step_limit;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }
}

/// Engine states, traced on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadePhase {
    Stable,
    Faulted,
    Rebalancing,
    Solved,
    Converged,
    Aborted,
}

impl std::fmt::Display for CascadePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CascadePhase::Stable => "stable",
            CascadePhase::Faulted => "faulted",
            CascadePhase::Rebalancing => "rebalancing",
            CascadePhase::Solved => "solved",
            CascadePhase::Converged => "converged",
            CascadePhase::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// Mutable state of one run.
struct CascadeRun {
    network: Network,
    failed: BTreeSet<BranchId>,
    history: Vec<Vec<BranchId>>,
    steps: usize,
    phase: CascadePhase,
}

impl CascadeRun {
    fn transition(&mut self, next: CascadePhase) {
        debug!(step = self.steps, from = %self.phase, to = %next, "cascade phase");
        self.phase = next;
    }
}

pub struct CascadeEngine {
    config: CascadeConfig,
    solver: Arc<dyn PowerFlowSolver>,
}

impl CascadeEngine {
    /// Engine with the stock DC solver on `config.solver`.
    pub fn new(config: CascadeConfig) -> Self {
        let solver = Arc::new(DcPowerFlow::new(config.solver));
        Self { config, solver }
    }

    pub fn with_solver(config: CascadeConfig, solver: Arc<dyn PowerFlowSolver>) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Solve every island of `network` without rebalancing; the slack bus of
    /// each island takes up any mismatch.
    pub fn baseline(&self, network: &Network) -> Result<Network, CascadeError> {
        self.solve_islands(network, None, 0)
    }

    /// Run a cascade from `attack`.
    ///
    /// The network is solved once before the attack. An attack ID naming an
    /// already-failed branch is ignored.
    ///
    /// # Errors
    ///
    /// [`CascadeError::InvalidAttackSet`] and [`CascadeError::MissingCapacity`]
    /// before anything runs; [`CascadeError::Grid`] if a merge breaks record
    /// identity. Solver divergence is not an error here: it ends the run with
    /// [`CascadeStatus::Aborted`] (see [`CascadeResult::into_result`]).
    pub fn run(
        &self,
        network: &Network,
        capacities: &BranchCapacities,
        attack: &[BranchId],
    ) -> Result<CascadeResult, CascadeError> {
        let unknown: Vec<BranchId> = attack
            .iter()
            .copied()
            .filter(|id| !network.contains_branch(*id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !unknown.is_empty() {
            return Err(CascadeError::InvalidAttackSet(unknown));
        }
        if let Some(branch) = network
            .branches()
            .iter()
            .find(|b| b.is_active() && capacities.get(b.id).is_none())
        {
            return Err(CascadeError::MissingCapacity(branch.id));
        }

        let initial_active = network.active_branch_count();
        info!(
            branches = initial_active,
            attack = attack.len(),
            policy = %self.config.policy,
            solver = self.solver.name(),
            "starting cascade"
        );

        let mut run = CascadeRun {
            network: network.clone(),
            failed: BTreeSet::new(),
            history: Vec::new(),
            steps: 0,
            phase: CascadePhase::Stable,
        };

        match self.baseline(network) {
            Ok(solved) => run.network = solved,
            Err(CascadeError::SolverDivergence(divergence)) => {
                return Ok(self.abort(run, network, initial_active, divergence));
            }
            Err(err) => return Err(err),
        }

        let mut wave: Vec<BranchId> = attack
            .iter()
            .copied()
            .filter(|id| run.network.branch(*id).is_some_and(|b| b.is_active()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        loop {
            if wave.is_empty() {
                run.transition(CascadePhase::Converged);
                return Ok(self.finish(
                    run,
                    network,
                    initial_active,
                    CascadeStatus::Converged,
                    Vec::new(),
                ));
            }
            if self.config.step_limit.is_some_and(|limit| run.steps >= limit) {
                warn!(
                    steps = run.steps,
                    pending = wave.len(),
                    "step limit reached with overloads pending"
                );
                return Ok(self.finish(
                    run,
                    network,
                    initial_active,
                    CascadeStatus::StepLimitReached,
                    wave,
                ));
            }

            run.transition(CascadePhase::Faulted);
            for id in &wave {
                run.network.fail_branch(*id);
                run.failed.insert(*id);
            }
            info!(
                step = run.steps + 1,
                failed = wave.len(),
                total = run.failed.len(),
                "failure wave"
            );
            run.history.push(std::mem::take(&mut wave));
            run.steps += 1;

            run.transition(CascadePhase::Rebalancing);
            match self.solve_islands(&run.network, Some(self.config.policy), run.steps) {
                Ok(solved) => run.network = solved,
                Err(CascadeError::SolverDivergence(divergence)) => {
                    return Ok(self.abort(run, network, initial_active, divergence));
                }
                Err(err) => return Err(err),
            }
            run.transition(CascadePhase::Solved);

            wave = overloaded(&run.network, capacities);
            run.transition(CascadePhase::Stable);
        }
    }

    /// Partition, extract, optionally rebalance, solve and merge.
    fn solve_islands(
        &self,
        network: &Network,
        policy: Option<RebalancePolicy>,
        step: usize,
    ) -> Result<Network, CascadeError> {
        let islands = partition(network);
        let subs = extract_all(&islands, network);
        debug!(step, islands = subs.len(), "solving islands");

        let work = |mut sub: SubNetwork| -> Result<SubNetwork, SolverDivergence> {
            if let Some(policy) = policy {
                rebalance(&mut sub.network, policy);
            }
            let solved = self.solver.solve(std::mem::take(&mut sub.network));
            if !solved.converged {
                return Err(SolverDivergence {
                    step,
                    buses: sub.island().iter().collect(),
                    reason: solved
                        .reason
                        .unwrap_or_else(|| "solver did not converge".to_string()),
                });
            }
            sub.network = solved.network;
            Ok(sub)
        };

        let solved: Result<Vec<SubNetwork>, SolverDivergence> =
            if self.config.parallel && subs.len() > 1 {
                subs.into_par_iter().map(&work).collect()
            } else {
                subs.into_iter().map(&work).collect()
            };

        Ok(merge(&solved?, network)?)
    }

    fn abort(
        &self,
        mut run: CascadeRun,
        original: &Network,
        initial_active: usize,
        divergence: SolverDivergence,
    ) -> CascadeResult {
        run.transition(CascadePhase::Aborted);
        warn!(%divergence, "cascade aborted");
        let mut result = self.finish(
            run,
            original,
            initial_active,
            CascadeStatus::Aborted,
            Vec::new(),
        );
        result.divergence = Some(divergence);
        result
    }

    fn finish(
        &self,
        run: CascadeRun,
        original: &Network,
        initial_active: usize,
        status: CascadeStatus,
        pending_overloads: Vec<BranchId>,
    ) -> CascadeResult {
        let isolated_components = metrics::isolated_components(&run.network);
        let result = CascadeResult {
            system_size: metrics::system_size(initial_active, run.failed.len()),
            power_loss: metrics::power_loss(original, &run.network),
            isolated_buses: metrics::isolated_buses(&isolated_components),
            isolated_components,
            failed_branch_ids: run.failed.into_iter().collect(),
            failure_history: run.history,
            steps: run.steps,
            status,
            pending_overloads,
            divergence: None,
            network: run.network,
        };
        info!(summary = %result.summary(), "cascade finished");
        result
    }
}

/// Active branches with `|flow| > capacity`, sorted by ID.
fn overloaded(network: &Network, capacities: &BranchCapacities) -> Vec<BranchId> {
    let mut wave: Vec<BranchId> = network
        .branches()
        .iter()
        .filter(|b| b.is_active())
        .filter(|b| {
            capacities
                .get(b.id)
                .is_some_and(|limit| b.flow.abs().value() > limit.value())
        })
        .map(|b| b.id)
        .collect();
    wave.sort_unstable();
    wave
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power_flow::SolvedIsland;
    use cascade_core::{Branch, Bus, BusId, Gen, GenId, Megawatts};

    fn line(capacity: f64) -> (Network, BranchCapacities) {
        let mut network = Network::new();
        network.add_bus(Bus::slack(BusId::new(1)));
        network.add_bus(Bus::new(BusId::new(2)).with_load(50.0));
        network.add_gen(Gen::new(GenId::new(1), BusId::new(1), 50.0));
        network
            .add_branch(Branch::new(BranchId::new(1), BusId::new(1), BusId::new(2), 0.1))
            .unwrap();
        let caps = [(BranchId::new(1), Megawatts(capacity))]
            .into_iter()
            .collect();
        (network, caps)
    }

    #[test]
    fn test_config_builders() {
        let config = CascadeConfig::default()
            .with_policy(RebalancePolicy::GenerationOnly)
            .with_step_limit(Some(3))
            .with_parallel(false)
            .with_solver(SolverKind::Faer);
        assert_eq!(config.policy, RebalancePolicy::GenerationOnly);
        assert_eq!(config.step_limit, Some(3));
        assert!(!config.parallel);
        assert_eq!(config.solver, SolverKind::Faer);
    }

    #[test]
    fn test_overload_is_strict() {
        let (network, _) = line(0.0);
        let solved = CascadeEngine::new(CascadeConfig::default())
            .baseline(&network)
            .unwrap();
        let flow = solved.branch(BranchId::new(1)).unwrap().flow.abs();
        assert!((flow.value() - 50.0).abs() < 1e-9);

        let exact: BranchCapacities = [(BranchId::new(1), flow)].into_iter().collect();
        assert!(overloaded(&solved, &exact).is_empty());

        let tight: BranchCapacities = [(BranchId::new(1), flow - Megawatts(1e-6))]
            .into_iter()
            .collect();
        assert_eq!(overloaded(&solved, &tight), vec![BranchId::new(1)]);
    }

    #[test]
    fn test_missing_capacity_is_rejected() {
        let (network, _) = line(100.0);
        let err = CascadeEngine::new(CascadeConfig::default())
            .run(&network, &BranchCapacities::new(), &[])
            .unwrap_err();
        assert!(matches!(err, CascadeError::MissingCapacity(id) if id == BranchId::new(1)));
    }

    struct Diverging;

    impl PowerFlowSolver for Diverging {
        fn solve(&self, island: Network) -> SolvedIsland {
            SolvedIsland::failed(island, "forced")
        }

        fn name(&self) -> &str {
            "diverging"
        }
    }

    #[test]
    fn test_baseline_divergence_aborts() {
        let (network, caps) = line(100.0);
        let engine = CascadeEngine::with_solver(CascadeConfig::default(), Arc::new(Diverging));
        let result = engine.run(&network, &caps, &[BranchId::new(1)]).unwrap();
        assert_eq!(result.status, CascadeStatus::Aborted);
        assert_eq!(result.steps, 0);
        assert!(result.failure_history.is_empty());
        let divergence = result.divergence.clone().unwrap();
        assert_eq!(divergence.step, 0);
        assert_eq!(divergence.reason, "forced");
        assert!(matches!(
            result.into_result(),
            Err(CascadeError::SolverDivergence(_))
        ));
    }
}
