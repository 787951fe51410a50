use crate::attack::{attack_size, trial_seed, AttackSampler};
use anyhow::{Context, Result};
use cascade_algo::{
    mean_active_flow, BranchCapacities, CapacityRule, CascadeConfig, CascadeEngine,
    RebalancePolicy,
};
use cascade_core::{BranchId, Network, SolverKind};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What changes from one sweep point to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SweepAxis {
    /// Point `k` attacks a fraction `k / points` under fixed capacities
    #[default]
    AttackFraction,
    /// Fixed attack fraction; point `k` uses `|f₀| + (k + 1)` MW capacities
    Headroom { fraction: f64 },
}

/// Settings shared by both sweep kinds.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub policy: RebalancePolicy,
    pub step_limit: Option<usize>,
    pub solver: SolverKind,
    /// Number of sweep points; point `k` attacks a fraction `k / points`
    pub points: usize,
    pub trials: usize,
    pub seed: u64,
    /// Worker threads; 0 uses every CPU
    pub threads: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            policy: RebalancePolicy::default(),
            step_limit: None,
            solver: SolverKind::default(),
            points: 20,
            trials: 200,
            seed: 0,
            threads: 0,
        }
    }
}

/// Outcome of one cascade run inside a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub point: usize,
    pub fraction: f64,
    pub trial: usize,
    pub attack_size: usize,
    /// Cascade status, or "error" when the run could not start
    pub status: String,
    pub system_size: Option<f64>,
    pub power_loss: Option<f64>,
    pub failed_branches: usize,
    pub steps: usize,
    pub error: Option<String>,
}

impl TrialRecord {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Averages over the successful trials of one sweep point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepPoint {
    pub fraction: f64,
    /// Capacity margin over `|f₀|`, set on headroom sweeps
    pub margin_mw: Option<f64>,
    pub attack_size: usize,
    pub trials: usize,
    pub failed_trials: usize,
    pub mean_system_size: Option<f64>,
    pub mean_power_loss: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SweepReport {
    pub points: Vec<SweepPoint>,
    pub records: Vec<TrialRecord>,
}

impl SweepReport {
    pub fn success_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.records.len() - self.success_count()
    }
}

/// Run one cascade and turn its outcome into a record.
///
/// Divergence and invalid input become a failed record instead of an error,
/// so one bad trial never stops a batch.
pub fn run_trial(
    engine: &CascadeEngine,
    network: &Network,
    capacities: &BranchCapacities,
    attack: &[BranchId],
    point: usize,
    fraction: f64,
    trial: usize,
) -> TrialRecord {
    let mut record = TrialRecord {
        point,
        fraction,
        trial,
        attack_size: attack.len(),
        status: "error".to_string(),
        system_size: None,
        power_loss: None,
        failed_branches: 0,
        steps: 0,
        error: None,
    };
    match engine.run(network, capacities, attack) {
        Ok(result) => {
            record.status = result.status.to_string();
            record.failed_branches = result.failed_branch_ids.len();
            record.steps = result.steps;
            match &result.divergence {
                Some(divergence) => {
                    warn!(point, trial, %divergence, "trial aborted");
                    record.error = Some(divergence.to_string());
                }
                None => {
                    record.system_size = Some(result.system_size);
                    record.power_loss = Some(result.power_loss);
                }
            }
        }
        Err(err) => {
            warn!(point, trial, error = %err, "trial failed");
            record.error = Some(err.to_string());
        }
    }
    record
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// One sweep point before any trial has run.
struct PointPlan {
    fraction: f64,
    margin_mw: Option<f64>,
    capacities: BranchCapacities,
}

/// Sweep the attack fraction over `0, 1/points, ..., (points-1)/points`.
///
/// Trials of every point run on one rayon pool. Each trial works on its own
/// copy of `network`.
pub fn run_sweep(
    network: &Network,
    capacities: &BranchCapacities,
    config: &SweepConfig,
) -> Result<SweepReport> {
    let plans = (0..config.points)
        .map(|point| PointPlan {
            fraction: point as f64 / config.points as f64,
            margin_mw: None,
            capacities: capacities.clone(),
        })
        .collect();
    run_plans(network, plans, config)
}

/// Margins of a headroom sweep over `baseline`: `1, 2, ..., 2 · (⌊mean|f₀|⌋ + 1)` MW.
pub fn headroom_margins(baseline: &Network) -> Vec<f64> {
    let steps = (mean_active_flow(baseline).value().floor() as usize + 1) * 2;
    (1..=steps).map(|margin| margin as f64).collect()
}

/// Attack a fixed `fraction` of branches while the capacity margin grows
/// along [`headroom_margins`]. `config.points` is not used.
///
/// `baseline` must carry the solved flows of `network`.
pub fn run_headroom_sweep(
    network: &Network,
    baseline: &Network,
    fraction: f64,
    config: &SweepConfig,
) -> Result<SweepReport> {
    anyhow::ensure!(
        (0.0..=1.0).contains(&fraction),
        "headroom sweep fraction {fraction} is outside [0, 1]"
    );
    let plans = headroom_margins(baseline)
        .into_iter()
        .map(|margin_mw| PointPlan {
            fraction,
            margin_mw: Some(margin_mw),
            capacities: CapacityRule::Headroom { margin_mw }.apply(baseline),
        })
        .collect();
    run_plans(network, plans, config)
}

fn run_plans(
    network: &Network,
    plans: Vec<PointPlan>,
    config: &SweepConfig,
) -> Result<SweepReport> {
    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for cascade trials")?;

    // trials are already spread over the pool
    let engine = CascadeEngine::new(
        CascadeConfig::default()
            .with_policy(config.policy)
            .with_step_limit(config.step_limit)
            .with_solver(config.solver)
            .with_parallel(false),
    );
    let sampler = AttackSampler::new(network);
    let branch_count = sampler.candidate_count();

    let jobs: Vec<(usize, usize)> = (0..plans.len())
        .flat_map(|point| (0..config.trials).map(move |trial| (point, trial)))
        .collect();
    info!(
        points = plans.len(),
        trials = config.trials,
        threads = thread_count,
        branches = branch_count,
        "starting sweep"
    );

    let records: Vec<TrialRecord> = pool.install(|| {
        jobs.par_iter()
            .map(|&(point, trial)| {
                let plan = &plans[point];
                let size = attack_size(plan.fraction, branch_count);
                let attack = sampler.sample(trial_seed(config.seed, point, trial), size);
                run_trial(
                    &engine,
                    network,
                    &plan.capacities,
                    &attack,
                    point,
                    plan.fraction,
                    trial,
                )
            })
            .collect()
    });

    let points = plans
        .iter()
        .enumerate()
        .map(|(point, plan)| {
            let at_point: Vec<&TrialRecord> =
                records.iter().filter(|r| r.point == point).collect();
            let ok = || at_point.iter().filter(|r| r.is_success());
            let summary = SweepPoint {
                fraction: plan.fraction,
                margin_mw: plan.margin_mw,
                attack_size: attack_size(plan.fraction, branch_count),
                trials: at_point.len(),
                failed_trials: at_point.len() - ok().count(),
                mean_system_size: mean(ok().filter_map(|r| r.system_size)),
                mean_power_loss: mean(ok().filter_map(|r| r.power_loss)),
            };
            info!(
                fraction = plan.fraction,
                margin_mw = ?plan.margin_mw,
                mean_system_size = ?summary.mean_system_size,
                failed = summary.failed_trials,
                "sweep point done"
            );
            summary
        })
        .collect();

    Ok(SweepReport { points, records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::{Branch, Bus, BusId, Gen, GenId, Megawatts};

    fn ring(buses: usize) -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::slack(BusId::new(1)));
        for id in 2..=buses {
            network.add_bus(Bus::new(BusId::new(id)).with_load(10.0));
        }
        network.add_gen(Gen::new(
            GenId::new(1),
            BusId::new(1),
            10.0 * (buses - 1) as f64,
        ));
        for id in 1..=buses {
            let to = id % buses + 1;
            network
                .add_branch(Branch::new(BranchId::new(id), BusId::new(id), BusId::new(to), 0.1))
                .unwrap();
        }
        network
    }

    #[test]
    fn test_sweep_shape_and_first_point() {
        let network = ring(6);
        let engine = CascadeEngine::new(CascadeConfig::default());
        let baseline = engine.baseline(&network).unwrap();
        let capacities = CapacityRule::MeanFlowHeadroom { factor: 1.0 }.apply(&baseline);

        let config = SweepConfig {
            points: 4,
            trials: 3,
            seed: 11,
            threads: 2,
            ..SweepConfig::default()
        };
        let report = run_sweep(&network, &capacities, &config).unwrap();
        assert_eq!(report.records.len(), 12);
        assert_eq!(report.points.len(), 4);
        assert_eq!(report.failure_count(), 0);

        let first = &report.points[0];
        assert_eq!(first.fraction, 0.0);
        assert_eq!(first.margin_mw, None);
        assert_eq!(first.attack_size, 0);
        assert_eq!(first.mean_system_size, Some(1.0));
        assert_eq!(first.mean_power_loss, Some(0.0));

        for point in &report.points {
            let size = point.mean_system_size.unwrap();
            assert!((0.0..=1.0).contains(&size));
        }
    }

    #[test]
    fn test_headroom_margins_follow_mean_flow() {
        let mut baseline = ring(3);
        for (branch, flow) in baseline.branches_mut().zip([4.0, -3.5, 0.0]) {
            branch.flow = Megawatts(flow);
        }
        // mean |f| = 2.5, so 2 · (2 + 1) margins
        assert_eq!(
            headroom_margins(&baseline),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(headroom_margins(&Network::new()), vec![1.0, 2.0]);
    }

    #[test]
    fn test_headroom_sweep_fixes_attack_and_grows_margin() {
        let network = ring(6);
        let engine = CascadeEngine::new(CascadeConfig::default());
        let baseline = engine.baseline(&network).unwrap();
        let config = SweepConfig {
            trials: 2,
            seed: 5,
            threads: 2,
            ..SweepConfig::default()
        };
        let report = run_headroom_sweep(&network, &baseline, 0.2, &config).unwrap();

        let margins = headroom_margins(&baseline);
        assert_eq!(report.points.len(), margins.len());
        assert_eq!(report.records.len(), margins.len() * 2);
        for (point, margin) in report.points.iter().zip(&margins) {
            assert_eq!(point.margin_mw, Some(*margin));
            assert_eq!(point.fraction, 0.2);
            assert_eq!(point.attack_size, 1);
        }
    }

    #[test]
    fn test_headroom_sweep_rejects_bad_fraction() {
        let network = ring(3);
        let engine = CascadeEngine::new(CascadeConfig::default());
        let baseline = engine.baseline(&network).unwrap();
        let err = run_headroom_sweep(&network, &baseline, 1.5, &SweepConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_sweep_is_reproducible() {
        let network = ring(5);
        let capacities = CapacityRule::Uniform { limit_mw: 1000.0 }.apply(&network);
        let config = SweepConfig {
            points: 3,
            trials: 4,
            seed: 3,
            threads: 3,
            ..SweepConfig::default()
        };
        let a = run_sweep(&network, &capacities, &config).unwrap();
        let b = run_sweep(&network, &capacities, &config).unwrap();
        let sizes = |r: &SweepReport| -> Vec<Option<f64>> {
            r.records.iter().map(|t| t.system_size).collect()
        };
        assert_eq!(sizes(&a), sizes(&b));
    }

    #[test]
    fn test_run_trial_records_invalid_input() {
        let network = ring(3);
        let engine = CascadeEngine::new(CascadeConfig::default());
        let record = run_trial(
            &engine,
            &network,
            &BranchCapacities::new(),
            &[],
            0,
            0.0,
            0,
        );
        assert_eq!(record.status, "error");
        assert!(!record.is_success());
        assert!(record.error.unwrap().contains("no capacity"));
    }
}
