//! Monte-Carlo experiments over cascading failures.
//!
//! An experiment loads one grid, derives branch capacities from a baseline
//! solve, then sweeps either the attack fraction `p = k / points` or the
//! capacity margin at a fixed fraction, running many random attacks at each
//! point on a rayon pool. Results land in a CSV file plus a JSON manifest.

pub mod attack;
pub mod config;
pub mod manifest;
pub mod runner;
pub mod sweep;

pub use attack::{attack_size, trial_seed, AttackSampler};
pub use config::{load_experiment, ExperimentConfig};
pub use manifest::{load_experiment_manifest, write_experiment_manifest, ExperimentManifest};
pub use runner::{run_experiment, ExperimentSummary};
pub use sweep::{
    headroom_margins, run_headroom_sweep, run_sweep, run_trial, SweepAxis, SweepConfig,
    SweepPoint, SweepReport, TrialRecord,
};
