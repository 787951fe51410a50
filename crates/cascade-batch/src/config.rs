//! Experiment files.
//!
//! ```yaml
//! name: ieee30-headroom
//! grid: grids/case30.yaml      # relative to this file
//! capacity: { rule: mean_flow_headroom, factor: 1.0 }
//! policy: generation-only
//! points: 20
//! trials: 200
//! seed: 42
//! equalize_generation: true
//! output: results/case30.csv
//! ```
//!
//! `sweep: { kind: headroom, fraction: 0.1 }` holds the attack fraction fixed
//! and sweeps the capacity margin instead; `capacity` and `points` are then
//! unused.

use crate::sweep::{SweepAxis, SweepConfig};
use anyhow::{Context, Result};
use cascade_algo::{CapacityRule, RebalancePolicy};
use cascade_core::SolverKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_points() -> usize {
    20
}

fn default_trials() -> usize {
    200
}

fn default_output() -> PathBuf {
    PathBuf::from("sweep.csv")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub grid: PathBuf,
    #[serde(default)]
    pub capacity: CapacityRule,
    #[serde(default)]
    pub sweep: SweepAxis,
    #[serde(default)]
    pub policy: RebalancePolicy,
    #[serde(default)]
    pub step_limit: Option<usize>,
    #[serde(default)]
    pub solver: SolverKind,
    #[serde(default = "default_points")]
    pub points: usize,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default)]
    pub seed: u64,
    /// Worker threads; 0 uses every CPU
    #[serde(default)]
    pub threads: usize,
    /// Spread total load evenly over the generators before the baseline
    #[serde(default)]
    pub equalize_generation: bool,
    /// Sweep CSV; the trial CSV and manifest are written next to it
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl ExperimentConfig {
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            policy: self.policy,
            step_limit: self.step_limit,
            solver: self.solver,
            points: self.points,
            trials: self.trials,
            seed: self.seed,
            threads: self.threads,
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.grid
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "experiment".to_string())
        })
    }

    /// Resolve relative `grid` and `output` paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.grid.is_relative() {
            self.grid = base.join(&self.grid);
        }
        if self.output.is_relative() {
            self.output = base.join(&self.output);
        }
    }
}

/// Load an experiment file (YAML or JSON by extension, falling back to
/// trying both). Relative paths inside it are taken from the file's directory.
pub fn load_experiment(path: &Path) -> Result<ExperimentConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading experiment config '{}'", path.display()))?;
    let mut config: ExperimentConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing experiment config yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing experiment config json")?
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing experiment config")?,
    };
    match config.sweep {
        SweepAxis::AttackFraction => {
            anyhow::ensure!(config.points > 0, "experiment needs at least one sweep point");
        }
        SweepAxis::Headroom { fraction } => {
            anyhow::ensure!(
                (0.0..=1.0).contains(&fraction),
                "headroom sweep fraction {fraction} is outside [0, 1]"
            );
        }
    }
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_yaml_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exp.yaml");
        fs::write(&path, "grid: case.json\npolicy: generation-only\n").unwrap();

        let config = load_experiment(&path).unwrap();
        assert_eq!(config.grid, dir.path().join("case.json"));
        assert_eq!(config.output, dir.path().join("sweep.csv"));
        assert_eq!(config.policy, RebalancePolicy::GenerationOnly);
        assert_eq!(config.capacity, CapacityRule::MeanFlowHeadroom { factor: 1.0 });
        assert_eq!(config.sweep, SweepAxis::AttackFraction);
        assert_eq!(config.points, 20);
        assert_eq!(config.trials, 200);
        assert_eq!(config.display_name(), "case");
    }

    #[test]
    fn loads_json_without_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exp.cfg");
        fs::write(
            &path,
            r#"{"name": "x", "grid": "/abs/grid.yaml", "capacity": {"rule": "uniform", "limit_mw": 5.0}, "trials": 3}"#,
        )
        .unwrap();
        let config = load_experiment(&path).unwrap();
        assert_eq!(config.grid, PathBuf::from("/abs/grid.yaml"));
        assert_eq!(config.capacity, CapacityRule::Uniform { limit_mw: 5.0 });
        assert_eq!(config.sweep_config().trials, 3);
        assert_eq!(config.display_name(), "x");
    }

    #[test]
    fn loads_headroom_sweep() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exp.yaml");
        fs::write(&path, "grid: g.json\nsweep: { kind: headroom, fraction: 0.25 }\n").unwrap();
        let config = load_experiment(&path).unwrap();
        assert_eq!(config.sweep, SweepAxis::Headroom { fraction: 0.25 });

        fs::write(&path, "grid: g.json\nsweep: { kind: headroom, fraction: 2.0 }\n").unwrap();
        assert!(load_experiment(&path).is_err());
    }

    #[test]
    fn rejects_zero_points() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exp.yml");
        fs::write(&path, "grid: g.json\npoints: 0\n").unwrap();
        assert!(load_experiment(&path).is_err());
    }
}
