use crate::config::ExperimentConfig;
use crate::manifest::{write_experiment_manifest, ExperimentManifest};
use crate::sweep::{run_headroom_sweep, run_sweep, SweepAxis, SweepPoint, SweepReport};
use anyhow::{anyhow, Context, Result};
use cascade_algo::{equalize_generation, CascadeConfig, CascadeEngine};
use cascade_core::io::load_network;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Returned after the run so callers can report counts and output locations.
pub struct ExperimentSummary {
    pub success: usize,
    pub failure: usize,
    pub sweep_csv: PathBuf,
    pub trials_csv: PathBuf,
    pub manifest_path: PathBuf,
    pub points: Vec<SweepPoint>,
}

/// Load the grid, derive capacities from a baseline solve, sweep along
/// `config.sweep`, and write the sweep CSV, per-trial CSV and manifest.
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentSummary> {
    let mut network = load_network(&config.grid)
        .with_context(|| format!("loading grid '{}'", config.grid.display()))?;
    if config.equalize_generation {
        let share = equalize_generation(&mut network)
            .ok_or_else(|| anyhow!("cannot equalize generation: grid has no in-service generator"))?;
        info!(%share, "equalized generation");
    }

    let engine = CascadeEngine::new(
        CascadeConfig::default()
            .with_policy(config.policy)
            .with_solver(config.solver),
    );
    let baseline = engine
        .baseline(&network)
        .context("solving baseline power flow")?;
    let sweep_config = config.sweep_config();
    let report = match config.sweep {
        SweepAxis::AttackFraction => {
            let capacities = config.capacity.apply(&baseline);
            run_sweep(&network, &capacities, &sweep_config)?
        }
        SweepAxis::Headroom { fraction } => {
            run_headroom_sweep(&network, &baseline, fraction, &sweep_config)?
        }
    };

    let sweep_csv = config.output.clone();
    let trials_csv = sibling(&sweep_csv, "_trials.csv");
    let manifest_path = sibling(&sweep_csv, "_manifest.json");
    write_csv(&sweep_csv, &report.points)?;
    write_csv(&trials_csv, &report.records)?;

    let manifest = manifest_for(config, &report, &sweep_csv, &trials_csv);
    write_experiment_manifest(&manifest_path, &manifest)?;
    info!(
        success = manifest.success,
        failure = manifest.failure,
        output = %sweep_csv.display(),
        "experiment finished"
    );

    Ok(ExperimentSummary {
        success: manifest.success,
        failure: manifest.failure,
        sweep_csv,
        trials_csv,
        manifest_path,
        points: report.points,
    })
}

fn manifest_for(
    config: &ExperimentConfig,
    report: &SweepReport,
    sweep_csv: &Path,
    trials_csv: &Path,
) -> ExperimentManifest {
    ExperimentManifest {
        created_at: Utc::now(),
        name: config.display_name(),
        grid: config.grid.display().to_string(),
        sweep: config.sweep,
        capacity: config.capacity.clone(),
        policy: config.policy,
        step_limit: config.step_limit,
        seed: config.seed,
        trials_per_point: config.trials,
        num_trials: report.records.len(),
        success: report.success_count(),
        failure: report.failure_count(),
        sweep_csv: sweep_csv.display().to_string(),
        trials_csv: trials_csv.display().to_string(),
        points: report.points.clone(),
    }
}

/// `out/sweep.csv` + `_trials.csv` -> `out/sweep_trials.csv`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sweep".to_string());
    path.with_file_name(format!("{stem}{suffix}"))
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("opening '{}'", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing row to '{}'", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_paths() {
        assert_eq!(
            sibling(Path::new("out/sweep.csv"), "_trials.csv"),
            PathBuf::from("out/sweep_trials.csv")
        );
        assert_eq!(
            sibling(Path::new("result"), "_manifest.json"),
            PathBuf::from("result_manifest.json")
        );
    }
}
