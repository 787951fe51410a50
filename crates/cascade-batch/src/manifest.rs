use anyhow::{Context, Result};
use cascade_algo::{CapacityRule, RebalancePolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::sweep::{SweepAxis, SweepPoint};

/// Written next to the sweep CSV so a result can be traced back to its inputs.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExperimentManifest {
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub grid: String,
    #[serde(default)]
    pub sweep: SweepAxis,
    pub capacity: CapacityRule,
    pub policy: RebalancePolicy,
    pub step_limit: Option<usize>,
    pub seed: u64,
    pub trials_per_point: usize,
    pub num_trials: usize,
    pub success: usize,
    pub failure: usize,
    pub sweep_csv: String,
    pub trials_csv: String,
    pub points: Vec<SweepPoint>,
}

pub fn write_experiment_manifest(path: &Path, manifest: &ExperimentManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(manifest)
        .context("serializing experiment manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing experiment manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_experiment_manifest(path: &Path) -> Result<ExperimentManifest> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening experiment manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing experiment manifest '{}'", path.display()))
}
