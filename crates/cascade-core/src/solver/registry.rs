use super::backend::{FaerSolver, GaussSolver, LinearSystemBackend};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Simple registry of available linear backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Gauss,
    Faer,
}

impl FromStr for SolverKind {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.to_ascii_lowercase().as_str() {
            "gauss" | "default" => Ok(SolverKind::Gauss),
            "faer" => Ok(SolverKind::Faer),
            other => Err(anyhow!(
                "unknown solver '{}'; supported values: {}",
                other,
                SolverKind::available().join(", ")
            )),
        }
    }
}

impl SolverKind {
    pub fn build_solver(self) -> Arc<dyn LinearSystemBackend> {
        match self {
            SolverKind::Gauss => Arc::new(GaussSolver),
            SolverKind::Faer => Arc::new(FaerSolver),
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["gauss", "faer"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Gauss => "gauss",
            SolverKind::Faer => "faer",
        }
    }
}

impl std::fmt::Display for SolverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
