use crate::error::{CascadeError, SolverDivergence};
use cascade_core::{BranchId, BusId, Island, Network};
use serde::Serialize;

/// How a cascade run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CascadeStatus {
    /// No branch overloaded after the last step.
    Converged,
    /// Stopped by the step limit with overloads still pending.
    StepLimitReached,
    /// A per-island solve diverged.
    #[serde(rename = "aborted-solver-failure")]
    Aborted,
}

impl CascadeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeStatus::Converged => "converged",
            CascadeStatus::StepLimitReached => "step-limit-reached",
            CascadeStatus::Aborted => "aborted-solver-failure",
        }
    }
}

impl std::fmt::Display for CascadeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a cascade run produces.
///
/// Serializes without the terminal network; write that separately with
/// `cascade_core::io::write_network`.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeResult {
    #[serde(skip)]
    pub network: Network,
    pub status: CascadeStatus,
    /// Branch IDs newly failed at each step, the attack set first
    pub failure_history: Vec<Vec<BranchId>>,
    /// Every branch failed during the run, sorted
    pub failed_branch_ids: Vec<BranchId>,
    pub system_size: f64,
    pub power_loss: f64,
    pub isolated_components: Vec<Island>,
    pub isolated_buses: Vec<BusId>,
    /// Steps executed (waves applied)
    pub steps: usize,
    /// Overloaded branches left unfailed when the step limit stopped the run
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pending_overloads: Vec<BranchId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divergence: Option<SolverDivergence>,
}

impl CascadeResult {
    pub fn is_converged(&self) -> bool {
        self.status == CascadeStatus::Converged
    }

    /// Turn an aborted run into `Err(CascadeError::SolverDivergence)`.
    pub fn into_result(self) -> Result<CascadeResult, CascadeError> {
        match self.divergence {
            Some(divergence) => Err(CascadeError::SolverDivergence(divergence)),
            None => Ok(self),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} after {} steps: {} branches failed, system size {:.4}, power loss {:.4}, {} isolated components",
            self.status,
            self.steps,
            self.failed_branch_ids.len(),
            self.system_size,
            self.power_loss,
            self.isolated_components.len()
        )
    }
}
