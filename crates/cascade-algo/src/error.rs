use cascade_core::{BranchId, BusId, GridError};
use serde::Serialize;
use thiserror::Error;

fn join_ids<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A power-flow solve failed to converge on one island.
///
/// Aborts the cascade run that hit it; drivers record it per trial.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("power flow diverged at step {step} on an island of {} buses ({}): {reason}", .buses.len(), .buses.first().map(|b| b.to_string()).unwrap_or_default())]
pub struct SolverDivergence {
    /// Cascade step at which the solve ran; 0 is the baseline
    pub step: usize,
    /// Buses of the island that diverged
    pub buses: Vec<BusId>,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum CascadeError {
    /// The attack set names branches the network does not have.
    /// Raised before the network is touched.
    #[error("attack set references unknown branches: {}", join_ids(.0))]
    InvalidAttackSet(Vec<BranchId>),

    #[error("no capacity given for active branch {0}")]
    MissingCapacity(BranchId),

    #[error(transparent)]
    SolverDivergence(#[from] SolverDivergence),

    #[error(transparent)]
    Grid(#[from] GridError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_attack_set_lists_ids() {
        let err = CascadeError::InvalidAttackSet(vec![BranchId::new(7), BranchId::new(9)]);
        assert_eq!(
            err.to_string(),
            "attack set references unknown branches: Branch 7, Branch 9"
        );
    }

    #[test]
    fn test_divergence_message() {
        let err = SolverDivergence {
            step: 2,
            buses: vec![BusId::new(4), BusId::new(5)],
            reason: "singular matrix".into(),
        };
        assert_eq!(
            err.to_string(),
            "power flow diverged at step 2 on an island of 2 buses (Bus 4): singular matrix"
        );
        let wrapped: CascadeError = err.into();
        assert!(matches!(wrapped, CascadeError::SolverDivergence(_)));
    }
}
