//! Dense linear-system backends used by the DC power-flow solve.

mod backend;
mod registry;

pub use backend::{FaerSolver, GaussSolver, LinearSystemBackend};
pub use registry::SolverKind;
