//! # cascade-algo: Cascading Line-Failure Simulation
//!
//! Runs the overload cascade on a [`cascade_core::Network`]: fail an initial
//! attack set, split the grid into islands, rebalance each island, solve DC
//! power flow per island, merge, and fail every branch pushed over its
//! capacity. Repeat until no new branch overloads or a step limit is hit.
//!
//! ## Components
//!
//! | Item | Role |
//! |------|------|
//! | [`rebalance()`] | Makes an island's generation and load agree ([`RebalancePolicy`]) |
//! | [`DcPowerFlow`] | Per-island linear solve behind the [`PowerFlowSolver`] trait |
//! | [`CascadeEngine`] | The step loop, driven by a [`CascadeConfig`] |
//! | [`CapacityRule`] | Branch limits derived from a baseline solve |
//! | [`metrics`] | System size, power loss, isolated components |
//!
//! ## Example
//!
//! ```ignore
//! use cascade_algo::{CapacityRule, CascadeConfig, CascadeEngine, RebalancePolicy};
//! use cascade_core::{io::load_network, BranchId};
//!
//! let network = load_network("grid.json".as_ref())?;
//! let engine = CascadeEngine::new(
//!     CascadeConfig::default().with_policy(RebalancePolicy::GenerationOnly),
//! );
//!
//! let baseline = engine.baseline(&network)?;
//! let capacities = CapacityRule::Proportional { alpha: 0.2 }.apply(&baseline);
//!
//! let result = engine.run(&network, &capacities, &[BranchId::new(3)])?;
//! println!("{}: system size {:.3}", result.status, result.system_size);
//! ```

pub mod cascade;
pub mod error;
pub mod power_flow;
pub mod rebalance;

pub use cascade::capacity::{mean_active_flow, BranchCapacities, CapacityRule};
pub use cascade::engine::{CascadeConfig, CascadeEngine, CascadePhase};
pub use cascade::metrics;
pub use cascade::result::{CascadeResult, CascadeStatus};
pub use error::{CascadeError, SolverDivergence};
pub use power_flow::{DcPowerFlow, PowerFlowSolver, SolvedIsland};
pub use rebalance::{equalize_generation, is_close, rebalance, RebalanceAction, RebalancePolicy};
