//! The overload cascade: engine, branch capacities, and run metrics.

pub mod capacity;
pub mod engine;
pub mod metrics;
pub mod result;
