//! Random attack sets.
//!
//! Every trial draws from its own `StdRng`, seeded from the experiment seed
//! and the trial's coordinates, so results do not depend on how the thread
//! pool schedules trials.

use cascade_core::{BranchId, Network};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Number of branches attacked at fraction `p`: `round(p · n)`, clamped to `n`.
pub fn attack_size(fraction: f64, branch_count: usize) -> usize {
    let size = (fraction.clamp(0.0, 1.0) * branch_count as f64).round() as usize;
    size.min(branch_count)
}

/// Seed for trial `trial` of sweep point `point`.
pub fn trial_seed(seed: u64, point: usize, trial: usize) -> u64 {
    seed.wrapping_add(((point as u64) << 32) | trial as u64)
}

/// Draws attack sets from the active branches of a network.
#[derive(Debug, Clone)]
pub struct AttackSampler {
    candidates: Vec<BranchId>,
}

impl AttackSampler {
    pub fn new(network: &Network) -> Self {
        let mut candidates: Vec<BranchId> = network
            .branches()
            .iter()
            .filter(|b| b.is_active())
            .map(|b| b.id)
            .collect();
        candidates.sort_unstable();
        Self { candidates }
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// `size` distinct branches, sorted by ID.
    pub fn sample(&self, seed: u64, size: usize) -> Vec<BranchId> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut attack: Vec<BranchId> = self
            .candidates
            .choose_multiple(&mut rng, size)
            .copied()
            .collect();
        attack.sort_unstable();
        attack
    }
}
