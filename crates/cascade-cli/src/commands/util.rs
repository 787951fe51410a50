use anyhow::{Context, Result};
use cascade_core::io::load_network_with_diagnostics;
use cascade_core::Network;
use rayon::ThreadPoolBuilder;
use std::path::Path;
use tracing::warn;

/// Size the global rayon pool from "auto" or a thread count.
pub fn configure_threads(threads: &str) -> usize {
    let count = if threads.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        threads.parse().unwrap_or_else(|_| num_cpus::get())
    };
    // fails only if the pool was already built
    let _ = ThreadPoolBuilder::new().num_threads(count).build_global();
    count
}

/// Load and validate a grid file, logging its validation warnings.
pub fn load_grid(path: &Path) -> Result<Network> {
    let (network, diag) = load_network_with_diagnostics(path)
        .with_context(|| format!("loading grid '{}'", path.display()))?;
    for issue in diag.warnings() {
        warn!(grid = %path.display(), "{issue}");
    }
    Ok(network)
}

pub fn join_ids<T: ToString>(ids: impl IntoIterator<Item = T>) -> String {
    let joined: Vec<String> = ids.into_iter().map(|id| id.to_string()).collect();
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_ids_formats_lists() {
        assert_eq!(join_ids([3, 1, 2]), "3, 1, 2");
        assert_eq!(join_ids(Vec::<usize>::new()), "-");
    }
}
