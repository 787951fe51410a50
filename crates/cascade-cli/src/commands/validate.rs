use std::path::Path;

use anyhow::{Context, Result};
use cascade_core::io::load_network_with_diagnostics;

pub fn handle(grid_file: &Path) -> Result<()> {
    let (network, diag) = load_network_with_diagnostics(grid_file)
        .with_context(|| format!("validating grid '{}'", grid_file.display()))?;
    println!("{}: {}", grid_file.display(), network.stats());
    print!("{diag}");
    Ok(())
}
