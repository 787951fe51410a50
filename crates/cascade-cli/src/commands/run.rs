use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use cascade_algo::{
    equalize_generation, BranchCapacities, CapacityRule, CascadeConfig, CascadeEngine,
    CascadeResult, RebalancePolicy,
};
use cascade_cli::cli::RunArgs;
use cascade_core::io::{write_network, NetworkFormat};
use cascade_core::{BranchId, SolverKind};
use tabwriter::TabWriter;
use tracing::{info, warn};

use crate::commands::util::{configure_threads, join_ids, load_grid};

pub fn handle(args: &RunArgs) -> Result<()> {
    let threads = configure_threads(&args.threads);
    let policy: RebalancePolicy = args.policy.parse()?;
    let solver: SolverKind = args.solver.parse()?;

    let mut network = load_grid(&args.grid_file)?;
    if args.equalize {
        let share = equalize_generation(&mut network).ok_or_else(|| {
            anyhow!("cannot equalize generation: grid has no in-service generator")
        })?;
        info!(%share, "equalized generation");
    }

    let engine = CascadeEngine::new(
        CascadeConfig::default()
            .with_policy(policy)
            .with_step_limit(args.step_limit)
            .with_solver(solver)
            .with_parallel(!args.sequential),
    );
    let capacities = match &args.capacities {
        Some(path) => load_capacities(path)?,
        None => {
            let rule = parse_capacity_rule(&args.capacity)?;
            let baseline = engine
                .baseline(&network)
                .context("solving baseline power flow")?;
            rule.apply(&baseline)
        }
    };

    let attack: Vec<BranchId> = args.attack.iter().map(|&id| BranchId::new(id)).collect();
    info!(
        "Running cascade on {} with {} attacked branches ({} policy, {} solver, {} threads)",
        args.grid_file.display(),
        attack.len(),
        policy,
        solver,
        threads
    );
    let result = engine.run(&network, &capacities, &attack)?;

    print_summary(&args.grid_file, &result)?;
    if let Some(out) = &args.out {
        write_result(out, &result)?;
        info!("Cascade result written to {}", out.display());
    }
    if let Some(path) = &args.network_out {
        write_network(&result.network, path)
            .with_context(|| format!("writing terminal network '{}'", path.display()))?;
        info!("Terminal network written to {}", path.display());
    }

    if let Some(divergence) = result.divergence {
        warn!(steps = result.steps, "cascade aborted");
        return Err(divergence.into());
    }
    Ok(())
}

/// `mean-flow[:factor]`, `proportional:<alpha>`, `headroom:<mw>` or `uniform:<mw>`.
pub fn parse_capacity_rule(rule: &str) -> Result<CapacityRule> {
    let (name, value) = match rule.split_once(':') {
        Some((name, value)) => {
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("invalid capacity parameter in '{rule}'"))?;
            (name.trim().to_ascii_lowercase(), Some(value))
        }
        None => (rule.trim().to_ascii_lowercase(), None),
    };
    let rule = match (name.as_str(), value) {
        ("mean-flow" | "mean_flow", factor) => CapacityRule::MeanFlowHeadroom {
            factor: factor.unwrap_or(1.0),
        },
        ("proportional", Some(alpha)) => CapacityRule::Proportional { alpha },
        ("headroom", Some(margin_mw)) => CapacityRule::Headroom { margin_mw },
        ("uniform", Some(limit_mw)) => CapacityRule::Uniform { limit_mw },
        ("proportional" | "headroom" | "uniform", None) => {
            bail!("capacity rule '{name}' needs a value, e.g. '{name}:0.5'")
        }
        (other, _) => bail!(
            "unknown capacity rule '{other}' (expected mean-flow, proportional, headroom, uniform)"
        ),
    };
    Ok(rule)
}

fn load_capacities(path: &Path) -> Result<BranchCapacities> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading capacities '{}'", path.display()))?;
    let capacities = match NetworkFormat::from_path(path) {
        Some(NetworkFormat::Json) => {
            serde_json::from_str(&data).context("parsing capacities json")?
        }
        _ => serde_yaml::from_str(&data).context("parsing capacities yaml")?,
    };
    Ok(capacities)
}

fn write_result(path: &Path, result: &CascadeResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(result).context("serializing cascade result")?;
    fs::write(path, json).with_context(|| format!("writing '{}'", path.display()))?;
    Ok(())
}

fn print_summary(grid_file: &Path, result: &CascadeResult) -> Result<()> {
    let mut tw = TabWriter::new(io::stdout());
    writeln!(tw, "Cascade on {}:", grid_file.display())?;
    writeln!(tw, "  Status\t{}", result.status)?;
    writeln!(tw, "  Steps\t{}", result.steps)?;
    writeln!(
        tw,
        "  Failed branches\t{}",
        join_ids(result.failed_branch_ids.iter().map(|id| id.value()))
    )?;
    writeln!(tw, "  System size\t{:.4}", result.system_size)?;
    writeln!(tw, "  Power loss\t{:.4}", result.power_loss)?;
    writeln!(
        tw,
        "  Isolated components\t{}",
        result.isolated_components.len()
    )?;
    writeln!(
        tw,
        "  Isolated buses\t{}",
        join_ids(result.isolated_buses.iter().map(|id| id.value()))
    )?;
    if !result.pending_overloads.is_empty() {
        writeln!(
            tw,
            "  Pending overloads\t{}",
            join_ids(result.pending_overloads.iter().map(|id| id.value()))
        )?;
    }
    for (idx, wave) in result.failure_history.iter().enumerate() {
        writeln!(
            tw,
            "  Wave {}\t{}",
            idx + 1,
            join_ids(wave.iter().map(|id| id.value()))
        )?;
    }
    tw.flush()?;
    Ok(())
}
