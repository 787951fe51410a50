use std::io::{self, Write};

use anyhow::Result;
use cascade_batch::{load_experiment, run_experiment, SweepAxis};
use cascade_cli::cli::SweepArgs;
use tabwriter::TabWriter;
use tracing::info;

fn fmt_mean(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

pub fn handle(args: &SweepArgs) -> Result<()> {
    let mut config = load_experiment(&args.config)?;
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(trials) = args.trials {
        config.trials = trials;
    }
    if let Some(out) = &args.out {
        config.output = out.clone();
    }
    match config.sweep {
        SweepAxis::AttackFraction => info!(
            "Running sweep '{}' on {}: {} points x {} trials",
            config.display_name(),
            config.grid.display(),
            config.points,
            config.trials
        ),
        SweepAxis::Headroom { fraction } => info!(
            "Running headroom sweep '{}' on {} at fraction {}: {} trials per margin",
            config.display_name(),
            config.grid.display(),
            fraction,
            config.trials
        ),
    }

    let summary = run_experiment(&config)?;

    let mut tw = TabWriter::new(io::stdout());
    writeln!(
        tw,
        "fraction\tmargin (MW)\tattack\ttrials\tfailed\tmean system size\tmean power loss"
    )?;
    for point in &summary.points {
        writeln!(
            tw,
            "{:.2}\t{}\t{}\t{}\t{}\t{}\t{}",
            point.fraction,
            point.margin_mw.map_or_else(|| "-".to_string(), |m| format!("{m:.0}")),
            point.attack_size,
            point.trials,
            point.failed_trials,
            fmt_mean(point.mean_system_size),
            fmt_mean(point.mean_power_loss)
        )?;
    }
    tw.flush()?;
    println!(
        "{} trials succeeded, {} failed; wrote {}, {} and {}",
        summary.success,
        summary.failure,
        summary.sweep_csv.display(),
        summary.trials_csv.display(),
        summary.manifest_path.display()
    );
    Ok(())
}
