use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cascade", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single cascade from an initial set of failed branches
    Run(RunArgs),
    /// Print the islands of a grid file
    Islands {
        /// Path to the grid file (JSON or YAML)
        #[arg(value_hint = ValueHint::FilePath)]
        grid_file: PathBuf,
        /// List the buses of every island
        #[arg(long)]
        emit: bool,
        /// Also write the topology as a Graphviz DOT file
        #[arg(long, value_hint = ValueHint::FilePath)]
        dot: Option<PathBuf>,
    },
    /// Validate a grid file and print its statistics
    Validate {
        /// Path to the grid file (JSON or YAML)
        #[arg(value_hint = ValueHint::FilePath)]
        grid_file: PathBuf,
    },
    /// Run an attack-fraction sweep described by an experiment file
    Sweep(SweepArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Run(_) => "run",
            Commands::Islands { .. } => "islands",
            Commands::Validate { .. } => "validate",
            Commands::Sweep(_) => "sweep",
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the grid file (JSON or YAML)
    #[arg(value_hint = ValueHint::FilePath)]
    pub grid_file: PathBuf,
    /// Branch IDs failed at the first step (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub attack: Vec<usize>,
    /// Capacity rule applied to the baseline flows:
    /// mean-flow[:factor], proportional:<alpha>, headroom:<mw> or uniform:<mw>
    #[arg(long, default_value = "mean-flow:1.0")]
    pub capacity: String,
    /// Per-branch capacities (map of branch ID to MW, JSON or YAML); replaces --capacity
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub capacities: Option<PathBuf>,
    /// Rebalance policy (symmetric, generation-only)
    #[arg(long, default_value = "symmetric")]
    pub policy: String,
    /// Stop after this many failure waves
    #[arg(long)]
    pub step_limit: Option<usize>,
    /// Linear solver backend (gauss, faer)
    #[arg(long, default_value = "gauss")]
    pub solver: String,
    /// Spread total load evenly over the generators first
    #[arg(long)]
    pub equalize: bool,
    /// Solve islands one after another instead of in parallel
    #[arg(long)]
    pub sequential: bool,
    /// Threads for island dispatch ("auto" or a number)
    #[arg(long, default_value = "auto")]
    pub threads: String,
    /// Write the cascade result as JSON
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
    /// Write the terminal network (JSON, or YAML by extension)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub network_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Path to the experiment file (YAML or JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
    /// Override the worker thread count
    #[arg(long)]
    pub threads: Option<usize>,
    /// Override the random seed
    #[arg(long)]
    pub seed: Option<u64>,
    /// Override the number of trials per point
    #[arg(long)]
    pub trials: Option<usize>,
    /// Override the sweep CSV path
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
}
