use cascade_cli::cli::{Cli, Commands};
use clap::Parser;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Commands::Run(args) => commands::run::handle(args),
        Commands::Islands {
            grid_file,
            emit,
            dot,
        } => commands::islands::handle(grid_file, *emit, dot.as_deref()),
        Commands::Validate { grid_file } => commands::validate::handle(grid_file),
        Commands::Sweep(args) => commands::sweep::handle(args),
    };

    if let Err(e) = result {
        error!("{} failed: {:?}", cli.command.name(), e);
        std::process::exit(1);
    }
}
