//! sondeo CLI - run analysis pipelines over audio files.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sondeo")]
#[command(author, version, about = "Sondeo audio analysis CLI", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline over a WAV file and print handler values
    Analyze(commands::analyze::AnalyzeArgs),

    /// Print the merged boundaries of a band description
    Bands(commands::bands::BandsArgs),

    /// Validate a pipeline file and print the handler order
    Check(commands::check::CheckArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze(args) => commands::analyze::run(args),
        Commands::Bands(args) => commands::bands::run(args),
        Commands::Check(args) => commands::check::run(args),
    }
}
