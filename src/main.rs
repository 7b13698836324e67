//! confound-continuum - Main Entry Point

use clap::Parser;
use confound_continuum::cli::{cmd_heuristic, cmd_predict, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confound_continuum=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict(args) => {
            cmd_predict(&args)?;
        }
        Commands::Heuristic(args) => {
            cmd_heuristic(&args)?;
        }
    }

    Ok(())
}
