//! DocAlign - code-to-documentation alignment and gap detection engine
//!
//! Computes entity-to-doc mappings, detects documentation gaps and
//! produces a priority-ranked, reproducible gap list per project.

use anyhow::Result;
use docalign::cli::{config, gaps, mappings, resolve, run, Cli, Commands};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let db_path = Path::new(&cli.db);
    let config_path = Path::new(&cli.config);

    // Execute command
    match cli.command {
        Commands::Run(args) => {
            run(db_path, config_path, &args, cli.format).await?;
        }

        Commands::Gaps(args) => {
            gaps(db_path, &args, cli.format)?;
        }

        Commands::Mappings(args) => {
            mappings(db_path, &args, cli.format)?;
        }

        Commands::Resolve(args) => {
            resolve(db_path, &args)?;
        }

        Commands::Config(args) => {
            config(config_path, args.reset)?;
        }
    }

    Ok(())
}
