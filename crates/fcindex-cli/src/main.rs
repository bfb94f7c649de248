//! Fcindex CLI - Command-line interface for capped-weight index construction.
//!
//! # Usage
//!
//! ```bash
//! # Build the index from a universe snapshot
//! fcindex build --universe universe.csv --as-of 2024-06-28
//!
//! # Use a custom methodology and an existing base value
//! fcindex build --universe universe.json --config index.toml --base-value 2.4e12
//!
//! # Run only the capped allocator
//! fcindex weights --values 10,20,30,40 --max-weight 0.4
//!
//! # Print the default methodology as TOML
//! fcindex config
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod error;
mod output;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let format = cli.format;

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, format)?,
        Commands::Weights(args) => commands::weights::execute(args, format)?,
        Commands::Config(args) => commands::config::execute(args, format)?,
    }

    Ok(())
}

/// Installs a stderr subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
