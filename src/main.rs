//! aconvert CLI
//!
//! Command-line front end for the audio conversion stage.

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use aconvert::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    debug!("aconvert v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Convert(args) => commands::convert(&args)
            .with_context(|| format!("failed to convert {}", args.input.display())),
        Commands::Plan { from, to } => commands::plan(&from, &to).context("failed to build conversion plan"),
    }
}
