//! Music Fetcher command-line entry point.
//!
//! Source modules are registered by the binary that links this crate. The
//! stock binary starts with an empty registry.

use clap::Parser;
use music_fetcher::cli;
use music_fetcher::module::ModuleRegistry;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("music_fetcher=info".parse()?))
        .init();

    let registry = ModuleRegistry::default();
    if registry.is_empty() {
        tracing::warn!("No source modules registered");
    } else {
        tracing::debug!(modules = ?registry.names().collect::<Vec<_>>(), "Source modules");
    }

    cli::run_command(&args, &registry)
}
