//! tidy - lint, format, sort imports and type-check a Python project
//!
//! Runs ruff (with fixes), black, isort and mypy, in that order, through the
//! project's dependency manager. Exits with the status of the last step.

mod cli;
mod detect;
mod pipeline;
mod runner;
mod status;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(async { cli::run(cli).await }),
        Err(e) => Err(e.into()),
    };

    match code {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            std::process::exit(2);
        }
    }
}
