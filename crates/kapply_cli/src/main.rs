//! kapply CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or configuration
//! - 3: One or more resources failed to apply
//! - 4: Template or manifest error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

use kapply_core::ApplierError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const APPLY_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "kapply=debug" } else { "kapply=info" };
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive(level.parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Apply(args) => commands::apply::execute(args).await,
        Commands::Render(args) => commands::render::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<ApplierError>() {
        Some(ApplierError::Render(_) | ApplierError::Decode(_)) => ExitCodes::TEMPLATE_ERROR,
        Some(ApplierError::Configuration(_)) => ExitCodes::INVALID_ARGS,
        Some(ApplierError::Aggregate { .. }) => ExitCodes::APPLY_FAILURE,
        Some(_) => ExitCodes::GENERAL_ERROR,
        None => ExitCodes::GENERAL_ERROR,
    }
}
