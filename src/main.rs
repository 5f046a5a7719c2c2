//! Token Timing - Main CLI Application
//!
//! Collects paired, randomly ordered timing samples for two candidate tokens
//! and compares them with a rank-sum test.

use clap::{CommandFactory, FromArgMatches};
use std::process;
use token_timing::{
    app::App,
    cli::Cli,
    config::EnvManager,
    error::{AppError, ErrorReporter, Result},
};

fn main() {
    // Report panics without exiting so unwinding still restores tuning
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
    }));

    let cli = parse_cli();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    if let Err(e) = run(cli) {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}

fn parse_cli() -> Cli {
    let matches = Cli::command()
        .after_long_help(EnvManager::display_env_help())
        .get_matches();

    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    if let Err(message) = cli.validate() {
        Cli::command()
            .error(clap::error::ErrorKind::ArgumentConflict, message)
            .exit();
    }
    cli
}

/// Requests go out from the main thread only
fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::internal(format!("Failed to start async runtime: {}", e)))?;

    runtime.block_on(App::new(cli).run())
}
