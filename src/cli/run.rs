//! CLI dispatch: parse arguments, discover configuration, build the tokio
//! runtime, and route to the one subcommand the operator asked for.

use clap::Parser;
use dcmrelay_config::Config;
use dcmrelay_util::ExitCode;

use super::args::{Cli, Commands};
use super::commands;

/// Parse arguments, discover config, and dispatch. All user-facing output —
/// success or failure — is printed from here or from the command handlers;
/// `main` only translates the returned [`ExitCode`].
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(err) = dcmrelay_util::logging::init(cli.json_logs) {
        eprintln!("warning: failed to initialize logging: {err}");
    }

    let overrides = commands::common::build_overrides(&cli)?;
    let cfg = match Config::discover(&overrides) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("✗ configuration error: {err}");
            return Err(ExitCode::CLI_ARGS);
        }
    };

    let rt = tokio::runtime::Runtime::new().map_err(|err| {
        eprintln!("✗ failed to start async runtime: {err}");
        ExitCode::INTERNAL
    })?;

    rt.block_on(async {
        match cli.command.clone() {
            Commands::Analyze { exam_root, run_id, batch_size } => {
                commands::analyze::execute(&cli, &cfg, exam_root, run_id, batch_size).await
            }
            Commands::Send { run_id, batch_size, java_healthcheck_timeout_secs } => {
                commands::send::execute(&cli, &cfg, run_id, batch_size, java_healthcheck_timeout_secs).await
            }
            Commands::Validate { run_id } => commands::validate::execute(&cli, &cfg, run_id).await,
            Commands::Report { run_id, mode } => commands::report::execute(&cli, &cfg, run_id, mode).await,
            Commands::Doctor { healthcheck_timeout_secs } => {
                commands::doctor::execute(&cli, &cfg, healthcheck_timeout_secs).await
            }
        }
    })
}
