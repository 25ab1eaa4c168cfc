use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use camino::Utf8PathBuf;
use dcmrelay_config::Config;
use dcmrelay_types::ReconciliationStatus;
use dcmrelay_util::ExitCode;
use dcmrelay_validate::{ValidateError, ValidateOptions, run_validation};

use super::common::{acquire_lock, build_driver, print_progress, run_cancellable, set_runs_base_env};
use crate::cli::args::Cli;

pub async fn execute(cli: &Cli, cfg: &Config, run_id: String) -> Result<(), ExitCode> {
    set_runs_base_env(&cfg.runs_base_dir);

    let toolkits_dir = Utf8PathBuf::from_path_buf(cli.toolkits_dir.clone()).map_err(|_| {
        eprintln!("✗ --toolkits-dir path is not valid UTF-8");
        ExitCode::CLI_ARGS
    })?;

    let _lock = acquire_lock(&run_id, cli.force, cli.lock_ttl_seconds)?;
    let driver = build_driver(cfg, &toolkits_dir);
    let runs_base = Utf8PathBuf::from(&cfg.runs_base_dir);

    let opts = ValidateOptions {
        cfg,
        driver: driver.as_ref(),
        run_id: &run_id,
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let result = run_cancellable(&cancelled, run_validation(&opts, &runs_base, &cancelled, print_progress)).await;

    match result {
        Ok(outcome) => {
            println!(
                "run_id={} final_status={} total_iuid_unique={} ok={} not_found={} api_error={} duration={:.1}s",
                outcome.run_id,
                outcome.final_status,
                outcome.total_iuid_unique,
                outcome.iuid_ok,
                outcome.iuid_not_found,
                outcome.iuid_api_error,
                outcome.validation_duration_sec
            );
            match outcome.final_status {
                ReconciliationStatus::Pass | ReconciliationStatus::PassWithWarnings => Ok(()),
                ReconciliationStatus::Fail => Err(ExitCode::WORKFLOW_FAILED),
            }
        }
        Err(ValidateError::Cancelled) => {
            eprintln!("✗ validation cancelled");
            Err(ExitCode::INTERRUPTED)
        }
        Err(err @ (ValidateError::RunNotFound(_) | ValidateError::SendResultsMissing(_))) => {
            eprintln!("✗ {err}");
            Err(ExitCode::CLI_ARGS)
        }
        Err(err) => {
            eprintln!("✗ validation failed: {err}");
            Err(ExitCode::INTERNAL)
        }
    }
}
