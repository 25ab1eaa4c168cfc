use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use camino::Utf8PathBuf;
use dcmrelay_config::Config;
use dcmrelay_driver::DriverError;
use dcmrelay_send::{SendError, SendOptions, run_send};
use dcmrelay_types::SendSummaryStatus;
use dcmrelay_util::ExitCode;

use super::common::{acquire_lock, build_driver, find_dcm4che_bin_dir, print_progress, run_cancellable, set_runs_base_env};
use crate::cli::args::Cli;

pub async fn execute(
    cli: &Cli,
    cfg: &Config,
    run_id: String,
    batch_size: Option<u64>,
    java_healthcheck_timeout_secs: u64,
) -> Result<(), ExitCode> {
    set_runs_base_env(&cfg.runs_base_dir);

    let toolkits_dir = Utf8PathBuf::from_path_buf(cli.toolkits_dir.clone()).map_err(|_| {
        eprintln!("✗ --toolkits-dir path is not valid UTF-8");
        ExitCode::CLI_ARGS
    })?;
    let batch_size = batch_size.unwrap_or(cfg.batch_size_default);

    let _lock = acquire_lock(&run_id, cli.force, cli.lock_ttl_seconds)?;
    let driver = build_driver(cfg, &toolkits_dir);
    let dcm4che_bin_dir = find_dcm4che_bin_dir(&toolkits_dir);
    let runs_base = Utf8PathBuf::from(&cfg.runs_base_dir);

    let opts = SendOptions {
        cfg,
        driver: driver.as_ref(),
        run_id: &run_id,
        dcm4che_bin_dir: dcm4che_bin_dir.as_deref(),
        batch_size,
        java_healthcheck_timeout: Duration::from_secs(java_healthcheck_timeout_secs),
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let result = run_cancellable(&cancelled, run_send(&opts, &runs_base, &cancelled, print_progress)).await;

    match result {
        Ok(outcome) => {
            println!(
                "run_id={} status={} duration={:.1}s",
                outcome.run_id, outcome.status, outcome.send_duration_sec
            );
            match outcome.status {
                SendSummaryStatus::Pass
                | SendSummaryStatus::PassWithWarnings
                | SendSummaryStatus::AlreadySent
                | SendSummaryStatus::AlreadySentPass => Ok(()),
                SendSummaryStatus::Fail => Err(ExitCode::WORKFLOW_FAILED),
                SendSummaryStatus::Interrupted => Err(ExitCode::INTERRUPTED),
            }
        }
        Err(SendError::Cancelled) => {
            eprintln!("✗ send cancelled");
            Err(ExitCode::INTERRUPTED)
        }
        Err(err @ (SendError::JavaUnavailable { .. } | SendError::Driver(DriverError::ToolkitNotFound { .. }))) => {
            eprintln!("✗ {err}");
            Err(ExitCode::TOOLKIT_NOT_LOCATED)
        }
        Err(err @ (SendError::ManifestUnreadable { .. } | SendError::NothingSelected)) => {
            eprintln!("✗ {err}");
            Err(ExitCode::CLI_ARGS)
        }
        Err(err) => {
            eprintln!("✗ send failed: {err}");
            Err(ExitCode::INTERNAL)
        }
    }
}
