use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use camino::Utf8PathBuf;
use dcmrelay_config::Config;
use dcmrelay_report::{ReportError, ReportOptions, export_report};
use dcmrelay_types::ReportMode;
use dcmrelay_util::ExitCode;

use super::common::{acquire_lock, build_driver, print_progress, run_cancellable, set_runs_base_env};
use crate::cli::args::Cli;

pub async fn execute(cli: &Cli, cfg: &Config, run_id: String, mode: ReportMode) -> Result<(), ExitCode> {
    set_runs_base_env(&cfg.runs_base_dir);

    let toolkits_dir = Utf8PathBuf::from_path_buf(cli.toolkits_dir.clone()).map_err(|_| {
        eprintln!("✗ --toolkits-dir path is not valid UTF-8");
        ExitCode::CLI_ARGS
    })?;

    let _lock = acquire_lock(&run_id, cli.force, cli.lock_ttl_seconds)?;
    let driver = build_driver(cfg, &toolkits_dir);
    let runs_base = Utf8PathBuf::from(&cfg.runs_base_dir);

    let opts = ReportOptions {
        cfg,
        driver: driver.as_ref(),
        run_id: &run_id,
        mode,
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let result = run_cancellable(&cancelled, export_report(&opts, &runs_base, &cancelled, print_progress)).await;

    match result {
        Ok(outcome) => {
            println!(
                "run_id={} report_file={} rows={} ok={} erro={}",
                outcome.run_id, outcome.report_file, outcome.rows, outcome.ok, outcome.erro
            );
            Ok(())
        }
        Err(ReportError::Cancelled) => {
            eprintln!("✗ report export cancelled");
            Err(ExitCode::INTERRUPTED)
        }
        Err(err @ (ReportError::RunNotFound(_) | ReportError::SendResultsMissing(_) | ReportError::NothingToExport)) => {
            eprintln!("✗ {err}");
            Err(ExitCode::CLI_ARGS)
        }
        Err(err) => {
            eprintln!("✗ report export failed: {err}");
            Err(ExitCode::INTERNAL)
        }
    }
}
