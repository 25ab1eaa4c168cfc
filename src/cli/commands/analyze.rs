use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use camino::Utf8PathBuf;
use dcmrelay_analyze::{AnalyzeError, AnalyzeOptions, run_analysis};
use dcmrelay_config::Config;
use dcmrelay_util::ExitCode;
use dcmrelay_util::clock::now_run_id;

use super::common::{acquire_lock, find_dcm4che_bin_dir, print_progress, run_cancellable_blocking, set_runs_base_env};
use crate::cli::args::Cli;

pub async fn execute(
    cli: &Cli,
    cfg: &Config,
    exam_root: std::path::PathBuf,
    run_id: Option<String>,
    batch_size: Option<u64>,
) -> Result<(), ExitCode> {
    set_runs_base_env(&cfg.runs_base_dir);

    let exam_root = Utf8PathBuf::from_path_buf(exam_root).map_err(|_| {
        eprintln!("✗ exam root path is not valid UTF-8");
        ExitCode::CLI_ARGS
    })?;
    let toolkits_dir = Utf8PathBuf::from_path_buf(cli.toolkits_dir.clone()).map_err(|_| {
        eprintln!("✗ --toolkits-dir path is not valid UTF-8");
        ExitCode::CLI_ARGS
    })?;
    let batch_size = batch_size.unwrap_or(cfg.batch_size_default);
    let run_id = run_id.unwrap_or_else(now_run_id);

    let _lock = acquire_lock(&run_id, cli.force, cli.lock_ttl_seconds)?;
    let dcm4che_bin_dir = find_dcm4che_bin_dir(&toolkits_dir);
    let runs_base = Utf8PathBuf::from(&cfg.runs_base_dir);

    let cancelled = Arc::new(AtomicBool::new(false));
    let watcher_cancelled = Arc::clone(&cancelled);
    let work_cancelled = Arc::clone(&cancelled);
    let cfg = cfg.clone();

    let result = run_cancellable_blocking(&watcher_cancelled, move || {
        let opts = AnalyzeOptions {
            cfg: &cfg,
            exam_root: &exam_root,
            batch_size,
            run_id: Some(run_id.as_str()),
            dcm4che_bin_dir: dcm4che_bin_dir.as_deref(),
        };
        run_analysis(&opts, &runs_base, &work_cancelled, print_progress)
    })
    .await;

    match result {
        Ok(outcome) => {
            println!(
                "run_id={} files_total={} files_selected={} folders_total={} folders_selected={} \
                 chunks_total={} chunk_unit={} batch_max_cmd={} ({}) duration={:.1}s",
                outcome.run_id,
                outcome.files_total,
                outcome.files_selected,
                outcome.folders_total,
                outcome.folders_selected,
                outcome.chunks_total,
                outcome.chunk_unit,
                outcome.batch_max_cmd,
                outcome.batch_max_cmd_source,
                outcome.analysis_duration_sec
            );
            Ok(())
        }
        Err(AnalyzeError::Cancelled) => {
            eprintln!("✗ analysis cancelled");
            Err(ExitCode::INTERRUPTED)
        }
        Err(err @ (AnalyzeError::RootNotFound { .. } | AnalyzeError::InvalidBatchSize)) => {
            eprintln!("✗ {err}");
            Err(ExitCode::CLI_ARGS)
        }
        Err(err) => {
            eprintln!("✗ analysis failed: {err}");
            Err(ExitCode::INTERNAL)
        }
    }
}
