//! Shared helpers: config override wiring, driver construction, run
//! locking, and the cancellation watcher every subcommand installs around
//! its workflow call (spec §5: "the cancel flag is set exogenously").

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use dcmrelay_config::CliOverrides;
use dcmrelay_driver::driver::Driver;
use dcmrelay_driver::{ToolFDriver, ToolTDriver, find_toolkit_bin};
use dcmrelay_lock::FileLock;
use dcmrelay_types::Toolkit;
use dcmrelay_util::ExitCode;

use crate::cli::args::Cli;

/// Fold the global flags on `cli` into a [`CliOverrides`], leaving a field
/// `None` when the operator never passed the corresponding flag.
pub fn build_overrides(cli: &Cli) -> Result<CliOverrides, ExitCode> {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| Utf8PathBuf::from_path_buf(p.clone()))
        .transpose()
        .map_err(|_| {
            eprintln!("✗ --config path is not valid UTF-8");
            ExitCode::CLI_ARGS
        })?;

    Ok(CliOverrides {
        config_path,
        toolkit: cli.toolkit,
        aet_source: cli.aet_source.clone(),
        aet_dest: cli.aet_dest.clone(),
        pacs_host: cli.pacs_host.clone(),
        pacs_port: cli.pacs_port,
        pacs_rest_host: cli.pacs_rest_host.clone(),
        runs_base_dir: cli.runs_base.clone(),
        batch_size_default: cli.batch_size_default,
        allowed_extensions: cli.allowed_extensions.clone(),
        restrict_extensions: tri_state(cli.restrict_extensions, cli.no_restrict_extensions),
        include_no_extension: tri_state(cli.include_no_extension, cli.no_include_no_extension),
        collect_size_bytes: tri_state(cli.collect_size_bytes, cli.no_collect_size_bytes),
        ts_mode: cli.ts_mode,
        toolf_send_mode: cli.toolf_send_mode,
        toolf_iuid_update_mode: cli.toolf_iuid_update_mode,
        toolf_use_shell_wrapper: tri_state(cli.toolf_use_shell_wrapper, cli.no_toolf_use_shell_wrapper),
        toolf_prefer_java_direct: tri_state(cli.toolf_prefer_java_direct, cli.no_toolf_prefer_java_direct),
    })
}

fn tri_state(set_true: bool, set_false: bool) -> Option<bool> {
    if set_true {
        Some(true)
    } else if set_false {
        Some(false)
    } else {
        None
    }
}

/// Point [`dcmrelay_lock`] at the configured runs-base directory. Must be
/// called once before any [`FileLock::acquire`] in this process.
pub fn set_runs_base_env(runs_base_dir: &str) {
    // SAFETY: dcmrelay is single-threaded at this point in startup, before
    // any workflow or lock acquisition has begun.
    unsafe {
        std::env::set_var("DCMRELAY_RUNS_BASE", runs_base_dir);
    }
}

/// Acquire the per-run advisory lock, mapping a held/stale lock to the
/// documented exit code (spec §10.1: code 4).
pub fn acquire_lock(run_id: &str, force: bool, ttl_seconds: Option<u64>) -> Result<FileLock, ExitCode> {
    FileLock::acquire(run_id, force, ttl_seconds).map_err(|err| {
        eprintln!("✗ could not acquire run lock for '{run_id}': {err}");
        ExitCode::LOCK_HELD
    })
}

/// Build the driver for `cfg.toolkit`, locating its toolkit binaries under
/// `toolkits_dir` (spec §4.4). A missing toolkit directory is not itself an
/// error here — individual driver operations report `ToolkitNotFound` when
/// they actually need a binary that isn't there.
pub fn build_driver(cfg: &dcmrelay_config::Config, toolkits_dir: &Utf8Path) -> Box<dyn Driver> {
    match cfg.toolkit {
        Toolkit::ToolF => {
            let bin_dir = find_toolkit_bin(toolkits_dir, "dcm4che", "storescu.bat");
            Box::new(ToolFDriver {
                bin_dir,
                aet_dest: cfg.aet_dest.clone(),
                pacs_host: cfg.pacs_host.clone(),
                pacs_port: cfg.pacs_port,
                use_shell_wrapper: cfg.toolf_use_shell_wrapper,
            })
        }
        Toolkit::ToolT => {
            let marker = if cfg!(windows) { "storescu.exe" } else { "storescu" };
            let bin_dir = find_toolkit_bin(toolkits_dir, "dcmtk", marker);
            Box::new(ToolTDriver {
                bin_dir,
                aet_source: cfg.aet_source.clone(),
                aet_dest: cfg.aet_dest.clone(),
                pacs_host: cfg.pacs_host.clone(),
                pacs_port: cfg.pacs_port,
            })
        }
    }
}

/// Also resolve the dcm4che bin dir alone, for Analyze's batch-ceiling
/// estimate and Send's pre-flight Java healthcheck — both only care about
/// ToolF and don't need a full [`Driver`].
pub fn find_dcm4che_bin_dir(toolkits_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    find_toolkit_bin(toolkits_dir, "dcm4che", "storescu.bat")
}

/// Print a progress line to stderr, keeping stdout free for the final
/// machine-parseable outcome summary.
pub fn print_progress(message: &str) {
    eprintln!("{message}");
}

/// Run an async workflow future alongside a Ctrl-C watcher that flips
/// `cancelled` the moment the operator interrupts (spec §5: cancellation is
/// exogenous; workflows themselves only ever *observe* the flag). The
/// watcher is aborted as soon as the workflow resolves on its own.
pub async fn run_cancellable<F, T>(cancelled: &Arc<AtomicBool>, workflow: F) -> T
where
    F: Future<Output = T>,
{
    let watcher_flag = Arc::clone(cancelled);
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher_flag.store(true, Ordering::SeqCst);
        }
    });
    let result = workflow.await;
    watcher.abort();
    result
}

/// Same as [`run_cancellable`], for workflows (Analyze) that are
/// synchronous and block the calling thread — runs `work` on a blocking
/// thread-pool thread while the Ctrl-C watcher runs concurrently on the
/// async side.
pub async fn run_cancellable_blocking<F, T>(cancelled: &Arc<AtomicBool>, work: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let watcher_flag = Arc::clone(cancelled);
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher_flag.store(true, Ordering::SeqCst);
        }
    });
    let result = tokio::task::spawn_blocking(work)
        .await
        .expect("analyze worker thread panicked");
    watcher.abort();
    result
}
