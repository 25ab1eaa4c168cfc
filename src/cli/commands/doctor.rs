//! Pre-flight diagnostics: Java/toolkit health-check and a zero-payload
//! C-ECHO-equivalent connectivity probe, without running a send (§11
//! "Supplemented features").

use std::time::Duration;

use camino::Utf8PathBuf;
use dcmrelay_config::Config;
use dcmrelay_driver::java::resolve_java_executable;
use dcmrelay_driver::{check_critical_jars, DriverError};
use dcmrelay_runner::StreamingChild;
use dcmrelay_types::Toolkit;
use dcmrelay_util::ExitCode;

use super::common::{build_driver, find_dcm4che_bin_dir};
use crate::cli::args::Cli;

pub async fn execute(cli: &Cli, cfg: &Config, healthcheck_timeout_secs: u64) -> Result<(), ExitCode> {
    let toolkits_dir = Utf8PathBuf::from_path_buf(cli.toolkits_dir.clone()).map_err(|_| {
        eprintln!("✗ --toolkits-dir path is not valid UTF-8");
        ExitCode::CLI_ARGS
    })?;

    if cfg.toolkit == Toolkit::ToolF {
        match resolve_java_executable(Duration::from_secs(healthcheck_timeout_secs)) {
            Ok(java) => println!("java: ok ({java})"),
            Err(reason) => {
                eprintln!("✗ java: {reason}");
                return Err(ExitCode::TOOLKIT_NOT_LOCATED);
            }
        }

        if let Some(bin_dir) = find_dcm4che_bin_dir(&toolkits_dir) {
            let (missing, lib_dir) = check_critical_jars(&bin_dir);
            if missing.is_empty() {
                println!("dcm4che jars: ok ({lib_dir})");
            } else {
                eprintln!("✗ dcm4che jars: missing {missing:?} under {lib_dir}");
                return Err(ExitCode::TOOLKIT_NOT_LOCATED);
            }
        }
    }

    let driver = build_driver(cfg, &toolkits_dir);
    let cmd = driver.build_echo_command().map_err(|err| {
        eprintln!("✗ {err}");
        match err {
            DriverError::ToolkitNotFound { .. } | DriverError::BinaryMissing { .. } | DriverError::JavaUnavailable { .. } => {
                ExitCode::TOOLKIT_NOT_LOCATED
            }
            DriverError::Dcmdump(_) => ExitCode::INTERNAL,
        }
    })?;

    let mut child = StreamingChild::spawn(&cmd).map_err(|err| {
        eprintln!("✗ failed to run echo probe: {err}");
        ExitCode::INTERNAL
    })?;
    let exit_code = child.wait().await.map_err(|err| {
        eprintln!("✗ echo probe failed: {err}");
        ExitCode::INTERNAL
    })?;

    match exit_code {
        Some(0) => {
            println!("echo: ok");
            Ok(())
        }
        other => {
            eprintln!("✗ echo probe exited with {other:?}");
            Err(ExitCode::WORKFLOW_FAILED)
        }
    }
}
