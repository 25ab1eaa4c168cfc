//! The dcm4che batch-size ceiling estimator (spec §4.5 step 7), grounded on
//! `shared/utils.py::estimate_dcm4che_batch_max_cmd`.

use camino::Utf8Path;
use dcmrelay_driver::cmdlen::{WINDOWS_CMD_SAFE_MAX_CHARS, WINDOWS_DIRECT_SAFE_MAX_CHARS, windows_cmdline_len};
use dcmrelay_types::BatchMaxCmdSource;

/// Destination AET/host/port, enough to reconstruct the base command's
/// rendered length without actually resolving the toolkit.
pub struct DestinationAddress<'a> {
    pub aet_dest: &'a str,
    pub pacs_host: &'a str,
    pub pacs_port: u16,
}

/// Compute the dcm4che per-chunk unit ceiling: how many files (or folders,
/// in ToolF folder mode) fit in one `storescu` invocation before the
/// rendered Windows command line would exceed its safe budget.
///
/// When `prefer_java_direct` holds on Windows, the direct (non-`cmd`-wrapped)
/// invocation bypasses `cmd.exe`'s argument-length ceiling entirely — see
/// DESIGN.md Open Question 3 — so every selected unit goes in a single
/// chunk, uncapped.
#[must_use]
pub fn estimate_dcm4che_batch_max_cmd(
    unit_max_arg_len: usize,
    units_total: u64,
    use_shell_wrapper: bool,
    prefer_java_direct: bool,
    dcm4che_bin_dir: Option<&Utf8Path>,
    dest: &DestinationAddress<'_>,
) -> (u64, BatchMaxCmdSource, usize) {
    if cfg!(windows) && prefer_java_direct {
        return (units_total, BatchMaxCmdSource::ToolFJavaArgfile, WINDOWS_DIRECT_SAFE_MAX_CHARS);
    }

    let source = BatchMaxCmdSource::ToolFCmdLimit;
    let budget = if cfg!(windows) && use_shell_wrapper {
        WINDOWS_CMD_SAFE_MAX_CHARS
    } else {
        WINDOWS_DIRECT_SAFE_MAX_CHARS
    };

    if units_total == 0 {
        return (0, source, budget);
    }
    if unit_max_arg_len == 0 {
        return (units_total, source, budget);
    }

    let storescu_guess = dcm4che_bin_dir
        .map(|dir| dir.join("storescu.bat"))
        .unwrap_or_else(|| camino::Utf8PathBuf::from("dcm4che/bin/storescu.bat"));
    let base = vec![
        storescu_guess.to_string(),
        "-c".to_string(),
        format!("{}@{}:{}", dest.aet_dest, dest.pacs_host, dest.pacs_port),
    ];
    let cmd_args: Vec<String> = if use_shell_wrapper {
        ["cmd".to_string(), "/c".to_string()].into_iter().chain(base).collect()
    } else {
        base
    };
    let base_len = windows_cmdline_len(&cmd_args);

    let remaining = (budget as i64) - (base_len as i64);
    let per_unit_cost = 1 + unit_max_arg_len as i64;
    if remaining < per_unit_cost {
        return (0, source, budget);
    }
    let max_units = (remaining / per_unit_cost) as u64;
    (units_total.min(max_units), source, budget)
}
