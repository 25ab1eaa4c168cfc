//! CLI argument definitions (clap).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dcmrelay_types::{ReportMode, Toolkit, ToolFIuidUpdateMode, ToolFSendMode, TsMode};

/// dcmrelay - bulk DICOM C-STORE transfer orchestrator with resumable send
/// runs and archive reconciliation.
#[derive(Parser)]
#[command(name = "dcmrelay")]
#[command(about = "Analyze, send, and reconcile bulk DICOM transfers against a PACS archive")]
#[command(long_about = r#"
dcmrelay orchestrates bulk transfer of a local DICOM file tree to a remote
archive via an external C-STORE tool, then reconciles what was sent against
the archive's REST view.

EXAMPLES:
  # Scan a tree and produce a send plan
  dcmrelay analyze /mnt/exams/patient-042 --run-id patient-042

  # Send the selected files for a run (resumable; re-run to continue)
  dcmrelay send --run-id patient-042_toolF_files

  # Reconcile claimed successes against the archive
  dcmrelay validate --run-id patient-042_toolF_files

  # Export a per-file or per-study report from the archive
  dcmrelay report --run-id patient-042_toolF_files --mode A

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > dcmrelay.toml > defaults.
  The config file is discovered by searching upward from CWD for dcmrelay.toml.
  Use --config to specify an explicit path.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base directory under which run directories live.
    #[arg(long, global = true)]
    pub runs_base: Option<String>,

    /// Directory containing `toolkits/{dcm4che,dcmtk}-*/bin` (spec §4.4).
    #[arg(long, global = true, default_value = ".")]
    pub toolkits_dir: PathBuf,

    /// `toolF` (dcm4che family) or `toolT` (DCMTK family).
    #[arg(long, global = true)]
    pub toolkit: Option<Toolkit>,

    #[arg(long, global = true)]
    pub aet_source: Option<String>,

    #[arg(long, global = true)]
    pub aet_dest: Option<String>,

    #[arg(long, global = true)]
    pub pacs_host: Option<String>,

    #[arg(long, global = true)]
    pub pacs_port: Option<u16>,

    #[arg(long, global = true)]
    pub pacs_rest_host: Option<String>,

    #[arg(long, global = true)]
    pub batch_size_default: Option<u64>,

    #[arg(long, global = true)]
    pub allowed_extensions: Option<String>,

    #[arg(long, global = true)]
    pub restrict_extensions: bool,
    #[arg(long, global = true)]
    pub no_restrict_extensions: bool,

    #[arg(long, global = true)]
    pub include_no_extension: bool,
    #[arg(long, global = true)]
    pub no_include_no_extension: bool,

    #[arg(long, global = true)]
    pub collect_size_bytes: bool,
    #[arg(long, global = true)]
    pub no_collect_size_bytes: bool,

    #[arg(long, global = true)]
    pub ts_mode: Option<TsMode>,

    #[arg(long, global = true)]
    pub toolf_send_mode: Option<ToolFSendMode>,

    #[arg(long, global = true)]
    pub toolf_iuid_update_mode: Option<ToolFIuidUpdateMode>,

    #[arg(long, global = true)]
    pub toolf_use_shell_wrapper: bool,
    #[arg(long, global = true)]
    pub no_toolf_use_shell_wrapper: bool,

    #[arg(long, global = true)]
    pub toolf_prefer_java_direct: bool,
    #[arg(long, global = true)]
    pub no_toolf_prefer_java_direct: bool,

    /// Force-acquire the run lock, overriding a stale lock left by a crashed
    /// process (spec §5 "concurrent workflows on the same run are not
    /// permitted").
    #[arg(long, global = true)]
    pub force: bool,

    /// Age, in seconds, past which an existing lock is considered stale.
    #[arg(long, global = true)]
    pub lock_ttl_seconds: Option<u64>,

    /// Emit structured JSON logs instead of compact human-readable ones.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Scan a directory tree, select files for send, and write the run's
    /// manifest + batch-size ceiling (spec §4.5).
    Analyze {
        /// Root directory to scan.
        exam_root: PathBuf,
        /// Run identifier; a fresh clock-derived id is used when omitted.
        #[arg(long)]
        run_id: Option<String>,
        /// Units per batch; falls back to `batch_size_default` from config.
        #[arg(long)]
        batch_size: Option<u64>,
    },
    /// Drive the external toolkit to send a run's selected files, resuming
    /// from any prior checkpoint (spec §4.6).
    Send {
        /// The run to send, as produced by `analyze`.
        #[arg(long)]
        run_id: String,
        /// Units per batch; falls back to `batch_size_default` from config.
        #[arg(long)]
        batch_size: Option<u64>,
        /// Timeout, in seconds, for the ToolF Java healthcheck probe.
        #[arg(long, default_value_t = 8)]
        java_healthcheck_timeout_secs: u64,
    },
    /// Reconcile a run's claimed successes against the archive's REST view
    /// (spec §4.8).
    Validate {
        #[arg(long)]
        run_id: String,
    },
    /// Export a per-file or per-study report from the archive for a run's
    /// already-sent files (spec §4.8/§4.9).
    Report {
        #[arg(long)]
        run_id: String,
        /// `A` (per file) or `C` (per study, aggregated).
        #[arg(long, default_value = "A")]
        mode: ReportMode,
    },
    /// Run the Java/toolkit health-check and a zero-payload echo probe
    /// without sending anything, for pre-flight diagnostics.
    Doctor {
        /// Timeout, in seconds, for the Java healthcheck probe.
        #[arg(long, default_value_t = 8)]
        healthcheck_timeout_secs: u64,
    },
}
