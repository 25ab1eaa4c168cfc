//! The `Driver` trait: the one seam Send/Validate code against, so neither
//! workflow ever special-cases "if dcm4che vs if DCMTK" outside this crate
//! (spec §4.4, grounded on `toolkit_drivers.py::ToolkitDriver`).

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use dcmrelay_runner::CommandSpec;
use dcmrelay_types::{SendStatus, Toolkit};

use crate::error::DriverError;

/// The four metadata fields `dcmdump`-style extraction yields per file.
/// `source_ts_name` duplicates `source_ts_uid` verbatim — the original
/// implementation never resolves a human-readable transfer-syntax name, so
/// neither does this one (see `toolkit_drivers.py::extract_metadata`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMetadata {
    pub sop_instance_uid: String,
    pub source_ts_uid: String,
    pub source_ts_name: String,
    pub error: String,
}

impl ExtractedMetadata {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_empty() && !self.sop_instance_uid.is_empty()
    }
}

/// One file's outcome as read out of a toolkit's per-file log output.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub send_status: SendStatus,
    pub status_detail: String,
}

/// dcm4che's output is correlated at the batch level: one set of
/// RQ/RSP-observed IUIDs for the whole chunk, not a per-file breakdown
/// (spec §4.6 "real-time RQ/RSP IUID correlation").
#[derive(Debug, Clone, Default)]
pub struct BatchCorrelation {
    pub rq_iuids: Vec<String>,
    pub ok_iuids: Vec<String>,
    pub err_iuids: Vec<String>,
    pub err_status_by_iuid: HashMap<String, String>,
}

/// Output of [`Driver::parse_send_output`]. The two toolkit families
/// observe fundamentally different granularity, so callers branch on this
/// rather than the driver forcing a lowest-common-denominator shape.
#[derive(Debug, Clone)]
pub enum ParsedSendOutput {
    Batch(BatchCorrelation),
    PerFile(HashMap<String, FileOutcome>),
}

/// A toolkit-specific command/output driver.
pub trait Driver {
    fn toolkit(&self) -> Toolkit;

    /// Build the `storescu`-equivalent invocation for one chunk. `args_file`
    /// is only consulted by drivers that take a DCMTK-style `@argfile`; ToolF
    /// lists `batch_files` directly on argv (or via its own Java argfile,
    /// built internally when the chunk is too large for a direct command
    /// line).
    fn build_send_command(
        &self,
        batch_files: &[Utf8PathBuf],
        args_file: &Utf8Path,
    ) -> Result<CommandSpec, DriverError>;

    /// Build a C-ECHO command against the configured destination, used by
    /// the `doctor` subcommand (spec §11).
    fn build_echo_command(&self) -> Result<CommandSpec, DriverError>;

    /// Run `dcmdump`-equivalent metadata extraction against one file.
    fn extract_metadata(&self, file_path: &Utf8Path) -> ExtractedMetadata;

    /// Classify a completed (or partial, mid-stream) chunk of process output
    /// lines into per-unit outcomes.
    fn parse_send_output(&self, lines: &[String], batch_files: &[Utf8PathBuf]) -> ParsedSendOutput;
}
