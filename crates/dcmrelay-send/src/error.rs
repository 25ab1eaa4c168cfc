//! Closed error surface for the Send workflow (spec §10.1).

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("run manifest not found or unreadable at {path}: {source}")]
    ManifestUnreadable {
        path: Utf8PathBuf,
        #[source]
        source: dcmrelay_artifact::ArtifactError,
    },

    #[error("no files selected for send in run manifest")]
    NothingSelected,

    #[error("no usable java runtime for ToolF direct invocation: {reason}")]
    JavaUnavailable { reason: String },

    #[error("failed to spawn or stream toolkit process: {0}")]
    Process(#[from] dcmrelay_runner::RunnerError),

    #[error("failed to build send command: {0}")]
    Driver(#[from] dcmrelay_driver::DriverError),

    #[error("artifact I/O failed: {0}")]
    Artifact(#[from] dcmrelay_artifact::ArtifactError),

    #[error("send run was cancelled")]
    Cancelled,

    #[error("command line for a single unit still exceeds the {budget}-char budget ({len} chars) under a cmd-wrapped invocation")]
    ChunkCmdOverLimit { len: usize, budget: usize },

    #[error("failed to write argfile at {path}: {source}")]
    ArgfileWrite {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}
