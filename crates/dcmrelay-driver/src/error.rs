//! Closed error surface for toolkit location and driver command-building
//! (spec §10.1).

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(
        "{binary} not found in the internal toolkit. Expected layout: <base>/toolkits/{prefix}-*/bin/{binary}"
    )]
    ToolkitNotFound { prefix: String, binary: String },

    #[error("{path} does not exist")]
    BinaryMissing { path: Utf8PathBuf },

    #[error("no usable java runtime found: {reason}")]
    JavaUnavailable { reason: String },

    #[error("failed to run dcmdump: {0}")]
    Dcmdump(#[from] dcmrelay_runner::RunnerError),
}
