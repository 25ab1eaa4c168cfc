//! Closed failure modes for the foundation utilities crate.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UtilError {
    #[error("failed to create parent directory for {path}: {source}")]
    CreateParentDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write temporary file in {dir}: {source}")]
    TempFileWrite {
        dir: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist {path} after retries: {source}")]
    Persist {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("logging subsystem already initialized")]
    LoggingAlreadyInitialized,
}

pub type UtilResult<T> = Result<T, UtilError>;
