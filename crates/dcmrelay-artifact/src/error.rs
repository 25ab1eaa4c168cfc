use camino::Utf8PathBuf;
use thiserror::Error;

/// Closed error surface for the artifact layer (spec §10.1).
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV row in {path} at line {line}: {reason}")]
    MalformedRow {
        path: Utf8PathBuf,
        line: usize,
        reason: String,
    },

    #[error("failed to (de)serialize JSON artifact {path}: {source}")]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Util(#[from] dcmrelay_util::UtilError),

    #[error("atomic write failed: {0}")]
    AtomicWrite(String),
}

impl From<anyhow::Error> for ArtifactError {
    fn from(source: anyhow::Error) -> Self {
        ArtifactError::AtomicWrite(format!("{source:#}"))
    }
}
