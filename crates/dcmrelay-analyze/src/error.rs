//! Closed error surface for the Analyze workflow (spec §10.1).

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("pasta nao encontrada: {path}")]
    RootNotFound { path: Utf8PathBuf },

    #[error("batch_size deve ser >= 1")]
    InvalidBatchSize,

    #[error("analise cancelada pelo usuario")]
    Cancelled,

    #[error(transparent)]
    Artifact(#[from] dcmrelay_artifact::ArtifactError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}
