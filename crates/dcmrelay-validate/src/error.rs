//! Closed error surface for the Validate workflow (spec §10.1).

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("run directory not found: {0}")]
    RunNotFound(Utf8PathBuf),

    #[error("send results not found at {0}; run send before validate")]
    SendResultsMissing(Utf8PathBuf),

    #[error("validation run was cancelled")]
    Cancelled,

    #[error("artifact I/O failed: {0}")]
    Artifact(#[from] dcmrelay_artifact::ArtifactError),

    #[error("archive REST client unavailable: {0}")]
    Rest(#[from] dcmrelay_rest::RestError),
}
