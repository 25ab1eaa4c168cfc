//! Closed error surface for the Report Exporter (spec §10.1).

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("run directory not found: {0}")]
    RunNotFound(Utf8PathBuf),

    #[error("send results not found at {0}")]
    SendResultsMissing(Utf8PathBuf),

    #[error("no SENT_OK files found in send results; nothing to export")]
    NothingToExport,

    #[error("report export was cancelled")]
    Cancelled,

    #[error("artifact I/O failed: {0}")]
    Artifact(#[from] dcmrelay_artifact::ArtifactError),

    #[error("archive REST client unavailable: {0}")]
    Rest(#[from] dcmrelay_rest::RestError),
}
