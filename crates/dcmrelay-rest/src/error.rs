use thiserror::Error;

/// Closed error surface for the archive REST client (spec §10.1).
///
/// Note that a failed query is not itself a [`RestError`] — the workflows
/// treat "instance not found" and "archive unreachable" as ordinary
/// [`crate::InstanceQuery`] outcomes (`NOT_FOUND` / `API_ERROR`) so a single
/// flaky IUID never aborts a whole validation run. This type covers only
/// the client construction failures that should.
#[derive(Debug, Error)]
pub enum RestError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}
