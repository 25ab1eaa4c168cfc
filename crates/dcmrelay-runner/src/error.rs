//! Error types for the runner module.

use thiserror::Error;

/// Closed error surface for process execution (spec §10.1).
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("failed to read stdout/stderr from {program}: {reason}")]
    StreamFailed { program: String, reason: String },

    #[error("failed to terminate process tree for pid {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("execution timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("native execution failed: {reason}")]
    NativeExecutionFailed { reason: String },
}
