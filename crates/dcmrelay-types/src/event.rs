//! Telemetry event vocabulary (`telemetry/events.csv`, spec §3/§4.9).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Closed vocabulary of telemetry events. Writers must refuse any value
/// outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum EventType {
    #[strum(serialize = "ANALYSIS_CANCELLED")]
    AnalysisCancelled,
    #[strum(serialize = "ANALYSIS_END")]
    AnalysisEnd,

    #[strum(serialize = "RUN_SEND_MODE")]
    RunSendMode,
    #[strum(serialize = "RUN_SEND_JAVA_HEALTHCHECK")]
    RunSendJavaHealthcheck,
    #[strum(serialize = "RUN_SEND_SKIP_ALREADY_COMPLETED")]
    RunSendSkipAlreadyCompleted,
    #[strum(serialize = "RUN_SEND_RESUME")]
    RunSendResume,
    #[strum(serialize = "RUN_SEND_START")]
    RunSendStart,
    #[strum(serialize = "RUN_SEND_END")]
    RunSendEnd,
    #[strum(serialize = "SEND_RESUME_FROM_RESULTS")]
    SendResumeFromResults,

    #[strum(serialize = "CHUNK_SPLIT_PLAN")]
    ChunkSplitPlan,
    #[strum(serialize = "CHUNK_START")]
    ChunkStart,
    #[strum(serialize = "CHUNK_JAVA_ARGFILE")]
    ChunkJavaArgfile,
    #[strum(serialize = "CHUNK_CMD_META")]
    ChunkCmdMeta,
    #[strum(serialize = "CHUNK_CMD_OVER_LIMIT")]
    ChunkCmdOverLimit,
    #[strum(serialize = "CHUNK_END")]
    ChunkEnd,
    #[strum(serialize = "CMDLEN_GUARD_WARN")]
    CmdlenGuardWarn,

    #[strum(serialize = "SEND_FILE_ERROR")]
    SendFileError,
    #[strum(serialize = "SEND_IUID_REALTIME")]
    SendIuidRealtime,
    #[strum(serialize = "SEND_PARSE_EXCEPTION")]
    SendParseException,

    #[strum(serialize = "RUN_SEND_JAVA_HEALTHCHECK_FAIL")]
    RunSendJavaHealthcheckFail,
    #[strum(serialize = "SEND_CANCEL_FORCE_KILL")]
    SendCancelForceKill,
    #[strum(serialize = "SEND_CANCELLED_IMMEDIATE")]
    SendCancelledImmediate,

    #[strum(serialize = "VALIDATION_START")]
    ValidationStart,
    #[strum(serialize = "VALIDATION_END")]
    ValidationEnd,
    #[strum(serialize = "CONSISTENCY_FILLED")]
    ConsistencyFilled,
    #[strum(serialize = "CONSISTENCY_MISSING")]
    ConsistencyMissing,
}

/// One row of `telemetry/events.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub run_id: String,
    pub event_type: EventType,
    pub timestamp_iso: String,
    pub message: String,
    pub ref_: String,
}

impl Event {
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        event_type: EventType,
        message: impl Into<String>,
        ref_: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            event_type,
            timestamp_iso: String::new(),
            message: message.into(),
            ref_: ref_.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn event_type_text_round_trips() {
        for variant in [
            EventType::AnalysisCancelled,
            EventType::RunSendStart,
            EventType::ChunkCmdOverLimit,
            EventType::ConsistencyMissing,
        ] {
            let text = variant.to_string();
            assert_eq!(EventType::from_str(&text).unwrap(), variant);
        }
    }
}
