//! Shared domain vocabulary for dcmrelay.
//!
//! Every tag a CSV/JSON artifact can carry is modeled as a closed enum here.
//! Writers must refuse to emit a value outside these sets (spec §9: "Implementers
//! must refuse to write unknown tag values").

pub mod event;
pub mod record;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// CSV field/row separator used by every artifact on disk.
pub const CSV_SEP: char = ';';

/// Outcome of the driver family for one of the two toolkit families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Toolkit {
    /// The dcm4che family (shell-wrapped `.bat` or direct Java + argfile).
    #[strum(serialize = "toolF")]
    #[serde(rename = "toolF")]
    ToolF,
    /// The DCMTK family (verbose per-file log).
    #[strum(serialize = "toolT")]
    #[serde(rename = "toolT")]
    ToolT,
}

/// How ToolF units are batched: whole folders, or individual files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ToolFSendMode {
    #[strum(serialize = "MANIFEST_FILES")]
    ManifestFiles,
    #[strum(serialize = "FOLDERS")]
    Folders,
}

/// When ToolF should fold real-time RQ/RSP IUIDs into result rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ToolFIuidUpdateMode {
    #[strum(serialize = "REALTIME")]
    Realtime,
    #[strum(serialize = "CHUNK_END")]
    ChunkEnd,
}

/// Transfer-syntax negotiation mode. Only `Auto` has implemented behavior —
/// see DESIGN.md Open Question 1. Non-`Auto` values must downgrade to `Auto`
/// with a warning; no other semantics may be invented for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum TsMode {
    #[strum(serialize = "AUTO")]
    Auto,
    #[strum(serialize = "JPEG_LS_LOSSLESS")]
    JpegLsLossless,
    #[strum(serialize = "UNCOMPRESSED_STANDARD")]
    UncompressedStandard,
}

/// Why a file was or wasn't selected for send during Analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum SelectionReason {
    #[strum(serialize = "INCLUDED_EXT")]
    IncludedExt,
    #[strum(serialize = "INCLUDED_NO_EXT")]
    IncludedNoExt,
    #[strum(serialize = "INCLUDED_ALL_FILES")]
    IncludedAllFiles,
    #[strum(serialize = "EXCLUDED_EXTENSION")]
    ExcludedExtension,
}

/// Source of the `batch_max_cmd` ceiling computed by Analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum BatchMaxCmdSource {
    #[strum(serialize = "TOOLF_JAVA_ARGFILE")]
    ToolFJavaArgfile,
    #[strum(serialize = "TOOLF_CMD_LIMIT")]
    ToolFCmdLimit,
    #[strum(serialize = "N/A")]
    NotApplicable,
}

/// Terminal per-file send outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum SendStatus {
    #[strum(serialize = "SENT_OK")]
    SentOk,
    #[strum(serialize = "SEND_FAIL")]
    SendFail,
    #[strum(serialize = "SENT_UNKNOWN")]
    SentUnknown,
    #[strum(serialize = "NON_DICOM")]
    NonDicom,
    #[strum(serialize = "UNSUPPORTED_DICOM_OBJECT")]
    UnsupportedDicomObject,
}

/// Provenance of the IUID recorded on a send-result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ExtractStatus {
    #[strum(serialize = "OK_FROM_STORESCU_REALTIME")]
    OkFromStorescuRealtime,
    #[strum(serialize = "OK_FROM_STORESCU")]
    OkFromStorescu,
    #[strum(serialize = "ERR_FROM_STORESCU_REALTIME")]
    ErrFromStorescuRealtime,
    #[strum(serialize = "ERR_FROM_STORESCU")]
    ErrFromStorescu,
    #[strum(serialize = "REQUESTED_NO_RSP")]
    RequestedNoRsp,
    #[strum(serialize = "PROCESS_EXIT_FAIL")]
    ProcessExitFail,
    #[strum(serialize = "NO_MATCH_UID_UNCONFIRMED")]
    NoMatchUidUnconfirmed,
    #[strum(serialize = "NO_MATCH")]
    NoMatch,
    /// ToolT's real-time parse succeeded with a confirmed IUID.
    #[strum(serialize = "OK")]
    Ok,
    /// Metadata extraction ran but no IUID tag was present in the file.
    #[strum(serialize = "MISSING_IUID")]
    MissingIuid,
    /// No metadata extraction was attempted on this row (default for unset rows).
    #[strum(serialize = "")]
    None,
}

impl Default for ExtractStatus {
    fn default() -> Self {
        Self::None
    }
}

/// Terminal status of a completed or interrupted Send invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum SendSummaryStatus {
    #[strum(serialize = "PASS")]
    Pass,
    #[strum(serialize = "PASS_WITH_WARNINGS")]
    PassWithWarnings,
    #[strum(serialize = "FAIL")]
    Fail,
    #[strum(serialize = "INTERRUPTED")]
    Interrupted,
    #[strum(serialize = "ALREADY_SENT")]
    AlreadySent,
    #[strum(serialize = "ALREADY_SENT_PASS")]
    AlreadySentPass,
}

/// Checkpoint write granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum CheckpointMode {
    #[strum(serialize = "ITEM")]
    Item,
    #[strum(serialize = "CHUNK_SYNC")]
    ChunkSync,
}

/// REST lookup outcome for one IUID during Validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ValidationOutcome {
    #[strum(serialize = "OK")]
    Ok,
    #[strum(serialize = "NOT_FOUND")]
    NotFound,
    #[strum(serialize = "API_ERROR")]
    ApiError,
}

/// Final judgment of a reconciliation pass or a validation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ReconciliationStatus {
    #[strum(serialize = "PASS")]
    Pass,
    #[strum(serialize = "PASS_WITH_WARNINGS")]
    PassWithWarnings,
    #[strum(serialize = "FAIL")]
    Fail,
}

/// Report Exporter mode: per-file, or aggregated per-study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ReportMode {
    #[strum(serialize = "A")]
    PerFile,
    #[strum(serialize = "C")]
    PerStudy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn send_status_round_trips_through_csv_text() {
        for variant in [
            SendStatus::SentOk,
            SendStatus::SendFail,
            SendStatus::SentUnknown,
            SendStatus::NonDicom,
            SendStatus::UnsupportedDicomObject,
        ] {
            let text = variant.to_string();
            let parsed = SendStatus::from_str(&text).unwrap();
            assert_eq!(parsed, variant);
        }
    }

    #[test]
    fn extract_status_default_is_empty_string() {
        assert_eq!(ExtractStatus::default().to_string(), "");
    }

    #[test]
    fn batch_max_cmd_source_not_applicable_serializes_as_n_a() {
        assert_eq!(BatchMaxCmdSource::NotApplicable.to_string(), "N/A");
    }

    #[test]
    fn unknown_send_status_text_fails_to_parse() {
        assert!(SendStatus::from_str("NOT_A_REAL_STATUS").is_err());
    }
}
