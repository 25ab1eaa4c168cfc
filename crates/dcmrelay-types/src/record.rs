//! Row/record structs for every CSV and JSON artifact a run produces.
//!
//! Field order in each struct's `FIELDS` constant is the on-disk column
//! order and must not be reordered without bumping the artifact's schema
//! (the writer in `dcmrelay-artifact` treats `FIELDS` as authoritative).

use serde::{Deserialize, Serialize};

use crate::{BatchMaxCmdSource, ExtractStatus, SelectionReason, SendStatus, Toolkit};

/// One row of `core/manifest_files.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileManifestRow {
    pub run_id: String,
    pub seq: u64,
    pub file_path: String,
    pub folder_path: String,
    pub extension: String,
    pub size_bytes: u64,
    pub selected_for_send: bool,
    pub selection_reason: SelectionReason,
    pub dicom_status: String,
    pub discovered_at: String,
    pub timestamp_br: String,
    pub timestamp_iso: String,
}

impl FileManifestRow {
    pub const FIELDS: &'static [&'static str] = &[
        "run_id",
        "seq",
        "file_path",
        "folder_path",
        "extension",
        "size_bytes",
        "selected_for_send",
        "selection_reason",
        "dicom_status",
        "discovered_at",
        "timestamp_br",
        "timestamp_iso",
    ];
}

/// One row of `core/manifest_folders.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderManifestRow {
    pub run_id: String,
    pub folder_path: String,
    pub file_count: u64,
    pub size_bytes: u64,
    pub discovered_at: String,
}

impl FolderManifestRow {
    pub const FIELDS: &'static [&'static str] =
        &["run_id", "folder_path", "file_count", "size_bytes", "discovered_at"];
}

/// The single row of `core/analysis_summary.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummaryRow {
    pub run_id: String,
    pub root_path: String,
    pub toolkit: Toolkit,
    pub batch_size: u64,
    pub folders_total: u64,
    pub folders_selected_for_send: u64,
    pub files_total: u64,
    pub files_selected_for_send: u64,
    pub files_excluded: u64,
    pub size_total_bytes: u64,
    pub size_selected_bytes: u64,
    pub size_collection_enabled: bool,
    pub chunk_unit: String,
    pub chunks_total: u64,
    pub analysis_duration_sec: f64,
    pub batch_max_cmd: String,
    pub batch_max_cmd_source: BatchMaxCmdSource,
    pub generated_at: String,
}

impl AnalysisSummaryRow {
    pub const FIELDS: &'static [&'static str] = &[
        "run_id",
        "root_path",
        "toolkit",
        "batch_size",
        "folders_total",
        "folders_selected_for_send",
        "files_total",
        "files_selected_for_send",
        "files_excluded",
        "size_total_bytes",
        "size_selected_bytes",
        "size_collection_enabled",
        "chunk_unit",
        "chunks_total",
        "analysis_duration_sec",
        "batch_max_cmd",
        "batch_max_cmd_source",
        "generated_at",
    ];
}

/// One row of `core/send_results_by_file.csv`. Patched in place (full-table
/// rewrite keyed on `run_id`+`file_path`) by Validate's consistency pass and
/// by the report exporter — see §11 "apply_send_result_updates-style
/// in-place patch".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResultRow {
    pub run_id: String,
    pub file_path: String,
    pub chunk_no: u64,
    pub toolkit: Toolkit,
    pub ts_mode: String,
    pub send_status: SendStatus,
    pub status_detail: String,
    pub sop_instance_uid: String,
    pub source_ts_uid: String,
    pub source_ts_name: String,
    pub extract_status: ExtractStatus,
    pub processed_at: String,
}

impl SendResultRow {
    pub const FIELDS: &'static [&'static str] = &[
        "run_id",
        "file_path",
        "chunk_no",
        "toolkit",
        "ts_mode",
        "send_status",
        "status_detail",
        "sop_instance_uid",
        "source_ts_uid",
        "source_ts_name",
        "extract_status",
        "processed_at",
    ];
}

/// The single row appended per attempt to `core/send_summary.csv` (the
/// latest row is the effective summary; resume reads it back to recover
/// `done_units`/`done_files` when the JSON checkpoint is missing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSummaryRow {
    pub run_id: String,
    pub toolkit: Toolkit,
    pub ts_mode_effective: String,
    pub total_items: u64,
    pub items_processed: u64,
    pub sent_ok: u64,
    pub warnings: u64,
    pub failed: u64,
    pub status: String,
    pub send_duration_sec: f64,
    pub finished_at: String,
}

impl SendSummaryRow {
    pub const FIELDS: &'static [&'static str] = &[
        "run_id",
        "toolkit",
        "ts_mode_effective",
        "total_items",
        "items_processed",
        "sent_ok",
        "warnings",
        "failed",
        "status",
        "send_duration_sec",
        "finished_at",
    ];
}

/// The JSON send checkpoint (`core/send_checkpoint_<toolkit>.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCheckpoint {
    pub done_units: u64,
    pub done_files: u64,
    pub updated_at: String,
    pub checkpoint_mode: crate::CheckpointMode,
    pub checkpoint_reason: String,
}

/// One row of `reports/validation_results.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResultRow {
    pub run_id: String,
    pub file_path: String,
    pub sop_instance_uid: String,
    pub send_status: SendStatus,
    pub validation_status: crate::ValidationOutcome,
    pub api_found: bool,
    pub http_status: String,
    pub detail: String,
    pub checked_at: String,
}

impl ValidationResultRow {
    pub const FIELDS: &'static [&'static str] = &[
        "run_id",
        "file_path",
        "sop_instance_uid",
        "send_status",
        "validation_status",
        "api_found",
        "http_status",
        "detail",
        "checked_at",
    ];
}

/// The single row of `reports/reconciliation_report.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRow {
    pub run_id: String,
    pub toolkit: Toolkit,
    pub total_iuid_unique: u64,
    pub iuid_ok: u64,
    pub iuid_not_found: u64,
    pub iuid_api_error: u64,
    pub send_warning_files: u64,
    pub send_failed_files: u64,
    pub final_status: crate::ReconciliationStatus,
    pub validation_duration_sec: f64,
    pub generated_at: String,
}

impl ReconciliationRow {
    pub const FIELDS: &'static [&'static str] = &[
        "run_id",
        "toolkit",
        "total_iuid_unique",
        "iuid_ok",
        "iuid_not_found",
        "iuid_api_error",
        "send_warning_files",
        "send_failed_files",
        "final_status",
        "validation_duration_sec",
        "generated_at",
    ];
}

/// Patient/study metadata pulled from the archive REST dataset, shared by
/// both report modes (spec §4.9 `_report_fields_from_dataset`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportDatasetFields {
    pub nome_paciente: String,
    pub data_nascimento: String,
    pub prontuario: String,
    pub accession_number: String,
    pub sexo: String,
    pub data_exame: String,
    pub descricao_exame: String,
    pub study_uid: String,
}

/// One row of `reports/validation_full_report_A.csv` (per-file export).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRowA {
    pub run_id: String,
    pub file_path: String,
    pub sop_instance_uid: String,
    pub nome_paciente: String,
    pub data_nascimento: String,
    pub prontuario: String,
    pub accession_number: String,
    pub sexo: String,
    pub data_exame: String,
    pub descricao_exame: String,
    pub study_uid: String,
    pub status: String,
    pub detail: String,
}

impl ReportRowA {
    pub const FIELDS: &'static [&'static str] = &[
        "run_id",
        "file_path",
        "sop_instance_uid",
        "nome_paciente",
        "data_nascimento",
        "prontuario",
        "accession_number",
        "sexo",
        "data_exame",
        "descricao_exame",
        "study_uid",
        "status",
        "detail",
    ];
}

/// One row of `reports/validation_full_report_C.csv` (per-study aggregate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRowC {
    pub run_id: String,
    pub study_uid: String,
    pub nome_paciente: String,
    pub data_nascimento: String,
    pub prontuario: String,
    pub accession_number: String,
    pub sexo: String,
    pub data_exame: String,
    pub descricao_exame: String,
    pub status: String,
    pub total_arquivos: u64,
}

impl ReportRowC {
    pub const FIELDS: &'static [&'static str] = &[
        "run_id",
        "study_uid",
        "nome_paciente",
        "data_nascimento",
        "prontuario",
        "accession_number",
        "sexo",
        "data_exame",
        "descricao_exame",
        "status",
        "total_arquivos",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_result_round_trips_through_json() {
        let row = SendResultRow {
            run_id: "run1".into(),
            file_path: "/data/a.dcm".into(),
            chunk_no: 1,
            toolkit: Toolkit::ToolF,
            ts_mode: "AUTO".into(),
            send_status: SendStatus::SentOk,
            status_detail: String::new(),
            sop_instance_uid: "1.2.3".into(),
            source_ts_uid: "1.2.840.10008.1.2.1".into(),
            source_ts_name: "Explicit VR Little Endian".into(),
            extract_status: ExtractStatus::OkFromStorescu,
            processed_at: "2026-07-28T00:00:00".into(),
        };
        let text = serde_json::to_string(&row).unwrap();
        let back: SendResultRow = serde_json::from_str(&text).unwrap();
        assert_eq!(back.sop_instance_uid, row.sop_instance_uid);
    }

    #[test]
    fn field_lists_match_struct_arity() {
        assert_eq!(FileManifestRow::FIELDS.len(), 12);
        assert_eq!(FolderManifestRow::FIELDS.len(), 5);
        assert_eq!(AnalysisSummaryRow::FIELDS.len(), 18);
        assert_eq!(SendResultRow::FIELDS.len(), 12);
        assert_eq!(SendSummaryRow::FIELDS.len(), 11);
        assert_eq!(ValidationResultRow::FIELDS.len(), 9);
        assert_eq!(ReconciliationRow::FIELDS.len(), 11);
        assert_eq!(ReportRowA::FIELDS.len(), 13);
        assert_eq!(ReportRowC::FIELDS.len(), 11);
    }
}
