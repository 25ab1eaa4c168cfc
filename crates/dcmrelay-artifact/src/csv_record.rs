//! Per-row-type CSV (de)serialization.
//!
//! The row types in `dcmrelay_types::record` use `strum`'s `EnumString` for
//! their enum fields' on-disk text (`"SENT_OK"`, not the Rust variant name),
//! so a generic `serde_json`-mediated CSV bridge would mismatch those fields.
//! Each row type instead gets an explicit, mechanical mapping here — the
//! hand-rolled equivalent of `run_artifacts.py`'s `dict`-keyed rows.

use std::collections::HashMap;
use std::str::FromStr;

use dcmrelay_types::event::{Event, EventType};
use dcmrelay_types::record::{
    AnalysisSummaryRow, FileManifestRow, FolderManifestRow, ReconciliationRow, ReportRowA,
    ReportRowC, SendResultRow, SendSummaryRow, ValidationResultRow,
};
use dcmrelay_types::{
    BatchMaxCmdSource, ExtractStatus, ReconciliationStatus, SelectionReason, SendStatus, Toolkit,
    ValidationOutcome,
};

const EVENT_FIELDS: &[&str] = &["run_id", "event_type", "timestamp_iso", "message", "ref"];

impl CsvRecord for Event {
    fn field_names() -> &'static [&'static str] {
        EVENT_FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.event_type.to_string(),
            self.timestamp_iso.clone(),
            self.message.clone(),
            self.ref_.clone(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            event_type: parse_enum::<EventType>(values, "event_type")?,
            timestamp_iso: get(values, "timestamp_iso").to_string(),
            message: get(values, "message").to_string(),
            ref_: get(values, "ref").to_string(),
        })
    }
}

pub trait CsvRecord: Sized {
    fn field_names() -> &'static [&'static str];
    fn to_row(&self) -> Vec<String>;
    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String>;
}

fn get<'a>(values: &HashMap<&str, &'a str>, key: &str) -> &'a str {
    values.get(key).copied().unwrap_or("")
}

fn parse_u64(values: &HashMap<&str, &str>, key: &str) -> Result<u64, String> {
    let raw = get(values, key);
    raw.trim()
        .parse::<u64>()
        .map_err(|_| format!("field {key!r} is not a valid integer: {raw:?}", key = key))
}

fn parse_f64(values: &HashMap<&str, &str>, key: &str) -> Result<f64, String> {
    let raw = get(values, key);
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("field {key!r} is not a valid number: {raw:?}", key = key))
}

fn parse_bool(values: &HashMap<&str, &str>, key: &str) -> Result<bool, String> {
    match get(values, key).trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(format!("field {key!r} is not a valid boolean: {other:?}")),
    }
}

fn parse_enum<T: FromStr>(values: &HashMap<&str, &str>, key: &str) -> Result<T, String> {
    let raw = get(values, key);
    T::from_str(raw).map_err(|_| format!("field {key!r} has unrecognized value {raw:?}"))
}

impl CsvRecord for FileManifestRow {
    fn field_names() -> &'static [&'static str] {
        FileManifestRow::FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.seq.to_string(),
            self.file_path.clone(),
            self.folder_path.clone(),
            self.extension.clone(),
            self.size_bytes.to_string(),
            self.selected_for_send.to_string(),
            self.selection_reason.to_string(),
            self.dicom_status.clone(),
            self.discovered_at.clone(),
            self.timestamp_br.clone(),
            self.timestamp_iso.clone(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            seq: parse_u64(values, "seq")?,
            file_path: get(values, "file_path").to_string(),
            folder_path: get(values, "folder_path").to_string(),
            extension: get(values, "extension").to_string(),
            size_bytes: parse_u64(values, "size_bytes")?,
            selected_for_send: parse_bool(values, "selected_for_send")?,
            selection_reason: parse_enum::<SelectionReason>(values, "selection_reason")?,
            dicom_status: get(values, "dicom_status").to_string(),
            discovered_at: get(values, "discovered_at").to_string(),
            timestamp_br: get(values, "timestamp_br").to_string(),
            timestamp_iso: get(values, "timestamp_iso").to_string(),
        })
    }
}

impl CsvRecord for FolderManifestRow {
    fn field_names() -> &'static [&'static str] {
        FolderManifestRow::FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.folder_path.clone(),
            self.file_count.to_string(),
            self.size_bytes.to_string(),
            self.discovered_at.clone(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            folder_path: get(values, "folder_path").to_string(),
            file_count: parse_u64(values, "file_count")?,
            size_bytes: parse_u64(values, "size_bytes")?,
            discovered_at: get(values, "discovered_at").to_string(),
        })
    }
}

impl CsvRecord for AnalysisSummaryRow {
    fn field_names() -> &'static [&'static str] {
        AnalysisSummaryRow::FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.root_path.clone(),
            self.toolkit.to_string(),
            self.batch_size.to_string(),
            self.folders_total.to_string(),
            self.folders_selected_for_send.to_string(),
            self.files_total.to_string(),
            self.files_selected_for_send.to_string(),
            self.files_excluded.to_string(),
            self.size_total_bytes.to_string(),
            self.size_selected_bytes.to_string(),
            self.size_collection_enabled.to_string(),
            self.chunk_unit.clone(),
            self.chunks_total.to_string(),
            self.analysis_duration_sec.to_string(),
            self.batch_max_cmd.clone(),
            self.batch_max_cmd_source.to_string(),
            self.generated_at.clone(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            root_path: get(values, "root_path").to_string(),
            toolkit: parse_enum::<Toolkit>(values, "toolkit")?,
            batch_size: parse_u64(values, "batch_size")?,
            folders_total: parse_u64(values, "folders_total")?,
            folders_selected_for_send: parse_u64(values, "folders_selected_for_send")?,
            files_total: parse_u64(values, "files_total")?,
            files_selected_for_send: parse_u64(values, "files_selected_for_send")?,
            files_excluded: parse_u64(values, "files_excluded")?,
            size_total_bytes: parse_u64(values, "size_total_bytes")?,
            size_selected_bytes: parse_u64(values, "size_selected_bytes")?,
            size_collection_enabled: parse_bool(values, "size_collection_enabled")?,
            chunk_unit: get(values, "chunk_unit").to_string(),
            chunks_total: parse_u64(values, "chunks_total")?,
            analysis_duration_sec: parse_f64(values, "analysis_duration_sec")?,
            batch_max_cmd: get(values, "batch_max_cmd").to_string(),
            batch_max_cmd_source: parse_enum::<BatchMaxCmdSource>(values, "batch_max_cmd_source")?,
            generated_at: get(values, "generated_at").to_string(),
        })
    }
}

impl CsvRecord for SendResultRow {
    fn field_names() -> &'static [&'static str] {
        SendResultRow::FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.file_path.clone(),
            self.chunk_no.to_string(),
            self.toolkit.to_string(),
            self.ts_mode.clone(),
            self.send_status.to_string(),
            self.status_detail.clone(),
            self.sop_instance_uid.clone(),
            self.source_ts_uid.clone(),
            self.source_ts_name.clone(),
            self.extract_status.to_string(),
            self.processed_at.clone(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        let extract_status_raw = get(values, "extract_status");
        let extract_status = if extract_status_raw.trim().is_empty() {
            ExtractStatus::None
        } else {
            parse_enum::<ExtractStatus>(values, "extract_status")?
        };
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            file_path: get(values, "file_path").to_string(),
            chunk_no: parse_u64(values, "chunk_no")?,
            toolkit: parse_enum::<Toolkit>(values, "toolkit")?,
            ts_mode: get(values, "ts_mode").to_string(),
            send_status: parse_enum::<SendStatus>(values, "send_status")?,
            status_detail: get(values, "status_detail").to_string(),
            sop_instance_uid: get(values, "sop_instance_uid").to_string(),
            source_ts_uid: get(values, "source_ts_uid").to_string(),
            source_ts_name: get(values, "source_ts_name").to_string(),
            extract_status,
            processed_at: get(values, "processed_at").to_string(),
        })
    }
}

impl CsvRecord for SendSummaryRow {
    fn field_names() -> &'static [&'static str] {
        SendSummaryRow::FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.toolkit.to_string(),
            self.ts_mode_effective.clone(),
            self.total_items.to_string(),
            self.items_processed.to_string(),
            self.sent_ok.to_string(),
            self.warnings.to_string(),
            self.failed.to_string(),
            self.status.clone(),
            self.send_duration_sec.to_string(),
            self.finished_at.clone(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            toolkit: parse_enum::<Toolkit>(values, "toolkit")?,
            ts_mode_effective: get(values, "ts_mode_effective").to_string(),
            total_items: parse_u64(values, "total_items")?,
            items_processed: parse_u64(values, "items_processed")?,
            sent_ok: parse_u64(values, "sent_ok")?,
            warnings: parse_u64(values, "warnings")?,
            failed: parse_u64(values, "failed")?,
            status: get(values, "status").to_string(),
            send_duration_sec: parse_f64(values, "send_duration_sec")?,
            finished_at: get(values, "finished_at").to_string(),
        })
    }
}

impl CsvRecord for ValidationResultRow {
    fn field_names() -> &'static [&'static str] {
        ValidationResultRow::FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.file_path.clone(),
            self.sop_instance_uid.clone(),
            self.send_status.to_string(),
            self.validation_status.to_string(),
            self.api_found.to_string(),
            self.http_status.clone(),
            self.detail.clone(),
            self.checked_at.clone(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            file_path: get(values, "file_path").to_string(),
            sop_instance_uid: get(values, "sop_instance_uid").to_string(),
            send_status: parse_enum::<SendStatus>(values, "send_status")?,
            validation_status: parse_enum::<ValidationOutcome>(values, "validation_status")?,
            api_found: parse_bool(values, "api_found")?,
            http_status: get(values, "http_status").to_string(),
            detail: get(values, "detail").to_string(),
            checked_at: get(values, "checked_at").to_string(),
        })
    }
}

impl CsvRecord for ReconciliationRow {
    fn field_names() -> &'static [&'static str] {
        ReconciliationRow::FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.toolkit.to_string(),
            self.total_iuid_unique.to_string(),
            self.iuid_ok.to_string(),
            self.iuid_not_found.to_string(),
            self.iuid_api_error.to_string(),
            self.send_warning_files.to_string(),
            self.send_failed_files.to_string(),
            self.final_status.to_string(),
            self.validation_duration_sec.to_string(),
            self.generated_at.clone(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            toolkit: parse_enum::<Toolkit>(values, "toolkit")?,
            total_iuid_unique: parse_u64(values, "total_iuid_unique")?,
            iuid_ok: parse_u64(values, "iuid_ok")?,
            iuid_not_found: parse_u64(values, "iuid_not_found")?,
            iuid_api_error: parse_u64(values, "iuid_api_error")?,
            send_warning_files: parse_u64(values, "send_warning_files")?,
            send_failed_files: parse_u64(values, "send_failed_files")?,
            final_status: parse_enum::<ReconciliationStatus>(values, "final_status")?,
            validation_duration_sec: parse_f64(values, "validation_duration_sec")?,
            generated_at: get(values, "generated_at").to_string(),
        })
    }
}

impl CsvRecord for ReportRowA {
    fn field_names() -> &'static [&'static str] {
        ReportRowA::FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.file_path.clone(),
            self.sop_instance_uid.clone(),
            self.nome_paciente.clone(),
            self.data_nascimento.clone(),
            self.prontuario.clone(),
            self.accession_number.clone(),
            self.sexo.clone(),
            self.data_exame.clone(),
            self.descricao_exame.clone(),
            self.study_uid.clone(),
            self.status.clone(),
            self.detail.clone(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            file_path: get(values, "file_path").to_string(),
            sop_instance_uid: get(values, "sop_instance_uid").to_string(),
            nome_paciente: get(values, "nome_paciente").to_string(),
            data_nascimento: get(values, "data_nascimento").to_string(),
            prontuario: get(values, "prontuario").to_string(),
            accession_number: get(values, "accession_number").to_string(),
            sexo: get(values, "sexo").to_string(),
            data_exame: get(values, "data_exame").to_string(),
            descricao_exame: get(values, "descricao_exame").to_string(),
            study_uid: get(values, "study_uid").to_string(),
            status: get(values, "status").to_string(),
            detail: get(values, "detail").to_string(),
        })
    }
}

impl CsvRecord for ReportRowC {
    fn field_names() -> &'static [&'static str] {
        ReportRowC::FIELDS
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.run_id.clone(),
            self.study_uid.clone(),
            self.nome_paciente.clone(),
            self.data_nascimento.clone(),
            self.prontuario.clone(),
            self.accession_number.clone(),
            self.sexo.clone(),
            self.data_exame.clone(),
            self.descricao_exame.clone(),
            self.status.clone(),
            self.total_arquivos.to_string(),
        ]
    }

    fn from_row(values: &HashMap<&str, &str>) -> Result<Self, String> {
        Ok(Self {
            run_id: get(values, "run_id").to_string(),
            study_uid: get(values, "study_uid").to_string(),
            nome_paciente: get(values, "nome_paciente").to_string(),
            data_nascimento: get(values, "data_nascimento").to_string(),
            prontuario: get(values, "prontuario").to_string(),
            accession_number: get(values, "accession_number").to_string(),
            sexo: get(values, "sexo").to_string(),
            data_exame: get(values, "data_exame").to_string(),
            descricao_exame: get(values, "descricao_exame").to_string(),
            status: get(values, "status").to_string(),
            total_arquivos: parse_u64(values, "total_arquivos")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmrelay_types::SelectionReason;

    #[test]
    fn file_manifest_row_round_trips() {
        let row = FileManifestRow {
            run_id: "r1".into(),
            seq: 1,
            file_path: "/a/b.dcm".into(),
            folder_path: "/a".into(),
            extension: ".dcm".into(),
            size_bytes: 1024,
            selected_for_send: true,
            selection_reason: SelectionReason::IncludedExt,
            dicom_status: String::new(),
            discovered_at: "2026-07-28T00:00:00".into(),
            timestamp_br: "28/07/2026 00:00:00".into(),
            timestamp_iso: "2026-07-28T00:00:00".into(),
        };
        let fields = row.to_row();
        let map: HashMap<&str, &str> = FileManifestRow::field_names()
            .iter()
            .copied()
            .zip(fields.iter().map(String::as_str))
            .collect();
        let back = FileManifestRow::from_row(&map).unwrap();
        assert_eq!(back.file_path, row.file_path);
        assert_eq!(back.size_bytes, row.size_bytes);
        assert!(back.selected_for_send);
    }
}
