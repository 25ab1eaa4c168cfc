//! The Validate workflow (spec §4.8): backfill any IUID missing from
//! `send_results_by_file.csv`, then reconcile every unique IUID against the
//! archive's REST instance index. Grounded on
//! `original_source/.../workflows/validation.py::run_validation`.

pub mod error;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use dcmrelay_artifact::csv_io::{append_csv_row, read_csv_rows};
use dcmrelay_artifact::events::write_telemetry_event;
use dcmrelay_artifact::iuid_map::{apply_send_result_updates, build_iuid_map_from_send_rows, merge_iuid_map_from_legacy_file, IuidMapEntry};
use dcmrelay_artifact::layout::{cleanup_run_artifact_variants, resolve_run_artifact_path};
use dcmrelay_config::Config;
use dcmrelay_driver::driver::Driver;
use dcmrelay_rest::RestClient;
use dcmrelay_types::event::EventType;
use dcmrelay_types::record::{ReconciliationRow, SendResultRow, ValidationResultRow};
use dcmrelay_types::{ReconciliationStatus, SendStatus, ValidationOutcome};
use dcmrelay_util::clock::now_br;

pub use error::ValidateError;

/// Filenames that must be regenerated from scratch, never appended across
/// attempts (spec §11 "cleanup must still recognize legacy names").
const STALE_ON_REVALIDATE: &[&str] =
    &["validation_results.csv", "validation_by_iuid.csv", "validation_by_file.csv", "reconciliation_report.csv"];

pub struct ValidateOptions<'a> {
    pub cfg: &'a Config,
    pub driver: &'a dyn Driver,
    pub run_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct ValidateOutcome {
    pub run_id: String,
    pub run_dir: Utf8PathBuf,
    pub final_status: ReconciliationStatus,
    pub total_iuid_unique: u64,
    pub iuid_ok: u64,
    pub iuid_not_found: u64,
    pub iuid_api_error: u64,
    pub validation_duration_sec: f64,
}

/// Run the Validate workflow against `opts.run_id`'s already-sent files.
pub async fn run_validation(
    opts: &ValidateOptions<'_>,
    runs_base: &Utf8Path,
    cancelled: &AtomicBool,
    mut progress: impl FnMut(&str),
) -> Result<ValidateOutcome, ValidateError> {
    let start = Instant::now();
    let run_id = opts.run_id;
    let run_dir = runs_base.join(run_id);
    if !run_dir.is_dir() {
        return Err(ValidateError::RunNotFound(run_dir));
    }

    let send_results_path = resolve_run_artifact_path(&run_dir, "send_results_by_file.csv", true)
        .map_err(artifact_io_err(&run_dir))?;
    if !send_results_path.exists() {
        return Err(ValidateError::SendResultsMissing(send_results_path));
    }
    let legacy_iuid_map_path = resolve_run_artifact_path(&run_dir, "file_iuid_map.csv", false)
        .map_err(artifact_io_err(&run_dir))?;
    for filename in STALE_ON_REVALIDATE {
        cleanup_run_artifact_variants(&run_dir, filename).map_err(artifact_io_err(&run_dir))?;
    }
    let events_path = resolve_run_artifact_path(&run_dir, "events.csv", true).map_err(artifact_io_err(&run_dir))?;
    let validation_results_path =
        resolve_run_artifact_path(&run_dir, "validation_results.csv", true).map_err(artifact_io_err(&run_dir))?;
    let recon_path = resolve_run_artifact_path(&run_dir, "reconciliation_report.csv", true).map_err(artifact_io_err(&run_dir))?;

    let send_rows: Vec<SendResultRow> =
        read_csv_rows(&send_results_path)?.into_iter().filter(|r| r.run_id == run_id).collect();
    let mut map_by_file = build_iuid_map_from_send_rows(&send_rows);
    merge_iuid_map_from_legacy_file(&mut map_by_file, &legacy_iuid_map_path)?;

    let total_send_rows = send_rows.len() as u64;
    let sent_ok_rows: Vec<&SendResultRow> = send_rows.iter().filter(|r| r.send_status == SendStatus::SentOk).collect();
    let send_ok_files = sent_ok_rows.len() as u64;
    let send_warn_files = send_rows
        .iter()
        .filter(|r| matches!(r.send_status, SendStatus::NonDicom | SendStatus::UnsupportedDicomObject | SendStatus::SentUnknown))
        .count() as u64;
    let send_fail_files = send_rows.iter().filter(|r| r.send_status == SendStatus::SendFail).count() as u64;

    write_telemetry_event(
        &events_path,
        run_id,
        EventType::ValidationStart,
        format!(
            "send_rows={total_send_rows};sent_ok={send_ok_files};send_warn={send_warn_files};\
             send_fail={send_fail_files};mapped_iuid={}",
            map_by_file.len()
        ),
        "",
    )?;
    progress(&format!("progresso validacao: iniciando | sent_ok={send_ok_files}"));

    // Consistency pass: extract any IUID missing for a SENT_OK file before
    // ever calling the archive.
    let mut updates_by_file: HashMap<String, IuidMapEntry> = HashMap::new();
    for row in &sent_ok_rows {
        let fp = row.file_path.trim();
        if fp.is_empty() || map_by_file.contains_key(fp) {
            continue;
        }
        let meta = opts.driver.extract_metadata(Utf8Path::new(fp));
        if meta.is_ok() {
            let entry = IuidMapEntry {
                sop_instance_uid: meta.sop_instance_uid.clone(),
                source_ts_uid: meta.source_ts_uid.clone(),
                source_ts_name: meta.source_ts_name.clone(),
                extract_status: "CONSISTENCY_OK".to_string(),
            };
            map_by_file.insert(fp.to_string(), entry.clone());
            updates_by_file.insert(fp.to_string(), entry);
            write_telemetry_event(&events_path, run_id, EventType::ConsistencyFilled, "iuid filled before validation", format!("file_path={fp}"))?;
        } else {
            write_telemetry_event(
                &events_path,
                run_id,
                EventType::ConsistencyMissing,
                if meta.error.is_empty() { "could not extract iuid".to_string() } else { meta.error.clone() },
                format!("file_path={fp}"),
            )?;
        }
    }
    apply_send_result_updates(&send_results_path, run_id, &updates_by_file)?;

    let mut iuid_to_files: HashMap<String, Vec<String>> = HashMap::new();
    for row in &sent_ok_rows {
        let fp = row.file_path.trim();
        let Some(entry) = map_by_file.get(fp) else { continue };
        if entry.sop_instance_uid.is_empty() {
            continue;
        }
        iuid_to_files.entry(entry.sop_instance_uid.clone()).or_default().push(fp.to_string());
    }

    let rest_client = RestClient::new()?;
    let mut ok_count = 0u64;
    let mut miss_count = 0u64;
    let mut api_err_count = 0u64;
    let mut checked = 0u64;
    let total_iuids = iuid_to_files.len() as u64;

    let mut iuids: Vec<&String> = iuid_to_files.keys().collect();
    iuids.sort();
    for iuid in iuids {
        if cancelled.load(Ordering::SeqCst) {
            return Err(ValidateError::Cancelled);
        }
        let files = &iuid_to_files[iuid];
        let query = rest_client.query_instance(&opts.cfg.pacs_rest_host, &opts.cfg.aet_dest, iuid).await;
        match query.outcome {
            ValidationOutcome::Ok => ok_count += 1,
            ValidationOutcome::ApiError => api_err_count += 1,
            ValidationOutcome::NotFound => miss_count += 1,
        }

        for fp in files {
            append_csv_row(
                &validation_results_path,
                &ValidationResultRow {
                    run_id: run_id.to_string(),
                    file_path: fp.clone(),
                    sop_instance_uid: iuid.clone(),
                    send_status: SendStatus::SentOk,
                    validation_status: query.outcome,
                    api_found: query.api_found(),
                    http_status: query.http_status.clone(),
                    detail: query.detail.clone(),
                    checked_at: now_br(),
                },
            )?;
        }

        checked += 1;
        if checked % 100 == 0 {
            progress(&format!("progresso validacao: {checked}/{total_iuids} iuids consultados"));
        }
    }

    let final_status = if api_err_count > 0 && ok_count == 0 {
        ReconciliationStatus::Fail
    } else if send_fail_files > 0 || api_err_count > 0 || miss_count > 0 {
        ReconciliationStatus::PassWithWarnings
    } else {
        ReconciliationStatus::Pass
    };
    let validation_duration_sec = start.elapsed().as_secs_f64();

    append_csv_row(
        &recon_path,
        &ReconciliationRow {
            run_id: run_id.to_string(),
            toolkit: opts.cfg.toolkit,
            total_iuid_unique: total_iuids,
            iuid_ok: ok_count,
            iuid_not_found: miss_count,
            iuid_api_error: api_err_count,
            send_warning_files: send_warn_files,
            send_failed_files: send_fail_files,
            final_status,
            validation_duration_sec,
            generated_at: now_br(),
        },
    )?;

    write_telemetry_event(
        &events_path,
        run_id,
        EventType::ValidationEnd,
        format!(
            "status={final_status};iuid_total={total_iuids};iuid_ok={ok_count};\
             iuid_not_found={miss_count};iuid_api_error={api_err_count};validation_duration_sec={validation_duration_sec}"
        ),
        "",
    )?;
    progress(&format!("progresso validacao: concluido | status={final_status}"));

    Ok(ValidateOutcome {
        run_id: run_id.to_string(),
        run_dir,
        final_status,
        total_iuid_unique: total_iuids,
        iuid_ok: ok_count,
        iuid_not_found: miss_count,
        iuid_api_error: api_err_count,
        validation_duration_sec,
    })
}

fn artifact_io_err(run_dir: &Utf8Path) -> impl Fn(std::io::Error) -> ValidateError + '_ {
    move |source| ValidateError::Artifact(dcmrelay_artifact::ArtifactError::Write { path: run_dir.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmrelay_types::{ExtractStatus, Toolkit};

    fn send_row(send_status: SendStatus) -> SendResultRow {
        SendResultRow {
            run_id: "r1".into(),
            file_path: "/a.dcm".into(),
            chunk_no: 1,
            toolkit: Toolkit::ToolT,
            ts_mode: "AUTO".into(),
            send_status,
            status_detail: String::new(),
            sop_instance_uid: "1.2.3".into(),
            source_ts_uid: String::new(),
            source_ts_name: String::new(),
            extract_status: ExtractStatus::Ok,
            processed_at: "2026-07-28T00:00:00".into(),
        }
    }

    #[test]
    fn counts_exclude_sent_ok_from_warnings_and_failures() {
        let rows = [send_row(SendStatus::SentOk), send_row(SendStatus::SendFail), send_row(SendStatus::NonDicom)];
        let warn = rows
            .iter()
            .filter(|r| matches!(r.send_status, SendStatus::NonDicom | SendStatus::UnsupportedDicomObject | SendStatus::SentUnknown))
            .count();
        let fail = rows.iter().filter(|r| r.send_status == SendStatus::SendFail).count();
        assert_eq!(warn, 1);
        assert_eq!(fail, 1);
    }
}
