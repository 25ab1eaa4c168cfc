//! The Report Exporter (spec §4.8/§4.9): per-file (mode A) or per-study
//! (mode C) CSV export of already-sent files' archive metadata. Grounded on
//! `original_source/.../workflows/validation.py::export_complete_report`.

pub mod error;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use dcmrelay_artifact::csv_io::{read_csv_rows, write_csv_table};
use dcmrelay_artifact::iuid_map::{apply_send_result_updates, build_iuid_map_from_send_rows, merge_iuid_map_from_legacy_file, IuidMapEntry};
use dcmrelay_artifact::layout::resolve_run_artifact_path_with_legacy;
use dcmrelay_config::Config;
use dcmrelay_driver::driver::Driver;
use dcmrelay_rest::{RestClient, ReportFields};
use dcmrelay_types::record::{ReportRowA, ReportRowC, SendResultRow};
use dcmrelay_types::{ReportMode, SendStatus};

pub use error::ReportError;

const STATUS_OK: &str = "OK";
const STATUS_ERR: &str = "ERRO";

pub struct ReportOptions<'a> {
    pub cfg: &'a Config,
    pub driver: &'a dyn Driver,
    pub run_id: &'a str,
    pub mode: ReportMode,
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub run_id: String,
    pub report_file: Utf8PathBuf,
    pub rows: u64,
    pub ok: u64,
    pub erro: u64,
}

/// One fully-resolved archive-backed field set plus status, keyed by IUID.
struct IuidLookup {
    fields: ReportFields,
    status: &'static str,
    detail: String,
}

/// Run the report export for `opts.run_id` against already-sent files.
pub async fn export_report(
    opts: &ReportOptions<'_>,
    runs_base: &Utf8Path,
    cancelled: &AtomicBool,
    mut progress: impl FnMut(&str),
) -> Result<ReportOutcome, ReportError> {
    let run_id = opts.run_id;
    let run_dir = runs_base.join(run_id);
    if !run_dir.is_dir() {
        return Err(ReportError::RunNotFound(run_dir));
    }

    let send_results_path = resolve_run_artifact_path_with_legacy(&run_dir, "send_results_by_file.csv", true, true)
        .map_err(artifact_io_err(&run_dir))?;
    if !send_results_path.exists() {
        return Err(ReportError::SendResultsMissing(send_results_path));
    }
    let legacy_iuid_map_path = resolve_run_artifact_path_with_legacy(&run_dir, "file_iuid_map.csv", false, true)
        .map_err(artifact_io_err(&run_dir))?;

    let send_rows: Vec<SendResultRow> =
        read_csv_rows(&send_results_path)?.into_iter().filter(|r| r.run_id == run_id).collect();
    let mut map_by_file = build_iuid_map_from_send_rows(&send_rows);
    merge_iuid_map_from_legacy_file(&mut map_by_file, &legacy_iuid_map_path)?;

    let sent_ok_rows: Vec<&SendResultRow> = send_rows.iter().filter(|r| r.send_status == SendStatus::SentOk).collect();
    if sent_ok_rows.is_empty() {
        return Err(ReportError::NothingToExport);
    }

    let mut updates_by_file: HashMap<String, IuidMapEntry> = HashMap::new();
    let mut report_records: Vec<(String, String)> = Vec::new();
    for row in &sent_ok_rows {
        let fp = row.file_path.trim();
        if fp.is_empty() {
            continue;
        }
        let iuid = map_by_file.get(fp).map(|e| e.sop_instance_uid.clone()).unwrap_or_default();
        let iuid = if iuid.is_empty() {
            let meta = opts.driver.extract_metadata(Utf8Path::new(fp));
            if meta.is_ok() {
                let entry = IuidMapEntry {
                    sop_instance_uid: meta.sop_instance_uid.clone(),
                    source_ts_uid: meta.source_ts_uid.clone(),
                    source_ts_name: meta.source_ts_name.clone(),
                    extract_status: "REPORT_EXPORT_OK".to_string(),
                };
                map_by_file.insert(fp.to_string(), entry.clone());
                updates_by_file.insert(fp.to_string(), entry);
                meta.sop_instance_uid
            } else {
                progress(&format!("IUID ausente para arquivo no relatorio: {fp}"));
                String::new()
            }
        } else {
            iuid
        };
        report_records.push((fp.to_string(), iuid));
    }
    apply_send_result_updates(&send_results_path, run_id, &updates_by_file)?;

    let mut unique_iuids: Vec<String> =
        report_records.iter().map(|(_, iuid)| iuid.clone()).filter(|i| !i.is_empty()).collect();
    unique_iuids.sort();
    unique_iuids.dedup();
    progress(&format!("IUIDs unicos para consulta: {}", unique_iuids.len()));

    let rest_client = RestClient::new()?;
    let mut iuid_data: HashMap<String, IuidLookup> = HashMap::new();
    let mut checked = 0u64;
    for iuid in &unique_iuids {
        if cancelled.load(Ordering::SeqCst) {
            return Err(ReportError::Cancelled);
        }
        let query = rest_client.query_instance(&opts.cfg.pacs_rest_host, &opts.cfg.aet_dest, iuid).await;
        let status = if query.api_found() { STATUS_OK } else { STATUS_ERR };
        let detail = query.detail.clone();
        iuid_data.insert(iuid.clone(), IuidLookup { fields: ReportFields::from_dataset(&query.dataset), status, detail });
        checked += 1;
        if checked % 100 == 0 {
            progress(&format!("progresso relatorio: {checked}/{} iuids consultados", unique_iuids.len()));
        }
    }

    let rows_a: Vec<ReportRowA> = report_records
        .into_iter()
        .map(|(file_path, sop_instance_uid)| {
            let (fields, status, query_detail) = match iuid_data.get(&sop_instance_uid) {
                Some(lookup) => (lookup.fields.clone(), lookup.status.to_string(), lookup.detail.clone()),
                None => (ReportFields::default(), STATUS_ERR.to_string(), String::new()),
            };
            let detail = if sop_instance_uid.is_empty() { "IUID ausente".to_string() } else { query_detail };
            ReportRowA {
                run_id: run_id.to_string(),
                file_path,
                sop_instance_uid,
                nome_paciente: fields.patient_name,
                data_nascimento: fields.birth_date,
                prontuario: fields.patient_id,
                accession_number: fields.accession_number,
                sexo: fields.sex,
                data_exame: fields.study_date,
                descricao_exame: fields.study_description,
                study_uid: fields.study_uid,
                status,
                detail,
            }
        })
        .collect();

    match opts.mode {
        ReportMode::PerFile => {
            let report_file = resolve_run_artifact_path_with_legacy(&run_dir, "validation_full_report_A.csv", true, false)
                .map_err(artifact_io_err(&run_dir))?;
            write_csv_table(&report_file, &rows_a)?;
            let ok = rows_a.iter().filter(|r| r.status == STATUS_OK).count() as u64;
            let erro = rows_a.len() as u64 - ok;
            progress(&format!("relatorio A exportado: {report_file} | linhas={} ok={ok} erro={erro}", rows_a.len()));
            Ok(ReportOutcome { run_id: run_id.to_string(), report_file, rows: rows_a.len() as u64, ok, erro })
        }
        ReportMode::PerStudy => {
            let rows_c = aggregate_per_study(run_id, &rows_a);
            let report_file = resolve_run_artifact_path_with_legacy(&run_dir, "validation_full_report_C.csv", true, false)
                .map_err(artifact_io_err(&run_dir))?;
            write_csv_table(&report_file, &rows_c)?;
            let ok = rows_c.iter().filter(|r| r.status == STATUS_OK).count() as u64;
            let erro = rows_c.len() as u64 - ok;
            progress(&format!("relatorio C exportado: {report_file} | linhas={} ok={ok} erro={erro}", rows_c.len()));
            Ok(ReportOutcome { run_id: run_id.to_string(), report_file, rows: rows_c.len() as u64, ok, erro })
        }
    }
}

/// Group per-file rows by `study_uid`, falling back to a per-record key when
/// `study_uid` is empty so files that never resolved a study still surface
/// one aggregate row each (spec §4.9, grounded on `export_complete_report`'s
/// `__ERRO__` fallback key).
fn aggregate_per_study(run_id: &str, rows_a: &[ReportRowA]) -> Vec<ReportRowC> {
    let mut grouped: BTreeMap<String, ReportRowC> = BTreeMap::new();
    for row in rows_a {
        let study_uid = row.study_uid.trim();
        let key = if study_uid.is_empty() {
            format!("__ERRO__{}", if !row.sop_instance_uid.is_empty() { &row.sop_instance_uid } else { &row.file_path })
        } else {
            study_uid.to_string()
        };
        let agg = grouped.entry(key).or_insert_with(|| ReportRowC {
            run_id: run_id.to_string(),
            study_uid: study_uid.to_string(),
            nome_paciente: String::new(),
            data_nascimento: String::new(),
            prontuario: String::new(),
            accession_number: String::new(),
            sexo: String::new(),
            data_exame: String::new(),
            descricao_exame: String::new(),
            status: STATUS_OK.to_string(),
            total_arquivos: 0,
        });
        agg.total_arquivos += 1;
        if agg.nome_paciente.is_empty() {
            agg.nome_paciente = row.nome_paciente.clone();
        }
        if agg.data_nascimento.is_empty() {
            agg.data_nascimento = row.data_nascimento.clone();
        }
        if agg.prontuario.is_empty() {
            agg.prontuario = row.prontuario.clone();
        }
        if agg.accession_number.is_empty() {
            agg.accession_number = row.accession_number.clone();
        }
        if agg.sexo.is_empty() {
            agg.sexo = row.sexo.clone();
        }
        if agg.data_exame.is_empty() {
            agg.data_exame = row.data_exame.clone();
        }
        if agg.descricao_exame.is_empty() {
            agg.descricao_exame = row.descricao_exame.clone();
        }
        if agg.study_uid.is_empty() {
            agg.study_uid = study_uid.to_string();
        }
        if row.status == STATUS_ERR {
            agg.status = STATUS_ERR.to_string();
        }
    }
    grouped.into_values().collect()
}

fn artifact_io_err(run_dir: &Utf8Path) -> impl Fn(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Artifact(dcmrelay_artifact::ArtifactError::Write { path: run_dir.to_path_buf(), source })
}
