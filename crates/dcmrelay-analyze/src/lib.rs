//! The Analyze workflow (spec §4.5): a depth-first filesystem scan that
//! selects files for send, aggregates per-folder counts, and computes the
//! dcm4che batch-size ceiling. Grounded on `workflows/analyze.py`.

pub mod batch;
pub mod error;

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use dcmrelay_artifact::csv_io::append_csv_row;
use dcmrelay_artifact::events::write_telemetry_event;
use dcmrelay_artifact::layout::{cleanup_run_artifact_variants, resolve_run_artifact_path};
use dcmrelay_config::Config;
use dcmrelay_driver::cmdlen::windows_cmdline_len;
use dcmrelay_types::event::EventType;
use dcmrelay_types::record::{AnalysisSummaryRow, FileManifestRow, FolderManifestRow};
use dcmrelay_types::{BatchMaxCmdSource, SelectionReason, Toolkit, ToolFSendMode};
use dcmrelay_util::clock::{format_eta, normalize_run_id, now_br, now_dual_timestamp};

pub use batch::{DestinationAddress, estimate_dcm4che_batch_max_cmd};
pub use error::AnalyzeError;

const PROGRESS_INTERVAL_SEC: f64 = 2.0;
const MANIFEST_BUFFER_ROWS: usize = 2000;
const SCAN_ERROR_LOG_LIMIT: u32 = 5;

/// Per-invocation options for [`run_analysis`], carrying both the `Config`
/// fields Analyze consults and the CLI-only inputs (`exam_root`, the
/// effective `batch_size`, and an optional caller-supplied `run_id`).
pub struct AnalyzeOptions<'a> {
    pub cfg: &'a Config,
    pub exam_root: &'a Utf8Path,
    pub batch_size: u64,
    pub run_id: Option<&'a str>,
    /// `<base>/toolkits/dcm4che-*/bin`, if already located — only consulted
    /// to render a realistic base-command length for the batch ceiling.
    pub dcm4che_bin_dir: Option<&'a Utf8Path>,
}

/// Result of a completed analysis pass (spec §4.5's returned summary dict).
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub run_id: String,
    pub run_dir: Utf8PathBuf,
    pub chunks_total: u64,
    pub chunk_unit: &'static str,
    pub files_total: u64,
    pub files_selected: u64,
    pub folders_total: u64,
    pub folders_selected: u64,
    pub size_total_bytes: u64,
    pub size_selected_bytes: u64,
    pub analysis_duration_sec: f64,
    pub batch_max_cmd: String,
    pub batch_max_cmd_source: BatchMaxCmdSource,
}

#[derive(Default)]
struct FolderAgg {
    count: u64,
    bytes: u64,
}

/// Run the depth-first scan + selection + aggregation pass, writing
/// `manifest_files.csv`, `manifest_folders.csv`, `analysis_summary.csv`, and
/// `events.csv` under `runs_base/<run_id>`.
pub fn run_analysis(
    opts: &AnalyzeOptions<'_>,
    runs_base: &Utf8Path,
    cancelled: &AtomicBool,
    mut progress: impl FnMut(&str),
) -> Result<AnalyzeOutcome, AnalyzeError> {
    let analysis_start = Instant::now();
    let cfg = opts.cfg;

    std::fs::create_dir_all(runs_base.as_std_path()).map_err(|source| AnalyzeError::Io {
        path: runs_base.to_path_buf(),
        source,
    })?;

    let folder_mode = cfg.toolkit == Toolkit::ToolF && cfg.toolf_send_mode == ToolFSendMode::Folders;
    let run = normalize_run_id(opts.run_id.unwrap_or_default(), cfg.toolkit, folder_mode);
    let run_dir = runs_base.join(&run);
    std::fs::create_dir_all(run_dir.as_std_path()).map_err(|source| AnalyzeError::Io {
        path: run_dir.clone(),
        source,
    })?;
    tracing::info!(run_id = %run, "run layout: core|telemetry|reports");

    let root = opts.exam_root.canonicalize_utf8().unwrap_or_else(|_| opts.exam_root.to_path_buf());
    if !root.exists() {
        return Err(AnalyzeError::RootNotFound { path: root });
    }
    if opts.batch_size < 1 {
        return Err(AnalyzeError::InvalidBatchSize);
    }

    for filename in ["manifest_folders.csv", "manifest_files.csv", "analysis_summary.csv", "events.csv"] {
        cleanup_run_artifact_variants(&run_dir, filename).map_err(|source| AnalyzeError::Io {
            path: run_dir.clone(),
            source,
        })?;
    }
    for legacy_name in ["analysis_events.csv", "send_events.csv", "send_errors.csv", "consistency_events.csv"] {
        cleanup_run_artifact_variants(&run_dir, legacy_name).map_err(|source| AnalyzeError::Io {
            path: run_dir.clone(),
            source,
        })?;
    }

    let manifest_files = resolve_run_artifact_path(&run_dir, "manifest_files.csv", true)?;
    let manifest_folders = resolve_run_artifact_path(&run_dir, "manifest_folders.csv", true)?;
    let summary_path = resolve_run_artifact_path(&run_dir, "analysis_summary.csv", true)?;
    let events_path = resolve_run_artifact_path(&run_dir, "events.csv", true)?;

    let allowed_ext = cfg.allowed_extensions_set();
    let include_no_ext = cfg.include_no_extension;
    // Open Question decision #2: ToolF folder mode always selects everything,
    // regardless of `include_no_extension`/`restrict_extensions`.
    let restrict_extensions = cfg.restrict_extensions && !folder_mode;

    tracing::info!(run_id = %run, toolkit = %cfg.toolkit, folder_mode, "analysis starting");
    progress("progresso analise: preparando varredura...");

    let mut folder_agg: BTreeMap<String, FolderAgg> = BTreeMap::new();
    let mut total_files = 0u64;
    let mut total_bytes = 0u64;
    let mut selected_files = 0u64;
    let mut selected_bytes = 0u64;
    let mut excluded_files = 0u64;
    let mut selected_folder_keys: HashSet<String> = HashSet::new();
    let mut selected_file_arg_len_max = 0usize;
    let mut seq = 0u64;
    let mut scan_errors = 0u32;

    let mut row_buffer: Vec<FileManifestRow> = Vec::with_capacity(MANIFEST_BUFFER_ROWS);
    let flush = |buf: &mut Vec<FileManifestRow>| -> Result<(), AnalyzeError> {
        for row in buf.drain(..) {
            append_csv_row(&manifest_files, &row)?;
        }
        Ok(())
    };

    let start = Instant::now();
    let mut last_progress = start;
    let mut dirs_processed = 0u64;
    let mut dir_stack: Vec<Utf8PathBuf> = vec![root.clone()];

    while let Some(folder) = dir_stack.pop() {
        if cancelled.load(Ordering::SeqCst) {
            flush(&mut row_buffer)?;
            write_telemetry_event(
                &events_path,
                &run,
                EventType::AnalysisCancelled,
                "Analise cancelada pelo usuario.",
                format!("files_scanned={total_files};dirs_processed={dirs_processed}"),
            )?;
            return Err(AnalyzeError::Cancelled);
        }

        dirs_processed += 1;
        let folder_key = folder.to_string();

        match std::fs::read_dir(folder.as_std_path()) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let file_type = match entry.file_type() {
                        Ok(ft) => ft,
                        Err(_) => continue,
                    };
                    if file_type.is_dir() {
                        if let Ok(utf8) = Utf8PathBuf::from_path_buf(path) {
                            dir_stack.push(utf8);
                        }
                        continue;
                    }
                    if !file_type.is_file() {
                        continue;
                    }
                    let Ok(entry_path) = Utf8PathBuf::from_path_buf(path) else {
                        continue;
                    };

                    seq += 1;
                    let size_actual = entry.metadata().map(|m| m.len()).unwrap_or(0);
                    let size = if cfg.collect_size_bytes { size_actual } else { 0 };

                    let ext = entry_path
                        .extension()
                        .map(|e| format!(".{}", e.to_lowercase()))
                        .unwrap_or_default();
                    let no_ext = ext.is_empty();

                    let (include, reason) = if restrict_extensions {
                        if allowed_ext.contains(&ext) {
                            (true, SelectionReason::IncludedExt)
                        } else if no_ext && include_no_ext {
                            (true, SelectionReason::IncludedNoExt)
                        } else {
                            (false, SelectionReason::ExcludedExtension)
                        }
                    } else {
                        (true, SelectionReason::IncludedAllFiles)
                    };

                    if include {
                        selected_files += 1;
                        selected_bytes += size_actual;
                        selected_folder_keys.insert(folder_key.clone());
                        if cfg.toolkit == Toolkit::ToolF && !folder_mode {
                            let len = windows_cmdline_len(&[entry_path.to_string()]);
                            selected_file_arg_len_max = selected_file_arg_len_max.max(len);
                        }
                    } else {
                        excluded_files += 1;
                    }

                    total_files += 1;
                    total_bytes += size_actual;
                    let agg = folder_agg.entry(folder_key.clone()).or_default();
                    agg.count += 1;
                    agg.bytes += size_actual;

                    let (ts_br, ts_iso) = now_dual_timestamp();
                    row_buffer.push(FileManifestRow {
                        run_id: run.clone(),
                        seq,
                        file_path: entry_path.to_string(),
                        folder_path: folder_key.clone(),
                        extension: ext,
                        size_bytes: size,
                        selected_for_send: include,
                        selection_reason: reason,
                        dicom_status: "UNKNOWN".to_string(),
                        discovered_at: ts_br.clone(),
                        timestamp_br: ts_br,
                        timestamp_iso: ts_iso,
                    });
                    if row_buffer.len() >= MANIFEST_BUFFER_ROWS {
                        flush(&mut row_buffer)?;
                    }
                }
            }
            Err(e) => {
                scan_errors += 1;
                if scan_errors <= SCAN_ERROR_LOG_LIMIT {
                    tracing::warn!(folder = %folder, error = %e, "failed to scan directory");
                }
            }
        }

        let now = Instant::now();
        if now.duration_since(last_progress).as_secs_f64() >= PROGRESS_INTERVAL_SEC {
            flush(&mut row_buffer)?;
            let elapsed = now.duration_since(start).as_secs_f64().max(0.001);
            let rate_files = total_files as f64 / elapsed;
            let avg_files_per_dir = total_files as f64 / dirs_processed.max(1) as f64;
            let est_total_files = total_files + (dir_stack.len() as f64 * avg_files_per_dir) as u64;
            let remaining_files = est_total_files.saturating_sub(total_files);
            let eta = if rate_files > 0.0 { Some(remaining_files as f64 / rate_files) } else { None };
            progress(&format!(
                "progresso analise: dirs={dirs_processed} pendentes={} arquivos={total_files} \
                 selecionados={selected_files} taxa={rate_files:.1} arq/s eta~{}",
                dir_stack.len(),
                format_eta(eta)
            ));
            last_progress = now;
        }
    }
    flush(&mut row_buffer)?;

    for (folder_path, agg) in &folder_agg {
        append_csv_row(
            &manifest_folders,
            &FolderManifestRow {
                run_id: run.clone(),
                folder_path: folder_path.clone(),
                file_count: agg.count,
                size_bytes: agg.bytes,
                discovered_at: now_br(),
            },
        )?;
    }

    let chunk_unit: &'static str = if folder_mode { "pastas" } else { "arquivos" };
    let selected_folder_count = selected_folder_keys.len() as u64;
    let chunk_base_count = if folder_mode { selected_folder_count } else { selected_files };
    let chunks_total = if chunk_base_count == 0 { 0 } else { chunk_base_count.div_ceil(opts.batch_size) };
    let analysis_duration_sec = analysis_start.elapsed().as_secs_f64().max(0.0);

    let (batch_max_cmd_value, batch_max_cmd_source) = if cfg.toolkit == Toolkit::ToolF {
        let unit_max_arg_len = if folder_mode {
            selected_folder_keys
                .iter()
                .map(|key| windows_cmdline_len(&[key.clone()]))
                .max()
                .unwrap_or(0)
        } else {
            selected_file_arg_len_max
        };
        let dest = DestinationAddress {
            aet_dest: &cfg.aet_dest,
            pacs_host: &cfg.pacs_host,
            pacs_port: cfg.pacs_port,
        };
        let (value, source, budget) = estimate_dcm4che_batch_max_cmd(
            unit_max_arg_len,
            chunk_base_count,
            cfg.toolf_use_shell_wrapper,
            cfg.toolf_prefer_java_direct,
            opts.dcm4che_bin_dir,
            &dest,
        );
        tracing::info!(
            source = %source,
            limit = value,
            units_total = chunk_base_count,
            unit_max_arg_len,
            budget,
            "batch ceiling computed"
        );
        (value.to_string(), source)
    } else {
        tracing::info!("batch ceiling not applicable for toolT");
        (String::new(), BatchMaxCmdSource::NotApplicable)
    };

    append_csv_row(
        &summary_path,
        &AnalysisSummaryRow {
            run_id: run.clone(),
            root_path: root.to_string(),
            toolkit: cfg.toolkit,
            batch_size: opts.batch_size,
            folders_total: folder_agg.len() as u64,
            folders_selected_for_send: selected_folder_count,
            files_total: total_files,
            files_selected_for_send: selected_files,
            files_excluded: excluded_files,
            size_total_bytes: total_bytes,
            size_selected_bytes: selected_bytes,
            size_collection_enabled: cfg.collect_size_bytes,
            chunk_unit: chunk_unit.to_string(),
            chunks_total,
            analysis_duration_sec,
            batch_max_cmd: batch_max_cmd_value.clone(),
            batch_max_cmd_source,
            generated_at: now_br(),
        },
    )?;

    write_telemetry_event(
        &events_path,
        &run,
        EventType::AnalysisEnd,
        "Analise concluida.",
        format!(
            "files_total={total_files};selected_files={selected_files};selected_folders={selected_folder_count};\
             chunks={chunks_total};chunk_unit={chunk_unit};scan_errors={scan_errors};\
             collect_size_bytes={};batch_max_cmd={};batch_max_cmd_source={batch_max_cmd_source};\
             analysis_duration_sec={analysis_duration_sec:.3}",
            cfg.collect_size_bytes as u8,
            if batch_max_cmd_value.is_empty() { "N/A" } else { &batch_max_cmd_value },
        ),
    )?;

    tracing::info!(run_id = %run, status = "PASS", "analysis complete");
    progress(&format!(
        "progresso analise: concluido | arquivos={total_files} selecionados={selected_files} chunks={chunks_total}"
    ));

    Ok(AnalyzeOutcome {
        run_id: run,
        run_dir,
        chunks_total,
        chunk_unit,
        files_total: total_files,
        files_selected: selected_files,
        folders_total: folder_agg.len() as u64,
        folders_selected: selected_folder_count,
        size_total_bytes: total_bytes,
        size_selected_bytes: selected_bytes,
        analysis_duration_sec,
        batch_max_cmd: batch_max_cmd_value,
        batch_max_cmd_source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tempfile::tempdir;

    fn make_tree(base: &Utf8Path) {
        std::fs::create_dir_all(base.join("sub").as_std_path()).unwrap();
        std::fs::write(base.join("a.dcm").as_std_path(), b"x").unwrap();
        std::fs::write(base.join("sub").join("b.txt").as_std_path(), b"y").unwrap();
        std::fs::write(base.join("sub").join("c.dcm").as_std_path(), b"zz").unwrap();
    }

    #[test]
    fn scan_selects_by_extension_and_writes_manifests() {
        let exam_dir = tempdir().unwrap();
        let exam_root = Utf8Path::from_path(exam_dir.path()).unwrap();
        make_tree(exam_root);

        let runs_dir = tempdir().unwrap();
        let runs_base = Utf8Path::from_path(runs_dir.path()).unwrap();

        let cfg = Config::default();
        let opts = AnalyzeOptions {
            cfg: &cfg,
            exam_root,
            batch_size: 200,
            run_id: Some("exame01"),
            dcm4che_bin_dir: None,
        };
        let cancelled = AtomicBool::new(false);
        let outcome = run_analysis(&opts, runs_base, &cancelled, |_| {}).unwrap();

        assert_eq!(outcome.files_total, 3);
        assert_eq!(outcome.files_selected, 2);
        assert!(outcome.run_id.ends_with("_toolF_files"));
        assert!(outcome.run_dir.join("core").join("manifest_files.csv").exists());
        assert!(outcome.run_dir.join("core").join("manifest_folders.csv").exists());
        assert!(outcome.run_dir.join("core").join("analysis_summary.csv").exists());
        assert!(outcome.run_dir.join("telemetry").join("events.csv").exists());
    }

    #[test]
    fn cancellation_mid_scan_returns_cancelled_error() {
        let exam_dir = tempdir().unwrap();
        let exam_root = Utf8Path::from_path(exam_dir.path()).unwrap();
        make_tree(exam_root);

        let runs_dir = tempdir().unwrap();
        let runs_base = Utf8Path::from_path(runs_dir.path()).unwrap();

        let cfg = Config::default();
        let opts = AnalyzeOptions {
            cfg: &cfg,
            exam_root,
            batch_size: 200,
            run_id: Some("exame02"),
            dcm4che_bin_dir: None,
        };
        let cancelled = AtomicBool::new(true);
        let err = run_analysis(&opts, runs_base, &cancelled, |_| {}).unwrap_err();
        assert!(matches!(err, AnalyzeError::Cancelled));
    }

    #[test]
    fn missing_root_is_reported() {
        let runs_dir = tempdir().unwrap();
        let runs_base = Utf8Path::from_path(runs_dir.path()).unwrap();
        let cfg = Config::default();
        let missing = Utf8PathBuf::from("/definitely/not/here/xyz");
        let opts = AnalyzeOptions {
            cfg: &cfg,
            exam_root: &missing,
            batch_size: 200,
            run_id: None,
            dcm4che_bin_dir: None,
        };
        let cancelled = AtomicBool::new(false);
        let err = run_analysis(&opts, runs_base, &cancelled, |_| {}).unwrap_err();
        assert!(matches!(err, AnalyzeError::RootNotFound { .. }));
    }
}
