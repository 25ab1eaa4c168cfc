//! The Send workflow (spec §4.6): chunked, resumable execution of the
//! configured toolkit driver against a run's selected files, with real-time
//! and post-stream IUID correlation. Grounded on `workflows/send.py`'s
//! `run_send`.

pub mod error;
pub mod planning;
pub mod preflight;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use dcmrelay_artifact::csv_io::{append_csv_row, read_csv_rows};
use dcmrelay_artifact::events::write_telemetry_event;
use dcmrelay_artifact::layout::{chunk_commands_dir, resolve_run_artifact_path, resolve_run_batch_args_dir};
use dcmrelay_config::Config;
use dcmrelay_driver::cmdlen::{WINDOWS_CMD_SAFE_MAX_CHARS, WINDOWS_DIRECT_SAFE_MAX_CHARS, windows_cmdline_len};
use dcmrelay_driver::driver::{BatchCorrelation, ExtractedMetadata, FileOutcome, ParsedSendOutput};
use dcmrelay_driver::{Driver, looks_like_dicom_payload_file};
use dcmrelay_runner::{StreamingChild, spawn_cancel_watcher};
use dcmrelay_types::event::EventType;
use dcmrelay_types::record::{AnalysisSummaryRow, FileManifestRow, SendResultRow, SendSummaryRow};
use dcmrelay_types::{CheckpointMode, ExtractStatus, SendStatus, SendSummaryStatus, Toolkit, ToolFIuidUpdateMode, ToolFSendMode};
use dcmrelay_util::clock::now_iso;

pub use error::SendError;
pub use planning::{AttemptChunk, plan_attempt_chunks, plan_technical_chunks};
pub use preflight::{ResumeState, java_healthcheck, load_resume_state, load_selected_files, write_checkpoint};

/// Per-invocation options for [`run_send`].
pub struct SendOptions<'a> {
    pub cfg: &'a Config,
    pub driver: &'a dyn Driver,
    pub run_id: &'a str,
    /// Only consulted for ToolF (the pre-flight Java healthcheck).
    pub dcm4che_bin_dir: Option<&'a Utf8Path>,
    pub batch_size: u64,
    pub java_healthcheck_timeout: Duration,
}

/// Result of a completed (or already-complete, short-circuited) Send attempt.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub run_id: String,
    pub run_dir: Utf8PathBuf,
    pub status: SendSummaryStatus,
    pub send_duration_sec: f64,
}

/// The fully-resolved outcome for one file, whatever path (real-time or
/// post-stream) produced it.
#[derive(Debug, Clone)]
struct FinalizedFile {
    send_status: SendStatus,
    status_detail: String,
    sop_instance_uid: String,
    source_ts_uid: String,
    source_ts_name: String,
    extract_status: ExtractStatus,
}

/// Run the Send workflow against `opts.run_id`'s manifest under
/// `runs_base`, resuming from any prior attempt.
pub async fn run_send(
    opts: &SendOptions<'_>,
    runs_base: &Utf8Path,
    cancelled: &Arc<AtomicBool>,
    mut progress: impl FnMut(&str),
) -> Result<SendOutcome, SendError> {
    let send_start = Instant::now();
    let cfg = opts.cfg;
    let run_id = opts.run_id;
    let run_dir = runs_base.join(run_id);
    let folder_mode = cfg.toolkit == Toolkit::ToolF && cfg.toolf_send_mode == ToolFSendMode::Folders;

    let events_path = resolve_run_artifact_path(&run_dir, "events.csv", true).map_err(artifact_io_err(&run_dir))?;
    let results_path =
        resolve_run_artifact_path(&run_dir, "send_results_by_file.csv", true).map_err(artifact_io_err(&run_dir))?;
    let summary_path = resolve_run_artifact_path(&run_dir, "send_summary.csv", true).map_err(artifact_io_err(&run_dir))?;

    write_telemetry_event(
        &events_path,
        run_id,
        EventType::RunSendMode,
        format!(
            "toolkit={};send_mode={};iuid_update_mode={}",
            cfg.toolkit,
            cfg.toolf_send_mode,
            cfg.toolf_iuid_update_mode
        ),
        "",
    )?;

    if cfg.toolkit == Toolkit::ToolF {
        java_healthcheck(&run_dir, run_id, opts.java_healthcheck_timeout, opts.dcm4che_bin_dir)?;
    }

    let selected = load_selected_files(&run_dir)?;
    let already_done: HashSet<String> = read_csv_rows::<SendResultRow>(&results_path)?
        .into_iter()
        .filter(|r| r.run_id == run_id)
        .map(|r| r.file_path)
        .collect();
    let pending_files: Vec<FileManifestRow> =
        selected.iter().filter(|r| !already_done.contains(&r.file_path)).cloned().collect();

    if pending_files.is_empty() {
        return Ok(short_circuit_already_sent(&results_path, &summary_path, &events_path, run_id, &run_dir, selected.len() as u64)?);
    }

    let resume_state = load_resume_state(&run_dir, run_id, cfg.toolkit, folder_mode)?;
    if resume_state.resumed {
        write_telemetry_event(
            &events_path,
            run_id,
            EventType::RunSendResume,
            format!("resuming with {} files already recorded", already_done.len()),
            "",
        )?;
    }
    let first_chunk_no = resume_state.done_files / opts.batch_size.max(1) + 1;

    let units: Vec<Utf8PathBuf> = if folder_mode {
        let mut seen = HashSet::new();
        pending_files
            .iter()
            .filter(|r| seen.insert(r.folder_path.clone()))
            .map(|r| Utf8PathBuf::from(r.folder_path.clone()))
            .collect()
    } else {
        pending_files.iter().map(|r| Utf8PathBuf::from(r.file_path.clone())).collect()
    };

    let attempt_chunks = plan_attempt_chunks(&units, opts.batch_size, first_chunk_no);
    let total_chunks = attempt_chunks.len();
    let batch_max_cmd = read_batch_max_cmd(&run_dir)?;

    write_telemetry_event(
        &events_path,
        run_id,
        EventType::RunSendStart,
        format!("{} pending units across {total_chunks} chunk(s)", units.len()),
        "",
    )?;
    progress(&format!("progresso envio: iniciando | pendentes={} chunks={total_chunks}", units.len()));

    let batch_args_dir = resolve_run_batch_args_dir(&run_dir, true).map_err(artifact_io_err(&run_dir))?;
    let commands_dir = chunk_commands_dir(&run_dir);
    std::fs::create_dir_all(commands_dir.as_std_path()).map_err(|source| SendError::Artifact(
        dcmrelay_artifact::ArtifactError::CreateDir { path: commands_dir.clone(), source },
    ))?;

    let mut done_units = resume_state.done_files;
    let mut done_files = resume_state.done_files;

    'chunks: for attempt in &attempt_chunks {
        if cancelled.load(Ordering::SeqCst) {
            write_telemetry_event(&events_path, run_id, EventType::SendCancelledImmediate, "cancelled before chunk dispatch", "")?;
            write_checkpoint(&run_dir, cfg.toolkit, folder_mode, done_units, done_files, CheckpointMode::ChunkSync, "cancelled")?;
            return Err(SendError::Cancelled);
        }

        write_telemetry_event(
            &events_path,
            run_id,
            EventType::ChunkStart,
            format!("chunk {} of {total_chunks} with {} unit(s)", attempt.chunk_no, attempt.files.len()),
            "",
        )?;
        progress(&format!("progresso envio: chunk {}/{total_chunks}", attempt.chunk_no));

        let technical_chunks = plan_technical_chunks(cfg.toolkit, &attempt.files, batch_max_cmd);
        let verified_chunks = if cfg.toolkit == Toolkit::ToolF {
            split_chunks_to_budget(opts.driver, technical_chunks, cfg.toolf_use_shell_wrapper, &events_path, run_id)?
        } else {
            technical_chunks
        };

        for (sub_idx, sub_units) in verified_chunks.iter().enumerate() {
            if cancelled.load(Ordering::SeqCst) {
                write_telemetry_event(&events_path, run_id, EventType::SendCancelledImmediate, "cancelled mid-attempt-chunk", "")?;
                write_checkpoint(&run_dir, cfg.toolkit, folder_mode, done_units, done_files, CheckpointMode::ChunkSync, "cancelled")?;
                break 'chunks;
            }

            let sub_actual_files = expand_units_to_files(&pending_files, folder_mode, sub_units);
            if sub_actual_files.is_empty() {
                continue;
            }

            let args_file = batch_args_dir.join(format!("chunk_{}_{sub_idx}.argfile", attempt.chunk_no));
            if cfg.toolkit == Toolkit::ToolT {
                let content = sub_units.iter().map(Utf8PathBuf::as_str).collect::<Vec<_>>().join("\n");
                std::fs::write(args_file.as_std_path(), content)
                    .map_err(|source| SendError::ArgfileWrite { path: args_file.clone(), source })?;
            }

            let cmd = opts.driver.build_send_command(sub_units, &args_file)?;
            write_chunk_command_trace(&commands_dir, attempt.chunk_no, sub_idx, &cmd);
            write_telemetry_event(
                &events_path,
                run_id,
                EventType::ChunkCmdMeta,
                format!("units={};program={:?}", sub_units.len(), cmd.program),
                "",
            )?;

            let mut meta_by_file: HashMap<String, ExtractedMetadata> = HashMap::new();
            if cfg.toolkit == Toolkit::ToolF {
                for file in &sub_actual_files {
                    meta_by_file.insert(file.to_string(), opts.driver.extract_metadata(file));
                }
            }
            let file_by_iuid: HashMap<String, String> = meta_by_file
                .iter()
                .filter(|(_, m)| m.is_ok())
                .map(|(f, m)| (m.sop_instance_uid.clone(), f.clone()))
                .collect();

            let mut child = StreamingChild::spawn(&cmd)?;
            let pid = child.pid();
            let watcher = spawn_cancel_watcher(pid, Arc::clone(cancelled));

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
            if let Some(mut out) = child.stdout_lines() {
                let tx = tx.clone();
                tokio::spawn(async move {
                    while let Ok(Some(line)) = out.next_line().await {
                        let _ = tx.send(line);
                    }
                });
            }
            if let Some(mut err) = child.stderr_lines() {
                let tx = tx.clone();
                tokio::spawn(async move {
                    while let Ok(Some(line)) = err.next_line().await {
                        let _ = tx.send(line);
                    }
                });
            }
            drop(tx);

            let mut lines: Vec<String> = Vec::new();
            let mut finalized: HashMap<String, FinalizedFile> = HashMap::new();
            let realtime_enabled = cfg.toolkit == Toolkit::ToolF && cfg.toolf_iuid_update_mode == ToolFIuidUpdateMode::Realtime;
            let mut resolved_iuids: HashSet<String> = HashSet::new();

            while let Some(line) = rx.recv().await {
                let saw_rsp = line.contains("C-STORE-RSP");
                lines.push(line);
                if realtime_enabled && saw_rsp {
                    let blob = lines.join("\n");
                    let corr = dcmrelay_driver::classify::classify_dcm4che_output(&blob);
                    for iuid in corr.ok_iuids.iter().chain(corr.err_iuids.iter()) {
                        if resolved_iuids.contains(iuid) {
                            continue;
                        }
                        let Some(owning_file) = file_by_iuid.get(iuid) else { continue };
                        if finalized.contains_key(owning_file) {
                            continue;
                        }
                        resolved_iuids.insert(iuid.clone());
                        let is_ok = corr.ok_iuids.contains(iuid);
                        let meta = &meta_by_file[owning_file];
                        let result = FinalizedFile {
                            send_status: if is_ok { SendStatus::SentOk } else { SendStatus::SendFail },
                            status_detail: if is_ok {
                                String::new()
                            } else {
                                format!("status={}", corr.err_status_by_iuid.get(iuid).cloned().unwrap_or_default())
                            },
                            sop_instance_uid: iuid.clone(),
                            source_ts_uid: meta.source_ts_uid.clone(),
                            source_ts_name: meta.source_ts_name.clone(),
                            extract_status: if is_ok {
                                ExtractStatus::OkFromStorescuRealtime
                            } else {
                                ExtractStatus::ErrFromStorescuRealtime
                            },
                        };
                        write_telemetry_event(
                            &events_path,
                            run_id,
                            EventType::SendIuidRealtime,
                            format!("{owning_file} resolved in real time: {}", result.send_status),
                            iuid.clone(),
                        )?;
                        append_csv_row(
                            &results_path,
                            &send_result_row(run_id, owning_file, attempt.chunk_no, cfg, &result),
                        )?;
                        done_units += 1;
                        done_files += 1;
                        write_checkpoint(&run_dir, cfg.toolkit, folder_mode, done_units, done_files, CheckpointMode::Item, "realtime")?;
                        finalized.insert(owning_file.clone(), result);
                    }
                }
            }

            let exit_code = child.wait().await?;
            watcher.abort();

            if cancelled.load(Ordering::SeqCst) {
                write_telemetry_event(&events_path, run_id, EventType::SendCancelForceKill, "process tree killed on cancellation", "")?;
                write_checkpoint(&run_dir, cfg.toolkit, folder_mode, done_units, done_files, CheckpointMode::ChunkSync, "cancelled")?;
                break 'chunks;
            }

            let parsed = opts.driver.parse_send_output(&lines, sub_units);
            match parsed {
                ParsedSendOutput::Batch(corr) => {
                    for (idx, file) in sub_actual_files.iter().enumerate() {
                        if finalized.contains_key(file.as_str()) {
                            continue;
                        }
                        let meta = meta_by_file.get(file.as_str());
                        let result = classify_toolf_file(idx, sub_actual_files.len(), meta, &corr);
                        finalized.insert(file.to_string(), result);
                    }
                }
                ParsedSendOutput::PerFile(outcomes) => {
                    for file in &sub_actual_files {
                        if finalized.contains_key(file.as_str()) {
                            continue;
                        }
                        let meta = opts.driver.extract_metadata(file);
                        let outcome = outcomes
                            .get(file.as_str())
                            .cloned()
                            .unwrap_or(FileOutcome {
                                send_status: SendStatus::SentUnknown,
                                status_detail: "parse_status=UNKNOWN;reason=no_match_in_output".to_string(),
                            });
                        finalized.insert(file.to_string(), classify_toolt_file(&outcome, &meta));
                    }
                }
            }

            if !matches!(exit_code, Some(0)) {
                for result in finalized.values_mut() {
                    if result.send_status == SendStatus::SentUnknown && result.extract_status != ExtractStatus::OkFromStorescuRealtime {
                        result.status_detail = format!("{};process_exit={exit_code:?}", result.status_detail);
                        result.extract_status = ExtractStatus::ProcessExitFail;
                        result.send_status = SendStatus::SendFail;
                    }
                }
            }

            for file in &sub_actual_files {
                let Some(result) = finalized.get(file.as_str()) else { continue };
                if result.extract_status == ExtractStatus::OkFromStorescuRealtime
                    || result.extract_status == ExtractStatus::ErrFromStorescuRealtime
                {
                    // Already appended and checkpointed during the real-time pass.
                    continue;
                }
                append_csv_row(&results_path, &send_result_row(run_id, file, attempt.chunk_no, cfg, result))?;
                done_files += 1;
            }
            done_units += sub_units.len() as u64;
            if !realtime_enabled {
                write_checkpoint(&run_dir, cfg.toolkit, folder_mode, done_units, done_files, CheckpointMode::ChunkSync, "chunk_end")?;
            }
        }

        write_telemetry_event(&events_path, run_id, EventType::ChunkEnd, format!("chunk {} complete", attempt.chunk_no), "")?;
        write_checkpoint(&run_dir, cfg.toolkit, folder_mode, done_units, done_files, CheckpointMode::ChunkSync, "chunk_end")?;
    }

    if cancelled.load(Ordering::SeqCst) {
        let send_duration_sec = send_start.elapsed().as_secs_f64();
        write_send_summary(&results_path, &summary_path, run_id, cfg, selected.len() as u64, send_duration_sec, SendSummaryStatus::Interrupted)?;
        return Err(SendError::Cancelled);
    }

    let send_duration_sec = send_start.elapsed().as_secs_f64();
    let status = finalize_send_status(&results_path, run_id)?;
    write_send_summary(&results_path, &summary_path, run_id, cfg, selected.len() as u64, send_duration_sec, status)?;
    write_telemetry_event(&events_path, run_id, EventType::RunSendEnd, format!("status={status}"), "")?;
    progress(&format!("progresso envio: concluido | status={status}"));

    Ok(SendOutcome { run_id: run_id.to_string(), run_dir, status, send_duration_sec })
}

fn artifact_io_err(run_dir: &Utf8Path) -> impl Fn(std::io::Error) -> SendError + '_ {
    move |source| SendError::Artifact(dcmrelay_artifact::ArtifactError::Write { path: run_dir.to_path_buf(), source })
}

fn expand_units_to_files(pending_files: &[FileManifestRow], folder_mode: bool, units: &[Utf8PathBuf]) -> Vec<Utf8PathBuf> {
    if !folder_mode {
        return units.to_vec();
    }
    let set: HashSet<&str> = units.iter().map(Utf8PathBuf::as_str).collect();
    pending_files
        .iter()
        .filter(|r| set.contains(r.folder_path.as_str()))
        .map(|r| Utf8PathBuf::from(r.file_path.clone()))
        .filter(|p| looks_like_dicom_payload_file(p))
        .collect()
}

fn read_batch_max_cmd(run_dir: &Utf8Path) -> Result<u64, SendError> {
    let path = resolve_run_artifact_path(run_dir, "analysis_summary.csv", false).map_err(artifact_io_err(run_dir))?;
    let rows = read_csv_rows::<AnalysisSummaryRow>(&path)?;
    Ok(rows.last().and_then(|r| r.batch_max_cmd.parse::<u64>().ok()).unwrap_or(0))
}

fn measure_command_len(driver: &dyn Driver, units: &[Utf8PathBuf], args_file: &Utf8Path) -> Result<usize, SendError> {
    let cmd = driver.build_send_command(units, args_file)?;
    let mut rendered = vec![cmd.program.to_string_lossy().into_owned()];
    rendered.extend(cmd.args.iter().map(|a| a.to_string_lossy().into_owned()));
    Ok(windows_cmdline_len(&rendered))
}

/// Verify each ToolF technical chunk actually fits its command-length
/// budget, splitting further when it doesn't (spec §4.6, grounded on
/// `send.py::_split_dcm4che_inputs_by_cmd_limit`).
fn split_chunks_to_budget(
    driver: &dyn Driver,
    chunks: Vec<Vec<Utf8PathBuf>>,
    use_shell_wrapper: bool,
    events_path: &Utf8Path,
    run_id: &str,
) -> Result<Vec<Vec<Utf8PathBuf>>, SendError> {
    let budget = if cfg!(windows) && use_shell_wrapper { WINDOWS_CMD_SAFE_MAX_CHARS } else { WINDOWS_DIRECT_SAFE_MAX_CHARS };
    let placeholder = Utf8PathBuf::from("cmdlen_probe.argfile");
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend(split_one_chunk(driver, chunk, budget, use_shell_wrapper, events_path, run_id, &placeholder)?);
    }
    Ok(out)
}

fn split_one_chunk(
    driver: &dyn Driver,
    chunk: Vec<Utf8PathBuf>,
    budget: usize,
    use_shell_wrapper: bool,
    events_path: &Utf8Path,
    run_id: &str,
    placeholder: &Utf8Path,
) -> Result<Vec<Vec<Utf8PathBuf>>, SendError> {
    if chunk.is_empty() {
        return Ok(Vec::new());
    }
    let len = measure_command_len(driver, &chunk, placeholder)?;
    if len <= budget {
        return Ok(vec![chunk]);
    }
    if chunk.len() == 1 {
        write_telemetry_event(
            events_path,
            run_id,
            EventType::CmdlenGuardWarn,
            format!("single-unit command still exceeds budget ({len} > {budget} chars)"),
            chunk[0].to_string(),
        )?;
        if use_shell_wrapper {
            write_telemetry_event(
                events_path,
                run_id,
                EventType::ChunkCmdOverLimit,
                format!("cmd-wrapped invocation cannot fit even a single unit within budget ({len} > {budget})"),
                chunk[0].to_string(),
            )?;
            return Err(SendError::ChunkCmdOverLimit { len, budget });
        }
        return Ok(vec![chunk]);
    }

    write_telemetry_event(
        events_path,
        run_id,
        EventType::ChunkSplitPlan,
        format!("command length {len} exceeds budget {budget}; splitting {} units in half", chunk.len()),
        "",
    )?;
    let mid = chunk.len() / 2;
    let (left, right) = chunk.split_at(mid);
    let mut out = split_one_chunk(driver, left.to_vec(), budget, use_shell_wrapper, events_path, run_id, placeholder)?;
    out.extend(split_one_chunk(driver, right.to_vec(), budget, use_shell_wrapper, events_path, run_id, placeholder)?);
    Ok(out)
}

fn write_chunk_command_trace(commands_dir: &Utf8Path, chunk_no: u64, sub_idx: usize, cmd: &dcmrelay_runner::CommandSpec) {
    let path = commands_dir.join(format!("chunk_{chunk_no}_{sub_idx}.txt"));
    let rendered = format!(
        "{:?} {}",
        cmd.program,
        cmd.args.iter().map(|a| format!("{a:?}")).collect::<Vec<_>>().join(" ")
    );
    let _ = std::fs::write(path.as_std_path(), rendered);
}

/// Map a dcm4che batch correlation onto one file when no real-time match
/// resolved it: prefer the file's own extracted IUID, falling back to its
/// position in the RQ order when extraction failed and the RQ count lines
/// up 1:1 with the files actually sent.
fn classify_toolf_file(idx: usize, total_files: usize, meta: Option<&ExtractedMetadata>, corr: &BatchCorrelation) -> FinalizedFile {
    let ok_set: HashSet<&str> = corr.ok_iuids.iter().map(String::as_str).collect();
    let err_set: HashSet<&str> = corr.err_iuids.iter().map(String::as_str).collect();
    let rq_set: HashSet<&str> = corr.rq_iuids.iter().map(String::as_str).collect();

    if let Some(meta) = meta.filter(|m| m.is_ok()) {
        let iuid = meta.sop_instance_uid.clone();
        let (send_status, status_detail, extract_status) = if ok_set.contains(iuid.as_str()) {
            (SendStatus::SentOk, String::new(), ExtractStatus::OkFromStorescu)
        } else if err_set.contains(iuid.as_str()) {
            let code = corr.err_status_by_iuid.get(&iuid).cloned().unwrap_or_default();
            (SendStatus::SendFail, format!("status={code}"), ExtractStatus::ErrFromStorescu)
        } else if rq_set.contains(iuid.as_str()) {
            (SendStatus::SentUnknown, "requested; no response observed".to_string(), ExtractStatus::RequestedNoRsp)
        } else {
            (SendStatus::SentUnknown, "no correlation observed for extracted iuid".to_string(), ExtractStatus::NoMatch)
        };
        return FinalizedFile {
            send_status,
            status_detail,
            sop_instance_uid: iuid,
            source_ts_uid: meta.source_ts_uid.clone(),
            source_ts_name: meta.source_ts_name.clone(),
            extract_status,
        };
    }

    if corr.rq_iuids.len() == total_files && idx < corr.rq_iuids.len() {
        let candidate = corr.rq_iuids[idx].clone();
        let (send_status, status_detail) = if ok_set.contains(candidate.as_str()) {
            (SendStatus::SentOk, String::new())
        } else if err_set.contains(candidate.as_str()) {
            let code = corr.err_status_by_iuid.get(&candidate).cloned().unwrap_or_default();
            (SendStatus::SendFail, format!("status={code}"))
        } else {
            (SendStatus::SentUnknown, "requested; no response observed".to_string())
        };
        return FinalizedFile {
            send_status,
            status_detail,
            sop_instance_uid: candidate,
            source_ts_uid: String::new(),
            source_ts_name: String::new(),
            extract_status: ExtractStatus::NoMatchUidUnconfirmed,
        };
    }

    FinalizedFile {
        send_status: SendStatus::SentUnknown,
        status_detail: meta.map(|m| m.error.clone()).unwrap_or_else(|| "metadata extraction failed".to_string()),
        sop_instance_uid: String::new(),
        source_ts_uid: String::new(),
        source_ts_name: String::new(),
        extract_status: ExtractStatus::NoMatch,
    }
}

fn classify_toolt_file(outcome: &FileOutcome, meta: &ExtractedMetadata) -> FinalizedFile {
    FinalizedFile {
        send_status: outcome.send_status,
        status_detail: outcome.status_detail.clone(),
        sop_instance_uid: meta.sop_instance_uid.clone(),
        source_ts_uid: meta.source_ts_uid.clone(),
        source_ts_name: meta.source_ts_name.clone(),
        extract_status: if meta.is_ok() { ExtractStatus::Ok } else { ExtractStatus::MissingIuid },
    }
}

fn send_result_row(run_id: &str, file_path: &Utf8Path, chunk_no: u64, cfg: &Config, result: &FinalizedFile) -> SendResultRow {
    SendResultRow {
        run_id: run_id.to_string(),
        file_path: file_path.to_string(),
        chunk_no,
        toolkit: cfg.toolkit,
        ts_mode: cfg.effective_ts_mode().0.to_string(),
        send_status: result.send_status,
        status_detail: result.status_detail.clone(),
        sop_instance_uid: result.sop_instance_uid.clone(),
        source_ts_uid: result.source_ts_uid.clone(),
        source_ts_name: result.source_ts_name.clone(),
        extract_status: result.extract_status,
        processed_at: now_iso(),
    }
}

fn counts_from_rows(rows: &[SendResultRow]) -> (u64, u64, u64) {
    let mut ok = 0u64;
    let mut warn = 0u64;
    let mut fail = 0u64;
    for row in rows {
        match row.send_status {
            SendStatus::SentOk => ok += 1,
            SendStatus::SendFail => fail += 1,
            SendStatus::SentUnknown | SendStatus::NonDicom | SendStatus::UnsupportedDicomObject => warn += 1,
        }
    }
    (ok, warn, fail)
}

fn finalize_send_status(results_path: &Utf8Path, run_id: &str) -> Result<SendSummaryStatus, SendError> {
    let rows: Vec<SendResultRow> = read_csv_rows(results_path)?.into_iter().filter(|r| r.run_id == run_id).collect();
    let (_, warn, fail) = counts_from_rows(&rows);
    Ok(if fail > 0 {
        SendSummaryStatus::Fail
    } else if warn > 0 {
        SendSummaryStatus::PassWithWarnings
    } else {
        SendSummaryStatus::Pass
    })
}

fn write_send_summary(
    results_path: &Utf8Path,
    summary_path: &Utf8Path,
    run_id: &str,
    cfg: &Config,
    total_items: u64,
    send_duration_sec: f64,
    status: SendSummaryStatus,
) -> Result<(), SendError> {
    let rows: Vec<SendResultRow> = read_csv_rows(results_path)?.into_iter().filter(|r| r.run_id == run_id).collect();
    let (sent_ok, warnings, failed) = counts_from_rows(&rows);
    append_csv_row(
        summary_path,
        &SendSummaryRow {
            run_id: run_id.to_string(),
            toolkit: cfg.toolkit,
            ts_mode_effective: cfg.effective_ts_mode().0.to_string(),
            total_items,
            items_processed: rows.len() as u64,
            sent_ok,
            warnings,
            failed,
            status: status.to_string(),
            send_duration_sec,
            finished_at: now_iso(),
        },
    )?;
    Ok(())
}

fn short_circuit_already_sent(
    results_path: &Utf8Path,
    summary_path: &Utf8Path,
    events_path: &Utf8Path,
    run_id: &str,
    run_dir: &Utf8Path,
    total_items: u64,
) -> Result<SendOutcome, SendError> {
    write_telemetry_event(
        events_path,
        run_id,
        EventType::RunSendSkipAlreadyCompleted,
        format!("all {total_items} selected file(s) already recorded for this run"),
        "",
    )?;
    let rows: Vec<SendResultRow> = read_csv_rows(results_path)?.into_iter().filter(|r| r.run_id == run_id).collect();
    let (_, warn, fail) = counts_from_rows(&rows);
    let status = if fail > 0 || warn > 0 { SendSummaryStatus::AlreadySent } else { SendSummaryStatus::AlreadySentPass };
    append_csv_row(
        summary_path,
        &SendSummaryRow {
            run_id: run_id.to_string(),
            toolkit: rows.first().map(|r| r.toolkit).unwrap_or(Toolkit::ToolF),
            ts_mode_effective: rows.first().map(|r| r.ts_mode.clone()).unwrap_or_default(),
            total_items,
            items_processed: rows.len() as u64,
            sent_ok: rows.iter().filter(|r| r.send_status == SendStatus::SentOk).count() as u64,
            warnings: warn,
            failed: fail,
            status: status.to_string(),
            send_duration_sec: 0.0,
            finished_at: now_iso(),
        },
    )?;
    Ok(SendOutcome { run_id: run_id.to_string(), run_dir: run_dir.to_path_buf(), status, send_duration_sec: 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_from_rows_buckets_statuses() {
        let rows = vec![
            make_row(SendStatus::SentOk),
            make_row(SendStatus::SendFail),
            make_row(SendStatus::SentUnknown),
            make_row(SendStatus::NonDicom),
        ];
        let (ok, warn, fail) = counts_from_rows(&rows);
        assert_eq!(ok, 1);
        assert_eq!(warn, 2);
        assert_eq!(fail, 1);
    }

    #[test]
    fn classify_toolf_file_prefers_confirmed_metadata_over_rq_order() {
        let meta = ExtractedMetadata {
            sop_instance_uid: "1.2.3".to_string(),
            source_ts_uid: "1.2.840.10008.1.2.1".to_string(),
            source_ts_name: "1.2.840.10008.1.2.1".to_string(),
            error: String::new(),
        };
        let corr = BatchCorrelation {
            rq_iuids: vec!["1.2.3".to_string()],
            ok_iuids: vec!["1.2.3".to_string()],
            err_iuids: vec![],
            err_status_by_iuid: HashMap::new(),
        };
        let result = classify_toolf_file(0, 1, Some(&meta), &corr);
        assert_eq!(result.send_status, SendStatus::SentOk);
        assert_eq!(result.extract_status, ExtractStatus::OkFromStorescu);
    }

    #[test]
    fn classify_toolf_file_falls_back_to_rq_order_when_metadata_missing() {
        let corr = BatchCorrelation {
            rq_iuids: vec!["9.9.9".to_string()],
            ok_iuids: vec!["9.9.9".to_string()],
            err_iuids: vec![],
            err_status_by_iuid: HashMap::new(),
        };
        let result = classify_toolf_file(0, 1, None, &corr);
        assert_eq!(result.send_status, SendStatus::SentOk);
        assert_eq!(result.extract_status, ExtractStatus::NoMatchUidUnconfirmed);
        assert_eq!(result.sop_instance_uid, "9.9.9");
    }

    #[test]
    fn classify_toolf_file_no_match_when_rq_counts_disagree() {
        let corr = BatchCorrelation {
            rq_iuids: vec!["1.1.1".to_string(), "2.2.2".to_string()],
            ok_iuids: vec!["1.1.1".to_string()],
            err_iuids: vec![],
            err_status_by_iuid: HashMap::new(),
        };
        let result = classify_toolf_file(0, 1, None, &corr);
        assert_eq!(result.extract_status, ExtractStatus::NoMatch);
    }

    fn make_row(status: SendStatus) -> SendResultRow {
        SendResultRow {
            run_id: "r1".into(),
            file_path: "/a.dcm".into(),
            chunk_no: 1,
            toolkit: Toolkit::ToolT,
            ts_mode: "AUTO".into(),
            send_status: status,
            status_detail: String::new(),
            sop_instance_uid: String::new(),
            source_ts_uid: String::new(),
            source_ts_name: String::new(),
            extract_status: ExtractStatus::None,
            processed_at: "2026-07-28T00:00:00".into(),
        }
    }
}
