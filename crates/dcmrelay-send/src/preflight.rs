//! Pre-flight checks run before any chunk is dispatched: manifest loading,
//! checkpoint/result-file reconciliation for resume, and the ToolF Java
//! healthcheck (spec §4.6 "Pre-flight").

use std::collections::HashSet;
use std::time::Duration;

use camino::Utf8Path;
use dcmrelay_artifact::checkpoint::{load_send_checkpoint, write_send_checkpoint};
use dcmrelay_artifact::csv_io::read_csv_rows;
use dcmrelay_artifact::events::write_telemetry_event;
use dcmrelay_artifact::layout::resolve_run_artifact_path;
use dcmrelay_artifact::ArtifactError;
use dcmrelay_driver::java::resolve_java_executable;
use dcmrelay_driver::toolf::check_critical_jars;
use dcmrelay_types::event::EventType;
use dcmrelay_types::record::{FileManifestRow, SendCheckpoint, SendResultRow};
use dcmrelay_types::{CheckpointMode, Toolkit};
use dcmrelay_util::clock::now_iso;

use crate::error::SendError;

/// Selected-for-send rows from `core/manifest_files.csv`, in manifest order
/// (i.e. `seq` ascending — the order Analyze discovered them in).
pub fn load_selected_files(run_dir: &Utf8Path) -> Result<Vec<FileManifestRow>, SendError> {
    let path = resolve_run_artifact_path(run_dir, "manifest_files.csv", false)
        .map_err(|e| SendError::ManifestUnreadable {
            path: run_dir.join("manifest_files.csv"),
            source: ArtifactError::Read {
                path: run_dir.join("manifest_files.csv"),
                source: e,
            },
        })?;
    let mut rows = read_csv_rows::<FileManifestRow>(&path)?;
    rows.sort_by_key(|r| r.seq);
    let selected: Vec<FileManifestRow> = rows.into_iter().filter(|r| r.selected_for_send).collect();
    if selected.is_empty() {
        return Err(SendError::NothingSelected);
    }
    Ok(selected)
}

/// How far a previous attempt at this run/toolkit/mode got, reconciled
/// between the JSON checkpoint (fast path, written every chunk) and the
/// per-file results table (ground truth, written every row).
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumeState {
    pub done_files: u64,
    pub resumed: bool,
}

/// Load and reconcile resume state for `(toolkit, folder_mode)`.
///
/// The checkpoint is the fast path but can lag one chunk behind the results
/// table if the process died between the last result row and the next
/// checkpoint write; the larger of the two `done_files` values wins, and a
/// `SEND_RESUME_FROM_RESULTS` event is emitted when the results table was
/// the one that was ahead (spec §4.6, §9).
pub fn load_resume_state(
    run_dir: &Utf8Path,
    run_id: &str,
    toolkit: Toolkit,
    folder_mode: bool,
) -> Result<ResumeState, SendError> {
    let checkpoint_done = load_send_checkpoint(run_dir, toolkit, folder_mode)?
        .map(|c| c.done_files)
        .unwrap_or(0);

    let results_path = resolve_run_artifact_path(run_dir, "send_results_by_file.csv", false)
        .map_err(|e| SendError::ManifestUnreadable {
            path: run_dir.join("send_results_by_file.csv"),
            source: ArtifactError::Read {
                path: run_dir.join("send_results_by_file.csv"),
                source: e,
            },
        })?;
    let results = read_csv_rows::<SendResultRow>(&results_path)?;
    let results_done: u64 = results
        .iter()
        .filter(|r| r.run_id == run_id)
        .map(|r| r.file_path.clone())
        .collect::<HashSet<_>>()
        .len() as u64;

    let done_files = checkpoint_done.max(results_done);
    let resumed = done_files > 0;

    if results_done > checkpoint_done {
        let events_path = resolve_run_artifact_path(run_dir, "events.csv", true)
            .map_err(|e| SendError::ManifestUnreadable {
                path: run_dir.join("events.csv"),
                source: ArtifactError::Write {
                    path: run_dir.join("events.csv"),
                    source: e,
                },
            })?;
        write_telemetry_event(
            &events_path,
            run_id,
            EventType::SendResumeFromResults,
            &format!("checkpoint reported {checkpoint_done} done files; results table has {results_done}"),
            "",
        )?;
    }

    Ok(ResumeState { done_files, resumed })
}

/// Persist a checkpoint after a chunk (or single item) completes.
pub fn write_checkpoint(
    run_dir: &Utf8Path,
    toolkit: Toolkit,
    folder_mode: bool,
    done_units: u64,
    done_files: u64,
    mode: CheckpointMode,
    reason: &str,
) -> Result<(), SendError> {
    let cp = SendCheckpoint {
        done_units,
        done_files,
        updated_at: now_iso(),
        checkpoint_mode: mode,
        checkpoint_reason: reason.to_string(),
    };
    write_send_checkpoint(run_dir, toolkit, folder_mode, &cp)?;
    Ok(())
}

/// Resolve and verify a usable `java` for ToolF's direct-invocation path,
/// then check `dcm4che_bin_dir`'s sibling `lib/` directory for every
/// critical jar marker (spec §4.6 pre-flight step 5). Emits the matching
/// telemetry event either way.
pub fn java_healthcheck(
    run_dir: &Utf8Path,
    run_id: &str,
    healthcheck_timeout: Duration,
    dcm4che_bin_dir: Option<&Utf8Path>,
) -> Result<(), SendError> {
    let events_path = resolve_run_artifact_path(run_dir, "events.csv", true)
        .map_err(|e| SendError::ManifestUnreadable {
            path: run_dir.join("events.csv"),
            source: ArtifactError::Write {
                path: run_dir.join("events.csv"),
                source: e,
            },
        })?;

    let java_path = match resolve_java_executable(healthcheck_timeout) {
        Ok(path) => path,
        Err(reason) => {
            write_telemetry_event(
                &events_path,
                run_id,
                EventType::RunSendJavaHealthcheckFail,
                &reason,
                "",
            )?;
            return Err(SendError::JavaUnavailable { reason });
        }
    };

    let Some(bin_dir) = dcm4che_bin_dir else {
        write_telemetry_event(
            &events_path,
            run_id,
            EventType::RunSendJavaHealthcheck,
            &format!("usable java runtime located at {java_path}"),
            "",
        )?;
        return Ok(());
    };

    let (missing, lib_dir) = check_critical_jars(bin_dir);
    if missing.is_empty() {
        write_telemetry_event(
            &events_path,
            run_id,
            EventType::RunSendJavaHealthcheck,
            &format!("usable java runtime located at {java_path}"),
            format!("status=OK;lib={lib_dir}"),
        )?;
        Ok(())
    } else {
        let missing_list = missing.join(",");
        write_telemetry_event(
            &events_path,
            run_id,
            EventType::RunSendJavaHealthcheckFail,
            &format!("critical dcm4che jars missing under {lib_dir}: {missing_list}"),
            format!("status=FAIL;lib={lib_dir};missing={missing_list}"),
        )?;
        Err(SendError::JavaUnavailable {
            reason: format!("missing critical jars under {lib_dir}: {missing_list}"),
        })
    }
}
