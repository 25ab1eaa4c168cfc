//! Send checkpoint (`core/send_checkpoint_<toolkit>_<mode>.json`, spec
//! §3/§4.6/§4.7). Three distinct filenames — `send_checkpoint_toolF_files`,
//! `send_checkpoint_toolF_folders`, `send_checkpoint_toolT` — so switching
//! ToolF send-mode on the same run directory can't conflate checkpoints.

use camino::Utf8Path;
use dcmrelay_types::Toolkit;
use dcmrelay_types::record::SendCheckpoint;

use crate::error::ArtifactError;
use crate::layout::resolve_run_artifact_path;

fn checkpoint_filename(toolkit: Toolkit, folder_mode: bool) -> String {
    match (toolkit, folder_mode) {
        (Toolkit::ToolF, true) => "send_checkpoint_toolF_folders.json".to_string(),
        (Toolkit::ToolF, false) => "send_checkpoint_toolF_files.json".to_string(),
        (Toolkit::ToolT, _) => "send_checkpoint_toolT.json".to_string(),
    }
}

/// Resolve the checkpoint path for `toolkit`/`folder_mode` under `run_dir`.
pub fn checkpoint_path(
    run_dir: &Utf8Path,
    toolkit: Toolkit,
    folder_mode: bool,
    for_write: bool,
) -> Result<camino::Utf8PathBuf, ArtifactError> {
    let filename = checkpoint_filename(toolkit, folder_mode);
    resolve_run_artifact_path(run_dir, &filename, for_write).map_err(|source| ArtifactError::Read {
        path: run_dir.join(&filename),
        source,
    })
}

/// Load the checkpoint, if present. `None` means "no checkpoint yet" (fresh
/// run), which callers treat the same as `done_units = 0`.
pub fn load_send_checkpoint(
    run_dir: &Utf8Path,
    toolkit: Toolkit,
    folder_mode: bool,
) -> Result<Option<SendCheckpoint>, ArtifactError> {
    let path = checkpoint_path(run_dir, toolkit, folder_mode, false)?;
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ArtifactError::Read {
        path: path.clone(),
        source,
    })?;
    let checkpoint = serde_json::from_str(&text).map_err(|source| ArtifactError::Json {
        path: path.clone(),
        source,
    })?;
    Ok(Some(checkpoint))
}

/// Atomically persist the checkpoint. Called after every `ITEM`-mode unit and
/// at every `CHUNK_SYNC` boundary (spec §4.7).
pub fn write_send_checkpoint(
    run_dir: &Utf8Path,
    toolkit: Toolkit,
    folder_mode: bool,
    checkpoint: &SendCheckpoint,
) -> Result<(), ArtifactError> {
    let path = checkpoint_path(run_dir, toolkit, folder_mode, true)?;
    let text = serde_json::to_string_pretty(checkpoint).map_err(|source| ArtifactError::Json {
        path: path.clone(),
        source,
    })?;
    dcmrelay_util::atomic_write::write_file_atomic(&path, &text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmrelay_types::CheckpointMode;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let run_dir = Utf8Path::from_path(dir.path()).unwrap();
        assert!(
            load_send_checkpoint(run_dir, Toolkit::ToolF, false)
                .unwrap()
                .is_none()
        );

        let checkpoint = SendCheckpoint {
            done_units: 5,
            done_files: 5,
            updated_at: "2026-07-28T00:00:00".into(),
            checkpoint_mode: CheckpointMode::Item,
            checkpoint_reason: "item".into(),
        };
        write_send_checkpoint(run_dir, Toolkit::ToolF, false, &checkpoint).unwrap();
        let loaded = load_send_checkpoint(run_dir, Toolkit::ToolF, false)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.done_units, 5);
    }

    #[test]
    fn toolf_files_and_folders_checkpoints_are_distinct() {
        let dir = tempdir().unwrap();
        let run_dir = Utf8Path::from_path(dir.path()).unwrap();
        let files_cp = SendCheckpoint {
            done_units: 1,
            done_files: 1,
            updated_at: "2026-07-28T00:00:00".into(),
            checkpoint_mode: CheckpointMode::Item,
            checkpoint_reason: "item".into(),
        };
        write_send_checkpoint(run_dir, Toolkit::ToolF, false, &files_cp).unwrap();
        assert!(
            load_send_checkpoint(run_dir, Toolkit::ToolF, true)
                .unwrap()
                .is_none()
        );
        assert_eq!(
            checkpoint_path(run_dir, Toolkit::ToolF, false, false)
                .unwrap()
                .file_name(),
            Some("send_checkpoint_toolF_files.json")
        );
        assert_eq!(
            checkpoint_path(run_dir, Toolkit::ToolF, true, false)
                .unwrap()
                .file_name(),
            Some("send_checkpoint_toolF_folders.json")
        );
    }
}
