//! Two-level run-directory layout (`core/`, `telemetry/`, `reports/`) with
//! read/write resolution that falls back to legacy flat filenames (spec §4.2,
//! §11 "Legacy artifact name fallback set").

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

pub const RUN_SUBDIR_CORE: &str = "core";
pub const RUN_SUBDIR_TELEMETRY: &str = "telemetry";
pub const RUN_SUBDIR_REPORTS: &str = "reports";

/// Which two-level subdirectory a given artifact filename belongs to.
/// Legacy-only entries are kept here solely so cleanup/fallback logic can
/// still find them (spec §11).
fn subdir_for(filename: &str) -> &'static str {
    match filename {
        "manifest_folders.csv"
        | "manifest_files.csv"
        | "analysis_summary.csv"
        | "send_results_by_file.csv"
        | "send_summary.csv"
        | "validation_results.csv"
        | "file_iuid_map.csv"
        | "validation_by_iuid.csv"
        | "validation_by_file.csv"
        | "send_checkpoint.json"
        | "send_checkpoint_toolF_folders.json"
        | "send_checkpoint_toolF_files.json"
        | "send_checkpoint_toolT.json"
        | "send_checkpoint_dcm4che_folders.json"
        | "send_checkpoint_dcm4che_files.json"
        | "send_checkpoint_dcmtk.json" => RUN_SUBDIR_CORE,

        "events.csv"
        | "analysis_events.csv"
        | "send_events.csv"
        | "send_errors.csv"
        | "consistency_events.csv"
        | "storescu_execucao.log" => RUN_SUBDIR_TELEMETRY,

        "reconciliation_report.csv"
        | "validation_full_report_A.csv"
        | "validation_full_report_C.csv" => RUN_SUBDIR_REPORTS,

        _ => RUN_SUBDIR_CORE,
    }
}

/// The categorized and legacy-flat candidate paths for `filename` under `run_dir`.
#[must_use]
pub fn run_artifact_variants(run_dir: &Utf8Path, filename: &str) -> (Utf8PathBuf, Utf8PathBuf) {
    let subdir = subdir_for(filename);
    (run_dir.join(subdir).join(filename), run_dir.join(filename))
}

/// Resolve the path to use for `filename` for reads: categorized if it
/// exists, else legacy-flat if it exists, else categorized (will be created
/// on first write).
pub fn resolve_run_artifact_path(
    run_dir: &Utf8Path,
    filename: &str,
    for_write: bool,
) -> std::io::Result<Utf8PathBuf> {
    resolve_run_artifact_path_with_legacy(run_dir, filename, for_write, true)
}

/// Full resolver (spec §4.2). Reads are always categorized-then-legacy-then-
/// categorized-default. Writes: use categorized if it exists; else, if a
/// legacy-flat file exists *and* `keep_legacy_on_write` is true, continue
/// appending to it (in-flight runs stay consistent); else create the
/// categorized path. Reports/derived artifacts call this with
/// `keep_legacy_on_write = false` to opt out of legacy preservation.
pub fn resolve_run_artifact_path_with_legacy(
    run_dir: &Utf8Path,
    filename: &str,
    for_write: bool,
    keep_legacy_on_write: bool,
) -> std::io::Result<Utf8PathBuf> {
    let (categorized, legacy) = run_artifact_variants(run_dir, filename);
    let (chosen, source) = if categorized.exists() {
        (categorized, "categorized_existing")
    } else if legacy.exists() && (!for_write || keep_legacy_on_write) {
        (legacy, "legacy_existing")
    } else {
        (categorized, "categorized_default")
    };
    if for_write {
        if let Some(parent) = chosen.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    debug!(
        mode = if for_write { "write" } else { "read" },
        file = filename,
        source,
        path = %chosen,
        "run artifact path resolved"
    );
    Ok(chosen)
}

/// Remove both the categorized and legacy variants of `filename`, if present
/// (spec §11: cleanup must still recognize legacy names on disk).
pub fn cleanup_run_artifact_variants(run_dir: &Utf8Path, filename: &str) -> std::io::Result<()> {
    let (categorized, legacy) = run_artifact_variants(run_dir, filename);
    for path in [categorized, legacy] {
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Resolve the per-chunk batch-args directory, with the same
/// categorized-then-legacy preference as [`resolve_run_artifact_path`].
pub fn resolve_run_batch_args_dir(
    run_dir: &Utf8Path,
    for_write: bool,
) -> std::io::Result<Utf8PathBuf> {
    let categorized = run_dir.join(RUN_SUBDIR_CORE).join("batch_args");
    let legacy = run_dir.join("batch_args");
    let chosen = if categorized.exists() {
        categorized
    } else if legacy.exists() {
        legacy
    } else {
        categorized
    };
    if for_write {
        std::fs::create_dir_all(&chosen)?;
    }
    Ok(chosen)
}

/// The per-run command-trace directory under `telemetry/`.
#[must_use]
pub fn chunk_commands_dir(run_dir: &Utf8Path) -> Utf8PathBuf {
    run_dir.join(RUN_SUBDIR_TELEMETRY).join("chunk_commands")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_resolution_defaults_to_categorized_when_nothing_exists() {
        let dir = tempdir().unwrap();
        let run_dir = Utf8Path::from_path(dir.path()).unwrap();
        let path = resolve_run_artifact_path(run_dir, "manifest_files.csv", true).unwrap();
        assert!(path.ends_with("core/manifest_files.csv"));
        assert!(path.parent().unwrap().exists());
    }

    #[test]
    fn read_resolution_prefers_legacy_when_only_legacy_exists() {
        let dir = tempdir().unwrap();
        let run_dir = Utf8Path::from_path(dir.path()).unwrap();
        std::fs::write(run_dir.join("manifest_files.csv"), "x").unwrap();
        let path = resolve_run_artifact_path(run_dir, "manifest_files.csv", false).unwrap();
        assert_eq!(path, run_dir.join("manifest_files.csv"));
    }

    #[test]
    fn categorized_wins_over_legacy_when_both_exist() {
        let dir = tempdir().unwrap();
        let run_dir = Utf8Path::from_path(dir.path()).unwrap();
        std::fs::write(run_dir.join("manifest_files.csv"), "legacy").unwrap();
        std::fs::create_dir_all(run_dir.join("core")).unwrap();
        std::fs::write(run_dir.join("core/manifest_files.csv"), "categorized").unwrap();
        let path = resolve_run_artifact_path(run_dir, "manifest_files.csv", false).unwrap();
        assert_eq!(path, run_dir.join("core/manifest_files.csv"));
    }

    #[test]
    fn cleanup_removes_both_variants() {
        let dir = tempdir().unwrap();
        let run_dir = Utf8Path::from_path(dir.path()).unwrap();
        std::fs::write(run_dir.join("manifest_files.csv"), "legacy").unwrap();
        std::fs::create_dir_all(run_dir.join("core")).unwrap();
        std::fs::write(run_dir.join("core/manifest_files.csv"), "categorized").unwrap();
        cleanup_run_artifact_variants(run_dir, "manifest_files.csv").unwrap();
        assert!(!run_dir.join("manifest_files.csv").exists());
        assert!(!run_dir.join("core/manifest_files.csv").exists());
    }
}
