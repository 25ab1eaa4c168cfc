//! File-path -> IUID map building/merging and the in-place send-results
//! patch-back (spec §11 "`apply_send_result_updates`-style in-place patch").

use std::collections::HashMap;

use camino::Utf8Path;
use dcmrelay_types::record::SendResultRow;

use crate::csv_io::{read_csv_rows, write_csv_table};
use crate::error::ArtifactError;

/// The four fields Validate may need to backfill per file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IuidMapEntry {
    pub sop_instance_uid: String,
    pub source_ts_uid: String,
    pub source_ts_name: String,
    pub extract_status: String,
}

/// Build a `file_path -> IuidMapEntry` map from already-loaded send-result
/// rows, skipping rows with an empty path or IUID.
#[must_use]
pub fn build_iuid_map_from_send_rows(rows: &[SendResultRow]) -> HashMap<String, IuidMapEntry> {
    let mut out = HashMap::new();
    for row in rows {
        let fp = row.file_path.trim();
        let iuid = row.sop_instance_uid.trim();
        if fp.is_empty() || iuid.is_empty() {
            continue;
        }
        out.insert(
            fp.to_string(),
            IuidMapEntry {
                sop_instance_uid: iuid.to_string(),
                source_ts_uid: row.source_ts_uid.trim().to_string(),
                source_ts_name: row.source_ts_name.trim().to_string(),
                extract_status: row.extract_status.to_string(),
            },
        );
    }
    out
}

/// Merge a legacy `file_iuid_map.csv` into `map_by_file`, filling only
/// entries not already present (spec §11 "Consistency IUID-map merge from
/// legacy file").
pub fn merge_iuid_map_from_legacy_file(
    map_by_file: &mut HashMap<String, IuidMapEntry>,
    legacy_map_path: &Utf8Path,
) -> Result<(), ArtifactError> {
    if !legacy_map_path.exists() {
        return Ok(());
    }
    let rows: Vec<SendResultRow> = read_csv_rows(legacy_map_path)?;
    for row in rows {
        let fp = row.file_path.trim().to_string();
        let iuid = row.sop_instance_uid.trim().to_string();
        if fp.is_empty() || iuid.is_empty() || map_by_file.contains_key(&fp) {
            continue;
        }
        map_by_file.insert(
            fp,
            IuidMapEntry {
                sop_instance_uid: iuid,
                source_ts_uid: row.source_ts_uid.trim().to_string(),
                source_ts_name: row.source_ts_name.trim().to_string(),
                extract_status: row.extract_status.to_string(),
            },
        );
    }
    Ok(())
}

/// Patch `send_results_by_file.csv` in place: for every row in `run_id` whose
/// `file_path` has an update, overwrite the non-empty fields of `updates`
/// into that row, then rewrite the whole table. Returns the number of rows
/// changed; a no-op (no rewrite) when nothing changed.
pub fn apply_send_result_updates(
    send_results_path: &Utf8Path,
    run_id: &str,
    updates_by_file: &HashMap<String, IuidMapEntry>,
) -> Result<usize, ArtifactError> {
    if updates_by_file.is_empty() || !send_results_path.exists() {
        return Ok(0);
    }
    let mut rows: Vec<SendResultRow> = read_csv_rows(send_results_path)?;
    if rows.is_empty() {
        return Ok(0);
    }

    let mut changed_rows = 0usize;
    for row in &mut rows {
        if row.run_id != run_id {
            continue;
        }
        let Some(update) = updates_by_file.get(&row.file_path) else {
            continue;
        };
        let mut row_changed = false;

        if !update.sop_instance_uid.is_empty() && row.sop_instance_uid != update.sop_instance_uid {
            row.sop_instance_uid = update.sop_instance_uid.clone();
            row_changed = true;
        }
        if !update.source_ts_uid.is_empty() && row.source_ts_uid != update.source_ts_uid {
            row.source_ts_uid = update.source_ts_uid.clone();
            row_changed = true;
        }
        if !update.source_ts_name.is_empty() && row.source_ts_name != update.source_ts_name {
            row.source_ts_name = update.source_ts_name.clone();
            row_changed = true;
        }
        if !update.extract_status.is_empty() {
            let current = row.extract_status.to_string();
            if current != update.extract_status {
                if let Ok(parsed) = update.extract_status.parse() {
                    row.extract_status = parsed;
                    row_changed = true;
                }
            }
        }

        if row_changed {
            changed_rows += 1;
        }
    }

    if changed_rows > 0 {
        write_csv_table(send_results_path, &rows)?;
    }
    Ok(changed_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmrelay_types::{ExtractStatus, SendStatus, Toolkit};
    use tempfile::tempdir;

    fn row(file_path: &str) -> SendResultRow {
        SendResultRow {
            run_id: "run1".into(),
            file_path: file_path.into(),
            chunk_no: 1,
            toolkit: Toolkit::ToolT,
            ts_mode: "AUTO".into(),
            send_status: SendStatus::SentOk,
            status_detail: String::new(),
            sop_instance_uid: String::new(),
            source_ts_uid: String::new(),
            source_ts_name: String::new(),
            extract_status: ExtractStatus::None,
            processed_at: "2026-07-28T00:00:00".into(),
        }
    }

    #[test]
    fn patch_fills_missing_iuid_and_rewrites_only_changed_rows() {
        let dir = tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("send_results_by_file.csv");
        write_csv_table(&path, &[row("/a.dcm"), row("/b.dcm")]).unwrap();

        let mut updates = HashMap::new();
        updates.insert(
            "/a.dcm".to_string(),
            IuidMapEntry {
                sop_instance_uid: "1.2.3".into(),
                source_ts_uid: "1.2.840.10008.1.2.1".into(),
                source_ts_name: "Explicit VR Little Endian".into(),
                extract_status: "OK_FROM_STORESCU".into(),
            },
        );

        let changed = apply_send_result_updates(&path, "run1", &updates).unwrap();
        assert_eq!(changed, 1);

        let rows: Vec<SendResultRow> = read_csv_rows(&path).unwrap();
        let a = rows.iter().find(|r| r.file_path == "/a.dcm").unwrap();
        assert_eq!(a.sop_instance_uid, "1.2.3");
        let b = rows.iter().find(|r| r.file_path == "/b.dcm").unwrap();
        assert!(b.sop_instance_uid.is_empty());
    }
}
