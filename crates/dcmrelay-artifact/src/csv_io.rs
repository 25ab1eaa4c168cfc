//! Hand-rolled, `;`-delimited, schema-preserving CSV I/O (spec §4.2,
//! grounded on `run_artifacts.py`'s `write_csv_row`/`read_csv_rows`/
//! `write_csv_table`). No `csv` crate: quoting rules are the minimal RFC4180
//! subset the original's `csv` module produces (quote a field iff it
//! contains the separator, a quote, or a newline; double embedded quotes).

use std::collections::HashMap;
use std::io::Write;

use camino::Utf8Path;
use dcmrelay_types::CSV_SEP;

use crate::csv_record::CsvRecord;
use crate::error::ArtifactError;

fn quote_field(field: &str) -> String {
    if field.contains(CSV_SEP) || field.contains('"') || field.contains('\n') || field.contains('\r')
    {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render_row(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| quote_field(v))
        .collect::<Vec<_>>()
        .join(&CSV_SEP.to_string())
}

/// Split one CSV line on `;`, honoring double-quoted fields.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' && current.is_empty() {
            in_quotes = true;
        } else if c == CSV_SEP {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

fn read_lines(path: &Utf8Path) -> Result<Vec<String>, ArtifactError> {
    let text = std::fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text.lines().map(str::to_string).collect())
}

/// Append one row to `path`, writing a header first if the file is new.
/// If the file already exists, its current header's column order is
/// preserved (back-compat with older schemas that may list a subset, or a
/// different order, of `T::field_names()`).
pub fn append_csv_row<T: CsvRecord>(path: &Utf8Path, row: &T) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ArtifactError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let write_header = !path.exists();
    let active_fields: Vec<String> = if write_header {
        T::field_names().iter().map(|s| s.to_string()).collect()
    } else {
        let lines = read_lines(path)?;
        match lines.first() {
            Some(header) if !header.trim().is_empty() => split_csv_line(header),
            _ => T::field_names().iter().map(|s| s.to_string()).collect(),
        }
    };

    let owned_values = row.to_row();
    let by_field: HashMap<&str, &str> = T::field_names()
        .iter()
        .copied()
        .zip(owned_values.iter().map(String::as_str))
        .collect();
    let values: Vec<&str> = active_fields
        .iter()
        .map(|f| by_field.get(f.as_str()).copied().unwrap_or(""))
        .collect();

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    if write_header {
        let header_refs: Vec<&str> = active_fields.iter().map(String::as_str).collect();
        writeln!(file, "{}", render_row(&header_refs)).map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    writeln!(file, "{}", render_row(&values)).map_err(|source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    file.sync_all().map_err(|source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Read every row of `path` into `T`, tolerating a header whose column order
/// (or subset) differs from `T::field_names()`. Returns an empty vec if the
/// file doesn't exist.
pub fn read_csv_rows<T: CsvRecord>(path: &Utf8Path) -> Result<Vec<T>, ArtifactError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let lines = read_lines(path)?;
    let Some(header_line) = lines.first() else {
        return Ok(Vec::new());
    };
    let header = split_csv_line(header_line);

    let mut rows = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let map: HashMap<&str, &str> = header
            .iter()
            .map(String::as_str)
            .zip(fields.iter().map(String::as_str).chain(std::iter::repeat("")))
            .collect();
        let row = T::from_row(&map).map_err(|reason| ArtifactError::MalformedRow {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Rewrite `path` from scratch with exactly `T::field_names()` as the header
/// (used by in-place patch-back operations like `apply_send_result_updates`).
pub fn write_csv_table<T: CsvRecord>(path: &Utf8Path, rows: &[T]) -> Result<(), ArtifactError> {
    let header_refs = T::field_names();
    let mut buf = String::new();
    buf.push_str(&render_row(header_refs));
    buf.push('\n');
    for row in rows {
        let values = row.to_row();
        let value_refs: Vec<&str> = values.iter().map(String::as_str).collect();
        buf.push_str(&render_row(&value_refs));
        buf.push('\n');
    }
    dcmrelay_util::atomic_write::write_file_atomic(path, &buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;
    use dcmrelay_types::record::FolderManifestRow;
    use tempfile::tempdir;

    fn row(n: u64) -> FolderManifestRow {
        FolderManifestRow {
            run_id: "r1".into(),
            folder_path: format!("/a/{n}"),
            file_count: n,
            size_bytes: n * 100,
            discovered_at: "2026-07-28T00:00:00".into(),
        }
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("folders.csv");
        append_csv_row(&path, &row(1)).unwrap();
        append_csv_row(&path, &row(2)).unwrap();

        let rows: Vec<FolderManifestRow> = read_csv_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].folder_path, "/a/1");
        assert_eq!(rows[1].file_count, 2);
    }

    #[test]
    fn values_containing_separator_round_trip_through_quoting() {
        let dir = tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("folders.csv");
        let mut r = row(1);
        r.folder_path = "/a;b/weird\"path".into();
        append_csv_row(&path, &r).unwrap();

        let rows: Vec<FolderManifestRow> = read_csv_rows(&path).unwrap();
        assert_eq!(rows[0].folder_path, "/a;b/weird\"path");
    }

    #[test]
    fn write_csv_table_rewrites_whole_file() {
        let dir = tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("folders.csv");
        write_csv_table(&path, &[row(1), row(2), row(3)]).unwrap();
        let rows: Vec<FolderManifestRow> = read_csv_rows(&path).unwrap();
        assert_eq!(rows.len(), 3);

        write_csv_table(&path, &[row(9)]).unwrap();
        let rows: Vec<FolderManifestRow> = read_csv_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file_count, 9);
    }

    #[test]
    fn reading_missing_file_returns_empty() {
        let dir = tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("nope.csv");
        let rows: Vec<FolderManifestRow> = read_csv_rows(&path).unwrap();
        assert!(rows.is_empty());
    }
}
