//! Internal toolkit discovery under `<base>/toolkits/{prefix}-*/bin/` (spec
//! §4.4, grounded on `toolkit_drivers.py::find_toolkit_bin`).

use camino::{Utf8Path, Utf8PathBuf};

/// Find the `bin/` directory of the highest-sorting `toolkits/{prefix}*`
/// subdirectory that contains `marker_file`. Directory names are compared
/// lexicographically in reverse (so `dcm4che-5.32.0` beats `dcm4che-5.24.0`
/// only because string comparison happens to agree with version order for
/// zero-padded releases; this mirrors the original's plain `sort(reverse=True)`
/// rather than a semver-aware comparison).
#[must_use]
pub fn find_toolkit_bin(base_dir: &Utf8Path, toolkit_prefix: &str, marker_file: &str) -> Option<Utf8PathBuf> {
    let toolkits_dir = base_dir.join("toolkits");
    if !toolkits_dir.is_dir() {
        return None;
    }

    let mut candidates: Vec<Utf8PathBuf> = std::fs::read_dir(toolkits_dir.as_std_path())
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.path()).ok())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_lowercase().starts_with(&toolkit_prefix.to_lowercase()))
                .unwrap_or(false)
        })
        .collect();

    candidates.sort();
    candidates.reverse();

    candidates.into_iter().find_map(|candidate| {
        let bin_dir = candidate.join("bin");
        bin_dir.join(marker_file).is_file().then_some(bin_dir)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn make_toolkit(base: &Utf8Path, dirname: &str, marker: &str) {
        let bin = base.join("toolkits").join(dirname).join("bin");
        fs::create_dir_all(bin.as_std_path()).unwrap();
        fs::write(bin.join(marker).as_std_path(), b"").unwrap();
    }

    #[test]
    fn picks_highest_sorting_version_with_the_marker_file() {
        let dir = tempdir().unwrap();
        let base = Utf8Path::from_path(dir.path()).unwrap();
        make_toolkit(base, "dcm4che-5.24.0", "storescu.bat");
        make_toolkit(base, "dcm4che-5.32.0", "storescu.bat");

        let found = find_toolkit_bin(base, "dcm4che", "storescu.bat").unwrap();
        assert!(found.as_str().contains("5.32.0"));
    }

    #[test]
    fn skips_candidates_missing_the_marker_file() {
        let dir = tempdir().unwrap();
        let base = Utf8Path::from_path(dir.path()).unwrap();
        let bin = base.join("toolkits").join("dcm4che-5.32.0").join("bin");
        fs::create_dir_all(bin.as_std_path()).unwrap();
        make_toolkit(base, "dcm4che-5.24.0", "storescu.bat");

        let found = find_toolkit_bin(base, "dcm4che", "storescu.bat").unwrap();
        assert!(found.as_str().contains("5.24.0"));
    }

    #[test]
    fn missing_toolkits_dir_returns_none() {
        let dir = tempdir().unwrap();
        let base = Utf8Path::from_path(dir.path()).unwrap();
        assert!(find_toolkit_bin(base, "dcm4che", "storescu.bat").is_none());
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let base = Utf8Path::from_path(dir.path()).unwrap();
        make_toolkit(base, "DCMTK-3.6.7", "storescu.exe");
        assert!(find_toolkit_bin(base, "dcmtk", "storescu.exe").is_some());
    }
}
