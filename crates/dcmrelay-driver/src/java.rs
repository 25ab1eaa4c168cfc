//! Java runtime discovery for ToolF's direct-invocation (`java -jar` /
//! argfile) path, grounded on `shared/utils.py::resolve_java_executable`.

use std::process::Command;
use std::time::Duration;

use camino::Utf8PathBuf;

/// Probe `JAVA_HOME/bin/java` (or `java.exe` on Windows) first, then `java`
/// on `PATH`, running `java -version` against each candidate and returning
/// the first one that exits zero. Both `RUN_SEND_JAVA_HEALTHCHECK` and
/// `RUN_SEND_JAVA_HEALTHCHECK_FAIL` telemetry events are emitted by the
/// caller around this result, not here.
#[must_use]
pub fn resolve_java_executable(healthcheck_timeout: Duration) -> Result<Utf8PathBuf, String> {
    let mut candidates: Vec<Utf8PathBuf> = Vec::new();

    if let Ok(java_home) = std::env::var("JAVA_HOME") {
        let java_home = java_home.trim();
        if !java_home.is_empty() {
            let binary = if cfg!(windows) { "java.exe" } else { "java" };
            candidates.push(Utf8PathBuf::from(java_home).join("bin").join(binary));
        }
    }
    if let Ok(on_path) = which::which("java")
        && let Ok(utf8) = Utf8PathBuf::from_path_buf(on_path)
    {
        candidates.push(utf8);
    }

    let mut seen = std::collections::HashSet::new();
    let mut last_reason = "java_not_found".to_string();

    for candidate in candidates {
        if !seen.insert(candidate.clone()) {
            continue;
        }
        match run_version_check(&candidate, healthcheck_timeout) {
            Ok(()) => return Ok(candidate),
            Err(reason) => last_reason = reason,
        }
    }

    Err(last_reason)
}

fn run_version_check(java: &camino::Utf8Path, timeout: Duration) -> Result<(), String> {
    let _ = timeout; // std::process::Command has no native timeout; callers healthcheck within their own async budget.
    let output = Command::new(java.as_std_path())
        .arg("-version")
        .output()
        .map_err(|e| e.to_string())?;
    if output.status.success() {
        Ok(())
    } else {
        Err(format!("java_version_exit={:?}", output.status.code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_java_home_and_missing_on_path_fails_gracefully() {
        // SAFETY: test-only, single-threaded env mutation scoped to this test.
        unsafe {
            std::env::remove_var("JAVA_HOME");
        }
        // We don't assert success/failure (the test host may or may not have
        // a JDK installed) — only that this never panics.
        let _ = resolve_java_executable(Duration::from_secs(8));
    }
}
