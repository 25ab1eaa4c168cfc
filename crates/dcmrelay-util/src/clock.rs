//! Timestamp and run-identifier helpers (spec §4.1).
//!
//! Format strings are load-bearing: every CSV/JSON artifact on disk embeds
//! `now_br`/`now_iso` output verbatim, so changing them changes the wire
//! format of every artifact.

use chrono::Local;

/// ISO-8601-ish local timestamp with second precision, no timezone suffix.
/// Matches `datetime.now().strftime("%Y-%m-%dT%H:%M:%S")`.
#[must_use]
pub fn now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Brazilian-locale local timestamp (`dd/mm/YYYY HH:MM:SS`), the primary
/// human-facing timestamp written into most artifact rows.
#[must_use]
pub fn now_br() -> String {
    Local::now().format("%d/%m/%Y %H:%M:%S").to_string()
}

/// Both timestamp flavors sampled from a single instant, for rows that carry
/// both `timestamp_br` and `timestamp_iso` columns (they must not drift
/// relative to one another).
#[must_use]
pub fn now_dual_timestamp() -> (String, String) {
    let now = Local::now();
    (
        now.format("%d/%m/%Y %H:%M:%S").to_string(),
        now.format("%Y-%m-%dT%H:%M:%S").to_string(),
    )
}

/// Default run identifier when the operator doesn't supply one.
#[must_use]
pub fn now_run_id() -> String {
    Local::now().format("%d%m%Y_%H%M%S").to_string()
}

/// Human-readable ETA, `calculando` (lit. "computing") when unknown.
#[must_use]
pub fn format_eta(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| *s >= 0.0) else {
        return "calculando".to_string();
    };
    let total = seconds as i64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Duration formatted to one decimal place, e.g. `"12.3s"`.
#[must_use]
pub fn format_duration_sec(seconds: f64) -> String {
    format!("{:.1}s", seconds.max(0.0))
}

/// Known toolkit-run suffixes a run id may already carry. Stripped before
/// re-deriving the current suffix so resuming with a different toolkit
/// doesn't stack suffixes (`_toolF_files_toolT`).
const KNOWN_RUN_SUFFIXES: &[&str] = &["_toolF_folders", "_toolF_files", "_toolT"];

/// Strip any already-present toolkit suffix from a run id.
#[must_use]
pub fn strip_known_run_suffixes(run_id: &str) -> String {
    let mut base = run_id.trim().to_string();
    if base.is_empty() {
        return base;
    }
    loop {
        let lower = base.to_lowercase();
        let mut stripped = false;
        for suffix in KNOWN_RUN_SUFFIXES {
            if lower.ends_with(&suffix.to_lowercase()) {
                base.truncate(base.len() - suffix.len());
                base = base.trim_end_matches('_').to_string();
                stripped = true;
                break;
            }
        }
        if !stripped {
            return base;
        }
    }
}

/// Derive the suffix for a given toolkit + ToolF send-mode combination
/// (spec §4.1): `_toolF_files`, `_toolF_folders`, or `_toolT`.
#[must_use]
pub fn toolkit_run_suffix(toolkit: dcmrelay_types::Toolkit, folder_mode: bool) -> &'static str {
    match (toolkit, folder_mode) {
        (dcmrelay_types::Toolkit::ToolF, true) => "_toolF_folders",
        (dcmrelay_types::Toolkit::ToolF, false) => "_toolF_files",
        (dcmrelay_types::Toolkit::ToolT, _) => "_toolT",
    }
}

/// Idempotently normalize a run id to carry exactly the suffix implied by
/// `toolkit`/`folder_mode`: strip any known suffix first, then reapply the
/// current one. Calling this twice on its own output is a no-op (spec §4.1
/// resume-equivalence invariant).
#[must_use]
pub fn normalize_run_id(raw: &str, toolkit: dcmrelay_types::Toolkit, folder_mode: bool) -> String {
    let base = strip_known_run_suffixes(raw);
    format!("{base}{}", toolkit_run_suffix(toolkit, folder_mode))
}
