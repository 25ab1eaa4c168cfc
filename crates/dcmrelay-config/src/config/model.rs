//! The option set of spec.md §6, as a plain serde-able struct.

use std::collections::HashSet;

use dcmrelay_types::{Toolkit, ToolFIuidUpdateMode, ToolFSendMode, TsMode};
use serde::{Deserialize, Serialize};

fn default_toolkit() -> Toolkit {
    Toolkit::ToolF
}
fn default_aet_source() -> String {
    "HMD_IMPORTER".to_string()
}
fn default_aet_dest() -> String {
    "HMD_IMPORTED".to_string()
}
fn default_pacs_host() -> String {
    "192.168.1.70".to_string()
}
fn default_pacs_port() -> u16 {
    5555
}
fn default_pacs_rest_host() -> String {
    "192.168.1.70:8080".to_string()
}
fn default_batch_size() -> u64 {
    200
}
fn default_allowed_extensions() -> String {
    ".dcm".to_string()
}
fn default_true() -> bool {
    true
}
fn default_ts_mode() -> TsMode {
    TsMode::Auto
}
fn default_send_mode() -> ToolFSendMode {
    ToolFSendMode::ManifestFiles
}
fn default_iuid_update_mode() -> ToolFIuidUpdateMode {
    ToolFIuidUpdateMode::Realtime
}
fn default_runs_base_dir() -> String {
    "runs".to_string()
}

/// The full configuration surface recognized by the core (spec §6).
///
/// Loaded from TOML with CLI-flag overrides applied on top (precedence:
/// CLI > file > these defaults). Unknown TOML keys are rejected by
/// `#[serde(deny_unknown_fields)]` — a closed configuration surface, in
/// keeping with the closed-enum philosophy of spec.md §9.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    #[serde(default = "default_toolkit")]
    pub toolkit: Toolkit,
    #[serde(default = "default_aet_source")]
    pub aet_source: String,
    #[serde(default = "default_aet_dest")]
    pub aet_dest: String,
    #[serde(default = "default_pacs_host")]
    pub pacs_host: String,
    #[serde(default = "default_pacs_port")]
    pub pacs_port: u16,
    #[serde(default = "default_pacs_rest_host")]
    pub pacs_rest_host: String,
    #[serde(default = "default_runs_base_dir")]
    pub runs_base_dir: String,
    #[serde(default = "default_batch_size")]
    pub batch_size_default: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: String,
    #[serde(default = "default_true")]
    pub restrict_extensions: bool,
    #[serde(default = "default_true")]
    pub include_no_extension: bool,
    #[serde(default)]
    pub collect_size_bytes: bool,
    #[serde(default = "default_ts_mode")]
    pub ts_mode: TsMode,
    #[serde(default = "default_send_mode")]
    pub toolf_send_mode: ToolFSendMode,
    #[serde(default = "default_iuid_update_mode")]
    pub toolf_iuid_update_mode: ToolFIuidUpdateMode,
    #[serde(default = "default_true")]
    pub toolf_use_shell_wrapper: bool,
    #[serde(default = "default_true")]
    pub toolf_prefer_java_direct: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toolkit: default_toolkit(),
            aet_source: default_aet_source(),
            aet_dest: default_aet_dest(),
            pacs_host: default_pacs_host(),
            pacs_port: default_pacs_port(),
            pacs_rest_host: default_pacs_rest_host(),
            runs_base_dir: default_runs_base_dir(),
            batch_size_default: default_batch_size(),
            allowed_extensions: default_allowed_extensions(),
            restrict_extensions: true,
            include_no_extension: true,
            collect_size_bytes: false,
            ts_mode: default_ts_mode(),
            toolf_send_mode: default_send_mode(),
            toolf_iuid_update_mode: default_iuid_update_mode(),
            toolf_use_shell_wrapper: true,
            toolf_prefer_java_direct: true,
        }
    }
}

impl Config {
    /// `allowed_extensions` parsed into a lowercase, dot-prefixed set
    /// (spec §10.3: "parsed into a lowercase set").
    #[must_use]
    pub fn allowed_extensions_set(&self) -> HashSet<String> {
        self.allowed_extensions
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let lower = s.to_lowercase();
                if lower.starts_with('.') {
                    lower
                } else {
                    format!(".{lower}")
                }
            })
            .collect()
    }

    /// Downgrade a non-`AUTO` `ts_mode` to `AUTO`, per spec.md §9's Open
    /// Question: no semantics are invented for the other two variants.
    #[must_use]
    pub fn effective_ts_mode(&self) -> (TsMode, bool) {
        match self.ts_mode {
            TsMode::Auto => (TsMode::Auto, false),
            other @ (TsMode::JpegLsLossless | TsMode::UncompressedStandard) => {
                let _ = other;
                (TsMode::Auto, true)
            }
        }
    }
}
