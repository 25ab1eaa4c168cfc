use std::path::Path;

use camino::Utf8PathBuf;

use crate::error::ConfigError;

use super::model::Config;

/// On-disk TOML shape. A plain flat mirror of [`Config`] with every field
/// optional, so a partial file only overrides what it mentions.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct TomlConfig {
    pub toolkit: Option<dcmrelay_types::Toolkit>,
    pub aet_source: Option<String>,
    pub aet_dest: Option<String>,
    pub pacs_host: Option<String>,
    pub pacs_port: Option<u16>,
    pub pacs_rest_host: Option<String>,
    pub runs_base_dir: Option<String>,
    pub batch_size_default: Option<u64>,
    pub allowed_extensions: Option<String>,
    pub restrict_extensions: Option<bool>,
    pub include_no_extension: Option<bool>,
    pub collect_size_bytes: Option<bool>,
    pub ts_mode: Option<dcmrelay_types::TsMode>,
    pub toolf_send_mode: Option<dcmrelay_types::ToolFSendMode>,
    pub toolf_iuid_update_mode: Option<dcmrelay_types::ToolFIuidUpdateMode>,
    pub toolf_use_shell_wrapper: Option<bool>,
    pub toolf_prefer_java_direct: Option<bool>,
}

/// Search upward from `start_dir` for `dcmrelay.toml`, stopping at a
/// repository root marker or the filesystem root.
pub fn discover_config_file_from(start_dir: &Path) -> Option<Utf8PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let candidate = current.join("dcmrelay.toml");
        if candidate.exists() {
            return Utf8PathBuf::from_path_buf(candidate).ok();
        }

        if current.join(".git").exists() || current.parent().is_none() {
            return None;
        }

        current = current
            .parent()
            .expect("checked above that parent exists")
            .to_path_buf();
    }
}

/// Load and parse a TOML config file. A missing file is not an error here —
/// callers decide whether an explicit `--config` path must exist.
pub(super) fn load_config_file(path: &Utf8PathBuf) -> Result<TomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

impl TomlConfig {
    /// Apply every field this file actually set onto `base`.
    pub(super) fn apply_onto(self, base: &mut Config) {
        if let Some(v) = self.toolkit {
            base.toolkit = v;
        }
        if let Some(v) = self.aet_source {
            base.aet_source = v;
        }
        if let Some(v) = self.aet_dest {
            base.aet_dest = v;
        }
        if let Some(v) = self.pacs_host {
            base.pacs_host = v;
        }
        if let Some(v) = self.pacs_port {
            base.pacs_port = v;
        }
        if let Some(v) = self.pacs_rest_host {
            base.pacs_rest_host = v;
        }
        if let Some(v) = self.runs_base_dir {
            base.runs_base_dir = v;
        }
        if let Some(v) = self.batch_size_default {
            base.batch_size_default = v;
        }
        if let Some(v) = self.allowed_extensions {
            base.allowed_extensions = v;
        }
        if let Some(v) = self.restrict_extensions {
            base.restrict_extensions = v;
        }
        if let Some(v) = self.include_no_extension {
            base.include_no_extension = v;
        }
        if let Some(v) = self.collect_size_bytes {
            base.collect_size_bytes = v;
        }
        if let Some(v) = self.ts_mode {
            base.ts_mode = v;
        }
        if let Some(v) = self.toolf_send_mode {
            base.toolf_send_mode = v;
        }
        if let Some(v) = self.toolf_iuid_update_mode {
            base.toolf_iuid_update_mode = v;
        }
        if let Some(v) = self.toolf_use_shell_wrapper {
            base.toolf_use_shell_wrapper = v;
        }
        if let Some(v) = self.toolf_prefer_java_direct {
            base.toolf_prefer_java_direct = v;
        }
    }
}
