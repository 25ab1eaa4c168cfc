use std::path::Path;

use camino::Utf8PathBuf;

use crate::error::ConfigError;

use super::discovery::{discover_config_file_from, load_config_file};
use super::model::Config;
use super::overrides::CliOverrides;

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    /// (spec §10.3), rooted at the current working directory.
    pub fn discover(overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
        Self::discover_from(&start_dir, overrides)
    }

    /// Path-driven variant of [`Config::discover`], used by tests so no
    /// process-global current directory is involved.
    pub fn discover_from(start_dir: &Path, overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        let config_path: Option<Utf8PathBuf> = match &overrides.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            load_config_file(path)?.apply_onto(&mut config);
        }

        overrides.clone().apply_onto(&mut config);

        config.validate()?;
        Ok(config)
    }
}

impl CliOverrides {
    fn apply_onto(self, base: &mut Config) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        let overrides = CliOverrides::default();
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover_from(dir.path(), &overrides).unwrap();
        assert_eq!(config.batch_size_default, 200);
        assert_eq!(config.pacs_port, 5555);
    }

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("dcmrelay.toml"),
            "pacs_host = \"10.0.0.5\"\nbatch_size_default = 50\n",
        )
        .unwrap();

        let overrides = CliOverrides {
            batch_size_default: Some(99),
            ..Default::default()
        };
        let config = Config::discover_from(dir.path(), &overrides).unwrap();
        assert_eq!(config.pacs_host, "10.0.0.5");
        assert_eq!(config.batch_size_default, 99);
    }

    #[test]
    fn explicit_missing_config_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = CliOverrides {
            config_path: Some(Utf8PathBuf::from(
                dir.path().join("missing.toml").to_string_lossy().as_ref(),
            )),
            ..Default::default()
        };
        assert!(Config::discover_from(dir.path(), &overrides).is_err());
    }
}
