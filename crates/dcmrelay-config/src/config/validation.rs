use crate::error::ConfigError;

use super::model::Config;

impl Config {
    /// Validate the final, merged configuration (spec §6/§10.3).
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size_default < 1 {
            return Err(ConfigError::InvalidValue {
                key: "batch_size_default".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.pacs_port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pacs_port".to_string(),
                reason: "must be in range 1-65535".to_string(),
            });
        }

        if self.pacs_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "pacs_host".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.pacs_rest_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "pacs_rest_host".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.aet_source.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "aet_source".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.aet_dest.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "aet_dest".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.allowed_extensions_set().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "allowed_extensions".to_string(),
                reason: "must contain at least one extension".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_batch_size() {
        let config = Config {
            batch_size_default: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_host() {
        let config = Config {
            pacs_host: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn extension_set_is_lowercased_and_dotted() {
        let config = Config {
            allowed_extensions: "DCM, .ima".to_string(),
            ..Config::default()
        };
        let set = config.allowed_extensions_set();
        assert!(set.contains(".dcm"));
        assert!(set.contains(".ima"));
    }
}
