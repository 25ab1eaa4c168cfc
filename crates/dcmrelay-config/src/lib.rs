//! Configuration model, discovery, and validation for dcmrelay.

mod config;
pub mod error;

pub use config::{CliOverrides, Config, discover_config_file_from};
pub use error::ConfigError;
