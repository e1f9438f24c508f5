pub mod config_cmd;
pub mod doctor;
pub mod serve;

use catboard_config::AppConfig;
use std::path::{Path, PathBuf};

pub fn default_config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

/// Load the config file and apply environment overrides.
pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load_with_overrides(path).map_err(|e| format!("Failed to load config: {e}").into())
}
