//! Configuration loading, validation, and management for Catboard.
//!
//! Loads configuration from `~/.catboard/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use catboard_core::{Environment, Presentation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.catboard/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Product identifiers passed to every computation unchanged
    #[serde(default = "default_products")]
    pub products: Vec<String>,

    /// HTTP listener configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Static values exposed to the computation as `env`
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Computation engine (WASM module) configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Embed and component literals written into every response
    #[serde(default)]
    pub presentation: Presentation,
}

fn default_products() -> Vec<String> {
    vec!["Crypto.SOL/USD".into()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Largest request body read into memory, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Hex-encoded application public key
    #[serde(default)]
    pub public_key: String,

    /// Symbols the computation may quote
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl EnvironmentConfig {
    /// Build the runtime [`Environment`] handed to the delegate.
    pub fn to_environment(&self) -> Environment {
        Environment::new(self.public_key.clone(), self.symbols.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the compiled `.wasm` computation module
    #[serde(default = "default_wasm_path")]
    pub wasm_path: PathBuf,

    /// Maximum linear memory in bytes
    #[serde(default = "default_max_memory")]
    pub max_memory_bytes: usize,

    /// Maximum fuel (instruction count limit, 0 = unlimited)
    #[serde(default = "default_max_fuel")]
    pub max_fuel: u64,

    /// Wall-clock limit per computation in milliseconds (0 = none)
    #[serde(default)]
    pub timeout_ms: u64,

    /// Compile the module at startup instead of on the first request
    #[serde(default)]
    pub eager_init: bool,
}

fn default_wasm_path() -> PathBuf {
    PathBuf::from("catboard.wasm")
}
fn default_max_memory() -> usize {
    16 * 1024 * 1024 // 16 MiB
}
fn default_max_fuel() -> u64 {
    1_000_000_000 // ~1 billion instructions
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wasm_path: default_wasm_path(),
            max_memory_bytes: default_max_memory(),
            max_fuel: default_max_fuel(),
            timeout_ms: 0,
            eager_init: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.catboard/config.toml).
    ///
    /// Environment variables override the file:
    /// - `CATBOARD_PUBLIC_KEY`
    /// - `CATBOARD_SYMBOLS` (comma-separated)
    /// - `CATBOARD_WASM_PATH`
    /// - `CATBOARD_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_overrides(&config_path)
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_with_overrides(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // A relative module path is relative to the config file.
        if config.engine.wasm_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.engine.wasm_path = dir.join(&config.engine.wasm_path);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("CATBOARD_PUBLIC_KEY") {
            self.environment.public_key = key;
        }

        if let Some(symbols) = lookup("CATBOARD_SYMBOLS") {
            self.environment.symbols = symbols
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(path) = lookup("CATBOARD_WASM_PATH") {
            self.engine.wasm_path = PathBuf::from(path);
        }

        if let Some(port) = lookup("CATBOARD_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("CATBOARD_PORT is not a valid port: {port}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".catboard")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_body_bytes must be > 0".into(),
            ));
        }

        if self.environment.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "environment.symbols must not contain empty entries".into(),
            ));
        }

        if self.products.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "products must not contain empty entries".into(),
            ));
        }

        if self.presentation.embed.title.is_empty() {
            return Err(ConfigError::ValidationError(
                "presentation.embed.title must not be empty".into(),
            ));
        }

        if self
            .presentation
            .component
            .components
            .iter()
            .any(|b| b.label.is_empty() || b.custom_id.is_empty())
        {
            return Err(ConfigError::ValidationError(
                "every presentation button needs a label and a custom_id".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            products: default_products(),
            gateway: GatewayConfig::default(),
            environment: EnvironmentConfig::default(),
            engine: EngineConfig::default(),
            presentation: Presentation::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
