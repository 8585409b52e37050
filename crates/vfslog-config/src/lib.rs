//! # vfslog-config
//!
//! Configuration for VFS log inspection.
//!
//! Loads configuration from:
//! 1. `~/.vfslog/config.toml` (global)
//! 2. `.vfslog/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;

use once_cell::sync::Lazy;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read()
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write() = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub time_machine: TimeMachineConfig,
    pub chronicle: ChronicleConfig,
    pub oracle: OracleConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Global config (~/.vfslog/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = Self::load_from(&global_path)?;
            }
        }

        // 2. Project config (.vfslog/config.toml) - overrides global
        let project_path = Path::new(".vfslog/config.toml");
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            let contents = std::fs::read_to_string(project_path)?;
            config.merge(&contents)?;
        }

        // 3. Environment variable overrides
        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load a single config file, without env overrides
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: ~/.vfslog/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".vfslog/config.toml"))
    }

    /// Overlay a project config: only keys present in `contents` replace
    /// the current values.
    pub fn merge(&mut self, contents: &str) -> Result<(), ConfigError> {
        let overlay: ConfigOverlay = toml::from_str(contents)?;

        if let Some(tm) = overlay.time_machine {
            if let Some(v) = tm.sweep_interval {
                self.time_machine.sweep_interval = v;
            }
        }
        if let Some(ch) = overlay.chronicle {
            if let Some(v) = ch.strict_invalid_records {
                self.chronicle.strict_invalid_records = v;
            }
        }
        if let Some(or) = overlay.oracle {
            if let Some(v) = or.enabled {
                self.oracle.enabled = v;
            }
            if let Some(v) = or.max_distance_bytes {
                self.oracle.max_distance_bytes = v;
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = var("VFSLOG_ORACLE_MAX_DISTANCE") {
            self.oracle.max_distance_bytes = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "VFSLOG_ORACLE_MAX_DISTANCE",
                value,
            })?;
        }
        if let Some(value) = var("VFSLOG_ORACLE_ENABLED") {
            self.oracle.enabled = parse_bool("VFSLOG_ORACLE_ENABLED", value)?;
        }
        if let Some(value) = var("VFSLOG_STRICT_INVALID_RECORDS") {
            self.chronicle.strict_invalid_records = parse_bool("VFSLOG_STRICT_INVALID_RECORDS", value)?;
        }
        Ok(())
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&Config::default())
    }
}

fn parse_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { name, value }),
    }
}

/// Snapshot cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeMachineConfig {
    /// Cache inserts between sweeps of reclaimed snapshot entries
    pub sweep_interval: usize,
}

impl Default for TimeMachineConfig {
    fn default() -> Self {
        Self { sweep_interval: 64 }
    }
}

/// Log scanning settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronicleConfig {
    /// Refuse to fall back to an older snapshot when the scanned window
    /// contained unreadable entries
    pub strict_invalid_records: bool,
}

/// Ground-truth oracle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Consult the oracle at all
    pub enabled: bool,
    /// Farthest distance from the log end (bytes) the oracle will answer for
    pub max_distance_bytes: u64,
}

impl OracleConfig {
    /// Default distance gate: 8 MiB
    pub const DEFAULT_MAX_DISTANCE: u64 = 8 * 1024 * 1024;
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_distance_bytes: Self::DEFAULT_MAX_DISTANCE,
        }
    }
}

/// Partial config used for project-level overrides
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    time_machine: Option<TimeMachineOverlay>,
    chronicle: Option<ChronicleOverlay>,
    oracle: Option<OracleOverlay>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeMachineOverlay {
    sweep_interval: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ChronicleOverlay {
    strict_invalid_records: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OracleOverlay {
    enabled: Option<bool>,
    max_distance_bytes: Option<u64>,
}
