//! Configuration loading and database path resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents for an orgmap service
///
/// All fields are optional; missing fields fall back to environment
/// variables and then compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    pub database_path: Option<String>,
    /// Listen address for the HTTP server (e.g. "127.0.0.1:5731")
    pub listen_addr: Option<String>,
    /// Exact-match confidence threshold (0-100)
    pub exact_threshold: Option<u8>,
    /// Lower bound of the similar/fuzzy confidence band (0-100)
    pub similar_threshold: Option<u8>,
    /// Fixed pacing between FWC agreement search calls, in milliseconds
    pub fwc_pacing_ms: Option<u64>,
}

/// Resolve the configuration file path for a service
///
/// Priority order:
/// 1. `ORGMAP_CONFIG` environment variable
/// 2. User config directory (`~/.config/orgmap/<service>.toml`)
pub fn config_file_path(service: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ORGMAP_CONFIG") {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|d| d.join("orgmap").join(format!("{}.toml", service)))
}

/// Load TOML configuration for a service, or defaults if no file exists
pub fn load_toml_config(service: &str) -> Result<TomlConfig> {
    let path = match config_file_path(service) {
        Some(p) if p.exists() => p,
        _ => return Ok(TomlConfig::default()),
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write TOML configuration to a file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, content)?;
    Ok(())
}

/// Resolve the database path following the priority order:
/// 1. `ORGMAP_DB` environment variable (highest priority)
/// 2. TOML config file (`database_path` key)
/// 3. OS-dependent compiled default (fallback)
pub fn resolve_database_path(toml_config: &TomlConfig) -> PathBuf {
    if let Ok(path) = std::env::var("ORGMAP_DB") {
        return PathBuf::from(path);
    }

    if let Some(path) = &toml_config.database_path {
        return PathBuf::from(path);
    }

    default_database_path()
}

/// Get OS-dependent default database path
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("orgmap"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/orgmap"))
        .join("orgmap.db")
}
