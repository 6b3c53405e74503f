// Configuration loading and parsing (config/statline.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Assembled runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite warehouse file holding the source table and the
    /// published datasets.
    pub warehouse_path: String,
    /// Default CSV path for `statline import` when no path argument is given.
    pub source_csv: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            warehouse_path: "statline.db".to_string(),
            source_csv: "data/player_game_stats.csv".to_string(),
        }
    }
}

/// Raw deserialization target for the entire statline.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    warehouse: WarehouseSection,
    source: SourceSection,
}

#[derive(Debug, Clone, Deserialize)]
struct WarehouseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SourceSection {
    csv: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load configuration from `config/statline.toml` relative to `base_dir`.
///
/// A missing config file is not an error: the documented defaults apply
/// (warehouse at `statline.db`, source CSV at `data/player_game_stats.csv`).
/// A present-but-malformed file is fatal.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("statline.toml");

    if !path.exists() {
        return Ok(Config::default());
    }

    let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
        path: path.clone(),
        source: e,
    })?;

    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        warehouse_path: file.warehouse.path,
        source_csv: file.source.csv,
    };

    validate(&config)?;

    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io {
        path: PathBuf::from("."),
        source: e,
    })?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.warehouse_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "warehouse.path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.source_csv.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "source.csv".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
