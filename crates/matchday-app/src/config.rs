// Configuration loading and parsing (season.toml).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub season: SeasonConfig,
    pub db_path: String,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// season.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire season.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SeasonFile {
    season: SeasonConfig,
    database: DatabaseSection,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonConfig {
    pub name: String,
    /// Transfer deadline of each gameweek; index 0 is gameweek 1.
    pub deadlines: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    /// CSV of `player_id,gameweek,points` rows imported on each run.
    pub player_points: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/season.toml` relative to
/// the given `base_dir`.
///
/// Does not copy defaults. Prefer `load_config()`, which does.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let season_path = base_dir.join("config").join("season.toml");
    let season_text = read_file(&season_path)?;
    let season_file: SeasonFile =
        toml::from_str(&season_text).map_err(|e| ConfigError::ParseError {
            path: season_path.clone(),
            source: e,
        })?;

    let config = Config {
        season: season_file.season,
        db_path: season_file.database.path,
        data_paths: season_file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy `defaults/season.toml` to `config/season.toml` unless the latter
/// already exists. Returns the path written, if any.
pub fn ensure_season_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join("season.toml");
    if target.exists() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join("season.toml");
    if !source.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no config/season.toml and no defaults/season.toml in {}",
                base_dir.display()
            ),
        });
    }

    if let Some(config_dir) = target.parent() {
        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", config_dir.display()),
        })?;
    }
    std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {} to {}: {e}", source.display(), target.display()),
    })?;
    Ok(Some(target))
}

/// Load config relative to the current working directory, copying the
/// default season file first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_season_file(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.season.name.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "season.name".into(),
            message: "must not be empty".into(),
        });
    }

    let deadlines = &config.season.deadlines;
    if deadlines.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "season.deadlines".into(),
            message: "at least one gameweek deadline is required".into(),
        });
    }
    for (i, pair) in deadlines.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(ConfigError::ValidationError {
                field: "season.deadlines".into(),
                message: format!(
                    "deadline for gameweek {} ({}) is not after gameweek {} ({})",
                    i + 2,
                    pair[1],
                    i + 1,
                    pair[0]
                ),
            });
        }
    }

    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.data_paths.player_points.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data_paths.player_points".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
