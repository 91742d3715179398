//! Error types for the tripwire CLI

use std::path::PathBuf;
use thiserror::Error;
use tripwire_engine::EngineError;
use tripwire_types::ConfigError;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported file format for {path} (expected .yaml, .yml, .json or .toml)")]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("No state file given; pass --state or set state_path in the settings")]
    MissingState,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
