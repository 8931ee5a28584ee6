use std::path::PathBuf;
use thiserror::Error;

/// Exit status used when the activity log cannot be written after all retries.
pub const EXIT_LOG_FAILURE: i32 = 1;

/// Exit status used when startup fails (bad configuration, unusable log path).
pub const EXIT_STARTUP_FAILURE: i32 = 2;

/// Core library errors
#[derive(Error, Debug)]
pub enum SweeperError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error at path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoBare(#[from] std::io::Error),

    #[error("System call failed: {0}")]
    Nix(#[from] nix::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Volume '{0}' reports zero total capacity")]
    ZeroCapacity(String),

    #[error("Evaluation pass panicked: {0}")]
    PassPanicked(String),

    #[error("{0}")]
    Other(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file '{0}' already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("No config directory could be determined; pass --config")]
    NoConfigDir,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Activity log sink errors
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to write log line after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SweeperError>;
