use crate::selector::SelectionError;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with a request that are reported to the caller before dispatch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Code cannot be empty")]
    EmptyCode,

    #[error("Language must be specified")]
    EmptyLanguage,

    #[error("Timeout must be a positive number of milliseconds")]
    InvalidTimeout,

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

impl From<SelectionError> for RequestError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::UnsupportedLanguage(language) => {
                RequestError::UnsupportedLanguage(language)
            }
        }
    }
}

/// Invalid or unreadable configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Runtime '{0}' is not compiled in")]
    RuntimeUnavailable(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
