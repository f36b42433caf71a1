//! Error types for Forge

use thiserror::Error;

/// Main error type for Forge
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found in {0}")]
    ConfigNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Daily prompt limit reached ({limit} per day)")]
    QuotaExceeded { limit: u32 },

    #[error("Sandbox runtime unsupported: {0}")]
    RuntimeUnsupported(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Mount error: {0}")]
    Mount(String),

    #[error("Invalid file tree: {0}")]
    InvalidFileTree(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ForgeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ForgeError::Network(format!("request timed out: {}", e))
        } else {
            ForgeError::Network(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
