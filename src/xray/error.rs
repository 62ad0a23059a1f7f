//! Error types for core management

use thiserror::Error;

/// Failures surfaced by provisioning, configuration and process control
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Download failed: {0}")]
    Network(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Digest mismatch: expected {expected}, got {computed}")]
    DigestMismatch { expected: String, computed: String },

    #[error("Failed to start xray: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("No free port to replace {port} after {attempts} attempts")]
    NoFreePort { port: u16, attempts: usize },

    #[error("No outbound matches {0}")]
    OutboundNotFound(String),

    #[error("No readable core configuration at {0}")]
    MissingConfiguration(String),

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Network(e.to_string())
    }
}

impl From<zip::result::ZipError> for CoreError {
    fn from(e: zip::result::ZipError) -> Self {
        CoreError::Extraction(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
