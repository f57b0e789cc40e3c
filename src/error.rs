use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("vSphere API fault {fault}: {message}")]
    Vsphere { fault: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
}

impl ExporterError {
    /// True when the server rejected the session and a fresh login is needed.
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, ExporterError::Vsphere { fault, .. } if fault == "NotAuthenticated")
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
