//! Error types for vigia

use crate::models::FailureKind;
use thiserror::Error;

/// Main error type for vigia operations
#[derive(Debug, Error)]
pub enum VigiaError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("TLS error: {0}")]
    TlsError(#[from] native_tls::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("TLS connection failed: {0}")]
    TlsConnectionError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("DNS resolution failed: {0}")]
    ResolutionError(String),

    #[error("{0}")]
    TimeoutExceeded(String),

    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Scanner error: {0}")]
    ScanError(String),
}

impl VigiaError {
    /// Maps the error onto the failure taxonomy stored in scan results
    pub fn kind(&self) -> FailureKind {
        match self {
            VigiaError::HttpError(e) if e.is_timeout() => FailureKind::TimeoutExceeded,
            VigiaError::HttpError(_)
            | VigiaError::ConnectionError(_)
            | VigiaError::ResolutionError(_) => FailureKind::Connection,
            VigiaError::TlsError(_) | VigiaError::TlsConnectionError(_) => {
                FailureKind::TlsConnection
            }
            VigiaError::UrlError(_) | VigiaError::ParseError(_) => FailureKind::Parse,
            VigiaError::TimeoutExceeded(_) => FailureKind::TimeoutExceeded,
            VigiaError::ToolUnavailable(_) => FailureKind::ToolUnavailable,
            _ => FailureKind::Other,
        }
    }
}

/// Result type alias for vigia operations
pub type Result<T> = std::result::Result<T, VigiaError>;
