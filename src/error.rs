// src/error.rs

//! Unified error handling for the change checker.

use std::fmt;

use thiserror::Error;

/// Result type alias for checker operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A request got no usable response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Reading or writing a resource's artifacts failed
    #[error("Storage error for {id}: {message}")]
    Storage { id: String, message: String },

    /// Building or delivering a mail failed
    #[error("Mail error: {0}")]
    Mail(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a transport error.
    pub fn transport(message: impl fmt::Display) -> Self {
        Self::Transport(message.to_string())
    }

    /// Create a storage error with the affected resource id.
    pub fn storage(id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Storage {
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Create a mail error.
    pub fn mail(message: impl fmt::Display) -> Self {
        Self::Mail(message.to_string())
    }
}
