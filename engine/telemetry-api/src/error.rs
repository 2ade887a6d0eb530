//! Error types for the telemetry API

use std::path::PathBuf;
use thiserror::Error;
use warp::http::StatusCode;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Admission control: {0}")]
    Admission(#[from] admission_controller::AdmissionError),
}

impl ConfigError {
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid { key: key.to_string(), message: message.into() }
    }
}

/// Errors raised by the data store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to get a database connection: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("No rows in table {0}")]
    Empty(&'static str),
}

/// Errors surfaced to HTTP clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Wrong key")]
    Unauthorized,

    #[error("Too many requests")]
    TooManyRequests,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients
    pub fn public_message(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "Wrong key",
            ApiError::TooManyRequests => "Too many requests",
            ApiError::Store(StoreError::Connection(_)) => "Failed to get a database connection",
            ApiError::Store(_) => "Failed to get data",
        }
    }
}

impl warp::reject::Reject for ApiError {}

/// Result type for data store operations
pub type StoreResult<T> = Result<T, StoreError>;
