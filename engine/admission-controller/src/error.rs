//! Error types for the admission controller

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}
