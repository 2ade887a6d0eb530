//! Shared-key authorization for the usage endpoint

use crate::error::ApiError;

/// Checks the `key` query parameter against the configured key
#[derive(Clone)]
pub struct ApiKeyGuard {
    key: Option<String>,
}

impl ApiKeyGuard {
    /// Without a key every request is refused
    pub fn new(key: Option<String>) -> Self {
        if key.is_none() {
            tracing::warn!("No API key configured; the usage endpoint will refuse all requests");
        }
        Self { key }
    }

    pub fn authorize(&self, presented: Option<&str>) -> Result<(), ApiError> {
        match (&self.key, presented) {
            (Some(expected), Some(presented)) if expected == presented => Ok(()),
            _ => Err(ApiError::Unauthorized),
        }
    }
}
