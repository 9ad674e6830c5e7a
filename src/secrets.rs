//! Secret provider seam
//!
//! The signing key lives in an external secret store. The pipeline only sees
//! the [`SecretProvider`] trait; the store client is injected by the host.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::error::ImageRequestError;

/// Errors returned by a secret store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret '{0}' not found")]
    NotFound(String),

    #[error("secret store error: {0}")]
    Store(String),
}

/// Read access to a secret store
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Fetch the secret string stored under `name`
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

/// In-memory secret provider, for the CLI and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}

/// Fetch the signing key, bounded by `timeout`
///
/// When `field` is set the secret must be a JSON object and the key is read
/// from that field. Every failure, including the timeout, maps to
/// `SecretUnavailable`.
pub async fn fetch_signing_key(
    provider: &dyn SecretProvider,
    name: &str,
    field: Option<&str>,
    timeout: Duration,
) -> Result<String, ImageRequestError> {
    let secret = match tokio::time::timeout(timeout, provider.get_secret(name)).await {
        Ok(Ok(secret)) => secret,
        Ok(Err(e)) => {
            return Err(ImageRequestError::secret_unavailable(format!(
                "Unable to retrieve the signing secret: {}",
                e
            )))
        }
        Err(_) => {
            return Err(ImageRequestError::secret_unavailable(format!(
                "Secret lookup timed out after {}ms",
                timeout.as_millis()
            )))
        }
    };

    let Some(field) = field else {
        return Ok(secret);
    };

    let value: serde_json::Value = serde_json::from_str(&secret).map_err(|_| {
        ImageRequestError::secret_unavailable("Signing secret is not a JSON object")
    })?;
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ImageRequestError::secret_unavailable(format!(
                "Signing secret has no string field '{}'",
                field
            ))
        })
}
