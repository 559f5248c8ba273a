//! Secret retrieval.
//!
//! The pipeline only ever asks for secrets by name. Where they live is up
//! to the `SecretStore` implementation; the bundled one reads environment
//! variables so `.env` files work in development.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret '{0}' is not set")]
    Missing(String),
    #[error("secret '{0}' is empty")]
    Empty(String),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret_string(&self, name: &str) -> Result<SecretString, SecretError>;
}

/// Looks secrets up as environment variables of the same name.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret_string(&self, name: &str) -> Result<SecretString, SecretError> {
        let value = std::env::var(name).map_err(|_| SecretError::Missing(name.to_string()))?;
        if value.trim().is_empty() {
            return Err(SecretError::Empty(name.to_string()));
        }
        Ok(SecretString::from(value))
    }
}
