//! Secret resolution for the document and OCR services.
//!
//! Secrets live in a remote store and are fetched fresh for every run. The
//! store is reached through a [`SecretStore`] which in turn authenticates with
//! a [`credential::CredentialProvider`] picked once at startup.

pub mod credential;
pub mod key_vault;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub use credential::{AccessToken, CredentialProvider, select_credential};
pub use key_vault::KeyVaultClient;

pub const PAPERLESS_URL: &str = "PAPERLESS-URL";
pub const PAPERLESS_TOKEN: &str = "PAPERLESS-TOKEN";
pub const AZURE_ENDPOINT: &str = "AZURE-ENDPOINT";
pub const AZURE_KEY: &str = "AZURE-KEY";
pub const CF_ACCESS_CLIENT_ID: &str = "CF-ACCESS-CLIENT-ID";
pub const CF_ACCESS_CLIENT_SECRET: &str = "CF-ACCESS-CLIENT-SECRET";

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Secret '{0}' is missing or empty")]
    Missing(String),

    #[error("Secret store returned {status} for '{name}'")]
    Status { name: String, status: u16 },

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Secret store request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Key-value lookup of secrets by name
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

/// Everything one run needs to talk to Paperless and the OCR service
#[derive(Clone)]
pub struct Secrets {
    pub paperless_url: String,
    pub paperless_token: String,
    pub azure_endpoint: String,
    pub azure_key: String,
    pub cf_access_client_id: String,
    pub cf_access_client_secret: String,
}

impl Secrets {
    /// Fetch every secret; the first failure aborts resolution.
    pub async fn resolve(store: &dyn SecretStore) -> Result<Self, SecretError> {
        let secrets = Self {
            paperless_url: store.get_secret(PAPERLESS_URL).await?,
            paperless_token: store.get_secret(PAPERLESS_TOKEN).await?,
            azure_endpoint: store.get_secret(AZURE_ENDPOINT).await?,
            azure_key: store.get_secret(AZURE_KEY).await?,
            cf_access_client_id: store.get_secret(CF_ACCESS_CLIENT_ID).await?,
            cf_access_client_secret: store.get_secret(CF_ACCESS_CLIENT_SECRET).await?,
        };
        tracing::debug!("Resolved service secrets from store");
        Ok(secrets)
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("paperless_url", &self.paperless_url)
            .field("paperless_token", &"<redacted>")
            .field("azure_endpoint", &self.azure_endpoint)
            .field("azure_key", &"<redacted>")
            .field("cf_access_client_id", &self.cf_access_client_id)
            .field("cf_access_client_secret", &"<redacted>")
            .finish()
    }
}
