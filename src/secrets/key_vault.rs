use super::credential::{CredentialProvider, VAULT_RESOURCE};
use super::{SecretError, SecretStore};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

const API_VERSION: &str = "7.4";

/// Key Vault REST client: `GET {vault}/secrets/{name}?api-version=7.4`
pub struct KeyVaultClient {
    vault_url: String,
    credential: Arc<dyn CredentialProvider>,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: Option<String>,
}

impl KeyVaultClient {
    pub fn new(vault_url: &str, credential: Arc<dyn CredentialProvider>, http: reqwest::Client) -> Self {
        Self {
            vault_url: vault_url.trim_end_matches('/').to_string(),
            credential,
            http,
        }
    }
}

#[async_trait]
impl SecretStore for KeyVaultClient {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let token = self.credential.get_token(VAULT_RESOURCE).await?;
        let url = format!("{}/secrets/{}", self.vault_url, name);

        let response = self
            .http
            .get(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&token.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(SecretError::Missing(name.to_string())),
            status => {
                tracing::error!(secret = %name, status = %status, "Secret lookup failed");
                return Err(SecretError::Status {
                    name: name.to_string(),
                    status: status.as_u16(),
                });
            }
        }

        let bundle: SecretBundle = response.json().await?;
        bundle
            .value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SecretError::Missing(name.to_string()))
    }
}
