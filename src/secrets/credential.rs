use super::SecretError;
use crate::config::CredentialMode;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::process::Command;

/// Resource identifier for Key Vault access tokens
pub const VAULT_RESOURCE: &str = "https://vault.azure.net";

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Source of bearer tokens for the secret store
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_token(&self, resource: &str) -> Result<AccessToken, SecretError>;
}

/// Pick the credential strategy once, from configuration.
pub fn select_credential(mode: CredentialMode, http: reqwest::Client) -> Arc<dyn CredentialProvider> {
    match mode {
        CredentialMode::AzureCli => {
            tracing::info!("Running in local development mode, using Azure CLI credentials");
            Arc::new(AzureCliCredential::default())
        }
        CredentialMode::ManagedIdentity => {
            tracing::info!("Running in hosted mode, using Managed Identity credentials");
            Arc::new(ManagedIdentityCredential::from_env(http))
        }
    }
}

/// Borrows the developer's `az login` session.
pub struct AzureCliCredential {
    program: String,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self {
            program: "az".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
}

#[async_trait]
impl CredentialProvider for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure_cli"
    }

    async fn get_token(&self, resource: &str) -> Result<AccessToken, SecretError> {
        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--resource", resource, "-o", "json"])
            .output()
            .await
            .map_err(|e| SecretError::Credential(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SecretError::Credential(format!(
                "Azure CLI token request failed: {}",
                stderr.trim()
            )));
        }

        let parsed: CliTokenResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| SecretError::Credential(format!("Unexpected Azure CLI output: {}", e)))?;

        Ok(AccessToken {
            token: parsed.access_token,
        })
    }
}

/// Token from the host's managed identity.
///
/// App Service and Functions expose `IDENTITY_ENDPOINT`/`IDENTITY_HEADER`;
/// VMs and containers fall back to the instance metadata service.
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    identity_endpoint: Option<(String, String)>,
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct IdentityTokenResponse {
    access_token: String,
}

impl ManagedIdentityCredential {
    pub fn new(
        http: reqwest::Client,
        identity_endpoint: Option<(String, String)>,
        client_id: Option<String>,
    ) -> Self {
        Self {
            http,
            identity_endpoint,
            client_id,
        }
    }

    pub fn from_env(http: reqwest::Client) -> Self {
        let identity_endpoint = match (
            std::env::var("IDENTITY_ENDPOINT"),
            std::env::var("IDENTITY_HEADER"),
        ) {
            (Ok(endpoint), Ok(header)) => Some((endpoint, header)),
            _ => None,
        };
        let client_id = std::env::var("AZURE_CLIENT_ID").ok();
        Self::new(http, identity_endpoint, client_id)
    }
}

#[async_trait]
impl CredentialProvider for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "managed_identity"
    }

    async fn get_token(&self, resource: &str) -> Result<AccessToken, SecretError> {
        let mut query = vec![("resource", resource.to_string())];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.clone()));
        }

        let request = match &self.identity_endpoint {
            Some((endpoint, header)) => {
                query.push(("api-version", "2019-08-01".to_string()));
                self.http
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
                    .query(&query)
            }
            None => {
                query.push(("api-version", "2018-02-01".to_string()));
                self.http
                    .get(IMDS_ENDPOINT)
                    .header("Metadata", "true")
                    .query(&query)
            }
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SecretError::Credential(format!(
                "Managed identity token request failed: {} - {}",
                status, body
            )));
        }

        let parsed: IdentityTokenResponse = response.json().await?;
        Ok(AccessToken {
            token: parsed.access_token,
        })
    }
}
