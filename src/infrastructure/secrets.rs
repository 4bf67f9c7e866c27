use crate::config::AppConfig;
use crate::secrets::{KeyVaultClient, SecretStore, select_credential};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Key Vault store authenticated with the configured credential strategy.
pub fn setup_secret_store(config: &AppConfig, http: reqwest::Client) -> Result<Arc<dyn SecretStore>> {
    let vault_url = config
        .vault_url
        .as_deref()
        .context("VAULT_URL must be set")?;

    let credential = select_credential(config.credential_mode, http.clone());
    info!("🔐 Secret store: {} (credential: {})", vault_url, credential.name());

    Ok(Arc::new(KeyVaultClient::new(vault_url, credential, http)))
}
