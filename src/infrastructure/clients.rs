use crate::config::AppConfig;
use crate::secrets::{SecretStore, Secrets};
use crate::services::azure_ocr::AzureOcrClient;
use crate::services::ocr::OcrEngine;
use crate::services::paperless::{DocumentStore, PaperlessClient};
use crate::services::processor::{DocumentProcessor, ProcessorSettings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Request contexts for one invocation
#[derive(Clone)]
pub struct Clients {
    pub documents: Arc<dyn DocumentStore>,
    pub ocr: Arc<dyn OcrEngine>,
}

impl Clients {
    pub fn processor(&self, config: &AppConfig) -> DocumentProcessor {
        DocumentProcessor::new(
            self.documents.clone(),
            self.ocr.clone(),
            ProcessorSettings::from(config),
        )
    }
}

/// Produces fresh clients for each run
#[async_trait]
pub trait ClientProvider: Send + Sync {
    async fn connect(&self) -> Result<Clients>;
}

pub fn setup_http_client(config: &AppConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Build the OCR client and the Paperless client from resolved secrets.
pub fn setup_clients(secrets: &Secrets, http: reqwest::Client, config: &AppConfig) -> Result<Clients> {
    let ocr = AzureOcrClient::new(
        &secrets.azure_endpoint,
        &secrets.azure_key,
        http.clone(),
        config.ocr_poll_timeout,
    );
    let documents =
        PaperlessClient::new(secrets, http).context("Failed to set up Paperless client")?;

    Ok(Clients {
        documents: Arc::new(documents),
        ocr: Arc::new(ocr),
    })
}

/// Resolves secrets from the store on every `connect`.
pub struct VaultClientProvider {
    secrets: Arc<dyn SecretStore>,
    http: reqwest::Client,
    config: AppConfig,
}

impl VaultClientProvider {
    pub fn new(secrets: Arc<dyn SecretStore>, http: reqwest::Client, config: AppConfig) -> Self {
        Self {
            secrets,
            http,
            config,
        }
    }
}

#[async_trait]
impl ClientProvider for VaultClientProvider {
    async fn connect(&self) -> Result<Clients> {
        let secrets = Secrets::resolve(self.secrets.as_ref())
            .await
            .context("Failed to resolve secrets")?;
        tracing::debug!(?secrets, "Secrets resolved");
        setup_clients(&secrets, self.http.clone(), &self.config)
    }
}
