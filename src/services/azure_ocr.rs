use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{Instant, sleep};

use super::ocr::{AnalyzeResult, OcrEngine, OcrError};

const API_VERSION: &str = "2024-11-30";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Azure AI Document Intelligence client for the long-running analyze call
pub struct AzureOcrClient {
    endpoint: String,
    key: String,
    http: reqwest::Client,
    poll_interval: Duration,
    poll_timeout: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl AzureOcrClient {
    pub fn new(endpoint: &str, key: &str, http: reqwest::Client, poll_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            key: key.to_string(),
            http,
            poll_interval: Duration::from_secs(1),
            poll_timeout,
        }
    }

    /// Wait used when the service sends no `Retry-After`.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn analyze_url(&self, model_id: &str) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint, model_id, API_VERSION
        )
    }

    /// `Retry-After` in seconds, never longer than the poll timeout.
    fn retry_after(&self, response: &reqwest::Response) -> Duration {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs.min(self.poll_timeout.as_secs())))
            .unwrap_or(self.poll_interval)
    }
}

#[async_trait]
impl OcrEngine for AzureOcrClient {
    async fn analyze(&self, model_id: &str, document: Vec<u8>) -> Result<AnalyzeResult, OcrError> {
        let response = self
            .http
            .post(self.analyze_url(model_id))
            .header(KEY_HEADER, &self.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(document)
            .send()
            .await?;

        if response.status() != StatusCode::ACCEPTED {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Status { status, body });
        }

        let operation_url = response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(OcrError::MissingOperationLocation)?;

        let deadline = Instant::now() + self.poll_timeout;
        let mut wait = self.retry_after(&response);

        loop {
            sleep(wait).await;

            let response = self
                .http
                .get(&operation_url)
                .header(KEY_HEADER, &self.key)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(OcrError::Status { status, body });
            }

            wait = self.retry_after(&response);
            let operation: AnalyzeOperation = response.json().await?;

            match operation.status.as_str() {
                "succeeded" => return operation.analyze_result.ok_or(OcrError::NoContent),
                state @ ("failed" | "canceled") => {
                    let reason = operation
                        .error
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .unwrap_or_else(|| state.to_string());
                    return Err(OcrError::Failed(reason));
                }
                other => {
                    tracing::debug!(status = other, "OCR analysis still running");
                }
            }

            if Instant::now()
                .checked_add(wait)
                .is_none_or(|next| next > deadline)
            {
                return Err(OcrError::Timeout(self.poll_timeout));
            }
        }
    }
}
