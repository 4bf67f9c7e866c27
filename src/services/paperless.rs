use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::secrets::Secrets;

#[derive(Error, Debug)]
pub enum PaperlessError {
    #[error("Paperless request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Paperless returned {status} for {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),

    #[error("Invalid Paperless URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Custom field descriptor as served by `/api/custom_fields/{id}/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomField {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data_type: Option<String>,
}

/// One `(field, value)` entry on a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldInstance {
    pub field: i64,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Row of the document list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

/// Full document record. Fields this service does not touch are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldInstance>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of the partial update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub content: String,
    pub custom_fields: Vec<CustomFieldInstance>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentPage {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<DocumentSummary>,
}

/// Filter selecting documents whose flag field is absent or false.
pub fn pending_filter(flag_field_id: i64) -> String {
    format!(
        r#"["OR",[[{id},"exists","false"],[{id},"exact","false"]]]"#,
        id = flag_field_id
    )
}

/// Remote operations against the document-management API
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the service answers with anything but 200.
    async fn find_custom_field(&self, id: i64) -> Result<Option<CustomField>, PaperlessError>;

    /// Documents matching `filter`, newest first.
    async fn query_documents(&self, filter: &str, page_size: u32)
    -> Result<DocumentPage, PaperlessError>;

    async fn download(&self, id: i64) -> Result<Bytes, PaperlessError>;

    async fn get_document(&self, id: i64) -> Result<DocumentRecord, PaperlessError>;

    async fn patch_document(&self, id: i64, patch: &DocumentPatch) -> Result<(), PaperlessError>;
}

/// reqwest-backed Paperless client carrying the auth and edge-access headers
pub struct PaperlessClient {
    base_url: String,
    http: reqwest::Client,
    headers: HeaderMap,
}

impl PaperlessClient {
    pub fn new(secrets: &Secrets, http: reqwest::Client) -> Result<Self, PaperlessError> {
        let base = url::Url::parse(secrets.paperless_url.trim())?;
        Ok(Self {
            base_url: base.as_str().trim_end_matches('/').to_string(),
            http,
            headers: build_headers(secrets)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Token auth plus the two edge-access headers, sent on every call.
pub fn build_headers(secrets: &Secrets) -> Result<HeaderMap, PaperlessError> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Token {}", secrets.paperless_token))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "CF-Access-Client-Id",
        HeaderValue::from_str(&secrets.cf_access_client_id)?,
    );
    let mut cf_secret = HeaderValue::from_str(&secrets.cf_access_client_secret)?;
    cf_secret.set_sensitive(true);
    headers.insert("CF-Access-Client-Secret", cf_secret);
    Ok(headers)
}

async fn status_error(operation: &'static str, response: reqwest::Response) -> PaperlessError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    PaperlessError::Status {
        operation,
        status,
        body,
    }
}

#[async_trait]
impl DocumentStore for PaperlessClient {
    async fn find_custom_field(&self, id: i64) -> Result<Option<CustomField>, PaperlessError> {
        tracing::info!(field_id = id, "Fetching custom field");
        let response = self
            .http
            .get(self.url(&format!("/api/custom_fields/{}/", id)))
            .headers(self.headers.clone())
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            tracing::error!(field_id = id, status = %response.status(), "Failed to get custom field");
            return Ok(None);
        }

        Ok(Some(response.json().await?))
    }

    async fn query_documents(
        &self,
        filter: &str,
        page_size: u32,
    ) -> Result<DocumentPage, PaperlessError> {
        let page_size = page_size.to_string();
        let response = self
            .http
            .get(self.url("/api/documents/"))
            .headers(self.headers.clone())
            .query(&[
                ("ordering", "-added"),
                ("page_size", page_size.as_str()),
                ("custom_field_query", filter),
            ])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(status_error("document query", response).await);
        }

        Ok(response.json().await?)
    }

    async fn download(&self, id: i64) -> Result<Bytes, PaperlessError> {
        let response = self
            .http
            .get(self.url(&format!("/api/documents/{}/download/", id)))
            .headers(self.headers.clone())
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(status_error("document download", response).await);
        }

        Ok(response.bytes().await?)
    }

    async fn get_document(&self, id: i64) -> Result<DocumentRecord, PaperlessError> {
        let response = self
            .http
            .get(self.url(&format!("/api/documents/{}/", id)))
            .headers(self.headers.clone())
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(status_error("document fetch", response).await);
        }

        Ok(response.json().await?)
    }

    async fn patch_document(&self, id: i64, patch: &DocumentPatch) -> Result<(), PaperlessError> {
        let response = self
            .http
            .patch(self.url(&format!("/api/documents/{}/", id)))
            .headers(self.headers.clone())
            .json(patch)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => Ok(()),
            _ => Err(status_error("document update", response).await),
        }
    }
}
