//! OCR engine port and text assembly.
//!
//! The engine takes raw document bytes and returns a page/line recognition
//! result; [`recognize`] turns that into the plain text stored on the
//! document.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("OCR service did not return an operation location")]
    MissingOperationLocation,

    #[error("OCR analysis failed: {0}")]
    Failed(String),

    #[error("OCR analysis did not finish within {0:?}")]
    Timeout(Duration),

    #[error("OCR returned no text")]
    NoContent,

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub pages: Vec<RecognizedPage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedPage {
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub lines: Vec<RecognizedLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedLine {
    pub content: String,
}

/// Document analysis backend
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Submit `document` to `model_id` and wait for the finished result.
    async fn analyze(&self, model_id: &str, document: Vec<u8>) -> Result<AnalyzeResult, OcrError>;
}

/// Every line of every page, in order, each followed by `\n`.
pub fn extract_text(result: &AnalyzeResult) -> String {
    let mut content = String::new();
    for page in &result.pages {
        for line in &page.lines {
            content.push_str(&line.content);
            content.push('\n');
        }
    }
    content
}

/// Run OCR over the file at `path`. Full text or an error, never partial output.
pub async fn recognize(path: &Path, engine: &dyn OcrEngine, model_id: &str) -> Result<String, OcrError> {
    tracing::info!(path = %path.display(), model_id, "Processing document with OCR");

    let document = tokio::fs::read(path).await?;
    let result = engine.analyze(model_id, document).await?;
    let text = extract_text(&result);

    if text.is_empty() {
        return Err(OcrError::NoContent);
    }
    tracing::debug!(pages = result.pages.len(), chars = text.len(), "OCR text extracted");
    Ok(text)
}
