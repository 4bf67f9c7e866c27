use crate::AppState;
use crate::api::error::AppError;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const MISSING_DOCUMENT_ID: &str = "Please provide a document_id in the request body";

/// Document ids arrive as JSON numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DocumentIdInput {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessDocumentRequest {
    #[serde(default)]
    #[schema(value_type = i64, example = 77)]
    pub document_id: Option<DocumentIdInput>,
}

impl ProcessDocumentRequest {
    pub fn document_id(&self) -> Option<i64> {
        let id = match self.document_id.as_ref()? {
            DocumentIdInput::Number(n) => *n,
            DocumentIdInput::Text(s) => s.trim().parse().ok()?,
        };
        (id > 0).then_some(id)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessDocumentResponse {
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/process_document",
    request_body = ProcessDocumentRequest,
    responses(
        (status = 200, description = "Document recognized and updated", body = ProcessDocumentResponse),
        (status = 400, description = "Missing or invalid document_id"),
        (status = 500, description = "Setup, download, OCR or update failure")
    ),
    tag = "ocr"
)]
pub async fn process_document(
    State(state): State<AppState>,
    payload: Result<Json<ProcessDocumentRequest>, JsonRejection>,
) -> Result<Json<ProcessDocumentResponse>, AppError> {
    tracing::info!("Processing single document request received");

    let document_id = payload
        .ok()
        .and_then(|Json(req)| req.document_id())
        .ok_or_else(|| AppError::BadRequest(MISSING_DOCUMENT_ID.to_string()))?;

    let clients = state
        .clients
        .connect()
        .await
        .map_err(|e| AppError::Setup(format!("{:#}", e)))?;

    let _guard = state.run_lock.lock().await;
    clients
        .processor(&state.config)
        .process_single(document_id)
        .await?;

    Ok(Json(ProcessDocumentResponse {
        message: format!("Successfully processed document {}", document_id),
    }))
}
