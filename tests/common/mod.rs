#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use paperless_ocr_sync::infrastructure::clients::{ClientProvider, Clients};
use paperless_ocr_sync::services::ocr::{
    AnalyzeResult, OcrEngine, OcrError, RecognizedLine, RecognizedPage,
};
use paperless_ocr_sync::services::paperless::{
    CustomField, CustomFieldInstance, DocumentPage, DocumentPatch, DocumentRecord, DocumentStore,
    DocumentSummary, PaperlessError, pending_filter,
};
use paperless_ocr_sync::services::processor::ProcessorSettings;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FLAG_FIELD: i64 = 2;

#[derive(Default)]
pub struct StoreState {
    pub field_exists: bool,
    pub documents: BTreeMap<i64, DocumentRecord>,
    pub fail_download: HashSet<i64>,
    pub fail_get: HashSet<i64>,
    pub fail_patch: HashSet<i64>,
    pub fail_count: bool,
    /// Page queries fail while count queries still answer
    pub fail_list: bool,
    /// Added to every reported count, like a lagging search index
    pub count_lag: u64,
    /// List query ignores the flag, returning already-processed documents
    pub stale_list: bool,
    pub calls: Vec<String>,
    pub patches: Vec<(i64, DocumentPatch)>,
}

/// In-memory Paperless
pub struct MockDocumentStore {
    pub state: Mutex<StoreState>,
}

pub fn document(id: i64, custom_fields: Vec<CustomFieldInstance>) -> DocumentRecord {
    DocumentRecord {
        id,
        title: format!("Document {}", id),
        content: String::new(),
        custom_fields,
        extra: serde_json::Map::new(),
    }
}

pub fn flag(value: Value) -> CustomFieldInstance {
    CustomFieldInstance {
        field: FLAG_FIELD,
        value,
    }
}

pub fn other_field(field: i64) -> CustomFieldInstance {
    CustomFieldInstance {
        field,
        value: Value::String("keep me".to_string()),
    }
}

fn is_flagged(doc: &DocumentRecord) -> bool {
    doc.custom_fields
        .iter()
        .any(|f| f.field == FLAG_FIELD && f.value == Value::Bool(true))
}

impl MockDocumentStore {
    pub fn with_documents(documents: Vec<DocumentRecord>) -> Arc<Self> {
        let state = StoreState {
            field_exists: true,
            documents: documents.into_iter().map(|d| (d.id, d)).collect(),
            ..Default::default()
        };
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn document(&self, id: i64) -> DocumentRecord {
        self.state.lock().unwrap().documents[&id].clone()
    }

    pub fn patched_ids(&self) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .patches
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn all_flagged(&self) -> bool {
        self.state.lock().unwrap().documents.values().all(is_flagged)
    }
}

fn status(operation: &'static str, status: u16) -> PaperlessError {
    PaperlessError::Status {
        operation,
        status,
        body: "mock failure".to_string(),
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn find_custom_field(&self, id: i64) -> Result<Option<CustomField>, PaperlessError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("field:{}", id));
        if state.field_exists && id == FLAG_FIELD {
            Ok(Some(CustomField {
                id,
                name: "Azure OCR Completed".to_string(),
                data_type: Some("boolean".to_string()),
            }))
        } else {
            Ok(None)
        }
    }

    async fn query_documents(
        &self,
        filter: &str,
        page_size: u32,
    ) -> Result<DocumentPage, PaperlessError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("query:{}", page_size));
        assert_eq!(filter, pending_filter(FLAG_FIELD));

        if state.fail_count && page_size == 1 {
            return Err(status("document query", 503));
        }
        if state.fail_list && page_size > 1 {
            return Err(status("document query", 502));
        }

        let stale = state.stale_list && page_size > 1;
        let pending: Vec<DocumentSummary> = state
            .documents
            .values()
            .rev()
            .filter(|d| stale || !is_flagged(d))
            .map(|d| DocumentSummary {
                id: d.id,
                title: d.title.clone(),
            })
            .collect();
        let count = state
            .documents
            .values()
            .filter(|d| !is_flagged(d))
            .count() as u64
            + state.count_lag;

        Ok(DocumentPage {
            count,
            next: None,
            previous: None,
            results: pending.into_iter().take(page_size as usize).collect(),
        })
    }

    async fn download(&self, id: i64) -> Result<Bytes, PaperlessError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("download:{}", id));
        if state.fail_download.contains(&id) {
            return Err(status("document download", 404));
        }
        Ok(Bytes::from(format!("document-{}", id)))
    }

    async fn get_document(&self, id: i64) -> Result<DocumentRecord, PaperlessError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("get:{}", id));
        if state.fail_get.contains(&id) {
            return Err(status("document fetch", 404));
        }
        state
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| status("document fetch", 404))
    }

    async fn patch_document(&self, id: i64, patch: &DocumentPatch) -> Result<(), PaperlessError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("patch:{}", id));
        if state.fail_patch.contains(&id) {
            return Err(status("document update", 400));
        }
        state.patches.push((id, patch.clone()));
        if let Some(doc) = state.documents.get_mut(&id) {
            doc.content = patch.content.clone();
            doc.custom_fields = patch.custom_fields.clone();
        }
        Ok(())
    }
}

/// OCR engine answering by document id, read back from the downloaded bytes.
/// `None` simulates an engine error, an empty string an empty result.
#[derive(Default)]
pub struct MockOcrEngine {
    pub responses: Mutex<HashMap<i64, Option<String>>>,
    pub seen: Mutex<Vec<i64>>,
}

impl MockOcrEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, id: i64, text: Option<&str>) {
        self.responses
            .lock()
            .unwrap()
            .insert(id, text.map(str::to_string));
    }

    pub fn text_for(id: i64) -> String {
        format!("Scanned page of document {}\nSecond line\n", id)
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn analyze(&self, model_id: &str, document: Vec<u8>) -> Result<AnalyzeResult, OcrError> {
        assert_eq!(model_id, "prebuilt-read");
        let id: i64 = String::from_utf8(document)
            .ok()
            .and_then(|s| s.strip_prefix("document-").and_then(|n| n.parse().ok()))
            .expect("mock documents are named document-<id>");
        self.seen.lock().unwrap().push(id);

        let text = match self.responses.lock().unwrap().get(&id) {
            Some(None) => return Err(OcrError::Failed("InternalServerError: mock".to_string())),
            Some(Some(text)) => text.clone(),
            None => Self::text_for(id),
        };

        let lines = text
            .lines()
            .map(|l| RecognizedLine {
                content: l.to_string(),
            })
            .collect();
        Ok(AnalyzeResult {
            model_id: Some(model_id.to_string()),
            pages: if text.is_empty() {
                Vec::new()
            } else {
                vec![RecognizedPage {
                    page_number: 1,
                    lines,
                }]
            },
        })
    }
}

pub fn settings(scratch_dir: &Path, batch_size: u32) -> ProcessorSettings {
    ProcessorSettings {
        flag_field_id: FLAG_FIELD,
        batch_size,
        document_pause: Duration::ZERO,
        scratch_dir: scratch_dir.to_path_buf(),
        model_id: "prebuilt-read".to_string(),
    }
}

/// Hands out the same mock clients, or fails like a missing secret.
pub struct MockClientProvider {
    pub clients: Option<Clients>,
}

#[async_trait]
impl ClientProvider for MockClientProvider {
    async fn connect(&self) -> anyhow::Result<Clients> {
        self.clients
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Secret 'AZURE-KEY' is missing or empty"))
    }
}

pub fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}
