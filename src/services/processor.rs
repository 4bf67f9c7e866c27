use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::ocr::{self, OcrEngine, OcrError};
use super::paperless::{
    CustomField, DocumentStore, DocumentSummary, PaperlessError, pending_filter,
};
use super::{transfer, update};
use crate::config::AppConfig;

/// Failure points of a run. The messages double as HTTP response bodies.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Custom field 'Azure OCR Completed' not found")]
    FlagFieldMissing(i64),

    #[error("Failed to look up custom field {id}: {source}")]
    FlagFieldLookup {
        id: i64,
        #[source]
        source: PaperlessError,
    },

    #[error("Failed to download document {id}")]
    Download {
        id: i64,
        #[source]
        source: PaperlessError,
    },

    #[error("Failed to process document {id} with Azure OCR")]
    Ocr {
        id: i64,
        #[source]
        source: OcrError,
    },

    #[error("Failed to update document {id} in Paperless")]
    Update {
        id: i64,
        #[source]
        source: PaperlessError,
    },
}

/// Why a batch run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The pending count reached zero
    Drained,
    /// The list query returned no documents although the count was non-zero
    EmptyPage,
    /// Count or list query failed; pending documents may remain
    QueryFailed,
    /// Every document on the page was already attempted in this run
    NoProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub pages: u32,
    pub processed: u32,
    pub failed: u32,
    pub stop: StopReason,
}

/// One page of pending documents together with the flag field it was filtered on
#[derive(Debug)]
pub struct PendingPage {
    pub documents: Vec<DocumentSummary>,
    pub flag_field_id: i64,
}

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub flag_field_id: i64,
    pub batch_size: u32,
    pub document_pause: Duration,
    pub scratch_dir: PathBuf,
    pub model_id: String,
}

impl From<&AppConfig> for ProcessorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            flag_field_id: config.flag_field_id,
            batch_size: config.batch_size,
            document_pause: config.document_pause,
            scratch_dir: config.scratch_dir.clone(),
            model_id: config.model_id.clone(),
        }
    }
}

/// Drives pending documents through download, OCR, update and cleanup.
pub struct DocumentProcessor {
    documents: Arc<dyn DocumentStore>,
    ocr: Arc<dyn OcrEngine>,
    settings: ProcessorSettings,
}

impl DocumentProcessor {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        ocr: Arc<dyn OcrEngine>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            documents,
            ocr,
            settings,
        }
    }

    /// Look up the completion flag field. Absence is fatal for any run.
    pub async fn find_flag_field(&self) -> Result<CustomField, ProcessError> {
        let id = self.settings.flag_field_id;
        match self.documents.find_custom_field(id).await {
            Ok(Some(field)) => Ok(field),
            Ok(None) => {
                tracing::error!(field_id = id, "Custom field 'Azure OCR Completed' not found");
                Err(ProcessError::FlagFieldMissing(id))
            }
            Err(source) => Err(ProcessError::FlagFieldLookup { id, source }),
        }
    }

    /// Number of documents whose flag is absent or false.
    pub async fn count_pending(&self, flag_field_id: i64) -> Result<u64, PaperlessError> {
        let page = self
            .documents
            .query_documents(&pending_filter(flag_field_id), 1)
            .await?;
        tracing::info!(count = page.count, "Documents without OCR flag");
        Ok(page.count)
    }

    /// Newest pending documents, at most `page_size`.
    pub async fn list_pending(
        &self,
        flag_field_id: i64,
        page_size: u32,
    ) -> Result<PendingPage, PaperlessError> {
        let page = self
            .documents
            .query_documents(&pending_filter(flag_field_id), page_size)
            .await?;
        tracing::info!(found = page.results.len(), page_size, "Fetched pending documents");
        Ok(PendingPage {
            documents: page.results,
            flag_field_id,
        })
    }

    /// Process pending documents page by page until none are left.
    pub async fn run_batch(&self) -> Result<RunSummary, ProcessError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("ocr_run", %run_id);
        self.run_batch_inner(run_id).instrument(span).await
    }

    async fn run_batch_inner(&self, run_id: Uuid) -> Result<RunSummary, ProcessError> {
        tracing::info!("Starting OCR batch run");
        let field = self.find_flag_field().await?;

        let mut summary = RunSummary {
            run_id,
            pages: 0,
            processed: 0,
            failed: 0,
            stop: StopReason::Drained,
        };
        let mut attempted: HashSet<i64> = HashSet::new();

        loop {
            let remaining = match self.count_pending(field.id).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!("Failed to count pending documents: {}", e);
                    summary.stop = StopReason::QueryFailed;
                    break;
                }
            };
            if remaining == 0 {
                summary.stop = StopReason::Drained;
                break;
            }

            let page = match self.list_pending(field.id, self.settings.batch_size).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!("Failed to list pending documents: {}", e);
                    summary.stop = StopReason::QueryFailed;
                    break;
                }
            };
            if page.documents.is_empty() {
                tracing::info!("No documents to process");
                summary.stop = StopReason::EmptyPage;
                break;
            }

            let fresh: Vec<DocumentSummary> = page
                .documents
                .into_iter()
                .filter(|doc| attempted.insert(doc.id))
                .collect();
            if fresh.is_empty() {
                tracing::warn!(remaining, "Pending documents were all attempted in this run, stopping");
                summary.stop = StopReason::NoProgress;
                break;
            }
            summary.pages += 1;

            for doc in fresh {
                tracing::info!(document_id = doc.id, title = %doc.title, "Processing document");
                let outcome = self
                    .process_document(doc.id, page.flag_field_id)
                    .instrument(tracing::info_span!("document", document_id = doc.id))
                    .await;
                match outcome {
                    Ok(()) => {
                        tracing::info!(document_id = doc.id, "Successfully processed document");
                        summary.processed += 1;
                    }
                    Err(e) => {
                        summary.failed += 1;
                        match &e {
                            ProcessError::Update { .. } => {
                                tracing::warn!(document_id = doc.id, "{}", e)
                            }
                            _ => {
                                tracing::error!(document_id = doc.id, "{}: {}", e, source_of(&e));
                                continue;
                            }
                        }
                    }
                }

                if !self.settings.document_pause.is_zero() {
                    tokio::time::sleep(self.settings.document_pause).await;
                }
            }
        }

        tracing::info!(
            pages = summary.pages,
            processed = summary.processed,
            failed = summary.failed,
            stop = ?summary.stop,
            "OCR batch run finished"
        );
        Ok(summary)
    }

    /// Run the per-document flow for one caller-supplied id.
    pub async fn process_single(&self, document_id: i64) -> Result<(), ProcessError> {
        let span = tracing::info_span!("ocr_single", run_id = %Uuid::new_v4(), document_id);
        async {
            let field = self.find_flag_field().await?;
            self.process_document(document_id, field.id).await
        }
        .instrument(span)
        .await
    }

    /// Download, recognize, update. The scratch file is removed on every path.
    pub async fn process_document(
        &self,
        document_id: i64,
        flag_field_id: i64,
    ) -> Result<(), ProcessError> {
        let scratch = transfer::download(
            self.documents.as_ref(),
            document_id,
            &self.settings.scratch_dir,
        )
        .await
        .map_err(|source| ProcessError::Download {
            id: document_id,
            source,
        })?;

        let text = match ocr::recognize(scratch.path(), self.ocr.as_ref(), &self.settings.model_id)
            .await
        {
            Ok(text) => text,
            Err(source) => {
                scratch.cleanup();
                return Err(ProcessError::Ocr {
                    id: document_id,
                    source,
                });
            }
        };

        let result = update::apply(self.documents.as_ref(), document_id, &text, flag_field_id).await;
        scratch.cleanup();

        result.map_err(|source| ProcessError::Update {
            id: document_id,
            source,
        })
    }
}

fn source_of(e: &ProcessError) -> String {
    std::error::Error::source(e)
        .map(|s| s.to_string())
        .unwrap_or_default()
}
