use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::paperless::{DocumentStore, PaperlessError};

/// Deterministic scratch location for one document.
pub fn scratch_path(scratch_dir: &Path, document_id: i64) -> PathBuf {
    scratch_dir.join(format!("paperless_doc_{}.pdf", document_id))
}

/// Downloaded document content on local disk. Removed on `cleanup` or drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cleanup(&self) {
        cleanup(&self.path);
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        cleanup(&self.path);
    }
}

/// Fetch the binary content of `document_id` into its scratch file,
/// overwriting any leftover from a previous run.
pub async fn download(
    store: &dyn DocumentStore,
    document_id: i64,
    scratch_dir: &Path,
) -> Result<ScratchFile, PaperlessError> {
    let content = store.download(document_id).await?;
    let path = scratch_path(scratch_dir, document_id);
    if let Err(e) = tokio::fs::write(&path, &content).await {
        cleanup(&path);
        return Err(e.into());
    }
    tracing::debug!(document_id, bytes = content.len(), path = %path.display(), "Document downloaded");
    Ok(ScratchFile { path })
}

/// Remove a scratch file if it exists. Safe to call repeatedly.
pub fn cleanup(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Scratch file removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "Failed to remove scratch file: {}", e),
    }
}
