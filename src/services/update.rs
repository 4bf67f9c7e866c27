use serde_json::Value;

use super::paperless::{CustomFieldInstance, DocumentPatch, DocumentStore, PaperlessError};

/// Set `flag_field_id` to `true`, replacing an existing entry in place or
/// appending a new one.
pub fn upsert_flag(fields: &mut Vec<CustomFieldInstance>, flag_field_id: i64) {
    let mut found = false;
    for field in fields.iter_mut().filter(|f| f.field == flag_field_id) {
        field.value = Value::Bool(true);
        found = true;
    }
    if !found {
        fields.push(CustomFieldInstance {
            field: flag_field_id,
            value: Value::Bool(true),
        });
    }
}

/// Write OCR text into the document and mark it as processed.
pub async fn apply(
    store: &dyn DocumentStore,
    document_id: i64,
    text: &str,
    flag_field_id: i64,
) -> Result<(), PaperlessError> {
    tracing::info!(document_id, "Updating document with OCR content");

    let mut record = store.get_document(document_id).await?;
    record.content = text.to_string();
    upsert_flag(&mut record.custom_fields, flag_field_id);

    let patch = DocumentPatch {
        content: record.content,
        custom_fields: record.custom_fields,
    };

    if let Err(e) = store.patch_document(document_id, &patch).await {
        tracing::error!(document_id, "Failed to update document: {}", e);
        return Err(e);
    }

    tracing::info!(document_id, "Successfully updated document");
    Ok(())
}
