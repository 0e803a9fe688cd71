//! Axum route handler for export.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use tracing::info;
use uuid::Uuid;

use crate::document::LoadStatus;
use crate::errors::AppError;
use crate::flatten::pdf::flatten_pdf;
use crate::flatten::FlattenSettings;
use crate::state::AppState;

/// POST /api/v1/documents/:id/export
///
/// Returns the flattened PDF. Refused while the source is still loading and
/// when it could not be read.
pub async fn handle_export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (bytes, fields, values, settings, file_name) = {
        let documents = state.documents.read().await;
        let record = documents
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;

        match &record.status {
            LoadStatus::Loading { .. } => {
                return Err(AppError::Conflict(
                    "document is still loading; export once it is ready".to_string(),
                ))
            }
            LoadStatus::Failed { message } => {
                return Err(AppError::SourceDocumentUnreadable(message.clone()))
            }
            LoadStatus::Ready { .. } => {}
        }

        let editor = record.editor.settings();
        (
            record.bytes.clone(),
            record.editor.fields().to_vec(),
            record.editor.values().clone(),
            FlattenSettings {
                style: editor.style,
                margin: editor.margin,
                date_format: editor.date_format.clone(),
            },
            export_file_name(record.file_name.as_deref()),
        )
    };

    // PDF rewriting is CPU-bound; keep it off the async executor.
    let measurer = state.measurer.clone();
    let output = tokio::task::spawn_blocking(move || {
        flatten_pdf(&bytes, &fields, &values, &settings, measurer.as_ref())
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("export task failed: {e}")))??;

    info!(document_id = %id, bytes = output.len(), "Document exported");

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        output,
    )
        .into_response())
}

/// `contract.pdf` → `contract-filled.pdf`. Quotes and control characters are dropped.
fn export_file_name(source: Option<&str>) -> String {
    let stem = source
        .map(|name| name.trim_end_matches(".pdf").trim_end_matches(".PDF"))
        .filter(|stem| !stem.is_empty())
        .unwrap_or("document");
    let clean: String = stem
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("{clean}-filled.pdf")
}
