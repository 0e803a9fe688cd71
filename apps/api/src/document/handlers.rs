//! Axum route handlers for source documents.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::document::loader::LoadTicket;
use crate::document::{DocumentRecord, DocumentSummary};
use crate::editor::session::EditorSession;
use crate::errors::AppError;
use crate::overlap::{recompute_warnings, WarningInputs, Warnings};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EditableRequest {
    pub editable: bool,
}

struct Upload {
    file_name: Option<String>,
    bytes: Bytes,
}

/// Pulls the `file` part out of a multipart body.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("could not read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::Validation("uploaded file is empty".to_string()));
        }
        return Ok(Upload { file_name, bytes });
    }
    Err(AppError::Validation("multipart field 'file' is required".to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/documents
///
/// Registers a source document and starts loading its pages in the background.
pub async fn handle_create_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentSummary>), AppError> {
    let upload = read_upload(multipart).await?;
    let id = Uuid::new_v4();
    let record = DocumentRecord::new(
        id,
        upload.file_name,
        upload.bytes.clone(),
        EditorSession::new(state.editor_settings()),
    );
    let ticket = LoadTicket::for_record(&record);

    let mut documents = state.documents.write().await;
    let record = documents.entry(id).or_insert(record);
    record.load_task = Some(state.loader.spawn(ticket, upload.bytes));
    info!(document_id = %id, bytes = record.bytes.len(), "Document registered");

    Ok((StatusCode::CREATED, Json(record.summary())))
}

/// PUT /api/v1/documents/:id
///
/// Replaces the source bytes. In-flight loading for the old bytes is abandoned;
/// fields and values are kept.
pub async fn handle_replace_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<DocumentSummary>, AppError> {
    let upload = read_upload(multipart).await?;

    let mut documents = state.documents.write().await;
    let record = documents
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;
    let interrupted = record.status.is_loading();
    record.replace_source(upload.file_name, upload.bytes.clone());
    let ticket = LoadTicket::for_record(record);
    record.load_task = Some(state.loader.spawn(ticket, upload.bytes));
    info!(
        document_id = %id,
        generation = record.generation,
        interrupted,
        "Document source replaced"
    );

    Ok(Json(record.summary()))
}

/// GET /api/v1/documents/:id
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentSummary>, AppError> {
    let documents = state.documents.read().await;
    let record = documents
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;
    Ok(Json(record.summary()))
}

/// PATCH /api/v1/documents/:id/editable
pub async fn handle_set_editable(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<EditableRequest>,
) -> Result<Json<DocumentSummary>, AppError> {
    let mut documents = state.documents.write().await;
    let record = documents
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;
    record.editor.set_editable(request.editable);
    record.updated_at = chrono::Utc::now();
    Ok(Json(record.summary()))
}

/// GET /api/v1/documents/:id/warnings
///
/// Warnings for the document's current fields and values. Pages that have not
/// loaded contribute nothing.
pub async fn handle_document_warnings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Warnings>, AppError> {
    let documents = state.documents.read().await;
    let record = documents
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;

    let settings = record.editor.settings();
    let warnings = recompute_warnings(&WarningInputs {
        fields: record.editor.fields(),
        values: record.editor.values(),
        pages: &record.pages,
        text_runs: &record.text_runs,
        style: &settings.style,
        margin: settings.margin,
        date_format: &settings.date_format,
        measurer: state.measurer.as_ref(),
    });
    Ok(Json(warnings))
}
