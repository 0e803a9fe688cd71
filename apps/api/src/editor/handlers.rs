//! Axum route handlers for the field editor.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::editor::session::{EditorEvent, EditorOutcome, EditorSnapshot};
use crate::errors::AppError;
use crate::models::{Field, FieldValue, ValueMap};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadFieldsRequest {
    pub fields: Vec<Field>,
    /// Stored values to restore alongside the fields. Each one is validated
    /// like a live edit.
    #[serde(default)]
    pub values: ValueMap,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub outcome: EditorOutcome,
    pub snapshot: EditorSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadFieldsResponse {
    pub snapshot: EditorSnapshot,
    /// Values that did not fit their field and were not restored.
    pub rejected_value_ids: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/documents/:id/editor
pub async fn handle_get_editor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EditorSnapshot>, AppError> {
    let documents = state.documents.read().await;
    let record = documents
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;
    Ok(Json(record.editor.snapshot()))
}

/// PUT /api/v1/documents/:id/editor/fields
///
/// Replaces the field list with a stored one. Boxes are clamped on the way in.
/// Stored values can only be restored once the document has loaded.
pub async fn handle_load_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<LoadFieldsRequest>,
) -> Result<Json<LoadFieldsResponse>, AppError> {
    let mut documents = state.documents.write().await;
    let record = documents
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;
    if !record.editor.is_editable() {
        return Err(AppError::Conflict("document is not editable".to_string()));
    }
    // Values are validated against page geometry, which only exists once loaded.
    if !request.values.is_empty() && record.status.is_loading() {
        return Err(AppError::Conflict(
            "document is still loading; restore values once it is ready".to_string(),
        ));
    }

    record.editor.load_fields(request.fields)?;

    let mut rejected_value_ids = Vec::new();
    let mut values: Vec<(String, FieldValue)> = request.values.into_iter().collect();
    values.sort_by(|a, b| a.0.cmp(&b.0));
    for (field_id, value) in values {
        let outcome = record.editor.apply(
            EditorEvent::EditValue {
                field_id: field_id.clone(),
                value,
            },
            state.measurer.as_ref(),
        )?;
        if !matches!(outcome, EditorOutcome::ValueAccepted { .. }) {
            rejected_value_ids.push(field_id);
        }
    }
    record.updated_at = chrono::Utc::now();

    Ok(Json(LoadFieldsResponse {
        snapshot: record.editor.snapshot(),
        rejected_value_ids,
    }))
}

/// POST /api/v1/documents/:id/editor/events
pub async fn handle_editor_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(event): Json<EditorEvent>,
) -> Result<Json<EventResponse>, AppError> {
    let mut documents = state.documents.write().await;
    let record = documents
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;

    let outcome = record.editor.apply(event, state.measurer.as_ref())?;
    if let EditorOutcome::Ignored { reason } = &outcome {
        debug!(document_id = %id, reason = %reason, "Editor event ignored");
    } else {
        record.updated_at = chrono::Utc::now();
    }

    Ok(Json(EventResponse {
        outcome,
        snapshot: record.editor.snapshot(),
    }))
}
