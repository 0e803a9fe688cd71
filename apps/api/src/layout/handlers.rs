//! Stateless text-fit endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::layout::text_fit::{layout_field_text, FieldTextStyle, FitResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitRequest {
    pub text: String,
    pub box_width: f64,
    pub box_height: f64,
    /// Style in the same units as the box. Defaults to the configured export style.
    pub style: Option<FieldTextStyle>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitResponse {
    #[serde(flatten)]
    pub fit: FitResult,
    pub lines: Vec<String>,
    pub visible_lines: usize,
}

/// POST /api/v1/fit
pub async fn handle_fit(
    State(state): State<AppState>,
    Json(request): Json<FitRequest>,
) -> Result<Json<FitResponse>, AppError> {
    let dimensions = [request.box_width, request.box_height];
    if dimensions.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(AppError::Validation(
            "boxWidth and boxHeight must be finite and non-negative".to_string(),
        ));
    }
    let style = request.style.unwrap_or_else(|| state.text_style());
    if !(style.typography.font_size > 0.0 && style.typography.line_height_ratio > 0.0) {
        return Err(AppError::Validation(
            "fontSize and lineHeightRatio must be positive".to_string(),
        ));
    }

    let layout = layout_field_text(
        &request.text,
        request.box_width,
        request.box_height,
        &style,
        state.measurer.as_ref(),
    );
    Ok(Json(FitResponse {
        fit: FitResult::from(&layout),
        visible_lines: layout.visible_lines,
        lines: layout.lines,
    }))
}
