//! Stateless warnings endpoint.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::geometry::PageGeometry;
use crate::layout::text_fit::FieldTextStyle;
use crate::models::{Field, ValueMap};
use crate::overlap::{recompute_warnings, PageMap, TextRunsByPage, WarningInputs, Warnings};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningsRequest {
    pub fields: Vec<Field>,
    #[serde(default)]
    pub values: ValueMap,
    /// Pages that have resolved. Fields on other pages are left out.
    pub pages: Vec<PageGeometry>,
    #[serde(default)]
    pub text_runs: TextRunsByPage,
    /// Export-unit style. Defaults to the configured one.
    pub style: Option<FieldTextStyle>,
}

/// POST /api/v1/warnings
pub async fn handle_warnings(
    State(state): State<AppState>,
    Json(request): Json<WarningsRequest>,
) -> Result<Json<Warnings>, AppError> {
    let pages: PageMap = request
        .pages
        .into_iter()
        .map(|page| (page.page_number, page))
        .collect();
    let style = request.style.unwrap_or_else(|| state.text_style());
    let settings = state.editor_settings();

    let warnings = recompute_warnings(&WarningInputs {
        fields: &request.fields,
        values: &request.values,
        pages: &pages,
        text_runs: &request.text_runs,
        style: &style,
        margin: settings.margin,
        date_format: &settings.date_format,
        measurer: state.measurer.as_ref(),
    });
    Ok(Json(warnings))
}
