use std::sync::Arc;

use crate::config::Config;
use crate::document::loader::DocumentLoader;
use crate::document::{new_store, DocumentStore};
use crate::editor::session::EditorSettings;
use crate::layout::font_metrics::{BaseFontMetrics, MeasureText};
use crate::layout::text_fit::FieldTextStyle;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Text measurement used by both the edit validator and the flattener.
    pub measurer: Arc<dyn MeasureText>,
    /// In-memory documents. Field lists are owned by each document's editor session.
    pub documents: DocumentStore,
    pub loader: DocumentLoader,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let documents = new_store();
        let loader = DocumentLoader::new(documents.clone(), config.preview_px_per_pt);
        AppState {
            config,
            measurer: Arc::new(BaseFontMetrics),
            documents,
            loader,
        }
    }

    /// Field text style in export units.
    pub fn text_style(&self) -> FieldTextStyle {
        self.config.field_text_style()
    }

    pub fn editor_settings(&self) -> EditorSettings {
        EditorSettings::new(self.text_style(), self.config.date_format.clone())
    }
}
