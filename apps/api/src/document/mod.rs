//! Source documents held by the service: bytes, load progress, resolved pages,
//! printed text runs, and the editor session that owns the document's fields.

pub mod handlers;
pub mod loader;
pub mod source;
pub mod text_runs;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::editor::session::EditorSession;
use crate::overlap::{PageMap, TextRunsByPage};

pub type DocumentStore = Arc<RwLock<HashMap<Uuid, DocumentRecord>>>;

pub fn new_store() -> DocumentStore {
    Arc::new(RwLock::new(HashMap::new()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Loading {
        loaded_pages: u32,
        total_pages: Option<u32>,
    },
    Ready {
        total_pages: u32,
    },
    /// The source could not be read. Its pages count as absent.
    Failed {
        message: String,
    },
}

impl LoadStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadStatus::Loading { .. })
    }
}

/// One uploaded source document.
pub struct DocumentRecord {
    pub id: Uuid,
    pub file_name: Option<String>,
    pub bytes: Bytes,
    /// Bumped whenever the source bytes are replaced; load results carry the
    /// generation they were started for.
    pub generation: u64,
    pub status: LoadStatus,
    pub pages: PageMap,
    pub text_runs: TextRunsByPage,
    pub editor: EditorSession,
    pub load_task: Option<AbortHandle>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(id: Uuid, file_name: Option<String>, bytes: Bytes, editor: EditorSession) -> Self {
        let now = Utc::now();
        DocumentRecord {
            id,
            file_name,
            bytes,
            generation: 1,
            status: LoadStatus::Loading {
                loaded_pages: 0,
                total_pages: None,
            },
            pages: PageMap::new(),
            text_runs: TextRunsByPage::new(),
            editor,
            load_task: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Swaps in new source bytes. Everything derived from the old bytes is
    /// dropped and any in-flight load is aborted; fields and values stay.
    pub fn replace_source(&mut self, file_name: Option<String>, bytes: Bytes) {
        if let Some(task) = self.load_task.take() {
            task.abort();
        }
        self.file_name = file_name;
        self.bytes = bytes;
        self.generation += 1;
        self.status = LoadStatus::Loading {
            loaded_pages: 0,
            total_pages: None,
        };
        self.pages.clear();
        self.text_runs.clear();
        self.editor.reset_pages();
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> DocumentSummary {
        let mut pages: Vec<_> = self.pages.values().copied().collect();
        pages.sort_by_key(|p| p.page_number);
        DocumentSummary {
            id: self.id,
            file_name: self.file_name.clone(),
            generation: self.generation,
            status: self.status.clone(),
            editable: self.editor.is_editable(),
            pages,
            text_runs: self.text_runs.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: Uuid,
    pub file_name: Option<String>,
    pub generation: u64,
    pub status: LoadStatus,
    pub editable: bool,
    pub pages: Vec<crate::geometry::PageGeometry>,
    pub text_runs: TextRunsByPage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
