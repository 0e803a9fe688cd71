//! Cancellable, page-by-page document loading.
//!
//! Each load runs against a [`LoadTicket`] naming the document and the source
//! generation it was started for. Every write re-checks the ticket under the
//! store lock, so a load that lost a race with a replacement upload can never
//! write its pages into the new document's state.

use bytes::Bytes;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::source::{PageSource, PdfPageSource, SourceError};
use crate::document::{DocumentRecord, DocumentStore, LoadStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub document_id: Uuid,
    pub generation: u64,
}

impl LoadTicket {
    pub fn for_record(record: &DocumentRecord) -> Self {
        LoadTicket {
            document_id: record.id,
            generation: record.generation,
        }
    }

    pub fn is_current(&self, record: &DocumentRecord) -> bool {
        record.id == self.document_id && record.generation == self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed { pages: u32 },
    /// The document was replaced or removed; nothing more was written.
    Stale,
    Failed,
}

#[derive(Clone)]
pub struct DocumentLoader {
    store: DocumentStore,
    px_per_pt: f64,
}

impl DocumentLoader {
    pub fn new(store: DocumentStore, px_per_pt: f64) -> Self {
        DocumentLoader { store, px_per_pt }
    }

    /// Starts a background load of `bytes` for the ticket's document.
    pub fn spawn(&self, ticket: LoadTicket, bytes: Bytes) -> AbortHandle {
        let loader = self.clone();
        tokio::spawn(async move {
            loader.run(ticket, bytes).await;
        })
        .abort_handle()
    }

    /// Parses the PDF off the async runtime, then loads its pages.
    pub async fn run(&self, ticket: LoadTicket, bytes: Bytes) -> LoadOutcome {
        let px_per_pt = self.px_per_pt;
        let parsed = tokio::task::spawn_blocking(move || PdfPageSource::parse(&bytes, px_per_pt))
            .await
            .map_err(|e| SourceError::Unreadable(format!("parse task failed: {e}")))
            .and_then(|result| result);

        match parsed {
            Ok(source) => self.load_pages(ticket, &source).await,
            Err(err) => self.fail(ticket, &err).await,
        }
    }

    /// Resolves pages one at a time, yielding between pages.
    pub async fn load_pages<S: PageSource + ?Sized>(&self, ticket: LoadTicket, source: &S) -> LoadOutcome {
        let total = match source.page_count().await {
            Ok(total) => total,
            Err(err) => return self.fail(ticket, &err).await,
        };

        let started = self
            .update(ticket, |record| {
                record.status = LoadStatus::Loading {
                    loaded_pages: 0,
                    total_pages: Some(total),
                };
            })
            .await;
        if !started {
            return self.abandon(ticket);
        }

        for page_number in 1..=total {
            let page = match source.load_page(page_number).await {
                Ok(page) => page,
                Err(err) => return self.fail(ticket, &err).await,
            };

            let written = self
                .update(ticket, |record| {
                    record.pages.insert(page_number, page.geometry);
                    record.text_runs.insert(page_number, page.text_runs);
                    record.editor.set_pages(record.pages.clone());
                    record.status = LoadStatus::Loading {
                        loaded_pages: page_number,
                        total_pages: Some(total),
                    };
                })
                .await;
            if !written {
                return self.abandon(ticket);
            }

            tokio::task::yield_now().await;
        }

        let finished = self
            .update(ticket, |record| {
                record.status = LoadStatus::Ready { total_pages: total };
                record.load_task = None;
            })
            .await;
        if !finished {
            return self.abandon(ticket);
        }

        info!(
            document_id = %ticket.document_id,
            generation = ticket.generation,
            pages = total,
            "Document loaded"
        );
        LoadOutcome::Completed { pages: total }
    }

    /// Applies `f` only when the ticket still names the document's current source.
    async fn update(&self, ticket: LoadTicket, f: impl FnOnce(&mut DocumentRecord)) -> bool {
        let mut documents = self.store.write().await;
        match documents.get_mut(&ticket.document_id) {
            Some(record) if ticket.is_current(record) => {
                f(record);
                record.updated_at = chrono::Utc::now();
                true
            }
            _ => false,
        }
    }

    async fn fail(&self, ticket: LoadTicket, err: &SourceError) -> LoadOutcome {
        let message = err.to_string();
        let written = self
            .update(ticket, |record| {
                record.status = LoadStatus::Failed {
                    message: message.clone(),
                };
                record.pages.clear();
                record.text_runs.clear();
                record.editor.reset_pages();
                record.load_task = None;
            })
            .await;
        if !written {
            return self.abandon(ticket);
        }

        warn!(
            document_id = %ticket.document_id,
            generation = ticket.generation,
            error = %message,
            "Source document unreadable"
        );
        LoadOutcome::Failed
    }

    fn abandon(&self, ticket: LoadTicket) -> LoadOutcome {
        debug!(
            document_id = %ticket.document_id,
            generation = ticket.generation,
            "Abandoning stale document load"
        );
        LoadOutcome::Stale
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::document::new_store;
    use crate::document::source::tests::sample_pdf;
    use crate::document::source::LoadedPage;
    use crate::editor::session::{EditorSession, EditorSettings};
    use crate::geometry::PageGeometry;
    use crate::layout::text_fit::FieldTextStyle;
    use crate::layout::font_metrics::Typography;
    use crate::overlap::TextRun;

    fn editor() -> EditorSession {
        EditorSession::new(EditorSettings::new(
            FieldTextStyle {
                typography: Typography::default(),
                padding: 2.0,
            },
            "%m/%d/%Y",
        ))
    }

    fn loaded_page(n: u32) -> LoadedPage {
        LoadedPage {
            geometry: PageGeometry {
                page_number: n,
                width_px: 816.0,
                height_px: 1056.0,
                width_pt: 612.0,
                height_pt: 792.0,
            },
            text_runs: vec![TextRun {
                left: 10.0,
                right: 50.0,
                top: 10.0,
                bottom: 20.0,
            }],
        }
    }

    /// Serves `pages` pages; page `fail_on` errors, and page `replace_on`
    /// swaps the document's source mid-load.
    struct FakeSource {
        pages: u32,
        fail_on: Option<u32>,
        replace_on: Option<(u32, DocumentStore, Uuid)>,
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn page_count(&self) -> Result<u32, SourceError> {
            Ok(self.pages)
        }

        async fn load_page(&self, page_number: u32) -> Result<LoadedPage, SourceError> {
            if self.fail_on == Some(page_number) {
                return Err(SourceError::Unreadable("bad page".to_string()));
            }
            if let Some((at, store, id)) = &self.replace_on {
                if *at == page_number {
                    let mut docs = store.write().await;
                    if let Some(record) = docs.get_mut(id) {
                        record.replace_source(None, Bytes::from_static(b"new"));
                    }
                }
            }
            Ok(loaded_page(page_number))
        }
    }

    async fn setup() -> (DocumentStore, DocumentLoader, LoadTicket) {
        let store = new_store();
        let id = Uuid::new_v4();
        let record = DocumentRecord::new(id, None, Bytes::new(), editor());
        let ticket = LoadTicket::for_record(&record);
        store.write().await.insert(id, record);
        let loader = DocumentLoader::new(store.clone(), 96.0 / 72.0);
        (store, loader, ticket)
    }

    #[tokio::test]
    async fn test_loads_every_page_and_feeds_editor() {
        let (store, loader, ticket) = setup().await;
        let source = FakeSource {
            pages: 3,
            fail_on: None,
            replace_on: None,
        };
        let outcome = loader.load_pages(ticket, &source).await;
        assert_eq!(outcome, LoadOutcome::Completed { pages: 3 });

        let docs = store.read().await;
        let record = &docs[&ticket.document_id];
        assert_eq!(record.status, LoadStatus::Ready { total_pages: 3 });
        assert_eq!(record.pages.len(), 3);
        assert_eq!(record.text_runs[&2].len(), 1);
        assert_eq!(record.editor.pages().len(), 3);
    }

    #[tokio::test]
    async fn test_stale_ticket_writes_nothing() {
        let (store, loader, ticket) = setup().await;
        store
            .write()
            .await
            .get_mut(&ticket.document_id)
            .unwrap()
            .replace_source(None, Bytes::from_static(b"v2"));

        let source = FakeSource {
            pages: 2,
            fail_on: None,
            replace_on: None,
        };
        assert_eq!(loader.load_pages(ticket, &source).await, LoadOutcome::Stale);

        let docs = store.read().await;
        let record = &docs[&ticket.document_id];
        assert!(record.pages.is_empty());
        assert_eq!(record.generation, 2);
        assert!(record.status.is_loading());
    }

    #[tokio::test]
    async fn test_replacement_mid_load_abandons_old_pages() {
        let (store, loader, ticket) = setup().await;
        let source = FakeSource {
            pages: 3,
            fail_on: None,
            replace_on: Some((2, store.clone(), ticket.document_id)),
        };
        assert_eq!(loader.load_pages(ticket, &source).await, LoadOutcome::Stale);

        let docs = store.read().await;
        let record = &docs[&ticket.document_id];
        assert!(record.pages.is_empty(), "page 1 was cleared and page 2 never written");
        assert!(record.editor.pages().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_page_marks_document_failed() {
        let (store, loader, ticket) = setup().await;
        let source = FakeSource {
            pages: 3,
            fail_on: Some(2),
            replace_on: None,
        };
        assert_eq!(loader.load_pages(ticket, &source).await, LoadOutcome::Failed);

        let docs = store.read().await;
        let record = &docs[&ticket.document_id];
        assert!(matches!(record.status, LoadStatus::Failed { .. }));
        assert!(record.pages.is_empty());
    }

    #[tokio::test]
    async fn test_run_parses_real_pdf() {
        let (store, loader, ticket) = setup().await;
        let outcome = loader
            .run(ticket, Bytes::from(sample_pdf(&["Name:", "Date:"])))
            .await;
        assert_eq!(outcome, LoadOutcome::Completed { pages: 2 });
        let docs = store.read().await;
        let page = docs[&ticket.document_id].pages[&1];
        assert!((page.width_px - 816.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_run_rejects_garbage() {
        let (store, loader, ticket) = setup().await;
        let outcome = loader.run(ticket, Bytes::from_static(b"%PDF-garbage")).await;
        assert_eq!(outcome, LoadOutcome::Failed);
        let docs = store.read().await;
        assert!(matches!(
            docs[&ticket.document_id].status,
            LoadStatus::Failed { .. }
        ));
    }
}
