//! Source-document collaborators: page geometry and printed text runs.
//!
//! The loader only talks to [`PageSource`]. [`PdfPageSource`] is the bundled
//! implementation, reading page boxes and content streams with `lopdf`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::document::text_runs::extract_text_runs;
use crate::geometry::PageGeometry;
use crate::layout::font_metrics::FontFamily;
use crate::overlap::TextRun;

/// US Letter, used when a page has no resolvable MediaBox.
const DEFAULT_MEDIA_BOX: MediaBox = MediaBox {
    llx: 0.0,
    lly: 0.0,
    width: 612.0,
    height: 792.0,
};

/// Bound on `Parent` hops; malformed files can contain cycles.
const MAX_PARENT_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Unreadable(String),

    #[error("page {0} does not exist")]
    MissingPage(u32),
}

impl From<lopdf::Error> for SourceError {
    fn from(err: lopdf::Error) -> Self {
        SourceError::Unreadable(err.to_string())
    }
}

/// Everything the engine needs from one resolved page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedPage {
    pub geometry: PageGeometry,
    pub text_runs: Vec<TextRun>,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn page_count(&self) -> Result<u32, SourceError>;

    /// Resolves one 1-based page.
    async fn load_page(&self, page_number: u32) -> Result<LoadedPage, SourceError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PDF page boxes
// ────────────────────────────────────────────────────────────────────────────

/// A page box in PDF user space (points, bottom-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub llx: f64,
    pub lly: f64,
    pub width: f64,
    pub height: f64,
}

impl MediaBox {
    /// Converts a top-left-origin offset (points) to PDF user-space y.
    pub fn pdf_y(&self, top: f64) -> f64 {
        self.lly + self.height - top
    }

    /// Converts PDF user-space y to an offset from the top edge (points).
    pub fn offset_from_top(&self, y: f64) -> f64 {
        self.lly + self.height - y
    }

    /// The overlap of two boxes, if it has any area.
    pub fn intersect(&self, other: &MediaBox) -> Option<MediaBox> {
        let llx = self.llx.max(other.llx);
        let lly = self.lly.max(other.lly);
        let urx = (self.llx + self.width).min(other.llx + other.width);
        let ury = (self.lly + self.height).min(other.lly + other.height);
        if urx - llx <= 0.0 || ury - lly <= 0.0 {
            return None;
        }
        Some(MediaBox {
            llx,
            lly,
            width: urx - llx,
            height: ury - lly,
        })
    }
}

/// The page's MediaBox, walking up the page tree when it is inherited.
pub fn media_box(doc: &Document, page_id: ObjectId) -> MediaBox {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| parse_box(doc, obj))
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

/// The box a viewer shows: the CropBox clipped to the MediaBox, or the
/// MediaBox when there is no usable CropBox. Field geometry is measured
/// against this box on both the preview and the export side.
///
/// `/Rotate` is not applied. Geometry stays in unrotated user space, so on a
/// rotated page fields line up with the page as stored rather than as a
/// viewer turns it; [`page_rotation`] lets callers flag such pages.
pub fn page_box(doc: &Document, page_id: ObjectId) -> MediaBox {
    let media = media_box(doc, page_id);
    inherited_attribute(doc, page_id, b"CropBox")
        .and_then(|obj| parse_box(doc, obj))
        .and_then(|crop| crop.intersect(&media))
        .unwrap_or(media)
}

/// The page's `/Rotate` in degrees, normalised to 0, 90, 180 or 270.
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| resolve(doc, obj).as_i64().ok())
        .map(|deg| deg.rem_euclid(360) / 90 * 90)
        .unwrap_or(0)
}

fn parse_box(doc: &Document, obj: &Object) -> Option<MediaBox> {
    let arr = resolve(doc, obj).as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut v = [0.0f64; 4];
    for (slot, item) in v.iter_mut().zip(arr) {
        *slot = number(resolve(doc, item))?;
    }
    let (llx, urx) = (v[0].min(v[2]), v[0].max(v[2]));
    let (lly, ury) = (v[1].min(v[3]), v[1].max(v[3]));
    if urx - llx <= 0.0 || ury - lly <= 0.0 {
        return None;
    }
    Some(MediaBox {
        llx,
        lly,
        width: urx - llx,
        height: ury - lly,
    })
}

/// Looks an attribute up on the page, then on each ancestor `Pages` node.
pub fn inherited_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    for _ in 0..MAX_PARENT_DEPTH {
        let dict = doc.get_object(current?).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Follows a reference one level; direct objects come back unchanged.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

/// The page's effective resource dictionary (possibly inherited).
pub fn page_resources<'a>(doc: &'a Document, page_id: ObjectId) -> Option<&'a Dictionary> {
    inherited_attribute(doc, page_id, b"Resources").and_then(|obj| resolve(doc, obj).as_dict().ok())
}

/// Maps each font resource name on the page to the base font family it measures like.
fn page_font_families(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontFamily> {
    let Some(fonts) = page_resources(doc, page_id)
        .and_then(|res| res.get(b"Font").ok())
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
    else {
        return HashMap::new();
    };

    fonts
        .iter()
        .map(|(name, obj)| {
            let base = resolve(doc, obj)
                .as_dict()
                .ok()
                .and_then(|font| font.get(b"BaseFont").ok())
                .and_then(|base| base.as_name().ok())
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            (name.clone(), family_for_base_font(&base))
        })
        .collect()
}

fn family_for_base_font(base_font: &str) -> FontFamily {
    let lower = base_font.to_ascii_lowercase();
    if lower.contains("courier") || lower.contains("mono") {
        FontFamily::Courier
    } else if lower.contains("times") || (lower.contains("serif") && !lower.contains("sans")) {
        FontFamily::TimesRoman
    } else {
        FontFamily::Helvetica
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PdfPageSource
// ────────────────────────────────────────────────────────────────────────────

/// What one page contributes, captured while the document is parsed.
#[derive(Debug, Clone)]
struct PdfPage {
    media: MediaBox,
    content: Vec<u8>,
    fonts: HashMap<Vec<u8>, FontFamily>,
}

/// Page source over a parsed PDF.
///
/// Parsing keeps only per-page boxes, raw content and font families; the
/// content walk for each page runs when that page is requested.
#[derive(Clone)]
pub struct PdfPageSource {
    pages: Arc<BTreeMap<u32, PdfPage>>,
    px_per_pt: f64,
}

impl PdfPageSource {
    /// Parses the document. CPU-bound; call from `spawn_blocking`.
    pub fn parse(bytes: &Bytes, px_per_pt: f64) -> Result<Self, SourceError> {
        let doc = Document::load_mem(bytes)?;
        if doc.is_encrypted() {
            return Err(SourceError::Unreadable("document is encrypted".to_string()));
        }
        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            return Err(SourceError::Unreadable("document has no pages".to_string()));
        }

        let pages = page_ids
            .into_iter()
            .map(|(number, page_id)| {
                let rotation = page_rotation(&doc, page_id);
                if rotation != 0 {
                    warn!(page = number, rotation, "Page rotation is not applied to field geometry");
                }
                let page = PdfPage {
                    media: page_box(&doc, page_id),
                    // Pages without a content stream simply have no text.
                    content: doc.get_page_content(page_id).unwrap_or_default(),
                    fonts: page_font_families(&doc, page_id),
                };
                (number, page)
            })
            .collect();

        Ok(PdfPageSource {
            pages: Arc::new(pages),
            px_per_pt,
        })
    }

    /// Geometry and text runs for one page. CPU-bound.
    pub fn read_page(&self, page_number: u32) -> Result<LoadedPage, SourceError> {
        let page = self
            .pages
            .get(&page_number)
            .ok_or(SourceError::MissingPage(page_number))?;

        let geometry = PageGeometry {
            page_number,
            width_px: page.media.width * self.px_per_pt,
            height_px: page.media.height * self.px_per_pt,
            width_pt: page.media.width,
            height_pt: page.media.height,
        };

        let text_runs = if page.content.is_empty() {
            Vec::new()
        } else {
            let content = Content::decode(&page.content)?;
            extract_text_runs(&content, &page.fonts, &page.media, self.px_per_pt)
        };

        Ok(LoadedPage {
            geometry,
            text_runs,
        })
    }
}

#[async_trait]
impl PageSource for PdfPageSource {
    async fn page_count(&self) -> Result<u32, SourceError> {
        Ok(self.pages.len() as u32)
    }

    async fn load_page(&self, page_number: u32) -> Result<LoadedPage, SourceError> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.read_page(page_number))
            .await
            .map_err(|e| SourceError::Unreadable(format!("page {page_number} task failed: {e}")))?
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
