//! PDF output for a flatten plan, written with `lopdf`.
//!
//! The source content is never rewritten. Each touched page gets its original
//! content streams wrapped in `q … Q` so leftover graphics state cannot leak
//! into the overlay, followed by one overlay stream with the field text.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};

use crate::document::source::{page_box, page_resources, resolve, MediaBox};
use crate::flatten::{plan_flatten, Drawing, FlattenError, FlattenSettings};
use crate::geometry::{PageGeometry, UnitBox};
use crate::layout::font_metrics::MeasureText;
use crate::models::{Field, ValueMap};
use crate::overlap::PageMap;

/// Resource names for the fonts the overlay adds to each touched page.
const TEXT_FONT_RESOURCE: &str = "FpText";
const CHECK_FONT_RESOURCE: &str = "FpCheck";

/// Baseline offset from the top of a line box, as a fraction of font size.
const BASELINE_ASCENT: f64 = 0.8;

/// ZapfDingbats `a20` (✔), drawn with code `4`.
const CHECK_GLYPH: &[u8] = b"4";
const CHECK_GLYPH_WIDTH: f64 = 0.846;
const CHECK_GLYPH_HEIGHT: f64 = 0.7;

/// Flattens `values` into a copy of `source`. CPU-bound; call from `spawn_blocking`.
pub fn flatten_pdf<M: MeasureText + ?Sized>(
    source: &[u8],
    fields: &[Field],
    values: &ValueMap,
    settings: &FlattenSettings,
    measurer: &M,
) -> Result<Vec<u8>, FlattenError> {
    let mut doc = Document::load_mem(source).map_err(|e| FlattenError::Unreadable(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(FlattenError::Unreadable("document is encrypted".to_string()));
    }

    let page_ids: BTreeMap<u32, ObjectId> = doc.get_pages();
    if page_ids.is_empty() {
        return Err(FlattenError::Unreadable("document has no pages".to_string()));
    }
    let media: BTreeMap<u32, MediaBox> = page_ids
        .iter()
        .map(|(&n, &id)| (n, page_box(&doc, id)))
        .collect();
    let pages: PageMap = media
        .iter()
        .map(|(&n, m)| (n, export_geometry(n, m)))
        .collect();

    let plan = plan_flatten(fields, values, &pages, settings, measurer);
    for id in &plan.unknown_values {
        warn!(field_id = %id, "Value has no matching field; ignored");
    }
    for id in &plan.missing_page {
        warn!(field_id = %id, "Field page does not exist in the source; ignored");
    }
    for id in &plan.clamped_away {
        debug!(field_id = %id, "Field has no drawable area after margin clamping; skipped");
    }

    if plan.drawing_count() > 0 {
        let text_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => settings.style.typography.font_family.base_font_name(),
            "Encoding" => "WinAnsiEncoding",
        });
        let check_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "ZapfDingbats",
        });

        for (page_number, drawings) in &plan.pages {
            let (Some(&page_id), Some(media)) = (page_ids.get(page_number), media.get(page_number)) else {
                continue;
            };
            install_fonts(&mut doc, page_id, text_font, check_font)?;
            let operations = overlay_operations(drawings, media, settings);
            overlay_page(&mut doc, page_id, operations)?;
        }
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| FlattenError::Write(e.to_string()))?;
    Ok(buffer)
}

fn export_geometry(page_number: u32, media: &MediaBox) -> PageGeometry {
    PageGeometry {
        page_number,
        width_px: media.width,
        height_px: media.height,
        width_pt: media.width,
        height_pt: media.height,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page resources + contents
// ────────────────────────────────────────────────────────────────────────────

/// Gives the page its own resource dictionary: a copy of the effective
/// (possibly inherited) one, plus the overlay fonts. Shared resource objects
/// are left untouched.
fn install_fonts(
    doc: &mut Document,
    page_id: ObjectId,
    text_font: ObjectId,
    check_font: ObjectId,
) -> Result<(), FlattenError> {
    let mut resources = page_resources(doc, page_id).cloned().unwrap_or_else(Dictionary::new);
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    fonts.set(TEXT_FONT_RESOURCE, text_font);
    fonts.set(CHECK_FONT_RESOURCE, check_font);
    resources.set("Font", fonts);

    page_dict_mut(doc, page_id)?.set("Resources", resources);
    Ok(())
}

fn overlay_page(doc: &mut Document, page_id: ObjectId, operations: Vec<Operation>) -> Result<(), FlattenError> {
    let existing: Vec<Object> = {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| FlattenError::Write(e.to_string()))?;
        match page.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(obj @ Object::Reference(_)) => match resolve(doc, obj) {
                // an indirect array of streams
                Object::Array(items) => items.clone(),
                _ => vec![obj.clone()],
            },
            _ => Vec::new(),
        }
    };

    let save = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));

    let mut overlay = Vec::with_capacity(operations.len() + 1);
    overlay.push(Operation::new("Q", vec![]));
    overlay.extend(operations);
    let encoded = Content { operations: overlay }
        .encode()
        .map_err(|e| FlattenError::Write(e.to_string()))?;
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    page_dict_mut(doc, page_id)?.set("Contents", contents);
    Ok(())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, FlattenError> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| FlattenError::Write(format!("page {page_id:?}: {e}")))
}

// ────────────────────────────────────────────────────────────────────────────
// Drawing operations
// ────────────────────────────────────────────────────────────────────────────

fn overlay_operations(drawings: &[Drawing], media: &MediaBox, settings: &FlattenSettings) -> Vec<Operation> {
    let mut ops = Vec::new();
    for drawing in drawings {
        match drawing {
            Drawing::Text { rect, layout, .. } => {
                let font_size = settings.style.typography.font_size;
                let padding = settings.style.padding;
                let baseline_offset = (layout.line_height - font_size) / 2.0 + BASELINE_ASCENT * font_size;

                begin_clipped(&mut ops, rect, media);
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![TEXT_FONT_RESOURCE.into(), real(font_size)]));
                for (i, line) in layout.visible().iter().enumerate() {
                    let x = media.llx + rect.left + padding;
                    let y = media.pdf_y(rect.top + padding + i as f64 * layout.line_height + baseline_offset);
                    ops.push(text_matrix(x, y));
                    ops.push(Operation::new(
                        "Tj",
                        vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
                    ));
                }
                ops.push(Operation::new("ET", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            Drawing::CheckMark { rect, .. } => {
                let inner = rect.inset(settings.style.padding);
                let size = inner.width.min(inner.height).max(0.0);
                if size <= 0.0 {
                    continue;
                }
                let x = media.llx + inner.left + (inner.width - CHECK_GLYPH_WIDTH * size) / 2.0;
                let y = media.pdf_y(inner.top + (inner.height + CHECK_GLYPH_HEIGHT * size) / 2.0);

                begin_clipped(&mut ops, rect, media);
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![CHECK_FONT_RESOURCE.into(), real(size)]));
                ops.push(text_matrix(x, y));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(CHECK_GLYPH.to_vec(), StringFormat::Literal)],
                ));
                ops.push(Operation::new("ET", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
    ops
}

/// `q`, black fill, and a clip to the field box.
fn begin_clipped(ops: &mut Vec<Operation>, rect: &UnitBox, media: &MediaBox) {
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("g", vec![0.into()]));
    ops.push(Operation::new(
        "re",
        vec![
            real(media.llx + rect.left),
            real(media.pdf_y(rect.bottom())),
            real(rect.width),
            real(rect.height),
        ],
    ));
    ops.push(Operation::new("W", vec![]));
    ops.push(Operation::new("n", vec![]));
}

fn text_matrix(x: f64, y: f64) -> Operation {
    Operation::new(
        "Tm",
        vec![1.into(), 0.into(), 0.into(), 1.into(), real(x), real(y)],
    )
}

fn real(v: f64) -> Object {
    Object::Real(v as _)
}

/// Encodes text for a WinAnsiEncoding simple font. Characters outside the
/// encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => win_ansi_special(c).unwrap_or(b'?'),
        })
        .collect()
}

fn win_ansi_special(c: char) -> Option<u8> {
    Some(match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        '\t' => b' ',
        _ => return None,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
