//! Overlap detection: which fields collide with other fields or with text
//! already printed on the page, plus the pre-export warning summary.
//!
//! Every function here is a pure observer: it takes the current fields, page
//! geometry and text runs and returns fresh sets. Callers recompute whenever an
//! input changes; there is no cache to invalidate.
//!
//! Fields on pages whose geometry has not resolved yet are left out of every
//! set. They are neither overlapping nor clear until their page loads.

pub mod handlers;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::geometry::{
    has_drawable_area, intersects, rects_overlap, to_pixel_box, FieldRect, Margin, PageGeometry,
    UnitBox, OVERLAP_THRESHOLD_PX,
};
use crate::layout::font_metrics::MeasureText;
use crate::layout::text_fit::{export_text_box, layout_field_text, FieldTextStyle};
use crate::models::field::sort_for_render;
use crate::models::{format_value, Field, FieldId, FormattedValue, ValueMap};

/// Average glyph width as a fraction of font size, for the badge heuristic only.
const HEURISTIC_CHAR_WIDTH_RATIO: f64 = 0.5;

pub type PageMap = HashMap<u32, PageGeometry>;
pub type TextRunsByPage = HashMap<u32, Vec<TextRun>>;

/// Bounding box of a run of text extracted from the source page, in raster pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl TextRun {
    fn to_unit_box(self, page_number: u32) -> UnitBox {
        UnitBox {
            page_number,
            left: self.left.min(self.right),
            top: self.top.min(self.bottom),
            width: (self.right - self.left).abs(),
            height: (self.bottom - self.top).abs(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Overlap sets
// ────────────────────────────────────────────────────────────────────────────

/// Fields whose boxes intersect another field's box on the same page.
///
/// O(n²) per page; field counts are in the tens.
pub fn find_field_overlaps(fields: &[Field], pages: &PageMap) -> BTreeSet<FieldId> {
    let placed: Vec<FieldRect<'_>> = fields
        .iter()
        .filter_map(|f| pages.get(&f.page_number).map(|p| field_rect(f, p)))
        .collect();

    let mut flagged = BTreeSet::new();
    for (i, a) in placed.iter().enumerate() {
        for b in placed.iter().skip(i + 1) {
            if intersects(a, b, OVERLAP_THRESHOLD_PX) {
                flagged.insert(a.field_id.to_string());
                flagged.insert(b.field_id.to_string());
            }
        }
    }
    flagged
}

/// True when two distinct fields overlap. A field never overlaps itself.
pub fn fields_intersect(a: &Field, b: &Field, pages: &PageMap) -> bool {
    if a.page_number != b.page_number {
        return false;
    }
    match pages.get(&a.page_number) {
        Some(page) => intersects(&field_rect(a, page), &field_rect(b, page), OVERLAP_THRESHOLD_PX),
        None => false,
    }
}

fn field_rect<'a>(field: &'a Field, page: &PageGeometry) -> FieldRect<'a> {
    FieldRect {
        field_id: &field.id,
        rect: to_pixel_box(field.bounds(), page),
    }
}

/// Fields whose boxes cover text that is already printed on the page.
pub fn find_text_overlaps(
    text_runs: &TextRunsByPage,
    fields: &[Field],
    pages: &PageMap,
) -> BTreeSet<FieldId> {
    fields
        .iter()
        .filter(|field| {
            let (Some(page), Some(runs)) =
                (pages.get(&field.page_number), text_runs.get(&field.page_number))
            else {
                return false;
            };
            let field_box = to_pixel_box(field.bounds(), page);
            runs.iter().any(|run| {
                rects_overlap(
                    &field_box,
                    &run.to_unit_box(field.page_number),
                    OVERLAP_THRESHOLD_PX,
                )
            })
        })
        .map(|field| field.id.clone())
        .collect()
}

/// Cheap overflow badge: `label chars × average glyph width > box width`.
///
/// Advisory only. The editing path uses the wrap-based validator in
/// `layout::text_fit`, and the two are allowed to disagree.
pub fn find_text_overflow(
    fields: &[Field],
    pages: &PageMap,
    style: &FieldTextStyle,
) -> BTreeSet<FieldId> {
    fields
        .iter()
        .filter(|field| {
            let Some(page) = pages.get(&field.page_number) else {
                return false;
            };
            let preview = style.for_preview(page);
            let char_width = preview.typography.font_size * HEURISTIC_CHAR_WIDTH_RATIO;
            let estimated = field.label.chars().count() as f64 * char_width;
            estimated > to_pixel_box(field.bounds(), page).width
        })
        .map(|field| field.id.clone())
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Warning summary
// ────────────────────────────────────────────────────────────────────────────

/// Label lists surfaced to the user before export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapWarnings {
    pub overlapping_field_labels: Vec<String>,
    /// Fields that will render nothing: no value, or no drawable area left after margin clamping.
    pub unfilled_field_labels: Vec<String>,
    pub text_overlap_field_labels: Vec<String>,
    /// Filled fields whose text will be cut off on export.
    pub truncated_field_labels: Vec<String>,
}

impl OverlapWarnings {
    pub fn is_empty(&self) -> bool {
        self.overlapping_field_labels.is_empty()
            && self.unfilled_field_labels.is_empty()
            && self.text_overlap_field_labels.is_empty()
            && self.truncated_field_labels.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warnings {
    pub overlapping_field_ids: BTreeSet<FieldId>,
    pub text_overlap_field_ids: BTreeSet<FieldId>,
    pub text_overflow_field_ids: BTreeSet<FieldId>,
    pub unfilled_field_ids: BTreeSet<FieldId>,
    pub clamped_away_field_ids: BTreeSet<FieldId>,
    pub truncated_field_ids: BTreeSet<FieldId>,
    pub labels: OverlapWarnings,
}

/// Everything `recompute_warnings` looks at.
pub struct WarningInputs<'a, M: MeasureText + ?Sized> {
    pub fields: &'a [Field],
    pub values: &'a ValueMap,
    pub pages: &'a PageMap,
    pub text_runs: &'a TextRunsByPage,
    /// Export-unit style; the same one the flattener draws with.
    pub style: &'a FieldTextStyle,
    pub margin: Margin,
    pub date_format: &'a str,
    pub measurer: &'a M,
}

/// Recomputes every warning set from scratch. Callable on demand.
pub fn recompute_warnings<M: MeasureText + ?Sized>(inputs: &WarningInputs<'_, M>) -> Warnings {
    let mut fields: Vec<Field> = inputs
        .fields
        .iter()
        .filter(|f| inputs.pages.contains_key(&f.page_number))
        .cloned()
        .collect();
    sort_for_render(&mut fields);

    let overlapping = find_field_overlaps(&fields, inputs.pages);
    let text_overlap = find_text_overlaps(inputs.text_runs, &fields, inputs.pages);
    let overflow = find_text_overflow(&fields, inputs.pages, inputs.style);

    let mut unfilled = BTreeSet::new();
    let mut clamped_away = BTreeSet::new();
    let mut truncated = BTreeSet::new();

    for field in &fields {
        let formatted = format_value(field.kind, inputs.values.get(&field.id), inputs.date_format);
        if formatted.is_empty() {
            unfilled.insert(field.id.clone());
            continue;
        }
        let Some(page) = inputs.pages.get(&field.page_number) else {
            continue;
        };
        let drawable = export_text_box(field, page, inputs.margin)
            .filter(|rect| has_drawable_area(rect, inputs.style.padding));
        let Some(rect) = drawable else {
            clamped_away.insert(field.id.clone());
            continue;
        };
        if let FormattedValue::Text(text) = &formatted {
            let layout =
                layout_field_text(text, rect.width, rect.height, inputs.style, inputs.measurer);
            if layout.truncated {
                truncated.insert(field.id.clone());
            }
        }
    }

    let labels_for = |ids: &BTreeSet<FieldId>| -> Vec<String> {
        fields
            .iter()
            .filter(|f| ids.contains(&f.id))
            .map(|f| f.label.clone())
            .collect()
    };

    let lost: BTreeSet<FieldId> = unfilled.union(&clamped_away).cloned().collect();
    let labels = OverlapWarnings {
        overlapping_field_labels: labels_for(&overlapping),
        unfilled_field_labels: labels_for(&lost),
        text_overlap_field_labels: labels_for(&text_overlap),
        truncated_field_labels: labels_for(&truncated),
    };

    Warnings {
        overlapping_field_ids: overlapping,
        text_overlap_field_ids: text_overlap,
        text_overflow_field_ids: overflow,
        unfilled_field_ids: unfilled,
        clamped_away_field_ids: clamped_away,
        truncated_field_ids: truncated,
        labels,
    }
}


// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
