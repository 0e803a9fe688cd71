//! Flattening: burning filled field values into a copy of the source document.
//!
//! Planning is pure and shares every rule with the preview: the same margin
//! crop, the same padding, the same `layout_field_text`. A field whose text is
//! cut off here is the same field the editor reports as truncated.

pub mod handlers;
pub mod pdf;

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::geometry::{has_drawable_area, Margin, UnitBox};
use crate::layout::font_metrics::MeasureText;
use crate::layout::text_fit::{export_text_box, layout_field_text, FieldTextLayout, FieldTextStyle};
use crate::models::field::sort_for_render;
use crate::models::{format_value, Field, FieldId, FormattedValue, ValueMap};
use crate::overlap::PageMap;

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("{0}")]
    Unreadable(String),

    #[error("failed to write flattened document: {0}")]
    Write(String),
}

/// Rules the flattener draws with, in export units.
#[derive(Debug, Clone)]
pub struct FlattenSettings {
    pub style: FieldTextStyle,
    pub margin: Margin,
    pub date_format: String,
}

/// One thing to draw for one field. Boxes are in points, top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawing {
    Text {
        field_id: FieldId,
        rect: UnitBox,
        layout: FieldTextLayout,
    },
    CheckMark {
        field_id: FieldId,
        rect: UnitBox,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenPlan {
    /// Page number → drawings, in render order.
    pub pages: BTreeMap<u32, Vec<Drawing>>,
    /// Filled fields left with no drawable area after the margin crop.
    pub clamped_away: Vec<FieldId>,
    /// Filled fields whose page does not exist in the source.
    pub missing_page: Vec<FieldId>,
    /// Values keyed by an id no field has.
    pub unknown_values: Vec<FieldId>,
}

impl FlattenPlan {
    pub fn drawing_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }
}

/// Decides what gets drawn where. `pages` must be in export units (`*_pt`).
pub fn plan_flatten<M: MeasureText + ?Sized>(
    fields: &[Field],
    values: &ValueMap,
    pages: &PageMap,
    settings: &FlattenSettings,
    measurer: &M,
) -> FlattenPlan {
    let mut plan = FlattenPlan::default();

    let known: HashSet<&str> = fields.iter().map(|f| f.id.as_str()).collect();
    plan.unknown_values = values
        .keys()
        .filter(|id| !known.contains(id.as_str()))
        .cloned()
        .collect();
    plan.unknown_values.sort();

    let mut ordered = fields.to_vec();
    sort_for_render(&mut ordered);

    for field in &ordered {
        let formatted = format_value(field.kind, values.get(&field.id), &settings.date_format);
        if formatted.is_empty() {
            continue;
        }
        let Some(page) = pages.get(&field.page_number) else {
            plan.missing_page.push(field.id.clone());
            continue;
        };
        let Some(rect) = export_text_box(field, page, settings.margin)
            .filter(|rect| has_drawable_area(rect, settings.style.padding))
        else {
            plan.clamped_away.push(field.id.clone());
            continue;
        };

        let drawing = match formatted {
            FormattedValue::Text(text) => Drawing::Text {
                field_id: field.id.clone(),
                rect,
                layout: layout_field_text(&text, rect.width, rect.height, &settings.style, measurer),
            },
            FormattedValue::CheckMark => Drawing::CheckMark {
                field_id: field.id.clone(),
                rect,
            },
            FormattedValue::Empty => continue,
        };
        plan.pages.entry(field.page_number).or_default().push(drawing);
    }

    plan
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
