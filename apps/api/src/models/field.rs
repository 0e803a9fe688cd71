use serde::{Deserialize, Serialize};

use crate::geometry::PercentBox;

/// Opaque field identifier, unique within one document.
pub type FieldId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Date,
    Checkbox,
    Signature,
}

impl FieldKind {
    /// Human label used when a new field is placed ("Text 3", "Signature 1").
    pub fn display_name(&self) -> &'static str {
        match self {
            FieldKind::Text => "Text",
            FieldKind::Date => "Date",
            FieldKind::Checkbox => "Checkbox",
            FieldKind::Signature => "Signature",
        }
    }
}

/// A user-placed rectangular region bound to one page.
///
/// Geometry is stored in percentage space (0–100 of page width/height) so the
/// same field renders identically at any raster size and in export units.
/// `page_number` is fixed at creation; drags never move a field across pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub kind: FieldKind,
    pub label: String,
    pub page_number: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub order_index: i32,
}

impl Field {
    pub fn bounds(&self) -> PercentBox {
        PercentBox {
            page_number: self.page_number,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    /// Writes a box back into the field. The page number is never taken from
    /// the box.
    pub fn set_bounds(&mut self, bounds: PercentBox) {
        self.x = bounds.x;
        self.y = bounds.y;
        self.width = bounds.width;
        self.height = bounds.height;
    }
}

/// Sorts fields into render/tab order: page first, then `order_index`, then id.
pub fn sort_for_render(fields: &mut [Field]) {
    fields.sort_by(|a, b| {
        a.page_number
            .cmp(&b.page_number)
            .then(a.order_index.cmp(&b.order_index))
            .then_with(|| a.id.cmp(&b.id))
    });
}
