//! Field geometry in resolution-independent percentage space.
//!
//! Every field box is stored as percentages of its page's width and height.
//! Raster pixels (preview) and PDF points (export) are two independent unit
//! spaces; they only meet through the percentage box, which is what keeps
//! the preview and the flattened output in the same place at any zoom level.
//!
//! Nothing in here fails. Out-of-range input is clamped, never rejected.

use serde::{Deserialize, Serialize};

/// Minimum field width, in percent of page width.
pub const MIN_WIDTH_PCT: f64 = 8.0;
/// Minimum field height, in percent of page height.
pub const MIN_HEIGHT_PCT: f64 = 4.0;

/// Overlap tolerance in pixels. Boxes that only touch are not overlapping.
pub const OVERLAP_THRESHOLD_PX: f64 = 0.5;

/// Page margin shared by the preview and the flattener. Changing it changes both.
pub const FIELD_MARGIN: Margin = Margin {
    left: 6.0,
    right: 6.0,
    top: 6.0,
    bottom: 6.0,
};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// A box in percentage space (0–100 of page width / height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentBox {
    pub page_number: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A box in a concrete unit space (raster pixels or export points), top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitBox {
    pub page_number: u32,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl UnitBox {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Shrinks the box by `padding` on every side. Width/height may go negative.
    pub fn inset(&self, padding: f64) -> UnitBox {
        UnitBox {
            page_number: self.page_number,
            left: self.left + padding,
            top: self.top + padding,
            width: self.width - 2.0 * padding,
            height: self.height - 2.0 * padding,
        }
    }
}

/// Rendered page geometry, supplied by the rasterizer (pixels) and the
/// source document (points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub page_number: u32,
    pub width_px: f64,
    pub height_px: f64,
    pub width_pt: f64,
    pub height_pt: f64,
}

/// Minimum field extent in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinSize {
    pub width: f64,
    pub height: f64,
}

pub const MIN_FIELD_SIZE: MinSize = MinSize {
    width: MIN_WIDTH_PCT,
    height: MIN_HEIGHT_PCT,
};

/// Page-relative inset: left/right in percent of width, top/bottom in percent of height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Margin {
    /// The usable content rectangle for a page, in percentage space.
    pub fn content_box(&self, page_number: u32) -> PercentBox {
        PercentBox {
            page_number,
            x: self.left,
            y: self.top,
            width: (100.0 - self.left - self.right).max(0.0),
            height: (100.0 - self.top - self.bottom).max(0.0),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Clamping
// ────────────────────────────────────────────────────────────────────────────

/// Clamps a box so it sits fully inside its page and is at least `min` in size.
///
/// Width and height are raised to the minimum (and capped at 100) before the
/// origin is pulled back into `[0, 100 - extent]`. Non-finite input is treated
/// as zero. Idempotent.
pub fn clamp_box(bounds: PercentBox, min: MinSize) -> PercentBox {
    let width = finite_or_zero(bounds.width).max(min.width).min(100.0);
    let height = finite_or_zero(bounds.height).max(min.height).min(100.0);
    let x = finite_or_zero(bounds.x).clamp(0.0, 100.0 - width);
    let y = finite_or_zero(bounds.y).clamp(0.0, 100.0 - height);

    PercentBox {
        page_number: bounds.page_number,
        x,
        y,
        width,
        height,
    }
}

/// Crops a box to the margin's content rectangle.
///
/// Returns `None` when nothing of the box survives; the caller treats that as
/// a field that cannot be drawn.
pub fn clamp_to_margin(bounds: PercentBox, margin: Margin) -> Option<PercentBox> {
    let content = margin.content_box(bounds.page_number);

    let left = bounds.x.max(content.x);
    let top = bounds.y.max(content.y);
    let right = (bounds.x + bounds.width).min(content.x + content.width);
    let bottom = (bounds.y + bounds.height).min(content.y + content.height);

    let width = right - left;
    let height = bottom - top;
    if !(width > 0.0 && height > 0.0) {
        return None;
    }

    Some(PercentBox {
        page_number: bounds.page_number,
        x: left,
        y: top,
        width,
        height,
    })
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Unit conversion
// ────────────────────────────────────────────────────────────────────────────

/// Percentage box → raster pixels.
pub fn to_pixel_box(bounds: PercentBox, page: &PageGeometry) -> UnitBox {
    scale_box(bounds, page.width_px, page.height_px)
}

/// Raster pixels → percentage box. Inverse of [`to_pixel_box`].
pub fn to_percent_box(rect: UnitBox, page: &PageGeometry) -> PercentBox {
    PercentBox {
        page_number: rect.page_number,
        x: ratio_pct(rect.left, page.width_px),
        y: ratio_pct(rect.top, page.height_px),
        width: ratio_pct(rect.width, page.width_px),
        height: ratio_pct(rect.height, page.height_px),
    }
}

/// Percentage box → export points (top-left origin).
pub fn to_export_box(bounds: PercentBox, page: &PageGeometry) -> UnitBox {
    scale_box(bounds, page.width_pt, page.height_pt)
}

/// A pointer position in page pixels → percentage coordinates.
pub fn pixel_point_to_percent(x_px: f64, y_px: f64, page: &PageGeometry) -> (f64, f64) {
    (
        ratio_pct(x_px, page.width_px),
        ratio_pct(y_px, page.height_px),
    )
}

fn scale_box(bounds: PercentBox, width: f64, height: f64) -> UnitBox {
    UnitBox {
        page_number: bounds.page_number,
        left: bounds.x / 100.0 * width,
        top: bounds.y / 100.0 * height,
        width: bounds.width / 100.0 * width,
        height: bounds.height / 100.0 * height,
    }
}

// Zero-sized pages map everything to the origin.
fn ratio_pct(value: f64, extent: f64) -> f64 {
    if extent > 0.0 {
        value / extent * 100.0
    } else {
        0.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Overlap
// ────────────────────────────────────────────────────────────────────────────

/// A field's box in a concrete unit space, tagged with the field it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRect<'a> {
    pub field_id: &'a str,
    pub rect: UnitBox,
}

/// Overlap test between two field boxes.
///
/// A box never intersects itself: the same field id is never an overlap, even
/// though its geometry matches exactly. Two distinct fields with identical
/// boxes do overlap. Symmetric in its arguments.
pub fn intersects(a: &FieldRect<'_>, b: &FieldRect<'_>, threshold: f64) -> bool {
    a.field_id != b.field_id && rects_overlap(&a.rect, &b.rect, threshold)
}

/// Axis-aligned overlap test with a tolerance, for anonymous boxes such as
/// text runs.
///
/// The intersection must exceed `threshold` on both axes, so boxes sharing an
/// edge (and float noise from percent↔pixel round-trips) do not count. Boxes
/// on different pages never intersect.
pub fn rects_overlap(a: &UnitBox, b: &UnitBox, threshold: f64) -> bool {
    if a.page_number != b.page_number {
        return false;
    }
    let overlap_w = a.right().min(b.right()) - a.left.max(b.left);
    let overlap_h = a.bottom().min(b.bottom()) - a.top.max(b.top);
    overlap_w > threshold && overlap_h > threshold
}

/// A box still has room for content once padding is taken off both sides.
pub fn has_drawable_area(rect: &UnitBox, padding: f64) -> bool {
    rect.width - 2.0 * padding > 0.0 && rect.height - 2.0 * padding > 0.0
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
