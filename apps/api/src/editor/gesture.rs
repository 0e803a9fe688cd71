//! Gesture state for the interactive editor.
//!
//! Exactly one gesture is active at a time. Pointer positions arrive in page
//! raster pixels and are converted to percentage space before any geometry is
//! touched, so a drag behaves the same at every zoom level.

use serde::{Deserialize, Serialize};

use crate::geometry::{
    clamp_box, pixel_point_to_percent, to_percent_box, to_pixel_box, MinSize, PageGeometry,
    PercentBox, UnitBox,
};
use crate::models::{Field, FieldId, FieldKind};

/// Default box for a newly placed field, in percent of the page.
pub const DEFAULT_FIELD_WIDTH_PCT: f64 = 20.0;
pub const DEFAULT_FIELD_HEIGHT_PCT: f64 = 5.0;

/// Which part of a field the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handle {
    Body,
    /// Bottom-right corner. The only resize anchor.
    ResizeHandle,
}

/// A new field held back until the caller confirms or cancels it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPlacement {
    pub field: Field,
    pub overlapping_field_ids: Vec<FieldId>,
}

/// Where a resize started, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeOrigin {
    pub width: f64,
    pub height: f64,
    pub pointer_x: f64,
    pub pointer_y: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GestureState {
    #[default]
    Idle,
    /// Armed to drop one field of `kind` on the next page click.
    Placing {
        kind: FieldKind,
        pending: Option<PendingPlacement>,
    },
    /// Pointer offset inside the box in raster pixels, captured at drag start.
    Dragging {
        field_id: FieldId,
        offset_x: f64,
        offset_y: f64,
    },
    Resizing {
        field_id: FieldId,
        origin: ResizeOrigin,
    },
}

impl GestureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GestureState::Idle)
    }

    /// The field a drag or resize is manipulating.
    pub fn active_field(&self) -> Option<&FieldId> {
        match self {
            GestureState::Dragging { field_id, .. } | GestureState::Resizing { field_id, .. } => {
                Some(field_id)
            }
            _ => None,
        }
    }
}

/// Box for a field dropped at a click point (top-left at the pointer), clamped.
pub fn placement_box(page: &PageGeometry, x_px: f64, y_px: f64, min: MinSize) -> PercentBox {
    let (x, y) = pixel_point_to_percent(x_px, y_px, page);
    clamp_box(
        PercentBox {
            page_number: page.page_number,
            x,
            y,
            width: DEFAULT_FIELD_WIDTH_PCT,
            height: DEFAULT_FIELD_HEIGHT_PCT,
        },
        min,
    )
}

/// Starts a drag: the pointer's offset from the field's on-screen origin, in pixels.
pub fn drag_offset(field: &Field, page: &PageGeometry, x_px: f64, y_px: f64) -> (f64, f64) {
    let rect = to_pixel_box(field.bounds(), page);
    (x_px - rect.left, y_px - rect.top)
}

/// New position for a dragged field. The on-screen box follows the pointer and
/// is mapped back to percent; size and page never change.
pub fn drag_to(
    field: &Field,
    page: &PageGeometry,
    offset: (f64, f64),
    x_px: f64,
    y_px: f64,
    min: MinSize,
) -> PercentBox {
    let rect = to_pixel_box(field.bounds(), page);
    let moved = UnitBox {
        left: x_px - offset.0,
        top: y_px - offset.1,
        ..rect
    };
    let bounds = to_percent_box(moved, page);
    clamp_box(
        PercentBox {
            width: field.width,
            height: field.height,
            ..bounds
        },
        min,
    )
}

/// Starts a resize from the bottom-right handle.
pub fn resize_origin(field: &Field, page: &PageGeometry, x_px: f64, y_px: f64) -> ResizeOrigin {
    let (px, py) = pixel_point_to_percent(x_px, y_px, page);
    ResizeOrigin {
        width: field.width,
        height: field.height,
        pointer_x: px,
        pointer_y: py,
    }
}

/// New extent for a field being resized: origin size plus pointer delta, bounded
/// by the minimum size and the page edge, then clamped.
pub fn resize_to(
    field: &Field,
    page: &PageGeometry,
    origin: &ResizeOrigin,
    x_px: f64,
    y_px: f64,
    min: MinSize,
) -> PercentBox {
    let (px, py) = pixel_point_to_percent(x_px, y_px, page);
    let width = (origin.width + (px - origin.pointer_x))
        .max(min.width)
        .min(100.0 - field.x);
    let height = (origin.height + (py - origin.pointer_y))
        .max(min.height)
        .min(100.0 - field.y);
    clamp_box(
        PercentBox {
            width,
            height,
            ..field.bounds()
        },
        min,
    )
}
