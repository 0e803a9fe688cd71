//! Editor session: the single writer of a document's field list and values.
//!
//! All mutation goes through [`EditorSession::apply`], a reducer over
//! [`EditorEvent`]s. Gesture state is an explicit value on the session rather
//! than pointer bookkeeping spread across handlers.
//!
//! Overflow flags follow the edit contract: a value change is validated
//! before it is stored; an edit that would overflow is rejected (the previous
//! value stays) and flags the field; the next edit that fits clears the flag.
//! Moving or resizing a field never touches the flags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::editor::gesture::{
    drag_offset, drag_to, placement_box, resize_origin, resize_to, GestureState, Handle,
    PendingPlacement,
};
use crate::geometry::{clamp_box, Margin, MinSize, FIELD_MARGIN, MIN_FIELD_SIZE};
use crate::layout::font_metrics::MeasureText;
use crate::layout::text_fit::{validate_field_text, FieldTextStyle, FitResult};
use crate::models::{format_value, Field, FieldId, FieldKind, FieldValue, FormattedValue, ValueMap};
use crate::overlap::{fields_intersect, PageMap};

// ────────────────────────────────────────────────────────────────────────────
// Events + outcomes
// ────────────────────────────────────────────────────────────────────────────

/// Input to the editor. Pointer coordinates are page raster pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorEvent {
    ArmPlacement {
        kind: FieldKind,
    },
    DisarmPlacement,
    PageClick {
        page_number: u32,
        x_px: f64,
        y_px: f64,
    },
    ConfirmPlacement,
    CancelPlacement,
    PointerDown {
        field_id: FieldId,
        handle: Handle,
        x_px: f64,
        y_px: f64,
    },
    PointerMove {
        x_px: f64,
        y_px: f64,
    },
    PointerUp,
    Select {
        field_id: Option<FieldId>,
    },
    Delete {
        field_id: FieldId,
    },
    UpdateLabel {
        field_id: FieldId,
        label: String,
    },
    SetRequired {
        field_id: FieldId,
        required: bool,
    },
    EditValue {
        field_id: FieldId,
        value: FieldValue,
    },
}

impl EditorEvent {
    /// Events that can change the field list or the value map.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, EditorEvent::Select { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditorOutcome {
    Armed {
        kind: FieldKind,
    },
    Disarmed,
    FieldPlaced {
        field_id: FieldId,
    },
    /// The candidate overlaps existing fields; send `confirm_placement` or `cancel_placement`.
    PlacementNeedsConfirmation {
        candidate: Field,
        overlapping_field_ids: Vec<FieldId>,
    },
    PlacementCancelled,
    GestureStarted,
    FieldMoved {
        field_id: FieldId,
    },
    FieldResized {
        field_id: FieldId,
    },
    GestureEnded,
    SelectionChanged {
        field_id: Option<FieldId>,
    },
    FieldDeleted {
        field_id: FieldId,
        aborted_gesture: bool,
    },
    FieldUpdated {
        field_id: FieldId,
    },
    ValueAccepted {
        field_id: FieldId,
        fit: Option<FitResult>,
    },
    ValueRejected {
        field_id: FieldId,
        fit: FitResult,
    },
    /// The event did not apply in the current state; nothing changed.
    Ignored {
        reason: String,
    },
}

fn ignored(reason: impl Into<String>) -> EditorOutcome {
    EditorOutcome::Ignored {
        reason: reason.into(),
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EditorError {
    #[error("document is not editable")]
    NotEditable,
    #[error("duplicate field id: {0}")]
    DuplicateFieldId(FieldId),
    #[error("field {0} has page number 0; pages are 1-based")]
    InvalidPageNumber(FieldId),
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// Rules the editor applies; the flattener is configured from the same values.
#[derive(Debug, Clone)]
pub struct EditorSettings {
    /// Export-unit text style.
    pub style: FieldTextStyle,
    pub margin: Margin,
    pub min_size: MinSize,
    pub date_format: String,
}

impl EditorSettings {
    pub fn new(style: FieldTextStyle, date_format: impl Into<String>) -> Self {
        EditorSettings {
            style,
            margin: FIELD_MARGIN,
            min_size: MIN_FIELD_SIZE,
            date_format: date_format.into(),
        }
    }
}

/// Serializable view of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    pub editable: bool,
    pub fields: Vec<Field>,
    pub values: ValueMap,
    pub gesture: GestureState,
    pub selected_field_id: Option<FieldId>,
    pub overflowing_field_ids: BTreeSet<FieldId>,
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    settings: EditorSettings,
    editable: bool,
    fields: Vec<Field>,
    values: ValueMap,
    pages: PageMap,
    gesture: GestureState,
    selected: Option<FieldId>,
    overflowing: BTreeSet<FieldId>,
}

impl EditorSession {
    pub fn new(settings: EditorSettings) -> Self {
        EditorSession {
            settings,
            editable: true,
            fields: Vec::new(),
            values: ValueMap::new(),
            pages: PageMap::new(),
            gesture: GestureState::Idle,
            selected: None,
            overflowing: BTreeSet::new(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    pub fn pages(&self) -> &PageMap {
        &self.pages
    }

    pub fn gesture(&self) -> &GestureState {
        &self.gesture
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// Lifecycle input. Locking a document also abandons any gesture in flight.
    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
        if !editable {
            self.gesture = GestureState::Idle;
        }
    }

    /// Replaces the known page geometry (pages resolve asynchronously).
    pub fn set_pages(&mut self, pages: PageMap) {
        self.pages = pages;
    }

    /// Discards everything tied to the previous source document.
    pub fn reset_pages(&mut self) {
        self.pages.clear();
        self.gesture = GestureState::Idle;
    }

    /// Loads a stored field list. Boxes are clamped on the way in.
    pub fn load_fields(&mut self, fields: Vec<Field>) -> Result<(), EditorError> {
        let mut seen = BTreeSet::new();
        for field in &fields {
            if field.page_number == 0 {
                return Err(EditorError::InvalidPageNumber(field.id.clone()));
            }
            if !seen.insert(field.id.clone()) {
                return Err(EditorError::DuplicateFieldId(field.id.clone()));
            }
        }

        let min = self.settings.min_size;
        self.fields = fields
            .into_iter()
            .map(|mut f| {
                f.set_bounds(clamp_box(f.bounds(), min));
                f
            })
            .collect();
        self.gesture = GestureState::Idle;
        self.overflowing.retain(|id| seen.contains(id));
        if self.selected.as_ref().is_some_and(|id| !seen.contains(id)) {
            self.selected = None;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            editable: self.editable,
            fields: self.fields.clone(),
            values: self.values.clone(),
            gesture: self.gesture.clone(),
            selected_field_id: self.selected.clone(),
            overflowing_field_ids: self.overflowing.clone(),
        }
    }

    /// Applies one event. The only error is editing a locked document.
    pub fn apply<M: MeasureText + ?Sized>(
        &mut self,
        event: EditorEvent,
        measurer: &M,
    ) -> Result<EditorOutcome, EditorError> {
        if event.is_mutating() && !self.editable {
            return Err(EditorError::NotEditable);
        }

        let outcome = match event {
            EditorEvent::ArmPlacement { kind } => self.arm(kind),
            EditorEvent::DisarmPlacement => self.disarm(),
            EditorEvent::PageClick {
                page_number,
                x_px,
                y_px,
            } => self.page_click(page_number, x_px, y_px),
            EditorEvent::ConfirmPlacement => self.confirm_placement(),
            EditorEvent::CancelPlacement => self.cancel_placement(),
            EditorEvent::PointerDown {
                field_id,
                handle,
                x_px,
                y_px,
            } => self.pointer_down(field_id, handle, x_px, y_px),
            EditorEvent::PointerMove { x_px, y_px } => self.pointer_move(x_px, y_px),
            EditorEvent::PointerUp => self.pointer_up(),
            EditorEvent::Select { field_id } => self.select(field_id),
            EditorEvent::Delete { field_id } => self.delete(field_id),
            EditorEvent::UpdateLabel { field_id, label } => {
                self.update_field(field_id, |f| f.label = label)
            }
            EditorEvent::SetRequired { field_id, required } => {
                self.update_field(field_id, |f| f.required = required)
            }
            EditorEvent::EditValue { field_id, value } => {
                self.edit_value(field_id, value, measurer)
            }
        };
        Ok(outcome)
    }

    // ── placement ───────────────────────────────────────────────────────────

    fn arm(&mut self, kind: FieldKind) -> EditorOutcome {
        if !self.gesture.is_idle() && !matches!(self.gesture, GestureState::Placing { .. }) {
            return ignored("another gesture is in progress");
        }
        self.gesture = GestureState::Placing {
            kind,
            pending: None,
        };
        EditorOutcome::Armed { kind }
    }

    fn disarm(&mut self) -> EditorOutcome {
        if !matches!(self.gesture, GestureState::Placing { .. }) {
            return ignored("placement is not armed");
        }
        self.gesture = GestureState::Idle;
        EditorOutcome::Disarmed
    }

    fn page_click(&mut self, page_number: u32, x_px: f64, y_px: f64) -> EditorOutcome {
        let kind = match &self.gesture {
            GestureState::Placing {
                kind,
                pending: None,
            } => *kind,
            GestureState::Placing {
                pending: Some(_), ..
            } => return ignored("a placement is awaiting confirmation"),
            _ => return ignored("placement is not armed"),
        };
        let Some(page) = self.pages.get(&page_number) else {
            return ignored(format!("page {page_number} has not loaded"));
        };

        let bounds = placement_box(page, x_px, y_px, self.settings.min_size);
        let mut candidate = Field {
            id: Uuid::new_v4().to_string(),
            kind,
            label: self.next_label(kind),
            page_number,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            required: false,
            order_index: self.next_order_index(),
        };
        candidate.set_bounds(bounds);

        let overlapping: Vec<FieldId> = self
            .fields
            .iter()
            .filter(|existing| fields_intersect(existing, &candidate, &self.pages))
            .map(|existing| existing.id.clone())
            .collect();

        if overlapping.is_empty() {
            return self.commit(candidate);
        }

        debug!(
            page = page_number,
            overlaps = overlapping.len(),
            "Placement overlaps existing fields; awaiting confirmation"
        );
        self.gesture = GestureState::Placing {
            kind,
            pending: Some(PendingPlacement {
                field: candidate.clone(),
                overlapping_field_ids: overlapping.clone(),
            }),
        };
        EditorOutcome::PlacementNeedsConfirmation {
            candidate,
            overlapping_field_ids: overlapping,
        }
    }

    fn confirm_placement(&mut self) -> EditorOutcome {
        match std::mem::take(&mut self.gesture) {
            GestureState::Placing {
                pending: Some(pending),
                ..
            } => self.commit(pending.field),
            other => {
                self.gesture = other;
                ignored("no placement is awaiting confirmation")
            }
        }
    }

    fn cancel_placement(&mut self) -> EditorOutcome {
        match &self.gesture {
            GestureState::Placing {
                pending: Some(_), ..
            } => {
                self.gesture = GestureState::Idle;
                EditorOutcome::PlacementCancelled
            }
            _ => ignored("no placement is awaiting confirmation"),
        }
    }

    fn commit(&mut self, field: Field) -> EditorOutcome {
        let field_id = field.id.clone();
        info!(field_id = %field_id, page = field.page_number, "Field placed");
        self.fields.push(field);
        self.selected = Some(field_id.clone());
        self.gesture = GestureState::Idle;
        EditorOutcome::FieldPlaced { field_id }
    }

    fn next_label(&self, kind: FieldKind) -> String {
        let count = self.fields.iter().filter(|f| f.kind == kind).count();
        format!("{} {}", kind.display_name(), count + 1)
    }

    fn next_order_index(&self) -> i32 {
        self.fields
            .iter()
            .map(|f| f.order_index)
            .max()
            .map_or(0, |max| max + 1)
    }

    // ── drag / resize ───────────────────────────────────────────────────────

    fn pointer_down(&mut self, field_id: FieldId, handle: Handle, x_px: f64, y_px: f64) -> EditorOutcome {
        if !self.gesture.is_idle() {
            return ignored("another gesture is in progress");
        }
        let Some(field) = self.fields.iter().find(|f| f.id == field_id) else {
            return ignored(format!("unknown field {field_id}"));
        };
        let Some(page) = self.pages.get(&field.page_number) else {
            return ignored(format!("page {} has not loaded", field.page_number));
        };

        self.gesture = match handle {
            Handle::Body => {
                let (offset_x, offset_y) = drag_offset(field, page, x_px, y_px);
                GestureState::Dragging {
                    field_id: field_id.clone(),
                    offset_x,
                    offset_y,
                }
            }
            Handle::ResizeHandle => GestureState::Resizing {
                field_id: field_id.clone(),
                origin: resize_origin(field, page, x_px, y_px),
            },
        };
        self.selected = Some(field_id);
        EditorOutcome::GestureStarted
    }

    fn pointer_move(&mut self, x_px: f64, y_px: f64) -> EditorOutcome {
        let Some(field_id) = self.gesture.active_field().cloned() else {
            return ignored("no drag or resize in progress");
        };
        let min = self.settings.min_size;
        let Some(index) = self.fields.iter().position(|f| f.id == field_id) else {
            self.gesture = GestureState::Idle;
            return ignored(format!("unknown field {field_id}"));
        };
        let Some(page) = self.pages.get(&self.fields[index].page_number).copied() else {
            return ignored("page geometry is no longer available");
        };

        let field = &self.fields[index];
        let (bounds, outcome) = match &self.gesture {
            GestureState::Dragging {
                offset_x, offset_y, ..
            } => (
                drag_to(field, &page, (*offset_x, *offset_y), x_px, y_px, min),
                EditorOutcome::FieldMoved {
                    field_id: field_id.clone(),
                },
            ),
            GestureState::Resizing { origin, .. } => (
                resize_to(field, &page, origin, x_px, y_px, min),
                EditorOutcome::FieldResized {
                    field_id: field_id.clone(),
                },
            ),
            _ => return ignored("no drag or resize in progress"),
        };
        self.fields[index].set_bounds(bounds);
        outcome
    }

    fn pointer_up(&mut self) -> EditorOutcome {
        if self.gesture.active_field().is_none() {
            return ignored("no drag or resize in progress");
        }
        self.gesture = GestureState::Idle;
        EditorOutcome::GestureEnded
    }

    // ── direct list operations ──────────────────────────────────────────────

    fn select(&mut self, field_id: Option<FieldId>) -> EditorOutcome {
        if let Some(id) = &field_id {
            if !self.fields.iter().any(|f| &f.id == id) {
                return ignored(format!("unknown field {id}"));
            }
        }
        self.selected = field_id.clone();
        EditorOutcome::SelectionChanged { field_id }
    }

    fn delete(&mut self, field_id: FieldId) -> EditorOutcome {
        let before = self.fields.len();
        self.fields.retain(|f| f.id != field_id);
        if self.fields.len() == before {
            return ignored(format!("unknown field {field_id}"));
        }

        let aborted_gesture = self.gesture.active_field() == Some(&field_id);
        if aborted_gesture {
            self.gesture = GestureState::Idle;
        }
        if self.selected.as_ref() == Some(&field_id) {
            self.selected = None;
        }
        self.overflowing.remove(&field_id);
        info!(field_id = %field_id, aborted_gesture, "Field deleted");
        EditorOutcome::FieldDeleted {
            field_id,
            aborted_gesture,
        }
    }

    fn update_field(&mut self, field_id: FieldId, update: impl FnOnce(&mut Field)) -> EditorOutcome {
        match self.fields.iter_mut().find(|f| f.id == field_id) {
            Some(field) => {
                update(field);
                EditorOutcome::FieldUpdated { field_id }
            }
            None => ignored(format!("unknown field {field_id}")),
        }
    }

    fn edit_value<M: MeasureText + ?Sized>(
        &mut self,
        field_id: FieldId,
        value: FieldValue,
        measurer: &M,
    ) -> EditorOutcome {
        let Some(field) = self.fields.iter().find(|f| f.id == field_id) else {
            return ignored(format!("unknown field {field_id}"));
        };

        // No geometry means nothing to validate against.
        let Some(page) = self.pages.get(&field.page_number) else {
            return ignored(format!("page {} has not loaded", field.page_number));
        };

        let fit = match format_value(field.kind, Some(&value), &self.settings.date_format) {
            FormattedValue::Text(text) => Some(validate_field_text(
                field,
                page,
                &text,
                &self.settings.style,
                self.settings.margin,
                measurer,
            )),
            _ => None,
        };

        if let Some(fit) = fit.as_ref().filter(|f| f.would_overflow) {
            debug!(field_id = %field_id, lines = fit.line_count, max = fit.max_lines, "Edit rejected: overflow");
            self.overflowing.insert(field_id.clone());
            return EditorOutcome::ValueRejected {
                field_id,
                fit: fit.clone(),
            };
        }

        self.overflowing.remove(&field_id);
        self.values.insert(field_id.clone(), value);
        EditorOutcome::ValueAccepted { field_id, fit }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PageGeometry;
    use crate::layout::font_metrics::{BaseFontMetrics, FontFamily, Typography};

    fn settings() -> EditorSettings {
        EditorSettings::new(
            FieldTextStyle {
                typography: Typography {
                    font_family: FontFamily::Helvetica,
                    font_size: 12.0,
                    line_height_ratio: 1.2,
                },
                padding: 4.0,
            },
            "%m/%d/%Y",
        )
    }

    fn page(n: u32) -> PageGeometry {
        PageGeometry {
            page_number: n,
            width_px: 600.0,
            height_px: 800.0,
            width_pt: 600.0,
            height_pt: 800.0,
        }
    }

    fn session_with_page() -> EditorSession {
        let mut session = EditorSession::new(settings());
        session.set_pages(PageMap::from([(1, page(1)), (2, page(2))]));
        session
    }

    fn make_field(id: &str, x: f64, y: f64, width: f64, height: f64) -> Field {
        Field {
            id: id.to_string(),
            kind: FieldKind::Text,
            label: id.to_string(),
            page_number: 1,
            x,
            y,
            width,
            height,
            required: false,
            order_index: 0,
        }
    }

    fn apply(session: &mut EditorSession, event: EditorEvent) -> EditorOutcome {
        session.apply(event, &BaseFontMetrics).unwrap()
    }

    // ── placement ───────────────────────────────────────────────────────────

    #[test]
    fn test_placement_is_single_shot() {
        let mut s = session_with_page();
        apply(&mut s, EditorEvent::ArmPlacement { kind: FieldKind::Date });
        let outcome = apply(
            &mut s,
            EditorEvent::PageClick {
                page_number: 1,
                x_px: 60.0,
                y_px: 80.0,
            },
        );
        assert!(matches!(outcome, EditorOutcome::FieldPlaced { .. }));
        assert!(s.gesture().is_idle());
        assert_eq!(s.fields().len(), 1);
        assert_eq!(s.fields()[0].label, "Date 1");
        assert_eq!((s.fields()[0].x, s.fields()[0].y), (10.0, 10.0));

        let second = apply(
            &mut s,
            EditorEvent::PageClick {
                page_number: 1,
                x_px: 300.0,
                y_px: 400.0,
            },
        );
        assert!(matches!(second, EditorOutcome::Ignored { .. }));
        assert_eq!(s.fields().len(), 1);
    }

    #[test]
    fn test_overlapping_placement_requires_confirmation() {
        let mut s = session_with_page();
        s.load_fields(vec![make_field("existing", 10.0, 10.0, 20.0, 5.0)])
            .unwrap();

        apply(&mut s, EditorEvent::ArmPlacement { kind: FieldKind::Text });
        let outcome = apply(
            &mut s,
            EditorEvent::PageClick {
                page_number: 1,
                x_px: 90.0,
                y_px: 90.0,
            },
        );
        match outcome {
            EditorOutcome::PlacementNeedsConfirmation {
                overlapping_field_ids,
                ..
            } => assert_eq!(overlapping_field_ids, vec!["existing".to_string()]),
            other => panic!("expected confirmation gate, got {other:?}"),
        }
        assert_eq!(s.fields().len(), 1, "must not be auto-accepted");

        let confirmed = apply(&mut s, EditorEvent::ConfirmPlacement);
        assert!(matches!(confirmed, EditorOutcome::FieldPlaced { .. }));
        assert_eq!(s.fields().len(), 2);
        assert!(s.gesture().is_idle());
    }

    #[test]
    fn test_cancelled_placement_adds_nothing() {
        let mut s = session_with_page();
        s.load_fields(vec![make_field("existing", 10.0, 10.0, 20.0, 5.0)])
            .unwrap();
        apply(&mut s, EditorEvent::ArmPlacement { kind: FieldKind::Text });
        apply(
            &mut s,
            EditorEvent::PageClick {
                page_number: 1,
                x_px: 90.0,
                y_px: 90.0,
            },
        );
        let outcome = apply(&mut s, EditorEvent::CancelPlacement);
        assert_eq!(outcome, EditorOutcome::PlacementCancelled);
        assert_eq!(s.fields().len(), 1);
        assert!(s.gesture().is_idle());
    }

    #[test]
    fn test_click_on_unloaded_page_ignored() {
        let mut s = session_with_page();
        apply(&mut s, EditorEvent::ArmPlacement { kind: FieldKind::Text });
        let outcome = apply(
            &mut s,
            EditorEvent::PageClick {
                page_number: 7,
                x_px: 10.0,
                y_px: 10.0,
            },
        );
        assert!(matches!(outcome, EditorOutcome::Ignored { .. }));
        assert!(matches!(s.gesture(), GestureState::Placing { .. }));
    }

    #[test]
    fn test_new_fields_get_increasing_order_index() {
        let mut s = session_with_page();
        for (x, y) in [(60.0, 80.0), (60.0, 400.0)] {
            apply(&mut s, EditorEvent::ArmPlacement { kind: FieldKind::Checkbox });
            apply(
                &mut s,
                EditorEvent::PageClick {
                    page_number: 1,
                    x_px: x,
                    y_px: y,
                },
            );
        }
        let orders: Vec<i32> = s.fields().iter().map(|f| f.order_index).collect();
        assert_eq!(orders, vec![0, 1]);
        assert_eq!(s.fields()[1].label, "Checkbox 2");
    }

    // ── drag / resize ───────────────────────────────────────────────────────

    #[test]
    fn test_drag_moves_and_clamps_without_resizing() {
        let mut s = session_with_page();
        s.load_fields(vec![make_field("f", 10.0, 10.0, 20.0, 5.0)]).unwrap();

        apply(
            &mut s,
            EditorEvent::PointerDown {
                field_id: "f".to_string(),
                handle: Handle::Body,
                x_px: 66.0,
                y_px: 84.0,
            },
        );
        let moved = apply(&mut s, EditorEvent::PointerMove { x_px: 5000.0, y_px: 404.0 });
        assert!(matches!(moved, EditorOutcome::FieldMoved { .. }));
        let f = &s.fields()[0];
        assert_eq!(f.x, 80.0);
        assert!((f.y - 50.0).abs() < 1e-9);
        assert_eq!((f.width, f.height), (20.0, 5.0));
        assert_eq!(f.page_number, 1);

        assert_eq!(apply(&mut s, EditorEvent::PointerUp), EditorOutcome::GestureEnded);
        assert!(s.gesture().is_idle());
    }

    #[test]
    fn test_resize_respects_minimum() {
        let mut s = session_with_page();
        s.load_fields(vec![make_field("f", 10.0, 10.0, 20.0, 5.0)]).unwrap();
        apply(
            &mut s,
            EditorEvent::PointerDown {
                field_id: "f".to_string(),
                handle: Handle::ResizeHandle,
                x_px: 180.0,
                y_px: 120.0,
            },
        );
        apply(&mut s, EditorEvent::PointerMove { x_px: 0.0, y_px: 0.0 });
        let f = &s.fields()[0];
        assert_eq!((f.width, f.height), (MIN_FIELD_SIZE.width, MIN_FIELD_SIZE.height));
        assert_eq!((f.x, f.y), (10.0, 10.0));
    }

    #[test]
    fn test_only_one_gesture_at_a_time() {
        let mut s = session_with_page();
        s.load_fields(vec![
            make_field("a", 10.0, 10.0, 20.0, 5.0),
            make_field("b", 50.0, 50.0, 20.0, 5.0),
        ])
        .unwrap();
        apply(
            &mut s,
            EditorEvent::PointerDown {
                field_id: "a".to_string(),
                handle: Handle::Body,
                x_px: 70.0,
                y_px: 85.0,
            },
        );
        let second = apply(
            &mut s,
            EditorEvent::PointerDown {
                field_id: "b".to_string(),
                handle: Handle::Body,
                x_px: 310.0,
                y_px: 405.0,
            },
        );
        assert!(matches!(second, EditorOutcome::Ignored { .. }));
        let armed = apply(&mut s, EditorEvent::ArmPlacement { kind: FieldKind::Text });
        assert!(matches!(armed, EditorOutcome::Ignored { .. }));
    }

    #[test]
    fn test_deleting_dragged_field_aborts_gesture() {
        let mut s = session_with_page();
        s.load_fields(vec![make_field("f", 10.0, 10.0, 20.0, 5.0)]).unwrap();
        apply(
            &mut s,
            EditorEvent::PointerDown {
                field_id: "f".to_string(),
                handle: Handle::Body,
                x_px: 70.0,
                y_px: 85.0,
            },
        );
        let outcome = apply(
            &mut s,
            EditorEvent::Delete {
                field_id: "f".to_string(),
            },
        );
        assert_eq!(
            outcome,
            EditorOutcome::FieldDeleted {
                field_id: "f".to_string(),
                aborted_gesture: true
            }
        );
        assert!(s.gesture().is_idle());
        assert!(s.fields().is_empty());
        assert!(matches!(
            apply(&mut s, EditorEvent::PointerMove { x_px: 1.0, y_px: 1.0 }),
            EditorOutcome::Ignored { .. }
        ));
    }

    // ── values ──────────────────────────────────────────────────────────────

    #[test]
    fn test_overflowing_edit_is_rejected_and_flagged() {
        let mut s = session_with_page();
        // 15% × 4% of a 600×800 page: 90px × 32px
        s.load_fields(vec![make_field("sig", 20.0, 20.0, 15.0, 4.0)]).unwrap();

        let ok = apply(
            &mut s,
            EditorEvent::EditValue {
                field_id: "sig".to_string(),
                value: FieldValue::Text("Jane".to_string()),
            },
        );
        assert!(matches!(ok, EditorOutcome::ValueAccepted { .. }));

        let rejected = apply(
            &mut s,
            EditorEvent::EditValue {
                field_id: "sig".to_string(),
                value: FieldValue::Text("Signature of Authorized Representative".to_string()),
            },
        );
        assert!(matches!(rejected, EditorOutcome::ValueRejected { .. }));
        assert!(s.snapshot().overflowing_field_ids.contains("sig"));
        assert_eq!(s.values()["sig"], FieldValue::Text("Jane".to_string()));

        apply(
            &mut s,
            EditorEvent::EditValue {
                field_id: "sig".to_string(),
                value: FieldValue::Text("J. Doe".to_string()),
            },
        );
        assert!(!s.snapshot().overflowing_field_ids.contains("sig"));
        assert_eq!(s.values()["sig"], FieldValue::Text("J. Doe".to_string()));
    }

    #[test]
    fn test_resize_does_not_clear_overflow_flag() {
        let mut s = session_with_page();
        s.load_fields(vec![make_field("f", 20.0, 20.0, 15.0, 4.0)]).unwrap();
        apply(
            &mut s,
            EditorEvent::EditValue {
                field_id: "f".to_string(),
                value: FieldValue::Text("Signature of Authorized Representative".to_string()),
            },
        );
        assert!(s.snapshot().overflowing_field_ids.contains("f"));

        apply(
            &mut s,
            EditorEvent::PointerDown {
                field_id: "f".to_string(),
                handle: Handle::ResizeHandle,
                x_px: 210.0,
                y_px: 192.0,
            },
        );
        apply(&mut s, EditorEvent::PointerMove { x_px: 500.0, y_px: 500.0 });
        apply(&mut s, EditorEvent::PointerUp);
        assert!(s.snapshot().overflowing_field_ids.contains("f"));
    }

    #[test]
    fn test_checkbox_value_skips_text_fit() {
        let mut s = session_with_page();
        let mut cb = make_field("cb", 20.0, 20.0, 8.0, 4.0);
        cb.kind = FieldKind::Checkbox;
        s.load_fields(vec![cb]).unwrap();
        let outcome = apply(
            &mut s,
            EditorEvent::EditValue {
                field_id: "cb".to_string(),
                value: FieldValue::Bool(true),
            },
        );
        assert_eq!(
            outcome,
            EditorOutcome::ValueAccepted {
                field_id: "cb".to_string(),
                fit: None
            }
        );
    }

    #[test]
    fn test_edit_on_unloaded_page_leaves_value_unchanged() {
        let mut s = session_with_page();
        let mut f = make_field("f", 10.0, 10.0, 20.0, 5.0);
        f.page_number = 3;
        s.load_fields(vec![f]).unwrap();

        let outcome = apply(
            &mut s,
            EditorEvent::EditValue {
                field_id: "f".to_string(),
                value: FieldValue::Text("a value that was never measured".to_string()),
            },
        );
        assert!(matches!(outcome, EditorOutcome::Ignored { .. }));
        assert!(s.values().get("f").is_none());

        s.set_pages(PageMap::from([(1, page(1)), (2, page(2)), (3, page(3))]));
        let outcome = apply(
            &mut s,
            EditorEvent::EditValue {
                field_id: "f".to_string(),
                value: FieldValue::Text("Ada".to_string()),
            },
        );
        assert!(matches!(outcome, EditorOutcome::ValueAccepted { .. }));
    }

    // ── editability + loading ───────────────────────────────────────────────

    #[test]
    fn test_locked_document_refuses_mutation_but_allows_selection() {
        let mut s = session_with_page();
        s.load_fields(vec![make_field("f", 10.0, 10.0, 20.0, 5.0)]).unwrap();
        s.set_editable(false);

        let err = s
            .apply(EditorEvent::ArmPlacement { kind: FieldKind::Text }, &BaseFontMetrics)
            .unwrap_err();
        assert_eq!(err, EditorError::NotEditable);

        let selected = s
            .apply(
                EditorEvent::Select {
                    field_id: Some("f".to_string()),
                },
                &BaseFontMetrics,
            )
            .unwrap();
        assert!(matches!(selected, EditorOutcome::SelectionChanged { .. }));
    }

    #[test]
    fn test_load_fields_clamps_and_rejects_duplicates() {
        let mut s = session_with_page();
        s.load_fields(vec![make_field("f", 95.0, -3.0, 2.0, 50.0)]).unwrap();
        let f = &s.fields()[0];
        assert_eq!((f.x, f.y, f.width, f.height), (92.0, 0.0, 8.0, 50.0));

        let dup = s.load_fields(vec![
            make_field("x", 10.0, 10.0, 20.0, 5.0),
            make_field("x", 40.0, 40.0, 20.0, 5.0),
        ]);
        assert_eq!(dup, Err(EditorError::DuplicateFieldId("x".to_string())));
    }
}
