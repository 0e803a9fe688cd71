//! Text fit: decides whether a string can be shown inside a field box.
//!
//! # Algorithm
//! 1. `line_height = font_size × line_height_ratio`
//! 2. available width/height = box extent − 2 × padding
//! 3. greedy word wrap; a word wider than the line is broken by character
//! 4. `max_lines = floor(available_height / line_height)`, at least 1
//! 5. fits ⇔ wrapped line count ≤ max_lines
//!
//! `layout_field_text` is the one implementation of this. The editing
//! validator and the flattener both call it, so a value accepted in the editor
//! produces exactly the same lines in the exported document.

use serde::{Deserialize, Serialize};

use crate::geometry::{
    clamp_to_margin, has_drawable_area, to_export_box, to_pixel_box, Margin, PageGeometry, UnitBox,
};
use crate::layout::font_metrics::{MeasureText, Typography};
use crate::models::Field;

// Absorbs float noise in `available_height / line_height` at exact multiples.
const LINE_CAPACITY_EPSILON: f64 = 1e-9;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Typography plus inner padding, in one unit space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTextStyle {
    pub typography: Typography,
    #[serde(alias = "paddingPx")]
    pub padding: f64,
}

impl FieldTextStyle {
    /// Converts an export-unit (pt) style into the page's raster pixel space.
    pub fn for_preview(&self, page: &PageGeometry) -> FieldTextStyle {
        let factor = if page.width_pt > 0.0 {
            page.width_px / page.width_pt
        } else {
            1.0
        };
        FieldTextStyle {
            typography: self.typography.scaled(factor),
            padding: self.padding * factor,
        }
    }
}

/// Wrapped text for one box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTextLayout {
    /// Every wrapped line, including those that do not fit.
    pub lines: Vec<String>,
    pub line_height: f64,
    pub max_lines: usize,
    /// Lines that are drawn (top-down). Always ≤ `max_lines`.
    pub visible_lines: usize,
    pub truncated: bool,
}

impl FieldTextLayout {
    pub fn visible(&self) -> &[String] {
        &self.lines[..self.visible_lines]
    }
}

/// Verdict of a fit check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitResult {
    pub fits: bool,
    pub would_overflow: bool,
    pub line_count: usize,
    pub max_lines: usize,
    /// Index of the first wrapped line that does not fit, when overflowing.
    pub first_overflow_line: Option<usize>,
}

impl From<&FieldTextLayout> for FitResult {
    fn from(layout: &FieldTextLayout) -> Self {
        let fits = !layout.truncated;
        FitResult {
            fits,
            would_overflow: !fits,
            line_count: layout.lines.len(),
            max_lines: layout.max_lines,
            first_overflow_line: if fits { None } else { Some(layout.max_lines) },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wrapping
// ────────────────────────────────────────────────────────────────────────────

/// Greedily wraps `text` into lines no wider than `max_width`.
///
/// Words join a line while `width(line + " " + word) ≤ max_width`. A word that
/// is too wide on its own is split between characters; a single glyph wider
/// than the line still gets a line of its own, so no character is dropped.
/// Explicit newlines start a new line.
///
/// Line widths are accumulated word by word, which assumes the measurer is
/// additive per glyph (no kerning), as the base-font tables are.
pub fn wrap_text<M: MeasureText + ?Sized>(
    text: &str,
    max_width: f64,
    typography: &Typography,
    measurer: &M,
) -> Vec<String> {
    let mut lines = Vec::new();
    if text.trim().is_empty() {
        return lines;
    }
    let space_width = measurer.measure_width(" ", typography);

    for paragraph in text.trim_end().split('\n') {
        let mut current = String::new();
        let mut current_width = 0.0;
        let mut any_word = false;

        for word in paragraph.split_whitespace() {
            any_word = true;
            let word_width = measurer.measure_width(word, typography);
            if !current.is_empty() {
                let candidate_width = current_width + space_width + word_width;
                if candidate_width <= max_width {
                    current.push(' ');
                    current.push_str(word);
                    current_width = candidate_width;
                    continue;
                }
                lines.push(std::mem::take(&mut current));
            }

            if word_width <= max_width {
                current = word.to_string();
                current_width = word_width;
            } else {
                (current, current_width) =
                    break_word(word, max_width, typography, measurer, &mut lines);
            }
        }

        if !current.is_empty() {
            lines.push(current);
        } else if !any_word {
            lines.push(String::new());
        }
    }

    lines
}

/// Splits an over-wide word across lines. Full chunks are pushed onto `lines`;
/// the trailing partial chunk and its width are returned so following words
/// can join it.
fn break_word<M: MeasureText + ?Sized>(
    word: &str,
    max_width: f64,
    typography: &Typography,
    measurer: &M,
    lines: &mut Vec<String>,
) -> (String, f64) {
    let mut chunk = String::new();
    let mut chunk_width = 0.0;
    let mut glyph = [0u8; 4];
    for ch in word.chars() {
        let ch_width = measurer.measure_width(ch.encode_utf8(&mut glyph), typography);
        if chunk.is_empty() || chunk_width + ch_width <= max_width {
            chunk.push(ch);
            chunk_width += ch_width;
        } else {
            lines.push(std::mem::replace(&mut chunk, ch.to_string()));
            chunk_width = ch_width;
        }
    }
    (chunk, chunk_width)
}

// ────────────────────────────────────────────────────────────────────────────
// Layout + fit
// ────────────────────────────────────────────────────────────────────────────

/// Wraps `text` into a `box_width × box_height` box and decides how many lines show.
pub fn layout_field_text<M: MeasureText + ?Sized>(
    text: &str,
    box_width: f64,
    box_height: f64,
    style: &FieldTextStyle,
    measurer: &M,
) -> FieldTextLayout {
    let line_height = style.typography.line_height();
    let available_width = box_width - 2.0 * style.padding;
    let available_height = box_height - 2.0 * style.padding;

    let lines = wrap_text(text, available_width, &style.typography, measurer);

    let max_lines = if line_height > 0.0 && available_height > 0.0 {
        ((available_height / line_height) + LINE_CAPACITY_EPSILON).floor() as usize
    } else {
        0
    }
    .max(1);

    let visible_lines = lines.len().min(max_lines);
    FieldTextLayout {
        truncated: lines.len() > max_lines,
        lines,
        line_height,
        max_lines,
        visible_lines,
    }
}

/// Authoritative fit check used on the editing path.
pub fn check_fit<M: MeasureText + ?Sized>(
    text: &str,
    box_width: f64,
    box_height: f64,
    style: &FieldTextStyle,
    measurer: &M,
) -> FitResult {
    FitResult::from(&layout_field_text(text, box_width, box_height, style, measurer))
}

/// The box a field's text is drawn into on screen: margin-clamped, in raster pixels.
pub fn preview_text_box(field: &Field, page: &PageGeometry, margin: Margin) -> Option<UnitBox> {
    clamp_to_margin(field.bounds(), margin).map(|b| to_pixel_box(b, page))
}

/// The box a field's text is drawn into on export: margin-clamped, in points.
pub fn export_text_box(field: &Field, page: &PageGeometry, margin: Margin) -> Option<UnitBox> {
    clamp_to_margin(field.bounds(), margin).map(|b| to_export_box(b, page))
}

/// Validates a candidate value for a field as it would appear in the preview.
///
/// `style` is in export units and is scaled into the page's raster space.
/// A field whose box is lost to margin clamping, or left with no room inside
/// its padding, is skipped by the flattener. It can show nothing, so any
/// non-empty text overflows it.
pub fn validate_field_text<M: MeasureText + ?Sized>(
    field: &Field,
    page: &PageGeometry,
    text: &str,
    style: &FieldTextStyle,
    margin: Margin,
    measurer: &M,
) -> FitResult {
    let preview = style.for_preview(page);
    let drawable = preview_text_box(field, page, margin)
        .filter(|rect| has_drawable_area(rect, preview.padding));
    match drawable {
        Some(rect) => check_fit(text, rect.width, rect.height, &preview, measurer),
        None => {
            let empty = text.trim().is_empty();
            FitResult {
                fits: empty,
                would_overflow: !empty,
                line_count: if empty { 0 } else { 1 },
                max_lines: 0,
                first_overflow_line: if empty { None } else { Some(0) },
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
