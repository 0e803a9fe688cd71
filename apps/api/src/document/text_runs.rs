//! Approximate text-run extraction from a page content stream.
//!
//! Walks the text and graphics state operators that position glyphs and
//! measures each shown string with the base-font width tables. Glyph codes are
//! read one byte per character, so composite (CID) fonts come out wider than
//! they render; the result feeds overlap warnings, which only need the rough
//! footprint of printed text.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::Object;

use crate::document::source::{number, MediaBox};
use crate::layout::font_metrics::{get_metrics, FontFamily};
use crate::overlap::TextRun;

/// Glyph box above and below the baseline, as a fraction of font size.
const ASCENT: f64 = 0.8;
const DESCENT: f64 = 0.2;

/// Affine matrix `[a b c d e f]`, PDF row-vector convention.
type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `a × b`: apply `a` first, then `b`.
fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn transform(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
}

fn translation(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

struct TextWalker<'a> {
    fonts: &'a HashMap<Vec<u8>, FontFamily>,
    media: &'a MediaBox,
    px_per_pt: f64,

    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    family: FontFamily,
    font_size: f64,
    leading: f64,
    horizontal_scale: f64,
    char_spacing: f64,
    word_spacing: f64,

    runs: Vec<TextRun>,
}

impl<'a> TextWalker<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, FontFamily>, media: &'a MediaBox, px_per_pt: f64) -> Self {
        TextWalker {
            fonts,
            media,
            px_per_pt,
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            family: FontFamily::Helvetica,
            font_size: 0.0,
            leading: 0.0,
            horizontal_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            runs: Vec::new(),
        }
    }

    fn step(&mut self, op: &Operation) {
        let nums: Vec<f64> = op.operands.iter().filter_map(number).collect();
        match op.operator.as_str() {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" if nums.len() == 6 => {
                let m = [nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]];
                self.ctm = multiply(&m, &self.ctm);
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "Tf" => {
                if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                    self.family = self.fonts.get(name).copied().unwrap_or_default();
                }
                if let Some(size) = op.operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" if !nums.is_empty() => self.leading = nums[0],
            "Tz" if !nums.is_empty() => self.horizontal_scale = nums[0] / 100.0,
            "Tc" if !nums.is_empty() => self.char_spacing = nums[0],
            "Tw" if !nums.is_empty() => self.word_spacing = nums[0],
            "Td" if nums.len() == 2 => self.next_line(nums[0], nums[1]),
            "TD" if nums.len() == 2 => {
                self.leading = -nums[1];
                self.next_line(nums[0], nums[1]);
            }
            "Tm" if nums.len() == 6 => {
                let m = [nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]];
                self.tm = m;
                self.tlm = m;
            }
            "T*" => self.next_line(0.0, -self.leading),
            "Tj" => {
                if let Some(text) = op.operands.first() {
                    self.show(std::slice::from_ref(text));
                }
            }
            "TJ" => {
                if let Some(Ok(items)) = op.operands.first().map(Object::as_array) {
                    self.show(items);
                }
            }
            "'" => {
                self.next_line(0.0, -self.leading);
                if let Some(text) = op.operands.first() {
                    self.show(std::slice::from_ref(text));
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    self.word_spacing = aw;
                    self.char_spacing = ac;
                }
                self.next_line(0.0, -self.leading);
                if let Some(text) = op.operands.get(2) {
                    self.show(std::slice::from_ref(text));
                }
            }
            _ => {}
        }
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.tlm = multiply(&translation(tx, ty), &self.tlm);
        self.tm = self.tlm;
    }

    /// Shows a `TJ`-style sequence of strings and kerning adjustments as one run.
    fn show(&mut self, items: &[Object]) {
        let mut advance = 0.0;
        let mut visible = false;
        for item in items {
            match item {
                Object::String(bytes, _) => {
                    advance += self.string_width(bytes);
                    visible |= bytes.iter().any(|b| !b.is_ascii_whitespace());
                }
                other => {
                    if let Some(adjust) = number(other) {
                        advance -= adjust / 1000.0 * self.font_size * self.horizontal_scale;
                    }
                }
            }
        }

        if visible && advance > 0.0 && self.font_size > 0.0 {
            self.record(advance);
        }
        self.tm = multiply(&translation(advance, 0.0), &self.tm);
    }

    /// Advance width of a string in unscaled text space.
    fn string_width(&self, bytes: &[u8]) -> f64 {
        let metrics = get_metrics(&self.family);
        let mut buf = [0u8; 4];
        bytes
            .iter()
            .map(|&b| {
                let glyph = metrics.measure_str(char::from(b).encode_utf8(&mut buf)) as f64;
                let spacing = self.char_spacing + if b == b' ' { self.word_spacing } else { 0.0 };
                (glyph * self.font_size + spacing) * self.horizontal_scale
            })
            .sum()
    }

    fn record(&mut self, width: f64) {
        let trm = multiply(&self.tm, &self.ctm);
        let low = -DESCENT * self.font_size;
        let high = ASCENT * self.font_size;
        let corners = [
            transform(&trm, 0.0, low),
            transform(&trm, width, low),
            transform(&trm, 0.0, high),
            transform(&trm, width, high),
        ];

        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let scale = self.px_per_pt;
        self.runs.push(TextRun {
            left: (min_x - self.media.llx) * scale,
            right: (max_x - self.media.llx) * scale,
            top: self.media.offset_from_top(max_y) * scale,
            bottom: self.media.offset_from_top(min_y) * scale,
        });
    }
}

/// Bounding boxes of shown text, in raster pixels with a top-left origin.
pub fn extract_text_runs(
    content: &Content,
    fonts: &HashMap<Vec<u8>, FontFamily>,
    media: &MediaBox,
    px_per_pt: f64,
) -> Vec<TextRun> {
    let mut walker = TextWalker::new(fonts, media, px_per_pt);
    for op in &content.operations {
        walker.step(op);
    }
    walker.runs
}
