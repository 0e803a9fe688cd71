//! Static font-metric tables for the three standard PDF base fonts.
//!
//! Character widths are in em units (relative to font size), taken from the
//! Adobe core-font AFM files. Because the flattener draws with the very same
//! base fonts, a width measured here for the preview is the width the glyphs
//! occupy in the exported document.
//! All tables cover ASCII 0x20..=0x7E (95 printable characters).
//! Index = (char as usize) - 32.

use serde::{Deserialize, Serialize};

use crate::layout::text_fit::wrap_text;

// ────────────────────────────────────────────────────────────────────────────
// Font family enum
// ────────────────────────────────────────────────────────────────────────────

/// The base fonts a field value can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    /// Sans-serif default for filled values.
    #[default]
    Helvetica,
    /// Serif.
    #[serde(alias = "times")]
    TimesRoman,
    /// Fixed pitch; every glyph is 0.6em.
    Courier,
}

impl FontFamily {
    /// PostScript name used for the `/BaseFont` entry of the export font resource.
    pub fn base_font_name(&self) -> &'static str {
        match self {
            FontFamily::Helvetica => "Helvetica",
            FontFamily::TimesRoman => "Times-Roman",
            FontFamily::Courier => "Courier",
        }
    }

    /// Parses the short config spelling (`helvetica`, `times`, `courier`).
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "helvetica" | "sans" => Some(FontFamily::Helvetica),
            "times" | "times-roman" | "times_roman" | "serif" => Some(FontFamily::TimesRoman),
            "courier" | "mono" | "monospace" => Some(FontFamily::Courier),
            _ => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Typography profile + measurement capability
// ────────────────────────────────────────────────────────────────────────────

/// Typography applied to a field's text.
///
/// `font_size` is in whatever unit space the box it is laid out into uses:
/// pixels for the preview raster, points for export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    #[serde(default)]
    pub font_family: FontFamily,
    #[serde(alias = "fontSizePx")]
    pub font_size: f64,
    #[serde(default = "default_line_height_ratio")]
    pub line_height_ratio: f64,
}

fn default_line_height_ratio() -> f64 {
    1.2
}

impl Typography {
    pub fn line_height(&self) -> f64 {
        self.font_size * self.line_height_ratio
    }

    /// The same profile expressed in another unit space (`factor` = target units per source unit).
    pub fn scaled(&self, factor: f64) -> Typography {
        Typography {
            font_size: self.font_size * factor,
            ..*self
        }
    }
}

impl Default for Typography {
    fn default() -> Self {
        Typography {
            font_family: FontFamily::Helvetica,
            font_size: 12.0,
            line_height_ratio: default_line_height_ratio(),
        }
    }
}

/// Rendered extent of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextExtent {
    pub width: f64,
    pub height: f64,
}

/// Text measurement service.
///
/// The fit algorithm only ever asks for single-line widths; implementations
/// can be backed by glyph metrics, a shaping library, or a fixed-pitch guess.
pub trait MeasureText: Send + Sync {
    /// Width of `text` set on one line.
    fn measure_width(&self, text: &str, typography: &Typography) -> f64;

    /// Extent of `text`, word-wrapped at `max_width` when given.
    fn measure(&self, text: &str, typography: &Typography, max_width: Option<f64>) -> TextExtent {
        match max_width {
            None => TextExtent {
                width: self.measure_width(text, typography),
                height: if text.is_empty() {
                    0.0
                } else {
                    typography.line_height()
                },
            },
            Some(max) => {
                let lines = wrap_text(text, max, typography, self);
                let width = lines
                    .iter()
                    .map(|l| self.measure_width(l, typography))
                    .fold(0.0_f64, f64::max);
                TextExtent {
                    width,
                    height: lines.len() as f64 * typography.line_height(),
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Static character-width table for a font family.
///
/// `widths[i]` = width of ASCII character `(i + 32)` in em, covering 0x20 (space) through 0x7E (~).
///
/// Width array slot layout:
/// ```text
/// [0]=sp  [1]=!   [2]="   [3]=#   [4]=$   [5]=%   [6]=&   [7]='
/// [8]=(   [9]=)   [10]=*  [11]=+  [12]=,  [13]=-  [14]=.  [15]=/
/// [16..25]=0-9
/// [26]=:  [27]=;  [28]=<  [29]==  [30]=>  [31]=?  [32]=@
/// [33..58]=A-Z
/// [59]=[  [60]=\  [61]=]  [62]=^  [63]=_  [64]=`
/// [65..90]=a-z
/// [91]={  [92]=|  [93]=}  [94]=~
/// ```
pub struct FontMetricTable {
    widths: [f32; 95],
    /// Fallback width for non-ASCII characters (codepoints > 0x7E).
    pub average_char_width: f32,
}

impl FontMetricTable {
    /// Measures the rendered width of a string in em units.
    ///
    /// Non-ASCII characters fall back to `average_char_width`.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars()
            .map(|c| {
                let code = c as usize;
                if (32..=126).contains(&code) {
                    self.widths[code - 32]
                } else {
                    self.average_char_width
                }
            })
            .sum()
    }
}

impl MeasureText for FontMetricTable {
    fn measure_width(&self, text: &str, typography: &Typography) -> f64 {
        self.measure_str(text) as f64 * typography.font_size
    }
}

/// Measures with whichever table matches the typography's font family.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseFontMetrics;

impl MeasureText for BaseFontMetrics {
    fn measure_width(&self, text: &str, typography: &Typography) -> f64 {
        get_metrics(&typography.font_family).measure_width(text, typography)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Static width tables  (95 ASCII printable characters each)
// ────────────────────────────────────────────────────────────────────────────

static HELVETICA_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.278, 0.355, 0.556, 0.556, 0.889, 0.667, 0.191, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.584, 0.584, 0.584, 0.556, 1.015,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.667, 0.667, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.500, 0.667, 0.556, 0.833,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [      \      ]      ^      _      `
        0.278, 0.278, 0.278, 0.469, 0.556, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.556, 0.500, 0.556, 0.556, 0.278, 0.556, 0.556, 0.222, 0.222, 0.500, 0.222, 0.833,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.556, 0.556, 0.556, 0.556, 0.333, 0.500, 0.278, 0.556, 0.500, 0.722, 0.500, 0.500, 0.500,
        // {      |      }      ~
        0.334, 0.260, 0.334, 0.584,
    ],
    average_char_width: 0.556,
};

static TIMES_ROMAN_TABLE: FontMetricTable = FontMetricTable {
    #[rustfmt::skip]
    widths: [
        // sp    !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.250, 0.333, 0.408, 0.500, 0.500, 0.833, 0.778, 0.180, 0.333, 0.333, 0.500, 0.564, 0.250, 0.333, 0.250, 0.278,
        // 0      1      2      3      4      5      6      7      8      9
        0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500,
        // :      ;      <      =      >      ?      @
        0.278, 0.278, 0.564, 0.564, 0.564, 0.444, 0.921,
        // A      B      C      D      E      F      G      H      I      J      K      L      M
        0.722, 0.667, 0.667, 0.722, 0.611, 0.556, 0.722, 0.722, 0.333, 0.389, 0.722, 0.611, 0.889,
        // N      O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.722, 0.556, 0.722, 0.667, 0.556, 0.611, 0.722, 0.722, 0.944, 0.722, 0.722, 0.611,
        // [      \      ]      ^      _      `
        0.333, 0.278, 0.333, 0.469, 0.500, 0.333,
        // a      b      c      d      e      f      g      h      i      j      k      l      m
        0.444, 0.500, 0.444, 0.500, 0.444, 0.333, 0.500, 0.500, 0.278, 0.278, 0.500, 0.278, 0.778,
        // n      o      p      q      r      s      t      u      v      w      x      y      z
        0.500, 0.500, 0.500, 0.500, 0.333, 0.389, 0.278, 0.500, 0.500, 0.722, 0.500, 0.500, 0.444,
        // {      |      }      ~
        0.480, 0.200, 0.480, 0.541,
    ],
    average_char_width: 0.500,
};

static COURIER_TABLE: FontMetricTable = FontMetricTable {
    widths: [0.600; 95],
    average_char_width: 0.600,
};

/// Returns the static metric table for a given font family.
pub fn get_metrics(font: &FontFamily) -> &'static FontMetricTable {
    match font {
        FontFamily::Helvetica => &HELVETICA_TABLE,
        FontFamily::TimesRoman => &TIMES_ROMAN_TABLE,
        FontFamily::Courier => &COURIER_TABLE,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn typography(font: FontFamily, size: f64) -> Typography {
        Typography {
            font_family: font,
            font_size: size,
            line_height_ratio: 1.2,
        }
    }

    #[test]
    fn test_measure_str_empty_returns_zero() {
        let metrics = get_metrics(&FontFamily::Helvetica);
        assert_eq!(metrics.measure_str(""), 0.0);
    }

    #[test]
    fn test_measure_str_single_space() {
        let metrics = get_metrics(&FontFamily::Helvetica);
        let width = metrics.measure_str(" ");
        assert!(
            (width - 0.278).abs() < 1e-4,
            "space width should be 0.278, got {width}"
        );
    }

    #[test]
    fn test_measure_str_ascii_characters() {
        let metrics = get_metrics(&FontFamily::Helvetica);
        // "Rust" = R(0.722) + u(0.556) + s(0.500) + t(0.278) = 2.056
        let width = metrics.measure_str("Rust");
        assert!(
            (width - 2.056).abs() < 1e-3,
            "Rust width should be ~2.056, got {width}"
        );
    }

    #[test]
    fn test_measure_str_non_ascii_falls_back() {
        let metrics = get_metrics(&FontFamily::Helvetica);
        let width = metrics.measure_str("é");
        assert!(
            (width - metrics.average_char_width).abs() < 1e-4,
            "non-ASCII should use average_char_width"
        );
    }

    #[test]
    fn test_measure_width_scales_with_font_size() {
        let metrics = BaseFontMetrics;
        let small = metrics.measure_width("Signature", &typography(FontFamily::Helvetica, 10.0));
        let large = metrics.measure_width("Signature", &typography(FontFamily::Helvetica, 20.0));
        assert!((large - 2.0 * small).abs() < 1e-6);
    }

    #[test]
    fn test_courier_is_fixed_pitch() {
        let metrics = BaseFontMetrics;
        let t = typography(FontFamily::Courier, 10.0);
        assert!((metrics.measure_width("iiii", &t) - metrics.measure_width("WWWW", &t)).abs() < 1e-9);
        assert!((metrics.measure_width("abc", &t) - 18.0).abs() < 1e-6);
    }

    #[test]
    fn test_times_narrower_than_helvetica_for_lowercase() {
        let metrics = BaseFontMetrics;
        let text = "authorized representative";
        let times = metrics.measure_width(text, &typography(FontFamily::TimesRoman, 12.0));
        let helv = metrics.measure_width(text, &typography(FontFamily::Helvetica, 12.0));
        assert!(times < helv);
    }

    #[test]
    fn test_measure_with_max_width_reports_wrapped_height() {
        let metrics = BaseFontMetrics;
        let t = typography(FontFamily::Helvetica, 10.0);
        let single = metrics.measure("one two three four", &t, None);
        assert!((single.height - 12.0).abs() < 1e-9);

        let wrapped = metrics.measure("one two three four", &t, Some(30.0));
        assert!(wrapped.height > single.height);
        assert!(wrapped.width <= single.width);
    }

    #[test]
    fn test_font_family_config_names() {
        assert_eq!(FontFamily::from_config_name("Times"), Some(FontFamily::TimesRoman));
        assert_eq!(FontFamily::from_config_name(" courier "), Some(FontFamily::Courier));
        assert_eq!(FontFamily::from_config_name("comic sans"), None);
    }

    #[test]
    fn test_typography_scaled_keeps_family_and_ratio() {
        let t = typography(FontFamily::TimesRoman, 12.0).scaled(0.75);
        assert_eq!(t.font_family, FontFamily::TimesRoman);
        assert!((t.font_size - 9.0).abs() < 1e-9);
        assert!((t.line_height_ratio - 1.2).abs() < 1e-9);
    }
}
