use anyhow::{bail, Context, Result};

use crate::layout::font_metrics::{FontFamily, Typography};
use crate::layout::text_fit::FieldTextStyle;
use crate::models::value::is_valid_date_format;

/// Application configuration loaded from environment variables.
/// Every variable has a default; a value that is present but invalid fails startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub max_upload_bytes: usize,
    /// Raster pixels per PDF point for page geometry and text runs derived server-side.
    pub preview_px_per_pt: f64,
    pub field_font: FontFamily,
    pub field_font_size_pt: f64,
    pub field_line_height: f64,
    pub field_padding_pt: f64,
    pub date_format: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let field_font = match lookup("FIELD_FONT") {
            Some(name) => FontFamily::from_config_name(&name)
                .with_context(|| format!("FIELD_FONT '{name}' is not one of helvetica, times, courier"))?,
            None => FontFamily::Helvetica,
        };

        let config = Config {
            port: parse_or(&lookup, "PORT", 8080u16)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024usize)?,
            preview_px_per_pt: parse_or(&lookup, "PREVIEW_PX_PER_PT", 96.0 / 72.0)?,
            field_font,
            field_font_size_pt: parse_or(&lookup, "FIELD_FONT_SIZE_PT", 10.0)?,
            field_line_height: parse_or(&lookup, "FIELD_LINE_HEIGHT", 1.2)?,
            field_padding_pt: parse_or(&lookup, "FIELD_PADDING_PT", 2.0)?,
            date_format: lookup("DATE_FORMAT").unwrap_or_else(|| "%m/%d/%Y".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("PREVIEW_PX_PER_PT", self.preview_px_per_pt),
            ("FIELD_FONT_SIZE_PT", self.field_font_size_pt),
            ("FIELD_LINE_HEIGHT", self.field_line_height),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                bail!("{key} must be a positive number, got {value}");
            }
        }
        if !(self.field_padding_pt.is_finite() && self.field_padding_pt >= 0.0) {
            bail!("FIELD_PADDING_PT must be zero or positive, got {}", self.field_padding_pt);
        }
        if self.date_format.trim().is_empty() {
            bail!("DATE_FORMAT cannot be empty");
        }
        if !is_valid_date_format(&self.date_format) {
            bail!("DATE_FORMAT '{}' is not a valid chrono format", self.date_format);
        }
        Ok(())
    }

    /// Field text style in export units (points). The preview scales it per page.
    pub fn field_text_style(&self) -> FieldTextStyle {
        FieldTextStyle {
            typography: Typography {
                font_family: self.field_font,
                font_size: self.field_font_size_pt,
                line_height_ratio: self.field_line_height,
            },
            padding: self.field_padding_pt,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
            preview_px_per_pt: 96.0 / 72.0,
            field_font: FontFamily::Helvetica,
            field_font_size_pt: 10.0,
            field_line_height: 1.2,
            field_padding_pt: 2.0,
            date_format: "%m/%d/%Y".to_string(),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
