//! Text measurement and fitting for field values.
//!
//! The same layout routine backs edit validation, overflow warnings and the
//! flattener, so a value accepted in the editor is drawn exactly as it fit.

pub mod font_metrics;
pub mod handlers;
pub mod text_fit;
