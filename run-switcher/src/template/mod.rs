//! Template materialization and format detection.

mod format;
mod materialize;

pub use format::{classify_template_format, TemplateFormat};
pub use materialize::{materialize, structured_spec_to_text, TemplateSource, TemplateText};
