//! Template materialization from settled entities.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::format::{classify_template_format, TemplateFormat};
use crate::core::{NextGenRun, RecurringRun};
use crate::errors::SwitcherError;

/// Entity that supplied the template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// Embedded spec of a next-generation run.
    NextGenRun,
    /// Stored manifest of a recurring run.
    RecurringRun,
    /// Compiled template of a pipeline version.
    CompiledTemplate,
    /// No source produced text yet.
    #[default]
    None,
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NextGenRun => write!(f, "next_gen_run"),
            Self::RecurringRun => write!(f, "recurring_run"),
            Self::CompiledTemplate => write!(f, "compiled_template"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Authoritative template text with its detected format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateText {
    text: String,
    source: TemplateSource,
    format: TemplateFormat,
}

impl TemplateText {
    /// Creates template text and classifies it.
    #[must_use]
    pub fn new(text: impl Into<String>, source: TemplateSource) -> Self {
        let text = text.into();
        let format = classify_template_format(&text);
        Self {
            text,
            source,
            format,
        }
    }

    /// Returns empty, unresolved template text.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the source entity.
    #[must_use]
    pub const fn source(&self) -> TemplateSource {
        self.source
    }

    /// Returns the detected format.
    #[must_use]
    pub const fn format(&self) -> TemplateFormat {
        self.format
    }

    /// Returns true if no text was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns a short digest of the text for logs and events.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }
}

/// Serializes a structured pipeline spec to block-style YAML.
pub fn structured_spec_to_text(spec: &serde_json::Value) -> Result<String, SwitcherError> {
    serde_yaml::to_string(spec).map_err(|e| SwitcherError::Serialization(e.to_string()))
}

/// Derives the template text from whichever entity supplies it.
///
/// Priority: next-gen run embedded spec, then recurring run stored
/// manifest, then the compiled template (possibly empty).
pub fn materialize(
    next_gen_run: Option<&NextGenRun>,
    recurring_run: Option<&RecurringRun>,
    compiled_template: Option<&str>,
) -> Result<TemplateText, SwitcherError> {
    if let Some(spec) = next_gen_run.and_then(NextGenRun::embedded_spec) {
        let text = structured_spec_to_text(spec)?;
        return Ok(TemplateText::new(text, TemplateSource::NextGenRun));
    }

    if let Some(manifest) = recurring_run.and_then(RecurringRun::stored_manifest) {
        return Ok(TemplateText::new(manifest, TemplateSource::RecurringRun));
    }

    Ok(match compiled_template {
        Some(text) => TemplateText::new(text, TemplateSource::CompiledTemplate),
        None => TemplateText::empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_next_gen_spec_wins_over_manifest() {
        let run = fixtures::next_gen_run("R1", Some(fixtures::next_gen_spec()), None);
        let job = fixtures::recurring_run("J1", Some(fixtures::LEGACY_TEMPLATE));

        let template = materialize(Some(&run), Some(&job), Some("ignored")).unwrap();

        assert_eq!(template.source(), TemplateSource::NextGenRun);
        assert_eq!(
            template.as_str(),
            structured_spec_to_text(&fixtures::next_gen_spec()).unwrap()
        );
        assert_eq!(template.format(), TemplateFormat::NextGen);
    }

    #[test]
    fn test_manifest_used_verbatim() {
        let job = fixtures::recurring_run("J1", Some(fixtures::NEXT_GEN_TEMPLATE));

        let template = materialize(None, Some(&job), Some("ignored")).unwrap();

        assert_eq!(template.source(), TemplateSource::RecurringRun);
        assert_eq!(template.as_str(), fixtures::NEXT_GEN_TEMPLATE);
    }

    #[test]
    fn test_run_without_spec_falls_through() {
        let run = fixtures::next_gen_run("R1", None, Some("V1"));

        let template = materialize(Some(&run), None, Some(fixtures::LEGACY_TEMPLATE)).unwrap();

        assert_eq!(template.source(), TemplateSource::CompiledTemplate);
        assert_eq!(template.format(), TemplateFormat::Legacy);
    }

    #[test]
    fn test_no_source_is_empty() {
        let template = materialize(None, None, None).unwrap();
        assert!(template.is_empty());
        assert_eq!(template.source(), TemplateSource::None);
    }

    #[test]
    fn test_empty_compiled_template_keeps_source() {
        let template = materialize(None, None, Some("")).unwrap();
        assert!(template.is_empty());
        assert_eq!(template.source(), TemplateSource::CompiledTemplate);
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let run = fixtures::next_gen_run("R1", Some(fixtures::next_gen_spec()), None);
        let first = materialize(Some(&run), None, None).unwrap();
        let second = materialize(Some(&run), None, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn test_spec_serializes_to_block_yaml() {
        let text = structured_spec_to_text(&json!({"pipelineInfo": {"name": "p"}})).unwrap();
        assert_eq!(text, "pipelineInfo:\n  name: p\n");
    }
}
