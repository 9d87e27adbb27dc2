//! Structural detection of the template schema generation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use tracing::debug;

#[allow(clippy::expect_used)]
static NEXT_GEN_SCHEMA_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^2\.\d+\.\d+$").expect("schema version pattern is valid"));

/// Schema generation of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFormat {
    /// Workflow manifest of the legacy engine.
    #[default]
    Legacy,
    /// Next-generation pipeline spec.
    NextGen,
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::NextGen => write!(f, "next_gen"),
        }
    }
}

/// Classifies template text by its structure.
///
/// The first mapping document decides. Argo workflows are legacy; a
/// pipeline spec (bare, or nested under `pipelineSpec`) is next-gen when
/// its `schemaVersion` is 2.x.y or it carries both `pipelineInfo` and
/// `root`. Empty or unparseable text is legacy.
#[must_use]
pub fn classify_template_format(text: &str) -> TemplateFormat {
    if text.trim().is_empty() {
        return TemplateFormat::Legacy;
    }

    let mut first_mapping = None;
    for document in serde_yaml::Deserializer::from_str(text) {
        match Value::deserialize(document) {
            Ok(value) if value.is_mapping() => {
                first_mapping = Some(value);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Template is not valid YAML");
                return TemplateFormat::Legacy;
            }
        }
    }

    let Some(document) = first_mapping else {
        return TemplateFormat::Legacy;
    };
    if is_argo_workflow(&document) {
        return TemplateFormat::Legacy;
    }

    let spec = ["pipelineSpec", "pipeline_spec"]
        .iter()
        .find_map(|key| document.get(*key).filter(|v| v.is_mapping()))
        .unwrap_or(&document);

    if is_pipeline_spec(spec) {
        TemplateFormat::NextGen
    } else {
        TemplateFormat::Legacy
    }
}

fn is_argo_workflow(document: &Value) -> bool {
    let kind = document.get("kind").and_then(Value::as_str);
    let api_version = document.get("apiVersion").and_then(Value::as_str);
    kind == Some("Workflow") && api_version.is_some_and(|v| v.starts_with("argoproj.io/"))
}

fn is_pipeline_spec(document: &Value) -> bool {
    let versioned = document
        .get("schemaVersion")
        .and_then(Value::as_str)
        .is_some_and(|v| NEXT_GEN_SCHEMA_VERSION.is_match(v));
    versioned || (document.get("pipelineInfo").is_some() && document.get("root").is_some())
}
