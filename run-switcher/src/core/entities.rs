//! Upstream entities consumed while resolving a new-run request.
//!
//! Field names follow the platform's REST payloads (snake_case). Every
//! optional field defaults so partial payloads still decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline spec attached to legacy runs and recurring runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyPipelineSpec {
    /// Id of the pipeline the spec was created from.
    #[serde(default)]
    pub pipeline_id: Option<String>,
    /// Name of the pipeline the spec was created from.
    #[serde(default)]
    pub pipeline_name: Option<String>,
    /// Compiled workflow manifest.
    #[serde(default)]
    pub workflow_manifest: Option<String>,
    /// Stored pipeline manifest.
    #[serde(default)]
    pub pipeline_manifest: Option<String>,
}

/// Summary of a run as returned by the legacy run API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyRunSummary {
    /// Run id.
    pub id: String,
    /// Run name.
    #[serde(default)]
    pub name: Option<String>,
    /// Pipeline spec the run was started with.
    #[serde(default)]
    pub pipeline_spec: Option<LegacyPipelineSpec>,
}

/// Runtime details of a legacy run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRuntime {
    /// Executed workflow manifest.
    #[serde(default)]
    pub workflow_manifest: Option<String>,
}

/// Run detail from the legacy run API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyRun {
    /// The run summary.
    pub run: LegacyRunSummary,
    /// Runtime details, if the run has started.
    #[serde(default)]
    pub pipeline_runtime: Option<PipelineRuntime>,
}

impl LegacyRun {
    /// Returns the run id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.run.id
    }
}

/// Run from the next-generation run API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextGenRun {
    /// Run id.
    pub run_id: String,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Experiment the run belongs to.
    #[serde(default)]
    pub experiment_id: Option<String>,
    /// Pipeline version the run was created from.
    #[serde(default)]
    pub pipeline_version_id: Option<String>,
    /// Embedded structured pipeline specification.
    #[serde(default)]
    pub pipeline_spec: Option<serde_json::Value>,
    /// Runtime parameters the run was started with.
    #[serde(default)]
    pub runtime_config: Option<serde_json::Value>,
}

impl NextGenRun {
    /// Returns the embedded spec if it carries any content.
    #[must_use]
    pub fn embedded_spec(&self) -> Option<&serde_json::Value> {
        self.pipeline_spec.as_ref().filter(|spec| match spec {
            serde_json::Value::Null => false,
            serde_json::Value::Object(map) => !map.is_empty(),
            _ => true,
        })
    }
}

/// Recurring run (job) from the legacy job API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecurringRun {
    /// Recurring run id.
    pub id: String,
    /// Recurring run name.
    #[serde(default)]
    pub name: Option<String>,
    /// Pipeline spec the recurring run triggers.
    #[serde(default)]
    pub pipeline_spec: Option<LegacyPipelineSpec>,
}

impl RecurringRun {
    /// Returns the stored manifest if it is non-empty.
    #[must_use]
    pub fn stored_manifest(&self) -> Option<&str> {
        self.pipeline_spec
            .as_ref()
            .and_then(|spec| spec.pipeline_manifest.as_deref())
            .filter(|manifest| !manifest.is_empty())
    }
}

/// Reference to a pipeline version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineVersionRef {
    /// Version id.
    pub id: String,
    /// Version name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline id.
    pub id: String,
    /// Pipeline name.
    #[serde(default)]
    pub name: Option<String>,
    /// Pipeline description.
    #[serde(default)]
    pub description: Option<String>,
    /// The version new runs use unless one is chosen.
    #[serde(default)]
    pub default_version: Option<PipelineVersionRef>,
}

/// A pipeline version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineVersion {
    /// Version id.
    pub id: String,
    /// Version name.
    #[serde(default)]
    pub name: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Compiled template of a pipeline version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledTemplate {
    /// Template text.
    #[serde(default)]
    pub template: Option<String>,
}

/// An experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Experiment id.
    pub id: String,
    /// Experiment name.
    #[serde(default)]
    pub name: Option<String>,
    /// Experiment description.
    #[serde(default)]
    pub description: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A resolved entity of any node.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// Legacy run detail.
    LegacyRun(LegacyRun),
    /// Next-generation run.
    NextGenRun(NextGenRun),
    /// Recurring run.
    RecurringRun(RecurringRun),
    /// Pipeline.
    Pipeline(Pipeline),
    /// Pipeline version.
    PipelineVersion(PipelineVersion),
    /// Template text extracted from a compiled template.
    Template(String),
    /// Experiment.
    Experiment(Experiment),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_spec_ignores_empty_objects() {
        let mut run = NextGenRun {
            run_id: "R1".to_string(),
            pipeline_spec: Some(json!({})),
            ..Default::default()
        };
        assert!(run.embedded_spec().is_none());

        run.pipeline_spec = Some(json!(null));
        assert!(run.embedded_spec().is_none());

        run.pipeline_spec = Some(json!({"schemaVersion": "2.1.0"}));
        assert!(run.embedded_spec().is_some());
    }

    #[test]
    fn test_stored_manifest_ignores_empty_text() {
        let mut job = RecurringRun {
            id: "J1".to_string(),
            pipeline_spec: Some(LegacyPipelineSpec {
                pipeline_manifest: Some(String::new()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(job.stored_manifest().is_none());

        job.pipeline_spec = Some(LegacyPipelineSpec {
            pipeline_manifest: Some("kind: Workflow".to_string()),
            ..Default::default()
        });
        assert_eq!(job.stored_manifest(), Some("kind: Workflow"));
    }

    #[test]
    fn test_pipeline_decodes_partial_payload() {
        let pipeline: Pipeline = serde_json::from_value(json!({
            "id": "P1",
            "default_version": {"id": "V1"}
        }))
        .unwrap();

        assert_eq!(pipeline.default_version.unwrap().id, "V1");
        assert!(pipeline.name.is_none());
    }
}
