//! Test fixtures for upstream entities and templates.

use serde_json::json;

use crate::core::{
    Experiment, LegacyPipelineSpec, LegacyRun, LegacyRunSummary, NextGenRun, Pipeline,
    PipelineRuntime, PipelineVersion, PipelineVersionRef, RecurringRun,
};

/// A workflow manifest of the legacy engine.
pub const LEGACY_TEMPLATE: &str = "\
apiVersion: argoproj.io/v1alpha1
kind: Workflow
metadata:
  generateName: hello-world-
spec:
  entrypoint: whalesay
  templates:
  - name: whalesay
    container:
      image: docker/whalesay
      command: [cowsay]
";

/// A next-generation pipeline spec.
pub const NEXT_GEN_TEMPLATE: &str = "\
pipelineInfo:
  name: hello-world
root:
  dag:
    tasks:
      hello:
        taskInfo:
          name: hello
schemaVersion: 2.1.0
sdkVersion: kfp-2.0.0
";

/// The structured form of a next-generation pipeline spec.
#[must_use]
pub fn next_gen_spec() -> serde_json::Value {
    json!({
        "pipelineInfo": {"name": "embedded"},
        "root": {"dag": {"tasks": {}}},
        "schemaVersion": "2.1.0"
    })
}

/// A legacy run with an embedded workflow manifest.
#[must_use]
pub fn legacy_run(id: &str) -> LegacyRun {
    LegacyRun {
        run: LegacyRunSummary {
            id: id.to_string(),
            name: Some(format!("run-{id}")),
            pipeline_spec: Some(LegacyPipelineSpec {
                workflow_manifest: Some(LEGACY_TEMPLATE.to_string()),
                ..Default::default()
            }),
        },
        pipeline_runtime: Some(PipelineRuntime {
            workflow_manifest: Some(LEGACY_TEMPLATE.to_string()),
        }),
    }
}

/// A next-gen run, optionally embedding a spec and naming its version.
#[must_use]
pub fn next_gen_run(
    id: &str,
    spec: Option<serde_json::Value>,
    pipeline_version_id: Option<&str>,
) -> NextGenRun {
    NextGenRun {
        run_id: id.to_string(),
        display_name: Some(format!("run-{id}")),
        pipeline_version_id: pipeline_version_id.map(str::to_owned),
        pipeline_spec: spec,
        ..Default::default()
    }
}

/// A recurring run, optionally storing a manifest.
#[must_use]
pub fn recurring_run(id: &str, manifest: Option<&str>) -> RecurringRun {
    RecurringRun {
        id: id.to_string(),
        name: Some(format!("job-{id}")),
        pipeline_spec: Some(LegacyPipelineSpec {
            pipeline_manifest: manifest.map(str::to_owned),
            ..Default::default()
        }),
    }
}

/// A pipeline, optionally with a default version.
#[must_use]
pub fn pipeline(id: &str, default_version: Option<&str>) -> Pipeline {
    Pipeline {
        id: id.to_string(),
        name: Some(format!("pipeline-{id}")),
        default_version: default_version.map(|version| PipelineVersionRef {
            id: version.to_string(),
            name: Some(format!("version-{version}")),
        }),
        ..Default::default()
    }
}

/// A pipeline version.
#[must_use]
pub fn pipeline_version(id: &str) -> PipelineVersion {
    PipelineVersion {
        id: id.to_string(),
        name: Some(format!("version-{id}")),
        ..Default::default()
    }
}

/// An experiment.
#[must_use]
pub fn experiment(id: &str) -> Experiment {
    Experiment {
        id: id.to_string(),
        name: Some(format!("experiment-{id}")),
        ..Default::default()
    }
}
