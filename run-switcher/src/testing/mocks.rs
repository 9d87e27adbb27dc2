//! In-memory API client for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::api::{ApiClient, ApiError};
use crate::core::{
    CompiledTemplate, Entity, Experiment, FetchNode, LegacyRun, NextGenRun, Pipeline,
    PipelineVersion, QueryKey, RecurringRun,
};

/// An [`ApiClient`] serving canned responses.
///
/// Unknown keys answer `NotFound`. Calls are counted per key, and a key can
/// be held so its response only arrives once released.
#[derive(Debug, Default)]
pub struct InMemoryApiClient {
    responses: Mutex<HashMap<QueryKey, Result<Entity, ApiError>>>,
    calls: Mutex<HashMap<QueryKey, usize>>,
    gates: Mutex<HashMap<QueryKey, Arc<Notify>>>,
}

impl InMemoryApiClient {
    /// Creates a client with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response for a key.
    #[must_use]
    pub fn with_response(self, key: QueryKey, response: Result<Entity, ApiError>) -> Self {
        self.responses.lock().insert(key, response);
        self
    }

    /// Serves a legacy run under its id.
    #[must_use]
    pub fn with_legacy_run(self, run: LegacyRun) -> Self {
        let key = QueryKey::new(FetchNode::LegacyRun, run.id());
        self.with_response(key, Ok(Entity::LegacyRun(run)))
    }

    /// Serves a next-gen run under its id.
    #[must_use]
    pub fn with_next_gen_run(self, run: NextGenRun) -> Self {
        let key = QueryKey::new(FetchNode::NextGenRun, run.run_id.clone());
        self.with_response(key, Ok(Entity::NextGenRun(run)))
    }

    /// Serves a recurring run under its id.
    #[must_use]
    pub fn with_recurring_run(self, job: RecurringRun) -> Self {
        let key = QueryKey::new(FetchNode::RecurringRun, job.id.clone());
        self.with_response(key, Ok(Entity::RecurringRun(job)))
    }

    /// Serves a pipeline under its id.
    #[must_use]
    pub fn with_pipeline(self, pipeline: Pipeline) -> Self {
        let key = QueryKey::new(FetchNode::Pipeline, pipeline.id.clone());
        self.with_response(key, Ok(Entity::Pipeline(pipeline)))
    }

    /// Serves a pipeline version under its id.
    #[must_use]
    pub fn with_pipeline_version(self, version: PipelineVersion) -> Self {
        let key = QueryKey::new(FetchNode::PipelineVersion, version.id.clone());
        self.with_response(key, Ok(Entity::PipelineVersion(version)))
    }

    /// Serves template text for a pipeline version.
    #[must_use]
    pub fn with_template(self, version_id: &str, text: &str) -> Self {
        let key = QueryKey::new(FetchNode::CompiledTemplate, version_id);
        self.with_response(key, Ok(Entity::Template(text.to_string())))
    }

    /// Serves an experiment under its id.
    #[must_use]
    pub fn with_experiment(self, experiment: Experiment) -> Self {
        let key = QueryKey::new(FetchNode::Experiment, experiment.id.clone());
        self.with_response(key, Ok(Entity::Experiment(experiment)))
    }

    /// Fails a key with the given error.
    #[must_use]
    pub fn with_failure(self, node: FetchNode, id: &str, err: ApiError) -> Self {
        self.with_response(QueryKey::new(node, id), Err(err))
    }

    /// Holds responses for a key until [`release`](Self::release).
    pub fn hold(&self, node: FetchNode, id: &str) {
        self.gates
            .lock()
            .entry(QueryKey::new(node, id))
            .or_insert_with(|| Arc::new(Notify::new()));
    }

    /// Lets a held key respond.
    pub fn release(&self, node: FetchNode, id: &str) {
        if let Some(gate) = self.gates.lock().remove(&QueryKey::new(node, id)) {
            gate.notify_one();
        }
    }

    /// Returns the number of calls made for a key.
    #[must_use]
    pub fn calls(&self, node: FetchNode, id: &str) -> usize {
        self.calls
            .lock()
            .get(&QueryKey::new(node, id))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the number of calls made for all keys.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    async fn respond(&self, node: FetchNode, id: &str) -> Result<Entity, ApiError> {
        let key = QueryKey::new(node, id);
        *self.calls.lock().entry(key.clone()).or_default() += 1;

        let gate = self.gates.lock().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.responses
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::not_found(key.to_string())))
    }
}

fn mismatched(node: FetchNode) -> ApiError {
    ApiError::decode(format!("canned response is not a {node}"))
}

#[async_trait]
impl ApiClient for InMemoryApiClient {
    async fn get_legacy_run(&self, id: &str) -> Result<LegacyRun, ApiError> {
        match self.respond(FetchNode::LegacyRun, id).await? {
            Entity::LegacyRun(run) => Ok(run),
            _ => Err(mismatched(FetchNode::LegacyRun)),
        }
    }

    async fn get_next_gen_run(&self, id: &str) -> Result<NextGenRun, ApiError> {
        match self.respond(FetchNode::NextGenRun, id).await? {
            Entity::NextGenRun(run) => Ok(run),
            _ => Err(mismatched(FetchNode::NextGenRun)),
        }
    }

    async fn get_recurring_run(&self, id: &str) -> Result<RecurringRun, ApiError> {
        match self.respond(FetchNode::RecurringRun, id).await? {
            Entity::RecurringRun(job) => Ok(job),
            _ => Err(mismatched(FetchNode::RecurringRun)),
        }
    }

    async fn get_pipeline(&self, id: &str) -> Result<Pipeline, ApiError> {
        match self.respond(FetchNode::Pipeline, id).await? {
            Entity::Pipeline(pipeline) => Ok(pipeline),
            _ => Err(mismatched(FetchNode::Pipeline)),
        }
    }

    async fn get_pipeline_version(&self, id: &str) -> Result<PipelineVersion, ApiError> {
        match self.respond(FetchNode::PipelineVersion, id).await? {
            Entity::PipelineVersion(version) => Ok(version),
            _ => Err(mismatched(FetchNode::PipelineVersion)),
        }
    }

    async fn get_compiled_template(&self, version_id: &str) -> Result<CompiledTemplate, ApiError> {
        match self.respond(FetchNode::CompiledTemplate, version_id).await? {
            Entity::Template(text) => Ok(CompiledTemplate {
                template: Some(text),
            }),
            _ => Err(mismatched(FetchNode::CompiledTemplate)),
        }
    }

    async fn get_experiment(&self, id: &str) -> Result<Experiment, ApiError> {
        match self.respond(FetchNode::Experiment, id).await? {
            Entity::Experiment(experiment) => Ok(experiment),
            _ => Err(mismatched(FetchNode::Experiment)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        let client = InMemoryApiClient::new();
        let err = client.get_pipeline("P1").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.calls(FetchNode::Pipeline, "P1"), 1);
    }

    #[tokio::test]
    async fn test_held_key_waits_for_release() {
        let client = InMemoryApiClient::new().with_pipeline(fixtures::pipeline("P1", None));
        client.hold(FetchNode::Pipeline, "P1");

        let mut call = Box::pin(client.get_pipeline("P1"));
        assert!((&mut call).now_or_never().is_none());

        client.release(FetchNode::Pipeline, "P1");
        assert_eq!(call.await.unwrap().id, "P1");
    }

    #[tokio::test]
    async fn test_release_before_call_does_not_block() {
        let client = InMemoryApiClient::new().with_template("V1", "t");
        client.hold(FetchNode::CompiledTemplate, "V1");
        client.release(FetchNode::CompiledTemplate, "V1");

        let compiled = client.get_compiled_template("V1").await.unwrap();
        assert_eq!(compiled.template.as_deref(), Some("t"));
    }
}
