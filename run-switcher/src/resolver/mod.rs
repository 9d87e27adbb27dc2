//! Entity resolution over the fetch dependency graph.
//!
//! Each [`FetchNode`] has an enablement predicate over the identifiers and
//! its parents' settled values. A node that is disabled never runs. A node
//! whose key changes is re-keyed: the old fetch is orphaned, its completion
//! is aborted and reported as discarded. The shared request itself stays in
//! the cache, so returning to the old key joins it. Results are cached per
//! [`QueryKey`] for the lifetime of the resolver.
//!
//! The resolver is polled cooperatively from `&mut self`; nothing is
//! spawned and no lock guards its state.

mod cache;

pub use cache::{FetchOutcome, QueryCache, SharedFetch};

use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, Abortable, BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::core::{
    Entity, Experiment, FetchNode, FetchPhase, FetchState, LegacyRun, NextGenRun, NodePhases,
    Pipeline, PipelineVersion, QueryKey, RecurringRun,
};
use crate::errors::{MissingIdentifierError, SwitcherError, UpstreamFetchError};
use crate::events::{EventSink, FETCH_DISCARDED, FETCH_FAILED, FETCH_ISSUED, FETCH_REUSED, FETCH_SETTLED};

/// A fetch that reached its node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// The settled key.
    pub key: QueryKey,
    /// Ready, empty or failed.
    pub phase: FetchPhase,
    /// When the node settled.
    pub settled_at: DateTime<Utc>,
}

/// Effect of a completed fetch on the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The result was stored on its node.
    Settled(Settlement),
    /// The node had moved on; the result was dropped.
    Discarded(QueryKey),
}

#[derive(Debug, Default)]
struct NodeSlot {
    key: Option<QueryKey>,
    state: FetchState<Entity>,
    abort: Option<AbortHandle>,
}

struct Completion {
    key: QueryKey,
    outcome: FetchOutcome,
}

/// Resolves upstream entities for one page instance.
pub struct EntityResolver {
    client: Arc<dyn ApiClient>,
    cache: QueryCache,
    slots: [NodeSlot; FetchNode::COUNT],
    in_flight: FuturesUnordered<BoxFuture<'static, Result<Completion, QueryKey>>>,
    sink: Arc<dyn EventSink>,
    instance_id: Uuid,
}

impl EntityResolver {
    /// Creates a resolver with every node disabled.
    #[must_use]
    pub fn new(client: Arc<dyn ApiClient>, sink: Arc<dyn EventSink>, instance_id: Uuid) -> Self {
        Self {
            client,
            cache: QueryCache::new(),
            slots: std::array::from_fn(|_| NodeSlot::default()),
            in_flight: FuturesUnordered::new(),
            sink,
            instance_id,
        }
    }

    /// Fetches the legacy run detail for the effective run id.
    pub fn fetch_legacy_run(&mut self, run_id: Option<&str>) -> Result<(), SwitcherError> {
        self.fetch(FetchNode::LegacyRun, run_id.is_some(), run_id)
    }

    /// Fetches the next-generation run for the effective run id.
    pub fn fetch_next_gen_run(&mut self, run_id: Option<&str>) -> Result<(), SwitcherError> {
        self.fetch(FetchNode::NextGenRun, run_id.is_some(), run_id)
    }

    /// Fetches the recurring run being cloned.
    pub fn fetch_recurring_run(
        &mut self,
        recurring_run_id: Option<&str>,
    ) -> Result<(), SwitcherError> {
        self.fetch(
            FetchNode::RecurringRun,
            recurring_run_id.is_some(),
            recurring_run_id,
        )
    }

    /// Fetches the selected pipeline.
    pub fn fetch_pipeline(&mut self, pipeline_id: Option<&str>) -> Result<(), SwitcherError> {
        self.fetch(FetchNode::Pipeline, pipeline_id.is_some(), pipeline_id)
    }

    /// Fetches the target experiment.
    pub fn fetch_experiment(&mut self, experiment_id: Option<&str>) -> Result<(), SwitcherError> {
        self.fetch(FetchNode::Experiment, experiment_id.is_some(), experiment_id)
    }

    /// Fetches the pipeline version.
    ///
    /// Enabled once a pipeline or a next-gen run has settled with a value
    /// and a version id is resolvable (see
    /// [`resolve_pipeline_version_id`](Self::resolve_pipeline_version_id)).
    pub fn fetch_pipeline_version(
        &mut self,
        pipeline_version_id: Option<&str>,
    ) -> Result<(), SwitcherError> {
        let parent_ready = FetchNode::PipelineVersion
            .dependencies()
            .iter()
            .any(|parent| self.state(*parent).value().is_some());
        let version_id = self.resolve_pipeline_version_id(pipeline_version_id);
        if parent_ready && version_id.is_none() {
            debug!(instance = %self.instance_id, "No pipeline version id resolvable");
        }
        self.fetch(
            FetchNode::PipelineVersion,
            parent_ready && version_id.is_some(),
            version_id.as_deref(),
        )
    }

    /// Fetches the compiled template of the settled pipeline version.
    pub fn fetch_compiled_template(&mut self) -> Result<(), SwitcherError> {
        let version_id = self.pipeline_version().map(|version| version.id.clone());
        let enabled = version_id.is_some();
        self.fetch(
            FetchNode::CompiledTemplate,
            enabled,
            version_id.as_deref().filter(|id| !id.is_empty()),
        )
    }

    /// Resolves the version id: explicit parameter, then the pipeline's
    /// default version, then the next-gen run's recorded version.
    #[must_use]
    pub fn resolve_pipeline_version_id(&self, explicit: Option<&str>) -> Option<String> {
        let non_empty = |id: &String| !id.is_empty();
        explicit
            .map(str::to_owned)
            .filter(non_empty)
            .or_else(|| {
                self.pipeline()
                    .and_then(|pipeline| pipeline.default_version.as_ref())
                    .map(|version| version.id.clone())
                    .filter(non_empty)
            })
            .or_else(|| {
                self.next_gen_run()
                    .and_then(|run| run.pipeline_version_id.clone())
                    .filter(non_empty)
            })
    }

    /// Awaits the next in-flight fetch and applies it.
    ///
    /// Orphaned fetches complete as [`Applied::Discarded`] as soon as they
    /// are polled. Returns `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Applied> {
        match self.in_flight.next().await? {
            Ok(completion) => Some(self.apply(completion)),
            Err(orphaned) => Some(self.discard(orphaned)),
        }
    }

    /// Returns true if any fetch is awaiting completion.
    #[must_use]
    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Returns the number of distinct collaborator calls issued.
    #[must_use]
    pub fn network_calls(&self) -> usize {
        self.cache.len()
    }

    /// Returns the state of a node.
    #[must_use]
    pub fn state(&self, node: FetchNode) -> &FetchState<Entity> {
        &self.slots[node.index()].state
    }

    /// Returns the key a node is currently bound to.
    #[must_use]
    pub fn key(&self, node: FetchNode) -> Option<&QueryKey> {
        self.slots[node.index()].key.as_ref()
    }

    /// Returns the phase of every node.
    #[must_use]
    pub fn phases(&self) -> NodePhases {
        let mut phases = NodePhases::new();
        for node in FetchNode::ALL {
            phases.set(node, self.state(node).phase());
        }
        phases
    }

    /// Returns the first error among required nodes.
    #[must_use]
    pub fn required_failure(&self) -> Option<&SwitcherError> {
        FetchNode::ALL
            .into_iter()
            .filter(|node| node.is_required())
            .find_map(|node| self.state(node).error())
    }

    /// Returns the settled legacy run.
    #[must_use]
    pub fn legacy_run(&self) -> Option<&LegacyRun> {
        match self.state(FetchNode::LegacyRun).value() {
            Some(Entity::LegacyRun(run)) => Some(run),
            _ => None,
        }
    }

    /// Returns the settled next-gen run.
    #[must_use]
    pub fn next_gen_run(&self) -> Option<&NextGenRun> {
        match self.state(FetchNode::NextGenRun).value() {
            Some(Entity::NextGenRun(run)) => Some(run),
            _ => None,
        }
    }

    /// Returns the settled recurring run.
    #[must_use]
    pub fn recurring_run(&self) -> Option<&RecurringRun> {
        match self.state(FetchNode::RecurringRun).value() {
            Some(Entity::RecurringRun(job)) => Some(job),
            _ => None,
        }
    }

    /// Returns the settled pipeline.
    #[must_use]
    pub fn pipeline(&self) -> Option<&Pipeline> {
        match self.state(FetchNode::Pipeline).value() {
            Some(Entity::Pipeline(pipeline)) => Some(pipeline),
            _ => None,
        }
    }

    /// Returns the settled pipeline version.
    #[must_use]
    pub fn pipeline_version(&self) -> Option<&PipelineVersion> {
        match self.state(FetchNode::PipelineVersion).value() {
            Some(Entity::PipelineVersion(version)) => Some(version),
            _ => None,
        }
    }

    /// Returns the settled compiled template text.
    #[must_use]
    pub fn compiled_template(&self) -> Option<&str> {
        match self.state(FetchNode::CompiledTemplate).value() {
            Some(Entity::Template(text)) => Some(text),
            _ => None,
        }
    }

    /// Returns the settled experiment.
    #[must_use]
    pub fn experiment(&self) -> Option<&Experiment> {
        match self.state(FetchNode::Experiment).value() {
            Some(Entity::Experiment(experiment)) => Some(experiment),
            _ => None,
        }
    }

    fn fetch(
        &mut self,
        node: FetchNode,
        enabled: bool,
        id: Option<&str>,
    ) -> Result<(), SwitcherError> {
        if !enabled {
            self.disable(node);
            return Ok(());
        }
        let Some(id) = id else {
            return Err(self.fail_missing(node));
        };

        let key = QueryKey::new(node, id);
        if self.slots[node.index()].key.as_ref() == Some(&key) {
            return Ok(());
        }
        if let Some(previous) = self.orphan(node) {
            debug!(instance = %self.instance_id, superseded = %previous, current = %key, "Fetch re-keyed");
        }

        let client = Arc::clone(&self.client);
        let (fetch, reused) = self
            .cache
            .get_or_issue(&key, || issue(client, key.clone()));
        self.slots[node.index()] = NodeSlot {
            key: Some(key.clone()),
            state: FetchState::Pending,
            abort: None,
        };
        self.emit(if reused { FETCH_REUSED } else { FETCH_ISSUED }, &key, None);

        if let Some(outcome) = self.cache.settled(&key) {
            self.settle(key, outcome);
        } else {
            let (handle, registration) = AbortHandle::new_pair();
            let orphaned = key.clone();
            let completion = async move {
                let outcome = fetch.await;
                Completion { key, outcome }
            };
            self.in_flight.push(
                Abortable::new(completion, registration)
                    .map(move |result| result.map_err(|_| orphaned))
                    .boxed(),
            );
            self.slots[node.index()].abort = Some(handle);
        }
        Ok(())
    }

    fn disable(&mut self, node: FetchNode) {
        if let Some(previous) = self.orphan(node) {
            debug!(instance = %self.instance_id, orphaned = %previous, "Fetch disabled");
        }
        self.slots[node.index()].state = FetchState::Disabled;
    }

    /// Unbinds a node from its key and aborts the completion it awaits.
    fn orphan(&mut self, node: FetchNode) -> Option<QueryKey> {
        let slot = &mut self.slots[node.index()];
        if let Some(handle) = slot.abort.take() {
            handle.abort();
        }
        slot.key.take()
    }

    fn fail_missing(&mut self, node: FetchNode) -> SwitcherError {
        let err: SwitcherError = MissingIdentifierError::new(node).into();
        let slot = &self.slots[node.index()];
        let already_failed = slot.key.is_none()
            && matches!(slot.state, FetchState::Failed(SwitcherError::MissingIdentifier(_)));
        if !already_failed {
            self.orphan(node);
            self.slots[node.index()].state = FetchState::Failed(err.clone());
            warn!(instance = %self.instance_id, node = %node, "Enabled fetch has no identifier");
            self.sink.try_emit(
                FETCH_FAILED,
                Some(serde_json::json!({
                    "instance": self.instance_id.to_string(),
                    "node": node,
                    "error": err.to_string(),
                })),
            );
        }
        err
    }

    fn apply(&mut self, completion: Completion) -> Applied {
        let slot = &self.slots[completion.key.node.index()];
        if slot.key.as_ref() != Some(&completion.key) || !slot.state.is_pending() {
            return self.discard(completion.key);
        }
        self.slots[completion.key.node.index()].abort = None;
        Applied::Settled(self.settle(completion.key, completion.outcome))
    }

    fn discard(&mut self, key: QueryKey) -> Applied {
        debug!(instance = %self.instance_id, key = %key, "Discarding stale fetch result");
        self.emit(FETCH_DISCARDED, &key, None);
        Applied::Discarded(key)
    }

    fn settle(&mut self, key: QueryKey, outcome: FetchOutcome) -> Settlement {
        let state = match outcome {
            Ok(Some(entity)) => FetchState::Ready(entity),
            Ok(None) => FetchState::Empty,
            Err(err) => FetchState::Failed(err),
        };
        let phase = state.phase();
        let error = state.error().map(ToString::to_string);
        self.slots[key.node.index()].state = state;

        if let Some(error) = error {
            warn!(instance = %self.instance_id, key = %key, error = %error, "Fetch failed");
            self.emit(FETCH_FAILED, &key, Some(error));
        } else {
            debug!(instance = %self.instance_id, key = %key, phase = %phase, "Fetch settled");
            self.emit(FETCH_SETTLED, &key, None);
        }

        Settlement {
            key,
            phase,
            settled_at: Utc::now(),
        }
    }

    fn emit(&self, event_type: &str, key: &QueryKey, error: Option<String>) {
        let mut data = serde_json::json!({
            "instance": self.instance_id.to_string(),
            "node": key.node,
            "id": key.id,
            "phase": self.state(key.node).phase(),
        });
        if let Some(error) = error {
            data["error"] = serde_json::Value::String(error);
        }
        self.sink.try_emit(event_type, Some(data));
    }
}

impl fmt::Debug for EntityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityResolver")
            .field("instance_id", &self.instance_id)
            .field("phases", &self.phases())
            .field("cache", &self.cache)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

fn issue(client: Arc<dyn ApiClient>, key: QueryKey) -> BoxFuture<'static, FetchOutcome> {
    async move {
        let id = key.id.as_str();
        let result = match key.node {
            FetchNode::LegacyRun => client.get_legacy_run(id).await.map(Entity::LegacyRun),
            FetchNode::NextGenRun => client.get_next_gen_run(id).await.map(Entity::NextGenRun),
            FetchNode::RecurringRun => {
                client.get_recurring_run(id).await.map(Entity::RecurringRun)
            }
            FetchNode::Pipeline => client.get_pipeline(id).await.map(Entity::Pipeline),
            FetchNode::PipelineVersion => client
                .get_pipeline_version(id)
                .await
                .map(Entity::PipelineVersion),
            FetchNode::CompiledTemplate => client
                .get_compiled_template(id)
                .await
                .map(|compiled| Entity::Template(compiled.template.unwrap_or_default())),
            FetchNode::Experiment => client.get_experiment(id).await.map(Entity::Experiment),
        };

        match result {
            Ok(entity) => Ok(Some(entity)),
            Err(source) if source.is_not_found() && key.node.is_run_lookup() => Ok(None),
            Err(source) => Err(UpstreamFetchError::new(key.node, id, source).into()),
        }
    }
    .boxed()
}
