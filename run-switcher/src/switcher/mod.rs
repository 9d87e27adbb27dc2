//! The run switcher.
//!
//! Ties the pieces together for one new-run page instance: identifiers
//! are extracted once, every enabled fetch is issued at construction, and
//! each settlement or selection change re-evaluates the fetch graph. The
//! classifier and gate are pure over the current state, so [`RunSwitcher::present`]
//! can be called at any point.

use futures::FutureExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Instrument, Span};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::classifier::{self, ClassifierInputs, ModeDecision};
use crate::config::{FeatureFlags, FeatureKey};
use crate::context::{Identifiers, RequestContext};
use crate::core::{FetchNode, QueryKey};
use crate::errors::SwitcherError;
use crate::events::{EventSink, NoOpEventSink, MODE_RESOLVED, SELECTION_CHANGED};
use crate::gate::{self, EditorSnapshot, Presentation, ResolvedRun, SelectionChange, SelectionHandle};
use crate::observability::switcher_span;
use crate::resolver::{Applied, EntityResolver, Settlement};
use crate::template::{materialize, TemplateText};


/// Something that changed the switcher's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverEvent {
    /// A fetch settled on its node.
    Settled(Settlement),
    /// A stale fetch result was dropped.
    Discarded(QueryKey),
    /// The editor changed the pipeline selection.
    SelectionChanged(SelectionChange),
}

impl From<Applied> for ResolverEvent {
    fn from(applied: Applied) -> Self {
        match applied {
            Applied::Settled(settlement) => Self::Settled(settlement),
            Applied::Discarded(key) => Self::Discarded(key),
        }
    }
}

/// Resolves which new-run editor to present.
pub struct RunSwitcher {
    instance_id: Uuid,
    namespace: Option<String>,
    identifiers: Identifiers,
    resolver: EntityResolver,
    flags: Arc<dyn FeatureFlags>,
    sink: Arc<dyn EventSink>,
    selection_tx: mpsc::UnboundedSender<SelectionChange>,
    selection_rx: mpsc::UnboundedReceiver<SelectionChange>,
    span: Span,
}

impl RunSwitcher {
    /// Creates a switcher and issues every enabled fetch.
    #[must_use]
    pub fn new(
        ctx: &RequestContext,
        client: Arc<dyn ApiClient>,
        flags: Arc<dyn FeatureFlags>,
    ) -> Self {
        Self::with_event_sink(ctx, client, flags, Arc::new(NoOpEventSink))
    }

    /// Creates a switcher reporting to the given event sink.
    #[must_use]
    pub fn with_event_sink(
        ctx: &RequestContext,
        client: Arc<dyn ApiClient>,
        flags: Arc<dyn FeatureFlags>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let instance_id = Uuid::new_v4();
        let namespace = ctx.namespace().map(str::to_owned);
        let span = switcher_span(instance_id, namespace.as_deref());
        let (selection_tx, selection_rx) = mpsc::unbounded_channel();

        let mut switcher = Self {
            instance_id,
            namespace,
            identifiers: Identifiers::extract(ctx),
            resolver: EntityResolver::new(client, Arc::clone(&sink), instance_id),
            flags,
            sink,
            selection_tx,
            selection_rx,
            span,
        };
        switcher.evaluate();
        switcher
    }

    /// Returns the instance id.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Returns the current identifiers.
    #[must_use]
    pub fn identifiers(&self) -> &Identifiers {
        &self.identifiers
    }

    /// Returns the entity resolver.
    #[must_use]
    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// Returns the number of distinct collaborator calls issued.
    #[must_use]
    pub fn network_calls(&self) -> usize {
        self.resolver.network_calls()
    }

    /// Returns mutators that can be handed to an editor.
    #[must_use]
    pub fn selection_handle(&self) -> SelectionHandle {
        SelectionHandle::new(self.selection_tx.clone())
    }

    /// Selects a different pipeline and re-keys dependent fetches.
    pub fn set_pipeline_id(&mut self, pipeline_id: Option<String>) {
        self.apply_selection(SelectionChange::PipelineId(pipeline_id));
    }

    /// Selects a different pipeline version and re-keys dependent fetches.
    pub fn set_pipeline_version_id(&mut self, pipeline_version_id: Option<String>) {
        self.apply_selection(SelectionChange::PipelineVersionId(pipeline_version_id));
    }

    /// Awaits the next settlement or selection change.
    ///
    /// Queued selection changes are applied first. Returns `None` once no
    /// change is queued and nothing is in flight.
    pub async fn next_event(&mut self) -> Option<ResolverEvent> {
        if let Ok(change) = self.selection_rx.try_recv() {
            return Some(self.apply_selection(change));
        }
        if !self.resolver.has_in_flight() {
            return None;
        }

        tokio::select! {
            biased;
            Some(change) = self.selection_rx.recv() => Some(self.apply_selection(change)),
            Some(applied) = self.resolver.next_completion() => {
                self.evaluate();
                Some(applied.into())
            }
            else => None,
        }
    }

    /// Drives resolution until no required fetch is pending and presents
    /// the result.
    ///
    /// Once every required node has settled, only events that are already
    /// ready are applied, so a hung experiment fetch never blocks the
    /// decision. A run/recurring-run conflict stops resolution immediately.
    pub async fn resolve(&mut self) -> Presentation {
        let span = self.span.clone();
        async {
            loop {
                if let Err(err @ SwitcherError::MutualExclusion(_)) = self.classify() {
                    warn!(error = %err, "Aborting resolution");
                    break;
                }
                let event = if self.resolver.phases().pending_required().is_empty() {
                    self.next_event().now_or_never().flatten()
                } else {
                    self.next_event().await
                };
                if event.is_none() {
                    break;
                }
            }

            let presentation = self.present();
            self.report(&presentation);
            presentation
        }
        .instrument(span)
        .await
    }

    /// Classifies the current state.
    pub fn classify(&self) -> Result<ModeDecision, SwitcherError> {
        self.decide().map(|(decision, _)| decision)
    }

    /// Returns the template materialized from the current state.
    pub fn template(&self) -> Result<TemplateText, SwitcherError> {
        materialize(
            self.resolver.next_gen_run(),
            self.resolver.recurring_run(),
            self.resolver.compiled_template(),
        )
    }

    /// Gates presentation on the current state.
    #[must_use]
    pub fn present(&self) -> Presentation {
        match self.decide() {
            Ok((decision, template)) => gate::present(
                decision,
                self.resolver.state(FetchNode::Experiment).error(),
                || self.snapshot(template),
            ),
            Err(err) => Presentation::Failed(err),
        }
    }

    fn decide(&self) -> Result<(ModeDecision, TemplateText), SwitcherError> {
        let template = self.template()?;
        let decision = classifier::classify(&ClassifierInputs {
            phases: self.resolver.phases(),
            failure: self.resolver.required_failure(),
            template: &template,
            next_gen_enabled: self.flags.is_enabled(FeatureKey::V2Alpha),
            effective_run_id: self.identifiers.effective_run_id(),
            recurring_run_id: self.identifiers.cloned_recurring_run_id.as_deref(),
        })?;
        Ok((decision, template))
    }

    fn snapshot(&self, template: TemplateText) -> EditorSnapshot {
        let ids = &self.identifiers;
        let resolved_run = self
            .resolver
            .next_gen_run()
            .cloned()
            .map(ResolvedRun::NextGen)
            .or_else(|| self.resolver.legacy_run().cloned().map(ResolvedRun::Legacy));

        EditorSnapshot {
            namespace: self.namespace.clone(),
            effective_run_id: ids.effective_run_id().map(str::to_owned),
            cloned_recurring_run_id: ids.cloned_recurring_run_id.clone(),
            pipeline_id: ids.pipeline_id.clone(),
            pipeline_version_id: ids.pipeline_version_id.clone(),
            resolved_run,
            resolved_recurring_run: self.resolver.recurring_run().cloned(),
            resolved_pipeline: self.resolver.pipeline().cloned(),
            resolved_pipeline_version: self.resolver.pipeline_version().cloned(),
            template,
            resolved_experiment: self.resolver.experiment().cloned(),
            selection: self.selection_handle(),
        }
    }

    /// Re-runs every fetch operation against the current state.
    ///
    /// Order matters: each dependent node is evaluated after its parents so
    /// a cached parent settles its children in the same pass.
    fn evaluate(&mut self) {
        let _guard = self.span.enter();
        let ids = &self.identifiers;
        let resolver = &mut self.resolver;

        for node in FetchNode::ALL {
            let result = match node {
                FetchNode::LegacyRun => resolver.fetch_legacy_run(ids.effective_run_id()),
                FetchNode::NextGenRun => resolver.fetch_next_gen_run(ids.effective_run_id()),
                FetchNode::RecurringRun => {
                    resolver.fetch_recurring_run(ids.cloned_recurring_run_id.as_deref())
                }
                FetchNode::Pipeline => resolver.fetch_pipeline(ids.pipeline_id.as_deref()),
                FetchNode::Experiment => resolver.fetch_experiment(ids.experiment_id.as_deref()),
                FetchNode::PipelineVersion => {
                    resolver.fetch_pipeline_version(ids.pipeline_version_id.as_deref())
                }
                FetchNode::CompiledTemplate => resolver.fetch_compiled_template(),
            };
            if let Err(err) = result {
                warn!(node = %node, error = %err, "Fetch operation rejected");
            }
        }
    }

    fn apply_selection(&mut self, change: SelectionChange) -> ResolverEvent {
        let normalize = |id: Option<String>| id.filter(|id| !id.is_empty());
        match change.clone() {
            SelectionChange::PipelineId(id) => self.identifiers.pipeline_id = normalize(id),
            SelectionChange::PipelineVersionId(id) => {
                self.identifiers.pipeline_version_id = normalize(id);
            }
        }

        {
            let _guard = self.span.enter();
            info!(change = ?change, "Selection changed");
        }
        self.sink.try_emit(
            SELECTION_CHANGED,
            serde_json::to_value(&change).ok().map(|change| {
                serde_json::json!({
                    "instance": self.instance_id.to_string(),
                    "change": change,
                })
            }),
        );

        self.evaluate();
        ResolverEvent::SelectionChanged(change)
    }

    fn report(&self, presentation: &Presentation) {
        match presentation {
            Presentation::Failed(err) => {
                warn!(error = %err, fatal = err.is_fatal(), "Resolution failed");
            }
            Presentation::Loading => debug!("Resolution still loading"),
            Presentation::LegacyEditor(snapshot) | Presentation::NextGenEditor(snapshot) => {
                let mode = presentation.mode();
                let reason = self.classify().ok().map(|decision| decision.reason);
                info!(
                    mode = ?mode,
                    reason = ?reason,
                    source = ?snapshot.template.source(),
                    network_calls = self.network_calls(),
                    "Mode resolved"
                );
                self.sink.try_emit(
                    MODE_RESOLVED,
                    Some(serde_json::json!({
                        "instance": self.instance_id.to_string(),
                        "mode": mode,
                        "reason": reason,
                        "template_source": snapshot.template.source(),
                        "template_digest": snapshot.template.digest(),
                        "network_calls": self.network_calls(),
                    })),
                );
            }
        }
    }
}

impl fmt::Debug for RunSwitcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunSwitcher")
            .field("instance_id", &self.instance_id)
            .field("namespace", &self.namespace)
            .field("identifiers", &self.identifiers)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
