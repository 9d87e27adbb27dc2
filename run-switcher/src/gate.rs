//! Presentation gate.
//!
//! Holds a loading placeholder until classification is terminal, then
//! hands the chosen editor a snapshot of everything resolved so far.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::classifier::ModeDecision;
use crate::core::{Experiment, LegacyRun, NextGenRun, Pipeline, PipelineVersion, RecurringRun, ResolvedMode};
use crate::errors::SwitcherError;
use crate::template::TemplateText;

/// A change to the editor's pipeline selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "field", content = "value")]
pub enum SelectionChange {
    /// The pipeline id changed.
    PipelineId(Option<String>),
    /// The pipeline version id changed.
    PipelineVersionId(Option<String>),
}

/// Mutators handed to the editor.
///
/// Changes are queued and applied by the switcher's event loop, which
/// re-keys the affected fetches.
#[derive(Debug, Clone)]
pub struct SelectionHandle {
    tx: mpsc::UnboundedSender<SelectionChange>,
}

impl SelectionHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SelectionChange>) -> Self {
        Self { tx }
    }

    /// Selects a different pipeline.
    pub fn set_pipeline_id(&self, pipeline_id: Option<String>) {
        self.send(SelectionChange::PipelineId(pipeline_id));
    }

    /// Selects a different pipeline version.
    pub fn set_pipeline_version_id(&self, pipeline_version_id: Option<String>) {
        self.send(SelectionChange::PipelineVersionId(pipeline_version_id));
    }

    fn send(&self, change: SelectionChange) {
        if let Err(e) = self.tx.send(change) {
            debug!(change = ?e.0, "Switcher dropped; selection change ignored");
        }
    }
}

/// The run the editor clones from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedRun {
    /// A run of the legacy engine.
    Legacy(LegacyRun),
    /// A next-generation run.
    NextGen(NextGenRun),
}

impl ResolvedRun {
    /// Returns the run id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Legacy(run) => run.id(),
            Self::NextGen(run) => &run.run_id,
        }
    }
}

/// Read-only view forwarded to the chosen editor.
#[derive(Debug, Clone)]
pub struct EditorSnapshot {
    /// Namespace the editor operates in.
    pub namespace: Option<String>,
    /// Cloned run id, else embedded run id.
    pub effective_run_id: Option<String>,
    /// Cloned recurring run id.
    pub cloned_recurring_run_id: Option<String>,
    /// Currently selected pipeline.
    pub pipeline_id: Option<String>,
    /// Currently selected pipeline version.
    pub pipeline_version_id: Option<String>,
    /// The resolved run; next-gen wins when both generations answer.
    pub resolved_run: Option<ResolvedRun>,
    /// The resolved recurring run.
    pub resolved_recurring_run: Option<RecurringRun>,
    /// The resolved pipeline.
    pub resolved_pipeline: Option<Pipeline>,
    /// The resolved pipeline version.
    pub resolved_pipeline_version: Option<PipelineVersion>,
    /// The materialized template.
    pub template: TemplateText,
    /// The resolved experiment.
    pub resolved_experiment: Option<Experiment>,
    /// Selection mutators.
    pub selection: SelectionHandle,
}

/// What the page shows.
#[derive(Debug, Clone)]
pub enum Presentation {
    /// Placeholder while classification inputs are incomplete.
    Loading,
    /// An unrecoverable or upstream error.
    Failed(SwitcherError),
    /// The legacy editor.
    LegacyEditor(EditorSnapshot),
    /// The next-generation editor.
    NextGenEditor(EditorSnapshot),
}

impl Presentation {
    /// Returns the presented mode, or `None` for a failure.
    #[must_use]
    pub fn mode(&self) -> Option<ResolvedMode> {
        match self {
            Self::Loading => Some(ResolvedMode::Loading),
            Self::Failed(_) => None,
            Self::LegacyEditor(_) => Some(ResolvedMode::LegacyEditor),
            Self::NextGenEditor(_) => Some(ResolvedMode::NextGenEditor),
        }
    }

    /// Returns the snapshot handed to an editor.
    #[must_use]
    pub fn snapshot(&self) -> Option<&EditorSnapshot> {
        match self {
            Self::LegacyEditor(snapshot) | Self::NextGenEditor(snapshot) => Some(snapshot),
            Self::Loading | Self::Failed(_) => None,
        }
    }

    /// Returns the surfaced error.
    #[must_use]
    pub fn error(&self) -> Option<&SwitcherError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true while the placeholder is shown.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Gates presentation on a classification.
///
/// The snapshot is only built when an editor is shown. A failed
/// experiment fetch is surfaced once classification is terminal.
pub fn present<F>(
    decision: ModeDecision,
    experiment_failure: Option<&SwitcherError>,
    snapshot: F,
) -> Presentation
where
    F: FnOnce() -> EditorSnapshot,
{
    if !decision.is_resolved() {
        return Presentation::Loading;
    }
    if let Some(err) = experiment_failure {
        return Presentation::Failed(err.clone());
    }
    match decision.mode {
        ResolvedMode::NextGenEditor => Presentation::NextGenEditor(snapshot()),
        ResolvedMode::LegacyEditor | ResolvedMode::Loading => {
            Presentation::LegacyEditor(snapshot())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::classifier::DecisionReason;
    use crate::core::FetchNode;
    use crate::errors::UpstreamFetchError;

    fn snapshot(selection: SelectionHandle) -> EditorSnapshot {
        EditorSnapshot {
            namespace: None,
            effective_run_id: Some("R1".into()),
            cloned_recurring_run_id: None,
            pipeline_id: None,
            pipeline_version_id: None,
            resolved_run: None,
            resolved_recurring_run: None,
            resolved_pipeline: None,
            resolved_pipeline_version: None,
            template: TemplateText::empty(),
            resolved_experiment: None,
            selection,
        }
    }

    fn decision(mode: ResolvedMode) -> ModeDecision {
        ModeDecision {
            mode,
            reason: DecisionReason::LegacyFormat,
        }
    }

    #[test]
    fn test_loading_never_builds_snapshot() {
        let presentation = present(decision(ResolvedMode::Loading), None, || {
            panic!("snapshot built while loading")
        });
        assert!(presentation.is_loading());
        assert!(presentation.snapshot().is_none());
    }

    #[test]
    fn test_editor_receives_snapshot() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let presentation = present(decision(ResolvedMode::NextGenEditor), None, || {
            snapshot(SelectionHandle::new(tx))
        });

        assert_eq!(presentation.mode(), Some(ResolvedMode::NextGenEditor));
        assert_eq!(
            presentation.snapshot().and_then(|s| s.effective_run_id.as_deref()),
            Some("R1")
        );
    }

    #[test]
    fn test_experiment_failure_is_surfaced() {
        let err: SwitcherError =
            UpstreamFetchError::new(FetchNode::Experiment, "E1", ApiError::not_found("E1"))
                .into();
        let (tx, _rx) = mpsc::unbounded_channel();

        let presentation = present(decision(ResolvedMode::LegacyEditor), Some(&err), || {
            snapshot(SelectionHandle::new(tx))
        });

        assert!(presentation.mode().is_none());
        assert!(matches!(presentation.error(), Some(SwitcherError::UpstreamFetch(_))));
    }

    #[test]
    fn test_selection_handle_queues_changes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = SelectionHandle::new(tx);

        handle.set_pipeline_id(Some("P2".into()));
        handle.set_pipeline_version_id(None);

        assert_eq!(rx.try_recv().unwrap(), SelectionChange::PipelineId(Some("P2".into())));
        assert_eq!(rx.try_recv().unwrap(), SelectionChange::PipelineVersionId(None));
    }

    #[test]
    fn test_selection_after_drop_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        SelectionHandle::new(tx).set_pipeline_id(Some("P2".into()));
    }

    #[test]
    fn test_resolved_run_id() {
        let run = ResolvedRun::NextGen(NextGenRun {
            run_id: "R9".into(),
            ..Default::default()
        });
        assert_eq!(run.id(), "R9");
    }
}
