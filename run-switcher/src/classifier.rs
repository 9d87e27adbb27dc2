//! Mode classification.
//!
//! A pure function of fetch phases, the feature flag and the materialized
//! template. It is re-run after every settlement; the first rule that
//! applies decides.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{FetchNode, NodePhases, ResolvedMode};
use crate::errors::{MutualExclusionViolation, SwitcherError};
use crate::template::{TemplateFormat, TemplateText};

/// Everything the classifier reads.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInputs<'a> {
    /// Phase of every fetch node.
    pub phases: NodePhases,
    /// First failure among required nodes.
    pub failure: Option<&'a SwitcherError>,
    /// The materialized template.
    pub template: &'a TemplateText,
    /// Whether the next-generation editor is allowed.
    pub next_gen_enabled: bool,
    /// Effective run id, for error reporting.
    pub effective_run_id: Option<&'a str>,
    /// Cloned recurring run id, for error reporting.
    pub recurring_run_id: Option<&'a str>,
}

/// Why a mode was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// A required fetch has not settled.
    AwaitingFetches,
    /// The next-generation feature is off.
    FeatureDisabled,
    /// No run, recurring run or compiled template resolved.
    NoTemplateSource,
    /// A source resolved but produced no template text.
    TemplateUnresolvable,
    /// The template is a legacy workflow.
    LegacyFormat,
    /// The template is a next-generation spec.
    NextGenFormat,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingFetches => "awaiting_fetches",
            Self::FeatureDisabled => "feature_disabled",
            Self::NoTemplateSource => "no_template_source",
            Self::TemplateUnresolvable => "template_unresolvable",
            Self::LegacyFormat => "legacy_format",
            Self::NextGenFormat => "next_gen_format",
        };
        f.write_str(name)
    }
}

/// A classified mode with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDecision {
    /// The resolved mode.
    pub mode: ResolvedMode,
    /// The deciding rule.
    pub reason: DecisionReason,
}

impl ModeDecision {
    const fn new(mode: ResolvedMode, reason: DecisionReason) -> Self {
        Self { mode, reason }
    }

    /// Returns true if the decision is terminal.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.mode != ResolvedMode::Loading
    }
}

/// Classifies the editor mode.
///
/// Errors on the run/recurring-run exclusion first so it is never masked
/// by a pending fetch, then on any required failure once nothing required
/// is pending.
pub fn classify(inputs: &ClassifierInputs<'_>) -> Result<ModeDecision, SwitcherError> {
    let phases = &inputs.phases;

    let run_ready =
        phases.is_ready(FetchNode::LegacyRun) || phases.is_ready(FetchNode::NextGenRun);
    if run_ready && phases.is_ready(FetchNode::RecurringRun) {
        return Err(MutualExclusionViolation::new(
            inputs.effective_run_id,
            inputs.recurring_run_id,
        )
        .into());
    }

    if !phases.pending_required().is_empty() {
        return Ok(ModeDecision::new(
            ResolvedMode::Loading,
            DecisionReason::AwaitingFetches,
        ));
    }

    if let Some(err) = inputs.failure {
        return Err(err.clone());
    }

    if !inputs.next_gen_enabled {
        return Ok(ModeDecision::new(
            ResolvedMode::LegacyEditor,
            DecisionReason::FeatureDisabled,
        ));
    }

    let has_source = [
        FetchNode::NextGenRun,
        FetchNode::RecurringRun,
        FetchNode::CompiledTemplate,
    ]
    .into_iter()
    .any(|node| phases.is_ready(node));
    if !has_source {
        return Ok(ModeDecision::new(
            ResolvedMode::LegacyEditor,
            DecisionReason::NoTemplateSource,
        ));
    }

    if inputs.template.is_empty() {
        return Ok(ModeDecision::new(
            ResolvedMode::LegacyEditor,
            DecisionReason::TemplateUnresolvable,
        ));
    }

    Ok(match inputs.template.format() {
        TemplateFormat::NextGen => {
            ModeDecision::new(ResolvedMode::NextGenEditor, DecisionReason::NextGenFormat)
        }
        TemplateFormat::Legacy => {
            ModeDecision::new(ResolvedMode::LegacyEditor, DecisionReason::LegacyFormat)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::core::FetchPhase;
    use crate::errors::UpstreamFetchError;
    use crate::template::TemplateSource;
    use crate::testing::fixtures;
    use pretty_assertions::assert_eq;

    fn inputs<'a>(phases: NodePhases, template: &'a TemplateText) -> ClassifierInputs<'a> {
        ClassifierInputs {
            phases,
            failure: None,
            template,
            next_gen_enabled: true,
            effective_run_id: None,
            recurring_run_id: None,
        }
    }

    fn next_gen_template() -> TemplateText {
        TemplateText::new(fixtures::NEXT_GEN_TEMPLATE, TemplateSource::CompiledTemplate)
    }

    #[test]
    fn test_pending_required_is_loading() {
        let template = TemplateText::empty();
        let phases = NodePhases::new().with(FetchNode::Pipeline, FetchPhase::Pending);

        let decision = classify(&inputs(phases, &template)).unwrap();

        assert_eq!(decision.mode, ResolvedMode::Loading);
        assert!(!decision.is_resolved());
    }

    #[test]
    fn test_pending_experiment_does_not_hold() {
        let template = TemplateText::empty();
        let phases = NodePhases::new().with(FetchNode::Experiment, FetchPhase::Pending);

        let decision = classify(&inputs(phases, &template)).unwrap();

        assert_eq!(decision.mode, ResolvedMode::LegacyEditor);
        assert_eq!(decision.reason, DecisionReason::NoTemplateSource);
    }

    #[test]
    fn test_flag_off_is_legacy() {
        let template = next_gen_template();
        let phases = NodePhases::new().with(FetchNode::CompiledTemplate, FetchPhase::Ready);
        let mut inputs = inputs(phases, &template);
        inputs.next_gen_enabled = false;

        let decision = classify(&inputs).unwrap();

        assert_eq!(decision.mode, ResolvedMode::LegacyEditor);
        assert_eq!(decision.reason, DecisionReason::FeatureDisabled);
    }

    #[test]
    fn test_next_gen_template_selects_next_gen_editor() {
        let template = next_gen_template();
        let phases = NodePhases::new().with(FetchNode::CompiledTemplate, FetchPhase::Ready);

        let decision = classify(&inputs(phases, &template)).unwrap();

        assert_eq!(decision.mode, ResolvedMode::NextGenEditor);
    }

    #[test]
    fn test_legacy_template_selects_legacy_editor() {
        let template =
            TemplateText::new(fixtures::LEGACY_TEMPLATE, TemplateSource::RecurringRun);
        let phases = NodePhases::new().with(FetchNode::RecurringRun, FetchPhase::Ready);

        let decision = classify(&inputs(phases, &template)).unwrap();

        assert_eq!(decision.mode, ResolvedMode::LegacyEditor);
        assert_eq!(decision.reason, DecisionReason::LegacyFormat);
    }

    #[test]
    fn test_empty_template_is_unresolvable() {
        let template = TemplateText::empty();
        let phases = NodePhases::new().with(FetchNode::CompiledTemplate, FetchPhase::Ready);

        let decision = classify(&inputs(phases, &template)).unwrap();

        assert_eq!(decision.reason, DecisionReason::TemplateUnresolvable);
        assert_eq!(decision.mode, ResolvedMode::LegacyEditor);
    }

    #[test]
    fn test_run_and_recurring_run_are_exclusive() {
        let template = TemplateText::empty();
        let phases = NodePhases::new()
            .with(FetchNode::LegacyRun, FetchPhase::Ready)
            .with(FetchNode::RecurringRun, FetchPhase::Ready)
            .with(FetchNode::Pipeline, FetchPhase::Pending);
        let mut inputs = inputs(phases, &template);
        inputs.effective_run_id = Some("R1");
        inputs.recurring_run_id = Some("J1");

        let err = classify(&inputs).unwrap_err();

        assert!(matches!(err, SwitcherError::MutualExclusion(ref e)
            if e.run_id.as_deref() == Some("R1") && e.recurring_run_id.as_deref() == Some("J1")));
    }

    #[test]
    fn test_failure_waits_for_pending() {
        let template = TemplateText::empty();
        let err: SwitcherError =
            UpstreamFetchError::new(FetchNode::Pipeline, "P1", ApiError::transport("down")).into();
        let phases = NodePhases::new()
            .with(FetchNode::Pipeline, FetchPhase::Failed)
            .with(FetchNode::RecurringRun, FetchPhase::Pending);
        let mut pending = inputs(phases, &template);
        pending.failure = Some(&err);

        assert_eq!(classify(&pending).unwrap().mode, ResolvedMode::Loading);

        let mut settled = pending;
        settled.phases = phases.with(FetchNode::RecurringRun, FetchPhase::Empty);
        assert!(matches!(
            classify(&settled),
            Err(SwitcherError::UpstreamFetch(_))
        ));
    }
}
