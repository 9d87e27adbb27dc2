//! Identifier extraction.

use serde::{Deserialize, Serialize};

use super::{QueryParam, RequestContext};

/// Optional identifiers derived from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifiers {
    /// Run being cloned.
    pub cloned_run_id: Option<String>,
    /// Run whose pipeline is embedded.
    pub embedded_run_id: Option<String>,
    /// Recurring run being cloned.
    pub cloned_recurring_run_id: Option<String>,
    /// Selected pipeline.
    pub pipeline_id: Option<String>,
    /// Selected pipeline version.
    pub pipeline_version_id: Option<String>,
    /// Target experiment.
    pub experiment_id: Option<String>,
}

impl Identifiers {
    /// Extracts identifiers verbatim from the request.
    #[must_use]
    pub fn extract(ctx: &RequestContext) -> Self {
        let get = |param| ctx.get(param).map(str::to_owned);
        Self {
            cloned_run_id: get(QueryParam::CloneFromRun),
            embedded_run_id: get(QueryParam::FromRunId),
            cloned_recurring_run_id: get(QueryParam::CloneFromRecurringRun),
            pipeline_id: get(QueryParam::PipelineId),
            pipeline_version_id: get(QueryParam::PipelineVersionId),
            experiment_id: get(QueryParam::ExperimentId),
        }
    }

    /// The cloned run id if present, else the embedded run id.
    #[must_use]
    pub fn effective_run_id(&self) -> Option<&str> {
        self.cloned_run_id
            .as_deref()
            .or(self.embedded_run_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_all_identifiers() {
        let ctx = RequestContext::new()
            .with_param(QueryParam::CloneFromRun, "R1")
            .with_param(QueryParam::FromRunId, "R2")
            .with_param(QueryParam::CloneFromRecurringRun, "J1")
            .with_param(QueryParam::PipelineId, "P1")
            .with_param(QueryParam::PipelineVersionId, "V1")
            .with_param(QueryParam::ExperimentId, "E1");

        let ids = Identifiers::extract(&ctx);

        assert_eq!(
            ids,
            Identifiers {
                cloned_run_id: Some("R1".into()),
                embedded_run_id: Some("R2".into()),
                cloned_recurring_run_id: Some("J1".into()),
                pipeline_id: Some("P1".into()),
                pipeline_version_id: Some("V1".into()),
                experiment_id: Some("E1".into()),
            }
        );
    }

    #[test]
    fn test_effective_run_id_prefers_cloned_run() {
        let ctx = RequestContext::new()
            .with_param(QueryParam::CloneFromRun, "R1")
            .with_param(QueryParam::FromRunId, "R2");
        assert_eq!(Identifiers::extract(&ctx).effective_run_id(), Some("R1"));

        let ctx = RequestContext::new().with_param(QueryParam::FromRunId, "R2");
        assert_eq!(Identifiers::extract(&ctx).effective_run_id(), Some("R2"));
    }

    #[test]
    fn test_extract_from_empty_request() {
        let ids = Identifiers::extract(&RequestContext::new());
        assert_eq!(ids, Identifiers::default());
        assert!(ids.effective_run_id().is_none());
    }

    #[test]
    fn test_identifiers_are_not_normalized() {
        let ctx = RequestContext::new().with_param(QueryParam::PipelineId, " P1 ");
        assert_eq!(Identifiers::extract(&ctx).pipeline_id.as_deref(), Some(" P1 "));
    }
}
