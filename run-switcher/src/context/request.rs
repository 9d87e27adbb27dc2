//! Read-only request context of a new-run page load.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Query parameters understood by the new-run page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryParam {
    /// Run to clone.
    CloneFromRun,
    /// Run whose pipeline is embedded in the new run.
    FromRunId,
    /// Recurring run to clone.
    CloneFromRecurringRun,
    /// Pipeline to start from.
    PipelineId,
    /// Pipeline version to start from.
    PipelineVersionId,
    /// Experiment to create the run in.
    ExperimentId,
}

impl QueryParam {
    /// All query parameters.
    pub const ALL: [Self; 6] = [
        Self::CloneFromRun,
        Self::FromRunId,
        Self::CloneFromRecurringRun,
        Self::PipelineId,
        Self::PipelineVersionId,
        Self::ExperimentId,
    ];

    /// Returns the query-string key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CloneFromRun => "cloneFromRun",
            Self::FromRunId => "fromRunId",
            Self::CloneFromRecurringRun => "cloneFromRecurringRun",
            Self::PipelineId => "pipelineId",
            Self::PipelineVersionId => "pipelineVersionId",
            Self::ExperimentId => "experimentId",
        }
    }
}

impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable bag of query parameters for one page load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    params: HashMap<String, String>,
    namespace: Option<String>,
}

impl RequestContext {
    /// Creates an empty request context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request context from decoded query pairs.
    ///
    /// When a key repeats, the first occurrence wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = HashMap::new();
        for (key, value) in pairs {
            params.entry(key.into()).or_insert_with(|| value.into());
        }
        Self {
            params,
            namespace: None,
        }
    }

    /// Sets a query parameter.
    #[must_use]
    pub fn with_param(mut self, param: QueryParam, value: impl Into<String>) -> Self {
        self.params.insert(param.as_str().to_string(), value.into());
        self
    }

    /// Sets the namespace the page operates in.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Returns a query parameter. Empty values read as absent.
    #[must_use]
    pub fn get(&self, param: QueryParam) -> Option<&str> {
        self.params
            .get(param.as_str())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Returns the namespace.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_first_occurrence_wins() {
        let ctx = RequestContext::from_pairs([("pipelineId", "P1"), ("pipelineId", "P2")]);
        assert_eq!(ctx.get(QueryParam::PipelineId), Some("P1"));
    }

    #[test]
    fn test_empty_value_reads_as_absent() {
        let ctx = RequestContext::new().with_param(QueryParam::CloneFromRun, "");
        assert_eq!(ctx.get(QueryParam::CloneFromRun), None);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let ctx = RequestContext::from_pairs([("foo", "bar")]);
        assert!(QueryParam::ALL.iter().all(|p| ctx.get(*p).is_none()));
    }
}
