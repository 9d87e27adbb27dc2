//! Error types for run-mode resolution.
//!
//! Invariant violations (`MissingIdentifier`, `MutualExclusionViolation`)
//! abort presentation; upstream fetch failures are surfaced as an error
//! state. Absence of an optional identifier is never an error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::api::ApiError;
use crate::core::FetchNode;

/// The main error type for run-mode resolution.
#[derive(Debug, Clone, Error)]
pub enum SwitcherError {
    /// An enabled fetch had no governing identifier.
    #[error("{0}")]
    MissingIdentifier(#[from] MissingIdentifierError),

    /// A run and a recurring run both resolved for the same request.
    #[error("{0}")]
    MutualExclusion(#[from] MutualExclusionViolation),

    /// A collaborator call failed for a present identifier.
    #[error("{0}")]
    UpstreamFetch(#[from] UpstreamFetchError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded or applied.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SwitcherError {
    /// Returns true if the error must abort rendering.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingIdentifier(_) | Self::MutualExclusion(_))
    }

    /// Returns structured diagnostics for the error.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        match self {
            Self::MissingIdentifier(err) => err.error_info(),
            Self::MutualExclusion(err) => err.error_info(),
            Self::UpstreamFetch(err) => err.error_info(),
            Self::Serialization(message) => {
                ErrorInfo::new("SWITCH-004-SERIALIZATION", message.clone())
            }
            Self::Config(message) => ErrorInfo::new("SWITCH-005-CONFIG", message.clone())
                .with_fix_hint("Check the switcher configuration file for invalid values."),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = self.error_info().to_dict();
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("fatal".to_string(), serde_json::json!(self.is_fatal()));
        map
    }
}

/// Diagnostic metadata attached to every switcher error.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "SWITCH-002-MUTEX").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised when an enabled fetch is issued without its identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{node} fetch is enabled but its identifier is missing")]
pub struct MissingIdentifierError {
    /// The fetch node lacking an identifier.
    pub node: FetchNode,
}

impl MissingIdentifierError {
    /// Creates a new missing identifier error.
    #[must_use]
    pub fn new(node: FetchNode) -> Self {
        Self { node }
    }

    fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new("SWITCH-001-MISSING_ID", self.to_string())
            .with_context_entry("node", self.node.to_string())
    }
}

/// Error raised when run and recurring-run sources both resolve.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "The existence of run '{}' and recurring run '{}' should be exclusive",
    run_id.as_deref().unwrap_or("<none>"),
    recurring_run_id.as_deref().unwrap_or("<none>")
)]
pub struct MutualExclusionViolation {
    /// The effective run id.
    pub run_id: Option<String>,
    /// The cloned recurring run id.
    pub recurring_run_id: Option<String>,
}

impl MutualExclusionViolation {
    /// Creates a new mutual exclusion violation.
    #[must_use]
    pub fn new(run_id: Option<&str>, recurring_run_id: Option<&str>) -> Self {
        Self {
            run_id: run_id.map(str::to_owned),
            recurring_run_id: recurring_run_id.map(str::to_owned),
        }
    }

    fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new("SWITCH-002-MUTEX", self.to_string()).with_fix_hint(
            "Pass either cloneFromRun/fromRunId or cloneFromRecurringRun, not both.",
        )
    }
}

/// Error raised when a collaborator call fails for a present identifier.
#[derive(Debug, Clone, Error)]
#[error("Failed to fetch {node} '{id}': {source}")]
pub struct UpstreamFetchError {
    /// The fetch node that failed.
    pub node: FetchNode,
    /// The identifier that was fetched.
    pub id: String,
    /// The collaborator error.
    #[source]
    pub source: ApiError,
}

impl UpstreamFetchError {
    /// Creates a new upstream fetch error.
    #[must_use]
    pub fn new(node: FetchNode, id: impl Into<String>, source: ApiError) -> Self {
        Self {
            node,
            id: id.into(),
            source,
        }
    }

    fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new("SWITCH-003-UPSTREAM", self.to_string())
            .with_context_entry("node", self.node.to_string())
            .with_context_entry("id", self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_creation() {
        let info = ErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("node", "pipeline");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("node"), Some(&"pipeline".to_string()));
    }

    #[test]
    fn test_mutual_exclusion_is_fatal() {
        let err: SwitcherError = MutualExclusionViolation::new(Some("R1"), Some("J1")).into();

        assert!(err.is_fatal());
        assert!(err.to_string().contains("'R1'"));
        assert!(err.to_string().contains("'J1'"));
        assert_eq!(err.error_info().code, "SWITCH-002-MUTEX");
    }

    #[test]
    fn test_upstream_fetch_is_not_fatal() {
        let err: SwitcherError = UpstreamFetchError::new(
            FetchNode::Pipeline,
            "P1",
            ApiError::transport("connection refused"),
        )
        .into();

        assert!(!err.is_fatal());
        let dict = err.to_dict();
        assert_eq!(dict.get("code").unwrap(), "SWITCH-003-UPSTREAM");
        assert_eq!(dict.get("fatal").unwrap(), false);
    }

    #[test]
    fn test_missing_identifier_names_node() {
        let err = MissingIdentifierError::new(FetchNode::CompiledTemplate);
        assert_eq!(
            err.to_string(),
            "compiled_template fetch is enabled but its identifier is missing"
        );
    }
}
