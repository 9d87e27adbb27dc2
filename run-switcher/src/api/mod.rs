//! Upstream API collaborator.
//!
//! The switcher consumes the pipelines API only through [`ApiClient`].
//! Calls are never retried at this layer.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpApiClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{
    CompiledTemplate, Experiment, LegacyRun, NextGenRun, Pipeline, PipelineVersion, RecurringRun,
};

/// Errors returned by an [`ApiClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The requested resource does not exist.
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was requested.
        resource: String,
    },

    /// The server answered with a non-success status.
    #[error("Upstream returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The request never completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a status error.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Returns true for "not found".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Narrow async contract over the pipelines API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Gets a run from the legacy run API.
    async fn get_legacy_run(&self, id: &str) -> Result<LegacyRun, ApiError>;

    /// Gets a run from the next-generation run API.
    async fn get_next_gen_run(&self, id: &str) -> Result<NextGenRun, ApiError>;

    /// Gets a recurring run.
    async fn get_recurring_run(&self, id: &str) -> Result<RecurringRun, ApiError>;

    /// Gets a pipeline.
    async fn get_pipeline(&self, id: &str) -> Result<Pipeline, ApiError>;

    /// Gets a pipeline version.
    async fn get_pipeline_version(&self, id: &str) -> Result<PipelineVersion, ApiError>;

    /// Gets the compiled template of a pipeline version.
    async fn get_compiled_template(&self, version_id: &str)
        -> Result<CompiledTemplate, ApiError>;

    /// Gets an experiment.
    async fn get_experiment(&self, id: &str) -> Result<Experiment, ApiError>;
}
