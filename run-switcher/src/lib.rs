//! # Run Switcher
//!
//! Decides which of two incompatible new-run editors (legacy or
//! next-generation) to present, from asynchronously fetched run, recurring
//! run, pipeline, pipeline version and compiled template entities.
//!
//! The switcher provides:
//!
//! - **Identifier extraction**: optional identifiers read verbatim from the request
//! - **Entity resolution**: a fetch dependency graph with per-key caching and re-keying
//! - **Template materialization**: strict priority over the template sources
//! - **Mode classification**: a pure state machine over settled fetches
//! - **Presentation gating**: no editor is shown while required fetches are pending
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use run_switcher::prelude::*;
//! use std::sync::Arc;
//!
//! let config = SwitcherConfig::from_file("switcher.json")?;
//! let client = Arc::new(HttpApiClient::new(&config.api)?);
//! let ctx = RequestContext::from_pairs([("pipelineId", "P1")]);
//!
//! let mut switcher = RunSwitcher::new(&ctx, client, Arc::new(config.feature_flags()));
//! match switcher.resolve().await {
//!     Presentation::NextGenEditor(snapshot) => { /* ... */ }
//!     Presentation::LegacyEditor(snapshot) => { /* ... */ }
//!     Presentation::Failed(err) => { /* ... */ }
//!     Presentation::Loading => {}
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod api;
pub mod classifier;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod gate;
pub mod observability;
pub mod resolver;
pub mod switcher;
pub mod template;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "http")]
    pub use crate::api::HttpApiClient;
    pub use crate::api::{ApiClient, ApiError};
    pub use crate::classifier::{classify, ClassifierInputs, DecisionReason, ModeDecision};
    pub use crate::config::{
        ApiConfig, FeatureFlagSet, FeatureFlags, FeatureKey, SwitcherConfig,
    };
    pub use crate::context::{Identifiers, QueryParam, RequestContext};
    pub use crate::core::{
        Entity, FetchNode, FetchPhase, FetchState, NodePhases, QueryKey, ResolvedMode,
    };
    pub use crate::errors::{
        ErrorInfo, MissingIdentifierError, MutualExclusionViolation, SwitcherError,
        UpstreamFetchError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::gate::{EditorSnapshot, Presentation, ResolvedRun, SelectionHandle};
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::resolver::EntityResolver;
    pub use crate::switcher::{ResolverEvent, RunSwitcher};
    pub use crate::template::{
        classify_template_format, materialize, TemplateFormat, TemplateSource, TemplateText,
    };
}
