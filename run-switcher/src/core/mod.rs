//! Core types for run-mode resolution.
//!
//! This module contains:
//! - Fetch nodes and cache keys
//! - Upstream entity models
//! - Fetch states and the resolved mode

mod entities;
mod node;
mod status;

pub use entities::{
    CompiledTemplate, Entity, Experiment, LegacyPipelineSpec, LegacyRun, LegacyRunSummary,
    NextGenRun, Pipeline, PipelineRuntime, PipelineVersion, PipelineVersionRef, RecurringRun,
};
pub use node::{FetchNode, QueryKey};
pub use status::{FetchPhase, FetchState, NodePhases, ResolvedMode};
