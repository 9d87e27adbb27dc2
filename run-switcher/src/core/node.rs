//! Fetch nodes and the keys their results are cached under.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One asynchronous lookup in the resolution graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchNode {
    /// Run detail from the legacy run API.
    LegacyRun,
    /// Run from the next-generation run API.
    NextGenRun,
    /// Recurring run (job) being cloned.
    RecurringRun,
    /// Pipeline selected for the new run.
    Pipeline,
    /// Pipeline version selected for the new run.
    PipelineVersion,
    /// Compiled template of the selected pipeline version.
    CompiledTemplate,
    /// Experiment the new run is created in.
    Experiment,
}

impl FetchNode {
    /// Number of nodes.
    pub const COUNT: usize = 7;

    /// All nodes, in evaluation order. Parents precede their dependents.
    pub const ALL: [Self; Self::COUNT] = [
        Self::LegacyRun,
        Self::NextGenRun,
        Self::RecurringRun,
        Self::Pipeline,
        Self::Experiment,
        Self::PipelineVersion,
        Self::CompiledTemplate,
    ];

    /// Returns a dense index for per-node storage.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::LegacyRun => 0,
            Self::NextGenRun => 1,
            Self::RecurringRun => 2,
            Self::Pipeline => 3,
            Self::PipelineVersion => 4,
            Self::CompiledTemplate => 5,
            Self::Experiment => 6,
        }
    }

    /// Nodes whose settled values decide this node's enablement and key.
    #[must_use]
    pub const fn dependencies(self) -> &'static [Self] {
        match self {
            Self::PipelineVersion => &[Self::Pipeline, Self::NextGenRun],
            Self::CompiledTemplate => &[Self::PipelineVersion],
            _ => &[],
        }
    }

    /// Returns true if classification waits for this node.
    ///
    /// The experiment is forwarded to the editor but never holds the gate.
    #[must_use]
    pub const fn is_required(self) -> bool {
        !matches!(self, Self::Experiment)
    }

    /// Returns true for the two lookups that share the effective run id.
    ///
    /// A run id belongs to exactly one API generation, so "not found" from
    /// either of these settles empty instead of failing.
    #[must_use]
    pub const fn is_run_lookup(self) -> bool {
        matches!(self, Self::LegacyRun | Self::NextGenRun)
    }
}

impl fmt::Display for FetchNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LegacyRun => write!(f, "legacy_run"),
            Self::NextGenRun => write!(f, "next_gen_run"),
            Self::RecurringRun => write!(f, "recurring_run"),
            Self::Pipeline => write!(f, "pipeline"),
            Self::PipelineVersion => write!(f, "pipeline_version"),
            Self::CompiledTemplate => write!(f, "compiled_template"),
            Self::Experiment => write!(f, "experiment"),
        }
    }
}

/// Cache key of a fetch: the operation plus the identifier it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    /// The fetch operation.
    pub node: FetchNode,
    /// The governing identifier.
    pub id: String,
}

impl QueryKey {
    /// Creates a new query key.
    #[must_use]
    pub fn new(node: FetchNode, id: impl Into<String>) -> Self {
        Self {
            node,
            id: id.into(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.id)
    }
}
