//! Fetch states and the resolved editor mode.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::FetchNode;
use crate::errors::SwitcherError;

/// State of one fetch node.
#[derive(Debug, Clone)]
pub enum FetchState<T> {
    /// The enablement predicate is false; the fetch never runs.
    Disabled,
    /// Issued and awaiting settlement.
    Pending,
    /// Settled with a value.
    Ready(T),
    /// Settled without a value.
    Empty,
    /// Settled with an error.
    Failed(SwitcherError),
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::Disabled
    }
}

impl<T> FetchState<T> {
    /// Returns the phase of this state.
    #[must_use]
    pub const fn phase(&self) -> FetchPhase {
        match self {
            Self::Disabled => FetchPhase::Disabled,
            Self::Pending => FetchPhase::Pending,
            Self::Ready(_) => FetchPhase::Ready,
            Self::Empty => FetchPhase::Empty,
            Self::Failed(_) => FetchPhase::Failed,
        }
    }

    /// Returns the settled value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the settled error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&SwitcherError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true while the fetch is in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns true once the fetch has completed.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.phase().is_settled()
    }
}

/// Value-free view of a [`FetchState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    /// Not enabled.
    #[default]
    Disabled,
    /// In flight.
    Pending,
    /// Settled with a value.
    Ready,
    /// Settled without a value.
    Empty,
    /// Settled with an error.
    Failed,
}

impl FetchPhase {
    /// Returns true if the phase is terminal.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::Empty | Self::Failed)
    }
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Empty => write!(f, "empty"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Phases of every fetch node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodePhases([FetchPhase; FetchNode::COUNT]);

impl NodePhases {
    /// Creates phases with every node disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the phase of a node.
    #[must_use]
    pub fn with(mut self, node: FetchNode, phase: FetchPhase) -> Self {
        self.set(node, phase);
        self
    }

    /// Sets the phase of a node in place.
    pub fn set(&mut self, node: FetchNode, phase: FetchPhase) {
        self.0[node.index()] = phase;
    }

    /// Returns the phase of a node.
    #[must_use]
    pub const fn get(&self, node: FetchNode) -> FetchPhase {
        self.0[node.index()]
    }

    /// Returns true if the node settled with a value.
    #[must_use]
    pub fn is_ready(&self, node: FetchNode) -> bool {
        self.get(node) == FetchPhase::Ready
    }

    /// Returns the required nodes still in flight.
    #[must_use]
    pub fn pending_required(&self) -> Vec<FetchNode> {
        FetchNode::ALL
            .into_iter()
            .filter(|node| node.is_required() && self.get(*node) == FetchPhase::Pending)
            .collect()
    }
}

/// Which editor the request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedMode {
    /// Classification inputs are incomplete.
    Loading,
    /// Present the legacy editor.
    LegacyEditor,
    /// Present the next-generation editor.
    NextGenEditor,
}

impl fmt::Display for ResolvedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::LegacyEditor => write!(f, "legacy_editor"),
            Self::NextGenEditor => write!(f, "next_gen_editor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_state_phases() {
        let ready: FetchState<u32> = FetchState::Ready(1);
        assert_eq!(ready.phase(), FetchPhase::Ready);
        assert_eq!(ready.value(), Some(&1));
        assert!(ready.is_settled());

        let pending: FetchState<u32> = FetchState::Pending;
        assert!(pending.is_pending());
        assert!(!pending.is_settled());

        let disabled: FetchState<u32> = FetchState::default();
        assert_eq!(disabled.phase(), FetchPhase::Disabled);
        assert!(!disabled.is_settled());
    }

    #[test]
    fn test_pending_required_skips_experiment() {
        let phases = NodePhases::new()
            .with(FetchNode::Experiment, FetchPhase::Pending)
            .with(FetchNode::Pipeline, FetchPhase::Pending)
            .with(FetchNode::LegacyRun, FetchPhase::Ready);

        assert_eq!(phases.pending_required(), vec![FetchNode::Pipeline]);
    }

    #[test]
    fn test_resolved_mode_display() {
        assert_eq!(ResolvedMode::Loading.to_string(), "loading");
        assert_eq!(ResolvedMode::NextGenEditor.to_string(), "next_gen_editor");
    }
}
