//! Event sink system for observability.
//!
//! The switcher reports every fetch transition and mode decision to an
//! injected [`EventSink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event emitted when a fetch is issued to the collaborator.
pub const FETCH_ISSUED: &str = "fetch.issued";
/// Event emitted when a fetch key is served from the cache.
pub const FETCH_REUSED: &str = "fetch.reused";
/// Event emitted when a fetch settles with a value or empty.
pub const FETCH_SETTLED: &str = "fetch.settled";
/// Event emitted when a fetch settles with an error.
pub const FETCH_FAILED: &str = "fetch.failed";
/// Event emitted when a stale fetch result is dropped.
pub const FETCH_DISCARDED: &str = "fetch.discarded";
/// Event emitted when the editor changes the pipeline selection.
pub const SELECTION_CHANGED: &str = "selection.changed";
/// Event emitted when resolution reaches a terminal mode.
pub const MODE_RESOLVED: &str = "mode.resolved";
