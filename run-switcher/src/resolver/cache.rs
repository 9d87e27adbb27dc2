//! Per-instance query cache.
//!
//! One entry per [`QueryKey`], written once and never refetched. Entries
//! are shared futures, so a key requested again while in flight joins the
//! original call instead of issuing a duplicate.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;

use crate::core::{Entity, QueryKey};
use crate::errors::SwitcherError;

/// Result of one fetch: a value, empty (`Ok(None)`), or an error.
pub type FetchOutcome = Result<Option<Entity>, SwitcherError>;

/// A fetch that any number of waiters can await.
pub type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Cache of fetches keyed by operation and identifier.
#[derive(Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, SharedFetch>,
}

impl QueryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached fetch for `key`, issuing it on first request.
    ///
    /// The flag is true when the entry already existed.
    pub fn get_or_issue<F>(&mut self, key: &QueryKey, issue: F) -> (SharedFetch, bool)
    where
        F: FnOnce() -> BoxFuture<'static, FetchOutcome>,
    {
        if let Some(existing) = self.entries.get(key) {
            return (existing.clone(), true);
        }
        let fetch = issue().shared();
        self.entries.insert(key.clone(), fetch.clone());
        (fetch, false)
    }

    /// Returns the outcome for `key` if it has settled.
    #[must_use]
    pub fn settled(&self, key: &QueryKey) -> Option<FetchOutcome> {
        self.entries.get(key).and_then(|fetch| fetch.peek().cloned())
    }

    /// Returns true if `key` was ever issued.
    #[must_use]
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of distinct fetches issued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was issued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.entries.keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("QueryCache").field("keys", &keys).finish()
    }
}
