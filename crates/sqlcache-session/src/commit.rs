//! Commit hand-off.
//!
//! Persisting changes is the caller's job. [`MutationTrackingCache::commit`]
//! hands the pending changes to a [`CommitSink`]; if the sink succeeds the
//! current collection becomes the new baseline.

use crate::change_tracker::{CollectionChange, MutationRecord, MutationTrackingCache};
use sqlcache_core::Result;

/// Read-only view of the pending changes.
#[derive(Debug)]
pub struct ChangeSet<'a, T> {
    pub added: &'a [T],
    pub updated: &'a [MutationRecord<T>],
    pub removed: &'a [T],
}

impl<T> ChangeSet<'_, T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Receives pending changes on commit.
pub trait CommitSink<T> {
    /// Persist the changes. An error leaves the cache untouched.
    #[allow(clippy::result_large_err)]
    fn commit(&mut self, changes: &ChangeSet<'_, T>) -> Result<()>;
}

impl<T, F> CommitSink<T> for F
where
    F: FnMut(&ChangeSet<'_, T>) -> Result<()>,
{
    fn commit(&mut self, changes: &ChangeSet<'_, T>) -> Result<()> {
        self(changes)
    }
}

impl<T: Clone + PartialEq> MutationTrackingCache<T> {
    /// Snapshot of the pending changes.
    pub fn change_set(&self) -> ChangeSet<'_, T> {
        ChangeSet {
            added: &self.added,
            updated: &self.updated,
            removed: &self.removed,
        }
    }

    /// Hand pending changes to `sink` and adopt the current collection as the
    /// new baseline if it succeeds.
    ///
    /// Returns `Ok(0)` without calling the sink when nothing is pending.
    #[tracing::instrument(level = "debug", skip(self, sink))]
    #[allow(clippy::result_large_err)]
    pub fn commit<S: CommitSink<T> + ?Sized>(&mut self, sink: &mut S) -> Result<usize> {
        let pending = self.change_set().len();
        if pending == 0 {
            tracing::trace!("Nothing to commit");
            return Ok(0);
        }

        self.observing = false;
        let result = sink.commit(&self.change_set());
        self.observing = true;

        match result {
            Ok(()) => {
                self.clear_changes();
                let len = self.items.len();
                tracing::debug!(pending, len, "Committed pending changes");
                self.notify(&CollectionChange::Reset { len });
                Ok(pending)
            }
            Err(e) => {
                tracing::warn!(error = %e, pending, "Commit failed; changes kept");
                Err(e)
            }
        }
    }
}
