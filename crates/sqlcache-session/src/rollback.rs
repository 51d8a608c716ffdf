//! Baseline rollback.
//!
//! Rollback undoes every pending change in three passes: update records are
//! reverted in place, additions are removed one occurrence at a time, and
//! removals are appended back in the order they were removed. Positions of
//! restored removals are not recovered.

use crate::change_tracker::MutationTrackingCache;
use sqlcache_core::InvariantViolation;

/// What a rollback did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackReport {
    /// Update records reverted to their original value.
    pub updates_restored: usize,
    /// Pending additions taken out of the collection.
    pub additions_cancelled: usize,
    /// Removed values put back.
    pub removals_restored: usize,
    /// Entries that could not be restored and were skipped.
    pub violations: Vec<InvariantViolation>,
}

impl RollbackReport {
    /// True if every pending change was undone.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of changes undone.
    #[must_use]
    pub fn total(&self) -> usize {
        self.updates_restored + self.additions_cancelled + self.removals_restored
    }
}

impl<T: Clone + PartialEq> MutationTrackingCache<T> {
    /// Restore the collection to its baseline and clear the pending changes.
    ///
    /// Calling this with no pending changes does nothing.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn rollback(&mut self) -> RollbackReport {
        let mut report = RollbackReport::default();
        if !self.has_changes() {
            return report;
        }

        self.observing = false;

        for record in std::mem::take(&mut self.updated) {
            let slot = if self.items.get(record.index) == Some(&record.last_value) {
                Some(record.index)
            } else {
                self.items.iter().position(|v| *v == record.last_value)
            };
            match slot {
                Some(index) => {
                    self.splice_unchecked(index, 1, vec![record.init_value]);
                    report.updates_restored += 1;
                }
                None => {
                    let violation = InvariantViolation {
                        operation: "rollback",
                        message: format!(
                            "no slot holds the updated value recorded at index {}",
                            record.index
                        ),
                    };
                    tracing::warn!(index = record.index, %violation, "Skipping update record");
                    report.violations.push(violation);
                }
            }
        }

        for value in std::mem::take(&mut self.added) {
            match self.items.iter().position(|v| *v == value) {
                Some(index) => {
                    self.splice_unchecked(index, 1, Vec::new());
                    report.additions_cancelled += 1;
                }
                None => {
                    let violation = InvariantViolation {
                        operation: "rollback",
                        message: "added value is no longer in the collection".to_string(),
                    };
                    tracing::warn!(%violation, "Skipping added value");
                    report.violations.push(violation);
                }
            }
        }

        let removed = std::mem::take(&mut self.removed);
        report.removals_restored = removed.len();
        if !removed.is_empty() {
            let index = self.items.len();
            self.splice_unchecked(index, 0, removed);
        }

        self.observing = true;

        tracing::debug!(
            updates = report.updates_restored,
            additions = report.additions_cancelled,
            removals = report.removals_restored,
            skipped = report.violations.len(),
            "Rolled back pending changes"
        );
        report
    }
}
