//! Mutation tracking for a loaded collection.
//!
//! [`MutationTrackingCache`] owns the loaded items and three derived sets
//! describing how the collection has drifted from its baseline:
//!
//! - `added`: values that entered the collection and were never loaded
//! - `updated`: [`MutationRecord`]s pairing a loaded value with its
//!   current replacement
//! - `removed`: loaded values that have left the collection
//!
//! Every structural edit is a [`Command`] passed through
//! [`MutationTrackingCache::apply`]. All commands reduce to a splice (remove a
//! run, insert a run at the same position); positions in the two runs are
//! paired for replacement and the leftovers are pure removals or insertions.

use sqlcache_core::{IndexError, Result};
use std::fmt;

/// A loaded value that has been replaced in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord<T> {
    /// Slot the replacement was observed at. Advisory: later inserts and
    /// removals can make it stale.
    pub index: usize,
    /// The value as it exists in the backing store.
    pub init_value: T,
    /// The current in-memory value.
    pub last_value: T,
}

/// A structural edit to the tracked collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<T> {
    /// Insert `values` before position `index`.
    Insert { index: usize, values: Vec<T> },
    /// Remove `count` items starting at `index`.
    Remove { index: usize, count: usize },
    /// Replace the item at `index`.
    ReplaceAt { index: usize, value: T },
    /// Replace `count` items starting at `index` with `values`.
    Splice {
        index: usize,
        count: usize,
        values: Vec<T>,
    },
}

impl<T> Command<T> {
    fn into_splice(self) -> (usize, usize, Vec<T>) {
        match self {
            Command::Insert { index, values } => (index, 0, values),
            Command::Remove { index, count } => (index, count, Vec::new()),
            Command::ReplaceAt { index, value } => (index, 1, vec![value]),
            Command::Splice {
                index,
                count,
                values,
            } => (index, count, values),
        }
    }
}

/// Structural change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange<T> {
    /// Items now occupy `from..to`.
    Added { from: usize, to: usize },
    /// `removed` used to start at `from`.
    Removed { from: usize, removed: Vec<T> },
    /// `removed` at `from` was replaced by the items now at `from..to`.
    Replaced {
        from: usize,
        to: usize,
        removed: Vec<T>,
    },
    /// The whole collection was replaced by a load or commit.
    Reset { len: usize },
}

/// Handle returned by [`MutationTrackingCache::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Box<dyn FnMut(&CollectionChange<T>) + Send>;

/// Count of pending changes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    /// Values pending INSERT.
    pub added: usize,
    /// Values pending UPDATE.
    pub updated: usize,
    /// Values pending DELETE.
    pub removed: usize,
}

impl PendingCounts {
    /// Total number of pending changes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.added + self.updated + self.removed
    }

    /// Check if there are no pending changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// A loaded collection plus the edits made to it since the last load.
///
/// Access is single-writer; wrap the cache in a mutex if it must be shared.
pub struct MutationTrackingCache<T> {
    pub(crate) items: Vec<T>,
    pub(crate) added: Vec<T>,
    pub(crate) updated: Vec<MutationRecord<T>>,
    pub(crate) removed: Vec<T>,
    /// Cleared while rollback or commit rewrites the collection.
    pub(crate) observing: bool,
    listeners: Vec<(ListenerId, Listener<T>)>,
    next_listener: u64,
}

impl<T> Default for MutationTrackingCache<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
            observing: true,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for MutationTrackingCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationTrackingCache")
            .field("items", &self.items)
            .field("added", &self.added)
            .field("updated", &self.updated)
            .field("removed", &self.removed)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T: Clone + PartialEq> MutationTrackingCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache whose baseline is `items`.
    pub fn with_baseline(items: Vec<T>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Install `items` as the new baseline, dropping all pending changes.
    pub fn load(&mut self, items: Vec<T>) {
        self.items = items;
        self.clear_changes();
        let len = self.items.len();
        tracing::debug!(len, "Installed new baseline");
        self.notify(&CollectionChange::Reset { len });
    }

    pub(crate) fn clear_changes(&mut self) {
        self.added.clear();
        self.updated.clear();
        self.removed.clear();
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn added(&self) -> &[T] {
        &self.added
    }

    pub fn updated(&self) -> &[MutationRecord<T>] {
        &self.updated
    }

    pub fn removed(&self) -> &[T] {
        &self.removed
    }

    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }

    pub fn pending_counts(&self) -> PendingCounts {
        PendingCounts {
            added: self.added.len(),
            updated: self.updated.len(),
            removed: self.removed.len(),
        }
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a structural change listener.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&CollectionChange<T>) + Send + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub(crate) fn notify(&mut self, change: &CollectionChange<T>) {
        for (_, listener) in &mut self.listeners {
            listener(change);
        }
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Apply one structural edit and classify it.
    ///
    /// Returns an [`IndexError`] without touching anything if the command
    /// addresses a position outside the collection.
    #[allow(clippy::result_large_err)]
    pub fn apply(&mut self, command: Command<T>) -> Result<()> {
        let (index, count, values) = command.into_splice();
        let len = self.items.len();
        if index > len {
            return Err(IndexError { index, len }.into());
        }
        if count > len - index {
            return Err(IndexError {
                index: index.saturating_add(count).saturating_sub(1),
                len,
            }
            .into());
        }
        self.splice_unchecked(index, count, values);
        Ok(())
    }

    /// Splice within bounds, classify unless suppressed, then notify.
    pub(crate) fn splice_unchecked(&mut self, index: usize, count: usize, values: Vec<T>) {
        if count == 0 && values.is_empty() {
            return;
        }
        let inserted = values.len();
        let old: Vec<T> = if self.observing {
            let old: Vec<T> = self
                .items
                .splice(index..index + count, values.iter().cloned())
                .collect();
            self.classify(index, &old, &values);
            old
        } else {
            self.items.splice(index..index + count, values).collect()
        };

        let change = if old.is_empty() {
            CollectionChange::Added {
                from: index,
                to: index + inserted,
            }
        } else if inserted == 0 {
            CollectionChange::Removed {
                from: index,
                removed: old,
            }
        } else {
            CollectionChange::Replaced {
                from: index,
                to: index + inserted,
                removed: old,
            }
        };
        self.notify(&change);
    }

    fn classify(&mut self, index: usize, old: &[T], new: &[T]) {
        let paired = old.len().min(new.len());
        for (offset, (old_value, new_value)) in old.iter().zip(new).enumerate() {
            self.classify_replace(index + offset, old_value, new_value);
        }
        for (offset, value) in old[paired..].iter().enumerate() {
            self.classify_remove(index + paired + offset, value);
        }
        for value in &new[paired..] {
            self.classify_insert(value);
        }
    }

    fn classify_replace(&mut self, index: usize, old: &T, new: &T) {
        if old == new {
            tracing::trace!(index, "Replacement with equal value ignored");
            return;
        }
        if let Some(pos) = self.added.iter().position(|v| v == old) {
            tracing::trace!(index, "Replaced a pending addition in place");
            self.added[pos] = new.clone();
            return;
        }
        if let Some(pos) = self.find_update(index, old) {
            tracing::trace!(index, "Extended existing update record");
            self.updated[pos].last_value = new.clone();
            return;
        }
        tracing::trace!(index, "Recorded new update");
        self.updated.push(MutationRecord {
            index,
            init_value: old.clone(),
            last_value: new.clone(),
        });
    }

    fn classify_remove(&mut self, index: usize, value: &T) {
        if let Some(pos) = self.added.iter().position(|v| v == value) {
            tracing::trace!(index, "Removal cancelled a pending addition");
            self.added.remove(pos);
            return;
        }
        if let Some(pos) = self.find_update(index, value) {
            tracing::trace!(index, "Removal of updated value; keeping original");
            let record = self.updated.remove(pos);
            self.removed.push(record.init_value);
            return;
        }
        tracing::trace!(index, "Recorded removal");
        self.removed.push(value.clone());
    }

    fn classify_insert(&mut self, value: &T) {
        if let Some(pos) = self.removed.iter().position(|v| v == value) {
            tracing::trace!("Insertion restored a pending removal");
            self.removed.remove(pos);
            return;
        }
        tracing::trace!("Recorded addition");
        self.added.push(value.clone());
    }

    /// Find the update record whose current value is `value`, preferring the
    /// one observed at `index`.
    fn find_update(&self, index: usize, value: &T) -> Option<usize> {
        self.updated
            .iter()
            .position(|r| r.index == index && r.last_value == *value)
            .or_else(|| self.updated.iter().position(|r| r.last_value == *value))
    }

    // ========================================================================
    // Convenience commands
    // ========================================================================

    /// Apply a command whose bounds were taken from the current length.
    fn apply_in_bounds(&mut self, command: Command<T>) {
        let applied = self.apply(command);
        debug_assert!(applied.is_ok(), "command built from current length");
    }

    /// Append a value.
    pub fn push(&mut self, value: T) {
        let index = self.items.len();
        self.apply_in_bounds(Command::Insert {
            index,
            values: vec![value],
        });
    }

    /// Insert a value before `index`.
    #[allow(clippy::result_large_err)]
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        self.apply(Command::Insert {
            index,
            values: vec![value],
        })
    }

    /// Append every value from `values`.
    pub fn extend(&mut self, values: impl IntoIterator<Item = T>) {
        let index = self.items.len();
        self.apply_in_bounds(Command::Insert {
            index,
            values: values.into_iter().collect(),
        });
    }

    /// Remove and return the value at `index`.
    #[allow(clippy::result_large_err)]
    pub fn remove(&mut self, index: usize) -> Result<T> {
        let value = self.items.get(index).cloned().ok_or(IndexError {
            index,
            len: self.items.len(),
        })?;
        self.apply(Command::Remove { index, count: 1 })?;
        Ok(value)
    }

    /// Remove the first value equal to `value`. Returns `false` if absent.
    pub fn remove_item(&mut self, value: &T) -> bool {
        match self.items.iter().position(|v| v == value) {
            Some(index) => {
                self.apply_in_bounds(Command::Remove { index, count: 1 });
                true
            }
            None => false,
        }
    }

    /// Replace the value at `index`, returning the previous one.
    #[allow(clippy::result_large_err)]
    pub fn replace(&mut self, index: usize, value: T) -> Result<T> {
        let previous = self.items.get(index).cloned().ok_or(IndexError {
            index,
            len: self.items.len(),
        })?;
        self.apply(Command::ReplaceAt { index, value })?;
        Ok(previous)
    }

    /// Edit a copy of the value at `index` and write it back as a replacement.
    #[allow(clippy::result_large_err)]
    pub fn edit(&mut self, index: usize, f: impl FnOnce(&mut T)) -> Result<()> {
        let mut value = self.items.get(index).cloned().ok_or(IndexError {
            index,
            len: self.items.len(),
        })?;
        f(&mut value);
        self.apply(Command::ReplaceAt { index, value })
    }

    /// Replace `count` items at `index` with `values`.
    #[allow(clippy::result_large_err)]
    pub fn splice(&mut self, index: usize, count: usize, values: Vec<T>) -> Result<()> {
        self.apply(Command::Splice {
            index,
            count,
            values,
        })
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        let count = self.items.len();
        self.apply_in_bounds(Command::Remove { index: 0, count });
    }
}

impl<'a, T> IntoIterator for &'a MutationTrackingCache<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlcache_core::Error;
    use std::sync::{Arc, Mutex};

    fn cache(items: &[&'static str]) -> MutationTrackingCache<&'static str> {
        MutationTrackingCache::with_baseline(items.to_vec())
    }

    fn snapshot(
        c: &MutationTrackingCache<&'static str>,
    ) -> (Vec<&'static str>, Vec<&'static str>, Vec<&'static str>) {
        (
            c.added().to_vec(),
            c.updated().iter().map(|r| r.last_value).collect(),
            c.removed().to_vec(),
        )
    }

    #[test]
    fn replace_with_equal_value_is_not_a_change() {
        let mut c = cache(&["A", "B"]);
        c.push("X");
        c.replace(1, "C").unwrap();
        let before = snapshot(&c);
        c.replace(0, "A").unwrap();
        c.replace(1, "C").unwrap();
        c.replace(2, "X").unwrap();
        assert_eq!(snapshot(&c), before);
    }

    #[test]
    fn replace_baseline_creates_update_record() {
        let mut c = cache(&["A", "B", "C"]);
        assert_eq!(c.replace(1, "D").unwrap(), "B");
        assert_eq!(
            c.updated(),
            &[MutationRecord {
                index: 1,
                init_value: "B",
                last_value: "D",
            }]
        );
        assert!(c.added().is_empty());
        assert!(c.removed().is_empty());
        assert_eq!(c.items(), &["A", "D", "C"]);
    }

    #[test]
    fn second_replace_extends_the_record() {
        let mut c = cache(&["A", "B"]);
        c.replace(0, "X").unwrap();
        c.replace(0, "Y").unwrap();
        assert_eq!(c.updated().len(), 1);
        assert_eq!(c.updated()[0].init_value, "A");
        assert_eq!(c.updated()[0].last_value, "Y");
    }

    #[test]
    fn update_then_revert_keeps_the_record() {
        let mut c = cache(&["A", "B"]);
        c.replace(0, "X").unwrap();
        c.replace(0, "A").unwrap();
        assert_eq!(
            c.updated(),
            &[MutationRecord {
                index: 0,
                init_value: "A",
                last_value: "A",
            }]
        );
    }

    #[test]
    fn replacing_an_addition_stays_an_addition() {
        let mut c = cache(&["A"]);
        c.push("N");
        c.replace(1, "M").unwrap();
        assert_eq!(c.added(), &["M"]);
        assert!(c.updated().is_empty());
    }

    #[test]
    fn added_then_removed_leaves_no_trace() {
        let mut c = cache(&["A", "B"]);
        let before = snapshot(&c);
        c.insert(1, "N").unwrap();
        assert_eq!(c.added(), &["N"]);
        assert!(c.remove_item(&"N"));
        assert_eq!(snapshot(&c), before);
        assert!(!c.has_changes());
    }

    #[test]
    fn removing_an_updated_value_records_the_original() {
        let mut c = cache(&["A", "B"]);
        c.replace(0, "X").unwrap();
        assert_eq!(c.remove(0).unwrap(), "X");
        assert!(c.updated().is_empty());
        assert_eq!(c.removed(), &["A"]);
    }

    #[test]
    fn reinserting_a_removed_value_cancels_the_removal() {
        let mut c = cache(&["A", "B"]);
        c.remove(0).unwrap();
        assert_eq!(c.removed(), &["A"]);
        c.push("A");
        assert!(c.removed().is_empty());
        assert!(c.added().is_empty());
    }

    #[test]
    fn duplicate_additions_are_tracked_separately() {
        let mut c = cache(&["A"]);
        c.extend(["N", "N"]);
        assert_eq!(c.added(), &["N", "N"]);
        c.remove_item(&"N");
        assert_eq!(c.added(), &["N"]);
    }

    #[test]
    fn splice_pairs_positions_and_handles_leftovers() {
        let mut c = cache(&["A", "B", "C", "D"]);
        c.splice(1, 3, vec!["X", "Y"]).unwrap();
        assert_eq!(c.items(), &["A", "X", "Y"]);
        let inits: Vec<_> = c.updated().iter().map(|r| r.init_value).collect();
        assert_eq!(inits, vec!["B", "C"]);
        assert_eq!(c.removed(), &["D"]);

        let mut c = cache(&["A", "B"]);
        c.splice(0, 1, vec!["X", "Y", "Z"]).unwrap();
        assert_eq!(c.items(), &["X", "Y", "Z", "B"]);
        assert_eq!(c.updated().len(), 1);
        assert_eq!(c.added(), &["Y", "Z"]);
    }

    #[test]
    fn clear_removes_everything() {
        let mut c = cache(&["A", "B"]);
        c.push("N");
        c.clear();
        assert!(c.is_empty());
        assert_eq!(c.removed(), &["A", "B"]);
        assert!(c.added().is_empty());
        assert_eq!(
            c.pending_counts(),
            PendingCounts {
                added: 0,
                updated: 0,
                removed: 2,
            }
        );
    }

    #[test]
    fn out_of_range_commands_change_nothing() {
        let mut c = cache(&["A"]);
        let err = c.replace(3, "X").unwrap_err();
        assert!(matches!(err, Error::Index(IndexError { index: 3, len: 1 })));
        assert!(c.insert(2, "X").is_err());
        assert!(c.splice(0, 2, vec![]).is_err());
        assert!(c.remove(1).is_err());
        assert_eq!(c.items(), &["A"]);
        assert!(!c.has_changes());
        // Inserting at the end is in range.
        assert!(c.insert(1, "B").is_ok());
    }

    #[test]
    fn huge_counts_are_rejected_not_overflowed() {
        let mut c = cache(&["A", "B"]);
        let err = c.splice(1, usize::MAX, vec![]).unwrap_err();
        assert!(matches!(
            err,
            Error::Index(IndexError {
                index: i,
                len: 2
            }) if i == usize::MAX - 1
        ));
        assert!(
            c.apply(Command::Remove {
                index: usize::MAX,
                count: usize::MAX,
            })
            .is_err()
        );
        assert_eq!(c.items(), &["A", "B"]);
        assert!(!c.has_changes());
    }

    #[test]
    fn shortcuts_match_their_commands() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut shortcuts = cache(&["A", "B"]);
        let sink = Arc::clone(&seen);
        shortcuts.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
        shortcuts.push("C");
        shortcuts.extend(["D", "E"]);
        assert!(shortcuts.remove_item(&"A"));
        assert!(!shortcuts.remove_item(&"Z"));
        shortcuts.clear();
        shortcuts.clear();

        let mut commands = cache(&["A", "B"]);
        let expected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&expected);
        commands.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
        for command in [
            Command::Insert {
                index: 2,
                values: vec!["C"],
            },
            Command::Insert {
                index: 3,
                values: vec!["D", "E"],
            },
            Command::Remove { index: 0, count: 1 },
            Command::Remove { index: 0, count: 4 },
        ] {
            commands.apply(command).unwrap();
        }

        assert_eq!(snapshot(&shortcuts), snapshot(&commands));
        assert_eq!(snapshot(&shortcuts), (vec![], vec![], vec!["A", "B"]));
        assert_eq!(*seen.lock().unwrap(), *expected.lock().unwrap());
        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[test]
    fn edit_goes_through_replace() {
        let mut c = MutationTrackingCache::with_baseline(vec![String::from("a")]);
        c.edit(0, |s| s.push('!')).unwrap();
        assert_eq!(c.items(), &["a!".to_string()]);
        assert_eq!(c.updated()[0].init_value, "a");
    }

    #[test]
    fn update_records_prefer_the_observed_slot() {
        let mut c = cache(&["A", "B"]);
        c.replace(0, "X").unwrap();
        c.replace(1, "X").unwrap();
        c.replace(1, "Y").unwrap();
        let pairs: Vec<_> = c
            .updated()
            .iter()
            .map(|r| (r.init_value, r.last_value))
            .collect();
        assert_eq!(pairs, vec![("A", "X"), ("B", "Y")]);
    }

    #[test]
    fn listeners_see_every_change() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut c = cache(&["A", "B"]);
        let sink = Arc::clone(&seen);
        let id = c.subscribe(move |change| sink.lock().unwrap().push(change.clone()));

        c.push("C");
        c.replace(0, "X").unwrap();
        c.remove(1).unwrap();
        c.load(vec!["Q"]);
        assert!(c.unsubscribe(id));
        c.push("R");
        assert!(!c.unsubscribe(id));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                CollectionChange::Added { from: 2, to: 3 },
                CollectionChange::Replaced {
                    from: 0,
                    to: 1,
                    removed: vec!["A"],
                },
                CollectionChange::Removed {
                    from: 1,
                    removed: vec!["B"],
                },
                CollectionChange::Reset { len: 1 },
            ]
        );
    }

    #[test]
    fn load_discards_pending_changes() {
        let mut c = cache(&["A"]);
        c.push("B");
        c.replace(0, "X").unwrap();
        c.load(vec!["P", "Q"]);
        assert!(!c.has_changes());
        assert_eq!(c.items(), &["P", "Q"]);
        assert_eq!(c.iter().count(), 2);
        assert_eq!((&c).into_iter().next(), Some(&"P"));
    }

    #[test]
    fn pending_counts_totals() {
        let counts = PendingCounts {
            added: 3,
            updated: 2,
            removed: 1,
        };
        assert_eq!(counts.total(), 6);
        assert!(!counts.is_empty());
        assert!(PendingCounts::default().is_empty());
    }
}
