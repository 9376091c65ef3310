//! The object-store boundary consumed from the enclosing database: link
//! validation and backlink/cascade maintenance. Both traits are implemented
//! here once more, purely in terms of standard collections, as the
//! reference embedding a standalone build of this crate runs against.

use std::collections::{HashMap, HashSet};

use crate::value::{ObjectKey, TableKey, TypedLink};

/// Read-only link validation, consumed by the value normalizer.
pub trait ObjectResolver {
    /// Whether `object` currently exists in `table`.
    fn is_valid(&self, table: &TableKey, object: ObjectKey) -> bool;
    /// Whether `object` has been tombstoned ("unresolved") in `table`: it
    /// once existed, a link to it is still storable, but it reads back as
    /// null (an "unresolved link").
    fn is_unresolved(&self, table: &TableKey, object: ObjectKey) -> bool;
}

/// Whether a backlink mutation scheduled a cascading removal that the
/// caller must now carry out via [`BackrefSink::remove_recursive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub cascade_scheduled: bool,
}

/// Accumulates objects whose strong-referenced owners have been removed and
/// which must themselves be removed recursively (glossary "Cascade state").
#[derive(Debug, Default, Clone)]
pub struct CascadeState {
    pub pending: Vec<TypedLink>,
}

impl CascadeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Backlink mutation and cascading removal, consumed by the dictionary
/// façade.
pub trait BackrefSink {
    /// Replaces the backlink from `old` to `new` (either may be absent).
    /// Accumulates any cascade into `cascade` and reports whether a
    /// recursive removal was scheduled.
    fn replace_backlink(
        &mut self,
        old: Option<&TypedLink>,
        new: Option<&TypedLink>,
        cascade: &mut CascadeState,
    ) -> CascadeOutcome;

    /// Clears the backlink pointing at `link`, accumulating any cascade.
    fn remove_backlink(&mut self, link: &TypedLink, cascade: &mut CascadeState) -> CascadeOutcome;

    /// Carries out a previously scheduled recursive removal.
    fn remove_recursive(&mut self, cascade: CascadeState);
}

#[derive(Debug, Default, Clone)]
struct TableState {
    live: HashSet<ObjectKey>,
    unresolved: HashSet<ObjectKey>,
    /// Number of backlinks currently pointing at each object.
    backlinks: HashMap<ObjectKey, usize>,
}

/// A reference in-memory object store: a flat map of tables, each tracking
/// which objects are live, which are tombstoned-but-referenced
/// ("unresolved"), and how many backlinks point at each.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    tables: HashMap<TableKey, TableState>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `object` as live in `table`.
    pub fn create_object(&mut self, table: TableKey, object: ObjectKey) {
        self.tables.entry(table).or_default().live.insert(object);
    }

    /// Moves `object` from live to unresolved ("deletes" it while leaving
    /// existing links pointing at it intact).
    pub fn tombstone_object(&mut self, table: &TableKey, object: ObjectKey) {
        if let Some(state) = self.tables.get_mut(table) {
            state.live.remove(&object);
            state.unresolved.insert(object);
        }
    }

    pub fn backlink_count(&self, table: &TableKey, object: ObjectKey) -> usize {
        self.tables
            .get(table)
            .and_then(|s| s.backlinks.get(&object).copied())
            .unwrap_or(0)
    }
}

impl ObjectResolver for InMemoryObjectStore {
    fn is_valid(&self, table: &TableKey, object: ObjectKey) -> bool {
        self.tables.get(table).map_or(false, |s| s.live.contains(&object))
    }

    fn is_unresolved(&self, table: &TableKey, object: ObjectKey) -> bool {
        self.tables.get(table).map_or(false, |s| s.unresolved.contains(&object))
    }
}

impl BackrefSink for InMemoryObjectStore {
    fn replace_backlink(
        &mut self,
        old: Option<&TypedLink>,
        new: Option<&TypedLink>,
        cascade: &mut CascadeState,
    ) -> CascadeOutcome {
        let mut outcome = CascadeOutcome { cascade_scheduled: false };
        if let Some(old) = old {
            outcome = self.remove_backlink(old, cascade);
        }
        if let Some(new) = new {
            *self
                .tables
                .entry(new.table.clone())
                .or_default()
                .backlinks
                .entry(new.object)
                .or_insert(0) += 1;
        }
        outcome
    }

    fn remove_backlink(&mut self, link: &TypedLink, cascade: &mut CascadeState) -> CascadeOutcome {
        let state = self.tables.entry(link.table.clone()).or_default();
        let remaining = state
            .backlinks
            .get_mut(&link.object)
            .map(|count| {
                *count = count.saturating_sub(1);
                *count
            })
            .unwrap_or(0);
        let cascade_scheduled = remaining == 0 && state.live.contains(&link.object);
        if cascade_scheduled {
            cascade.pending.push(link.clone());
        }
        CascadeOutcome { cascade_scheduled }
    }

    fn remove_recursive(&mut self, cascade: CascadeState) {
        for link in cascade.pending {
            if let Some(state) = self.tables.get_mut(&link.table) {
                state.live.remove(&link.object);
                state.backlinks.remove(&link.object);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> TableKey {
        TableKey(name.to_string())
    }

    #[test]
    fn tombstoned_object_reads_as_unresolved_not_valid() {
        let mut store = InMemoryObjectStore::new();
        store.create_object(t("People"), ObjectKey(5));
        assert!(store.is_valid(&t("People"), ObjectKey(5)));
        store.tombstone_object(&t("People"), ObjectKey(5));
        assert!(!store.is_valid(&t("People"), ObjectKey(5)));
        assert!(store.is_unresolved(&t("People"), ObjectKey(5)));
    }

    #[test]
    fn backlink_drop_to_zero_schedules_cascade_only_if_live() {
        let mut store = InMemoryObjectStore::new();
        store.create_object(t("People"), ObjectKey(5));
        let mut cascade = CascadeState::new();
        let link = TypedLink { table: t("People"), object: ObjectKey(5) };
        store.replace_backlink(None, Some(&link), &mut cascade);
        let outcome = store.remove_backlink(&link, &mut cascade);
        assert!(outcome.cascade_scheduled);
        assert_eq!(cascade.pending.len(), 1);
    }
}
