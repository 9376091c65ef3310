//! The dictionary façade — the public API a column handle presents to
//! callers, wired up over the slot deriver, cluster tree, value normalizer
//! and the enclosing database's object-store/replication collaborators.

use itertools::Itertools;
use log::{debug, trace};
use std::cmp::Ordering;

use crate::accumulate::{Extremum, NumericDomain};
use crate::arena::{Arena, ArenaRef};
use crate::error::{DictError, Result};
use crate::normalize::{normalize_read, normalize_write, validate_key, validate_key_type};
use crate::replication::ReplicationSink;
use crate::resolver::{BackrefSink, CascadeState, ObjectResolver};
use crate::slot::derive;
use crate::tree::{ClusterTree, DEFAULT_CLUSTER_CAPACITY};
use crate::value::{cmp_mixed, Key, KeyType, TableKey, Value, ValueType};

/// Declares the shape of one dictionary column: its key/value types,
/// nullability, and (for `Link`-typed columns) the table a link targets.
#[derive(Debug, Clone)]
pub struct DictConfig {
    pub key_type: KeyType,
    pub value_type: ValueType,
    pub nullable: bool,
    pub opposite_table: Option<TableKey>,
    /// Private so [`DictConfig::with_cluster_capacity`]'s clamp to a safe
    /// minimum cannot be bypassed by a struct literal.
    cluster_capacity: usize,
}

impl DictConfig {
    pub fn new(key_type: KeyType, value_type: ValueType, nullable: bool) -> Self {
        DictConfig {
            key_type,
            value_type,
            nullable,
            opposite_table: None,
            cluster_capacity: DEFAULT_CLUSTER_CAPACITY,
        }
    }

    pub fn with_opposite_table(mut self, table: TableKey) -> Self {
        self.opposite_table = Some(table);
        self
    }

    /// Clamped to a minimum of 2: a cluster must be able to hold a pair of
    /// entries for a split to make progress (see [`ClusterTree::with_capacity`]).
    pub fn with_cluster_capacity(mut self, capacity: usize) -> Self {
        self.cluster_capacity = capacity.max(2);
        self
    }

    pub fn cluster_capacity(&self) -> usize {
        self.cluster_capacity
    }

    fn numeric_domain(&self) -> NumericDomain {
        NumericDomain::for_declared(self.value_type)
    }
}

/// A live handle onto one object's dictionary column. Owns the tree lazily,
/// plus the three collaborators it calls out to: an [`Arena`] for the root
/// reference, an object store implementing both [`ObjectResolver`] and
/// [`BackrefSink`], and a [`ReplicationSink`].
///
/// Mutating methods take `&mut self`; read-only methods take `&self`. No
/// runtime lock guards either: the borrow checker is what prevents a reader
/// from observing a tree mid-mutation.
pub struct DictionaryHandle<A: Arena, O, S: ReplicationSink>
where
    O: ObjectResolver + BackrefSink,
{
    config: DictConfig,
    arena: A,
    objects: O,
    replication: S,
    tree: Option<ClusterTree>,
    root_ref: Option<ArenaRef>,
    content_version: u64,
    live: bool,
}

impl<A: Arena, O, S: ReplicationSink> DictionaryHandle<A, O, S>
where
    O: ObjectResolver + BackrefSink,
{
    pub fn new(config: DictConfig, arena: A, objects: O, replication: S) -> Self {
        DictionaryHandle {
            config,
            arena,
            objects,
            replication,
            tree: None,
            root_ref: None,
            content_version: 0,
            live: true,
        }
    }

    /// Simulates the parent object going away: every subsequent call fails
    /// with [`DictError::DetachedAccessor`] until a new handle is created.
    pub fn detach(&mut self) {
        self.live = false;
    }

    fn ensure_live(&self) -> Result<()> {
        if self.live {
            Ok(())
        } else {
            Err(DictError::DetachedAccessor)
        }
    }

    pub fn content_version(&self) -> u64 {
        self.content_version
    }

    /// Access to the object-store collaborator, for embeddings (and tests)
    /// that need to drive object lifecycle events directly.
    pub fn objects(&self) -> &O {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut O {
        &mut self.objects
    }

    pub fn replication(&self) -> &S {
        &self.replication
    }

    /// Number of entries, `0` if the tree has never been materialized.
    pub fn size(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.tree.as_ref().map_or(0, ClusterTree::size))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.size()? == 0)
    }

    /// Materializes the tree and acquires its arena root reference on first
    /// write. A dictionary that has never been written to never touches the
    /// arena at all.
    fn ensure_tree(&mut self) -> Result<()> {
        if self.tree.is_none() {
            debug!("materializing cluster tree");
            let root = self.arena.alloc(0)?;
            self.root_ref = Some(root);
            self.tree = Some(ClusterTree::with_capacity(self.config.cluster_capacity()));
        }
        Ok(())
    }

    /// Inserts `value` under `key`, or updates it in place if the key
    /// already occupies this slot. Returns the absolute position of the
    /// entry and whether a fresh entry was created.
    pub fn insert(&mut self, key: Key, value: Value) -> Result<(usize, bool)> {
        self.ensure_live()?;
        validate_key(self.config.key_type, &key)?;
        let value = normalize_write(
            self.config.value_type,
            self.config.nullable,
            self.config.opposite_table.as_ref(),
            &self.objects,
            value,
        )?;
        self.ensure_tree()?;
        let slot = derive(&key);
        let tree = self.tree.as_mut().expect("tree materialized above");

        match tree.insert(slot, key.clone(), value.clone()) {
            Ok(()) => {
                let ndx = tree.get_ndx(slot)?;
                let new_link = value.as_typed_link().cloned();
                let mut cascade = CascadeState::new();
                let outcome = self.objects.replace_backlink(None, new_link.as_ref(), &mut cascade);
                if outcome.cascade_scheduled {
                    self.objects.remove_recursive(cascade);
                }
                self.replication.dictionary_insert(ndx, &key, &value);
                self.content_version += 1;
                Ok((ndx, true))
            }
            Err(DictError::SlotAlreadyUsed) => {
                trace!("insert: slot already used, falling back to update");
                let loc = tree.get(slot)?;
                let old_link = tree.entry(loc).2.as_typed_link().cloned();
                *tree.value_mut(loc) = value.clone();
                let ndx = tree.get_ndx(slot)?;
                let new_link = value.as_typed_link().cloned();
                let mut cascade = CascadeState::new();
                let outcome =
                    self.objects
                        .replace_backlink(old_link.as_ref(), new_link.as_ref(), &mut cascade);
                if outcome.cascade_scheduled {
                    self.objects.remove_recursive(cascade);
                }
                self.replication.dictionary_set(ndx, &key, &value);
                self.content_version += 1;
                Ok((ndx, false))
            }
            Err(other) => Err(other),
        }
    }

    /// Reads the value stored under `key`, normalized for the read path
    /// (unresolved links filtered to null).
    pub fn get(&self, key: &Key) -> Result<Value> {
        self.ensure_live()?;
        validate_key_type(self.config.key_type, key)?;
        let tree = self.tree.as_ref().ok_or(DictError::KeyNotFound)?;
        let slot = derive(key);
        let loc = tree.get(slot)?;
        let stored = tree.entry(loc).2.clone();
        Ok(normalize_read(self.config.value_type, &self.objects, stored))
    }

    /// As [`DictionaryHandle::get`], but `None` instead of `KeyNotFound`.
    pub fn try_get(&self, key: &Key) -> Result<Option<Value>> {
        self.ensure_live()?;
        validate_key_type(self.config.key_type, key)?;
        let Some(tree) = self.tree.as_ref() else {
            return Ok(None);
        };
        let slot = derive(key);
        match tree.try_get(slot) {
            Some(loc) => {
                let stored = tree.entry(loc).2.clone();
                Ok(Some(normalize_read(self.config.value_type, &self.objects, stored)))
            }
            None => Ok(None),
        }
    }

    /// `dict[key]`: returns the existing value, inserting a null entry first
    /// if `key` is absent. Rust has no fallible indexing operator, so this
    /// is a regular method rather than an `Index` impl.
    pub fn index_or_insert_null(&mut self, key: Key) -> Result<Value> {
        if let Some(value) = self.try_get(&key)? {
            return Ok(value);
        }
        self.insert(key.clone(), Value::Null)?;
        self.get(&key)
    }

    pub fn contains(&self, key: &Key) -> Result<bool> {
        Ok(self.try_get(key)?.is_some())
    }

    /// Absolute position of `key`'s entry under traversal order, or `None`.
    pub fn find(&self, key: &Key) -> Result<Option<usize>> {
        self.ensure_live()?;
        validate_key_type(self.config.key_type, key)?;
        let Some(tree) = self.tree.as_ref() else {
            return Ok(None);
        };
        let slot = derive(key);
        match tree.try_get(slot) {
            Some(_) => Ok(Some(tree.get_ndx(slot)?)),
            None => Ok(None),
        }
    }

    /// Linear scan for the first entry whose stored value equals `value`,
    /// by absolute position. Compares against the value as stored (before
    /// read-path link filtering), matching a direct scan of leaf storage.
    pub fn find_any(&self, value: &Value) -> Result<Option<usize>> {
        self.ensure_live()?;
        let Some(tree) = self.tree.as_ref() else {
            return Ok(None);
        };
        Ok(tree.iter().position(|(_, _, v)| v == value))
    }

    /// Absolute position of `key`'s entry, or `None` if `key` does not
    /// resolve to a slot currently occupied in this dictionary.
    pub fn find_any_key(&self, key: &Key) -> Result<Option<usize>> {
        self.find(key)
    }

    /// Removes `key`'s entry, clearing (and cascading) its backlink if it
    /// held a link.
    pub fn erase(&mut self, key: &Key) -> Result<()> {
        self.ensure_live()?;
        validate_key(self.config.key_type, key)?;
        let slot = derive(key);
        let tree = self.tree.as_mut().ok_or(DictError::KeyNotFound)?;
        let ndx = tree.get_ndx(slot)?;
        let (_, value) = tree.erase(slot)?;
        if let Some(link) = value.as_typed_link() {
            let mut cascade = CascadeState::new();
            let outcome = self.objects.remove_backlink(link, &mut cascade);
            if outcome.cascade_scheduled {
                self.objects.remove_recursive(cascade);
            }
        }
        self.replication.dictionary_erase(ndx, key);
        self.content_version += 1;
        Ok(())
    }

    /// Overwrites `key`'s entry with null in place, without touching its
    /// backlink bookkeeping (the entry keeps its slot).
    pub fn nullify(&mut self, key: &Key) -> Result<()> {
        self.ensure_live()?;
        if !self.config.nullable {
            return Err(DictError::TypeMismatch {
                expected: self.config.value_type,
                found: crate::value::ValueKind::Null,
            });
        }
        validate_key_type(self.config.key_type, key)?;
        let slot = derive(key);
        let tree = self.tree.as_mut().ok_or(DictError::KeyNotFound)?;
        let loc = tree.get(slot)?;
        *tree.value_mut(loc) = Value::Null;
        let ndx = tree.get_ndx(slot)?;
        self.replication.dictionary_set(ndx, key, &Value::Null);
        self.content_version += 1;
        Ok(())
    }

    /// Drops every entry, clearing every link's backlink (cascading where
    /// scheduled) and releasing the tree's arena root reference.
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_live()?;
        if let Some(tree) = self.tree.take() {
            let mut cascade = CascadeState::new();
            for (ndx, (_, key, value)) in tree.iter().enumerate() {
                if let Some(link) = value.as_typed_link() {
                    self.objects.remove_backlink(link, &mut cascade);
                }
                self.replication.dictionary_erase(ndx, key);
            }
            if !cascade.is_empty() {
                self.objects.remove_recursive(cascade);
            }
        }
        if let Some(root) = self.root_ref.take() {
            self.arena.free(root);
        }
        self.content_version += 1;
        Ok(())
    }

    /// Every `(key, value)` pair in traversal order, values normalized for
    /// the read path.
    pub fn iter(&self) -> Result<Vec<(Key, Value)>> {
        self.ensure_live()?;
        let Some(tree) = self.tree.as_ref() else {
            return Ok(Vec::new());
        };
        Ok(tree
            .iter()
            .map(|(_, k, v)| (k.clone(), normalize_read(self.config.value_type, &self.objects, v.clone())))
            .collect())
    }

    fn value_at_ndx(&self, ndx: usize) -> Result<Value> {
        let tree = self.tree.as_ref().ok_or(DictError::IndexOutOfRange { index: ndx, size: 0 })?;
        let (_, loc) = tree.get_by_ndx(ndx)?;
        Ok(tree.entry(loc).2.clone())
    }

    fn key_at_ndx(&self, ndx: usize) -> Result<Key> {
        let tree = self.tree.as_ref().ok_or(DictError::IndexOutOfRange { index: ndx, size: 0 })?;
        let (_, loc) = tree.get_by_ndx(ndx)?;
        Ok(tree.entry(loc).1.clone())
    }

    /// Sorts an external index vector (initially `0..size()`) by the total
    /// order over stored values, leaving the underlying storage untouched.
    pub fn sort_by_value(&self, idx: &mut Vec<usize>, ascending: bool) -> Result<()> {
        self.ensure_live()?;
        let mut err = None;
        let sorted = std::mem::take(idx)
            .into_iter()
            .sorted_by(|&a, &b| match (self.value_at_ndx(a), self.value_at_ndx(b)) {
                (Ok(va), Ok(vb)) => {
                    let ord = cmp_mixed(&va, &vb);
                    if ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    err.get_or_insert(e);
                    Ordering::Equal
                }
            })
            .collect();
        *idx = sorted;
        err.map_or(Ok(()), Err)
    }

    /// Sorts by value, then collapses adjacent equal values down to one
    /// representative index each. Ties are broken by the sort's grouping
    /// order; pass `None` to re-settle the surviving indices back into
    /// natural (ascending ndx) order afterwards.
    pub fn distinct_by_value(&self, idx: &mut Vec<usize>, ascending: Option<bool>) -> Result<()> {
        self.sort_by_value(idx, ascending.unwrap_or(true))?;
        let mut err = None;
        idx.dedup_by(|&mut a, &mut b| match (self.value_at_ndx(a), self.value_at_ndx(b)) {
            (Ok(va), Ok(vb)) => cmp_mixed(&va, &vb) == Ordering::Equal,
            (Err(e), _) | (_, Err(e)) => {
                err.get_or_insert(e);
                false
            }
        });
        if let Some(e) = err {
            return Err(e);
        }
        if ascending.is_none() {
            idx.sort_unstable();
        }
        Ok(())
    }

    fn cmp_key(a: &Key, b: &Key) -> Ordering {
        match (a, b) {
            (Key::Int(x), Key::Int(y)) => x.cmp(y),
            (Key::Str(x), Key::Str(y)) => x.cmp(y),
            (Key::Int(_), Key::Str(_)) => Ordering::Less,
            (Key::Str(_), Key::Int(_)) => Ordering::Greater,
        }
    }

    /// Sorts an external index vector by the application key. Keys are
    /// unique by construction, so there is no grouping ambiguity to resolve.
    pub fn sort_by_key(&self, idx: &mut Vec<usize>, ascending: bool) -> Result<()> {
        self.ensure_live()?;
        let mut err = None;
        let sorted = std::mem::take(idx)
            .into_iter()
            .sorted_by(|&a, &b| match (self.key_at_ndx(a), self.key_at_ndx(b)) {
                (Ok(ka), Ok(kb)) => {
                    let ord = Self::cmp_key(&ka, &kb);
                    if ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    err.get_or_insert(e);
                    Ordering::Equal
                }
            })
            .collect();
        *idx = sorted;
        err.map_or(Ok(()), Err)
    }

    /// Keys are unique by construction, so `distinct_by_key` is merely
    /// `sort_by_key`: there is nothing left to collapse.
    pub fn distinct_by_key(&self, idx: &mut Vec<usize>, ascending: bool) -> Result<()> {
        self.sort_by_key(idx, ascending)
    }

    /// The minimum non-null value and its absolute position, or
    /// `(Value::Null, None)` if nothing qualifies.
    pub fn min(&self) -> Result<(Value, Option<usize>)> {
        self.ensure_live()?;
        Ok(self.tree.as_ref().map_or((Value::Null, None), |t| t.extremum(Extremum::Min)))
    }

    pub fn max(&self) -> Result<(Value, Option<usize>)> {
        self.ensure_live()?;
        Ok(self.tree.as_ref().map_or((Value::Null, None), |t| t.extremum(Extremum::Max)))
    }

    /// The typed running sum and the number of values that participated.
    pub fn sum(&self) -> Result<(Value, usize)> {
        self.ensure_live()?;
        let domain = self.config.numeric_domain();
        Ok(self.tree.as_ref().map_or((domain.zero(), 0), |t| t.sum(domain)))
    }

    pub fn avg(&self) -> Result<Value> {
        self.ensure_live()?;
        let domain = self.config.numeric_domain();
        Ok(self.tree.as_ref().map_or(Value::Null, |t| t.avg(domain)))
    }
}
