//! The cluster tree — a slot-id-keyed store over (slot_id, user_key,
//! value) triples, built from a flat, sorted list of [`Cluster`] leaves
//! rather than a multi-level node hierarchy: with clusters kept in slot-id
//! order and addressed by binary search, point operations are still
//! `O(log n)` without needing internal/branch nodes, since this engine
//! holds every cluster resident rather than paging them through a cache.

use log::{debug, trace, warn};

use crate::accumulate::{AvgAccumulator, Extremum, ExtremumAccumulator, NumericDomain, SumAccumulator};
use crate::cluster::Cluster;
use crate::error::{DictError, Result};
use crate::slot::SlotId;
use crate::value::{Key, Value};

/// Default maximum entry count per cluster before a split is triggered.
/// Kept small since clusters here are in-memory `Vec`s, not disk pages.
pub const DEFAULT_CLUSTER_CAPACITY: usize = 64;

/// What a [`ClusterTree::traverse`] visitor returns to keep going or stop
/// early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseControl {
    Continue,
    Stop,
}

/// The location of an entry: which cluster, and its index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocation {
    pub cluster_ndx: usize,
    pub index_in_cluster: usize,
}

/// A slot-id-keyed collection of [`Cluster`] leaves.
pub struct ClusterTree {
    clusters: Vec<Cluster>,
    capacity: usize,
    total_len: usize,
}

impl ClusterTree {
    /// Produces an empty tree rooted in a single empty cluster. Registering
    /// the root reference with the parent object's column slot is the
    /// façade's responsibility.
    pub fn create_empty() -> Self {
        Self::with_capacity(DEFAULT_CLUSTER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "cluster capacity must allow at least a pair of entries");
        ClusterTree {
            clusters: vec![Cluster::new()],
            capacity,
            total_len: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    /// Index of the cluster that would contain `slot`, found by binary
    /// search over each cluster's minimum slot id.
    fn cluster_index_for(&self, slot: SlotId) -> usize {
        let ndx = self.clusters.partition_point(|c| c.min_slot().map_or(true, |m| m <= slot));
        ndx.saturating_sub(1)
    }

    /// Looks up the location of `slot`, failing with `KeyNotFound` if absent.
    pub fn get(&self, slot: SlotId) -> Result<EntryLocation> {
        self.try_get(slot).ok_or(DictError::KeyNotFound)
    }

    /// As [`ClusterTree::get`], but `None` instead of failing.
    pub fn try_get(&self, slot: SlotId) -> Option<EntryLocation> {
        let cluster_ndx = self.cluster_index_for(slot);
        let cluster = &self.clusters[cluster_ndx];
        match cluster.position(slot) {
            Ok(index_in_cluster) => Some(EntryLocation { cluster_ndx, index_in_cluster }),
            Err(_) => None,
        }
    }

    pub fn entry(&self, loc: EntryLocation) -> (SlotId, &Key, &Value) {
        self.clusters[loc.cluster_ndx].entry_at(loc.index_in_cluster)
    }

    pub fn value_mut(&mut self, loc: EntryLocation) -> &mut Value {
        self.clusters[loc.cluster_ndx].value_at_mut(loc.index_in_cluster)
    }

    /// Inserts `key`/`value` under `slot`. Fails with `SlotAlreadyUsed` if
    /// the slot is taken; the façade is responsible for turning that into an
    /// update.
    pub fn insert(&mut self, slot: SlotId, key: Key, value: Value) -> Result<()> {
        trace!("cluster tree insert: slot={slot}");
        let cluster_ndx = self.cluster_index_for(slot);
        let idx = match self.clusters[cluster_ndx].position(slot) {
            Ok(_) => return Err(DictError::SlotAlreadyUsed),
            Err(idx) => idx,
        };
        self.clusters[cluster_ndx].insert_at(idx, slot, key, value);
        self.total_len += 1;
        if self.clusters[cluster_ndx].len() > self.capacity {
            self.split_cluster(cluster_ndx);
        }
        Ok(())
    }

    fn split_cluster(&mut self, cluster_ndx: usize) {
        let upper = self.clusters[cluster_ndx].split_off_upper_half();
        debug!(
            "splitting cluster {cluster_ndx}: {} entries remain, {} move to new cluster",
            self.clusters[cluster_ndx].len(),
            upper.len()
        );
        self.clusters.insert(cluster_ndx + 1, upper);
    }

    /// Removes `slot`'s entry. Returns the removed entry so the façade can
    /// inspect the value for backlink/cascade work.
    pub fn erase(&mut self, slot: SlotId) -> Result<(Key, Value)> {
        let cluster_ndx = self.cluster_index_for(slot);
        let index_in_cluster = match self.clusters[cluster_ndx].position(slot) {
            Ok(idx) => idx,
            Err(_) => {
                warn!("erase: slot {slot} not found in cluster {cluster_ndx}");
                return Err(DictError::KeyNotFound);
            }
        };
        let (_, key, value) = self.clusters[cluster_ndx].remove_at(index_in_cluster);
        self.total_len -= 1;
        if self.clusters[cluster_ndx].is_empty() && self.clusters.len() > 1 {
            debug!("removing drained cluster {cluster_ndx}");
            self.clusters.remove(cluster_ndx);
        }
        Ok((key, value))
    }

    /// Drops every entry, leaving a single empty cluster behind (mirrors
    /// `create_empty`'s invariant that a tree always has at least one
    /// cluster to traverse).
    pub fn clear(&mut self) {
        self.clusters = vec![Cluster::new()];
        self.total_len = 0;
    }

    /// Absolute 0-based position of `slot` under traversal order, or
    /// `KeyNotFound`.
    pub fn get_ndx(&self, slot: SlotId) -> Result<usize> {
        let cluster_ndx = self.cluster_index_for(slot);
        let index_in_cluster = self.clusters[cluster_ndx]
            .position(slot)
            .map_err(|_| DictError::KeyNotFound)?;
        let preceding: usize = self.clusters[..cluster_ndx].iter().map(Cluster::len).sum();
        Ok(preceding + index_in_cluster)
    }

    /// The slot id and location of the `ndx`-th entry in traversal order.
    pub fn get_by_ndx(&self, ndx: usize) -> Result<(SlotId, EntryLocation)> {
        if ndx >= self.total_len {
            return Err(DictError::IndexOutOfRange { index: ndx, size: self.total_len });
        }
        let mut remaining = ndx;
        for (cluster_ndx, cluster) in self.clusters.iter().enumerate() {
            if remaining < cluster.len() {
                let (slot, _, _) = cluster.entry_at(remaining);
                return Ok((slot, EntryLocation { cluster_ndx, index_in_cluster: remaining }));
            }
            remaining -= cluster.len();
        }
        unreachable!("ndx < total_len but walked off the end of the cluster list");
    }

    /// Invokes `visitor` on each cluster in traversal order until it
    /// requests a stop.
    pub fn traverse<F: FnMut(&Cluster) -> TraverseControl>(&self, mut visitor: F) {
        for cluster in &self.clusters {
            if visitor(cluster) == TraverseControl::Stop {
                break;
            }
        }
    }

    /// Iterates every `(slot_id, key, value)` triple in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &Key, &Value)> {
        self.clusters.iter().flat_map(Cluster::iter)
    }

    /// The extremum non-null value and the first position achieving it, or
    /// `(Value::Null, None)` if the tree is empty or every value is null.
    pub fn extremum(&self, which: Extremum) -> (Value, Option<usize>) {
        let mut acc = ExtremumAccumulator::new(which);
        let mut ndx = 0usize;
        for (_, _, value) in self.iter() {
            acc.accumulate(ndx, value);
            ndx += 1;
        }
        acc.finish()
    }

    /// The typed running sum and the count of values that participated.
    pub fn sum(&self, domain: NumericDomain) -> (Value, usize) {
        let mut acc = SumAccumulator::new(domain);
        for (_, _, value) in self.iter() {
            acc.accumulate(value);
        }
        let count = acc.count();
        (acc.finish(), count)
    }

    /// Sum/count as a mixed value, or `Value::Null` if no value
    /// participated.
    pub fn avg(&self, domain: NumericDomain) -> Value {
        let mut acc = AvgAccumulator::new(domain);
        for (_, _, value) in self.iter() {
            acc.accumulate(value);
        }
        acc.finish()
    }

    #[cfg(test)]
    pub(crate) fn assert_size_invariant(&self) {
        let sum: usize = self.clusters.iter().map(Cluster::len).sum();
        assert_eq!(sum, self.total_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::derive;

    fn tree_with(n: i64) -> ClusterTree {
        let mut t = ClusterTree::with_capacity(4);
        for i in 0..n {
            let key = Key::Int(i);
            let slot = derive(&key);
            t.insert(slot, key, Value::Int(i)).unwrap();
        }
        t
    }

    #[test]
    fn insert_get_erase_roundtrip() {
        let mut t = ClusterTree::create_empty();
        let key = Key::Str("a".into());
        let slot = derive(&key);
        t.insert(slot, key.clone(), Value::Int(1)).unwrap();
        let loc = t.get(slot).unwrap();
        assert_eq!(*t.entry(loc).2, Value::Int(1));
        t.erase(slot).unwrap();
        assert!(t.try_get(slot).is_none());
        assert_eq!(t.size(), 0);
    }

    #[test]
    fn duplicate_slot_is_rejected() {
        let mut t = ClusterTree::create_empty();
        let key = Key::Int(1);
        let slot = derive(&key);
        t.insert(slot, key.clone(), Value::Int(1)).unwrap();
        assert_eq!(t.insert(slot, key, Value::Int(2)), Err(DictError::SlotAlreadyUsed));
    }

    #[test]
    fn splitting_preserves_all_entries() {
        let t = tree_with(200);
        t.assert_size_invariant();
        assert_eq!(t.size(), 200);
        let mut seen: Vec<SlotId> = t.iter().map(|(s, _, _)| s).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 200);
    }

    #[test]
    fn get_ndx_and_get_by_ndx_agree() {
        let t = tree_with(50);
        for ndx in 0..50 {
            let (slot, loc) = t.get_by_ndx(ndx).unwrap();
            assert_eq!(t.get_ndx(slot).unwrap(), ndx);
            assert_eq!(t.entry(loc).0, slot);
        }
    }

    #[test]
    fn out_of_range_positional_access_fails() {
        let t = tree_with(3);
        assert!(matches!(
            t.get_by_ndx(3),
            Err(DictError::IndexOutOfRange { index: 3, size: 3 })
        ));
    }

    #[test]
    fn erase_drains_clusters_without_losing_the_root() {
        let mut t = tree_with(200);
        let slots: Vec<SlotId> = t.iter().map(|(s, _, _)| s).collect();
        for s in slots {
            t.erase(s).unwrap();
        }
        assert_eq!(t.size(), 0);
        t.assert_size_invariant();
    }

    #[test]
    fn min_max_sum_avg_on_empty_tree() {
        let t = ClusterTree::create_empty();
        assert_eq!(t.extremum(Extremum::Min), (Value::Null, None));
        assert_eq!(t.extremum(Extremum::Max), (Value::Null, None));
        let (sum, count) = t.sum(NumericDomain::Int);
        assert_eq!((sum, count), (Value::Int(0), 0));
        assert_eq!(t.avg(NumericDomain::Int), Value::Null);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::slot::derive;
    use quickcheck_macros::quickcheck;
    use std::collections::HashSet;

    #[quickcheck]
    fn insert_then_get_returns_what_was_inserted(xs: Vec<i64>) -> bool {
        let mut seen_slots = HashSet::new();
        let mut entries = Vec::new();
        for x in xs {
            let slot = derive(&Key::Int(x));
            if seen_slots.insert(slot) {
                entries.push((slot, x));
            }
        }

        let mut t = ClusterTree::with_capacity(4);
        for &(slot, x) in &entries {
            t.insert(slot, Key::Int(x), Value::Int(x)).unwrap();
        }

        t.size() == entries.len()
            && entries.iter().all(|&(slot, x)| {
                matches!(t.get(slot).map(|loc| t.entry(loc).2.clone()), Ok(Value::Int(v)) if v == x)
            })
    }

    #[quickcheck]
    fn splitting_preserves_size_invariant_for_arbitrary_capacity(capacity: u8, count: u8) -> bool {
        let capacity = (capacity as usize % 15) + 2;
        let count = count as i64 % 200;
        let mut t = ClusterTree::with_capacity(capacity);
        for i in 0..count {
            let slot = derive(&Key::Int(i));
            if t.try_get(slot).is_none() {
                t.insert(slot, Key::Int(i), Value::Int(i)).unwrap();
            }
        }
        t.assert_size_invariant();
        t.size() as i64 <= count
    }
}
