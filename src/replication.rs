//! The replication sink boundary consumed from the enclosing database:
//! every mutating façade operation emits exactly one event here, in program
//! order.

use crate::value::{Key, Value};

/// One change-log event, named after the façade operation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationEvent {
    Insert { ndx: usize, key: Key, value: Value },
    Set { ndx: usize, key: Key, value: Value },
    Erase { ndx: usize, key: Key },
}

/// The replication sink interface itself. A transactional embedding forwards
/// these into its change log; the reference implementation here just
/// records them for inspection in tests.
pub trait ReplicationSink {
    fn dictionary_insert(&mut self, ndx: usize, key: &Key, value: &Value);
    fn dictionary_set(&mut self, ndx: usize, key: &Key, value: &Value);
    fn dictionary_erase(&mut self, ndx: usize, key: &Key);
}

/// Records every event it receives, in order, for test assertions.
#[derive(Debug, Default)]
pub struct RecordingReplicationSink {
    pub events: Vec<ReplicationEvent>,
}

impl RecordingReplicationSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplicationSink for RecordingReplicationSink {
    fn dictionary_insert(&mut self, ndx: usize, key: &Key, value: &Value) {
        self.events.push(ReplicationEvent::Insert { ndx, key: key.clone(), value: value.clone() });
    }

    fn dictionary_set(&mut self, ndx: usize, key: &Key, value: &Value) {
        self.events.push(ReplicationEvent::Set { ndx, key: key.clone(), value: value.clone() });
    }

    fn dictionary_erase(&mut self, ndx: usize, key: &Key) {
        self.events.push(ReplicationEvent::Erase { ndx, key: key.clone() });
    }
}

/// A sink that discards every event, for callers that do not care about
/// replication (e.g. throwaway test dictionaries).
#[derive(Debug, Default)]
pub struct NullReplicationSink;

impl ReplicationSink for NullReplicationSink {
    fn dictionary_insert(&mut self, _ndx: usize, _key: &Key, _value: &Value) {}
    fn dictionary_set(&mut self, _ndx: usize, _key: &Key, _value: &Value) {}
    fn dictionary_erase(&mut self, _ndx: usize, _key: &Key) {}
}
