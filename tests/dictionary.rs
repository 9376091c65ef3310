use cluster_dict::arena::InMemoryArena;
use cluster_dict::dictionary::{DictConfig, DictionaryHandle};
use cluster_dict::replication::{NullReplicationSink, RecordingReplicationSink, ReplicationEvent};
use cluster_dict::resolver::InMemoryObjectStore;
use cluster_dict::value::{Key, KeyType, ObjectKey, TableKey, TypedLink, Value, ValueType};

fn str_int_dict() -> DictionaryHandle<InMemoryArena, InMemoryObjectStore, RecordingReplicationSink> {
    let config = DictConfig::new(KeyType::Str, ValueType::Int, true);
    DictionaryHandle::new(config, InMemoryArena::new(), InMemoryObjectStore::new(), RecordingReplicationSink::new())
}

#[test]
fn scenario_insert_get_erase_round_trip() {
    cluster_dict::init_env_logger();
    let mut d = str_int_dict();
    d.insert(Key::Str("one".into()), Value::Int(1)).unwrap();
    d.insert(Key::Str("two".into()), Value::Int(2)).unwrap();
    assert_eq!(d.size().unwrap(), 2);
    assert_eq!(d.get(&Key::Str("one".into())).unwrap(), Value::Int(1));
    d.erase(&Key::Str("one".into())).unwrap();
    assert!(!d.contains(&Key::Str("one".into())).unwrap());
    assert_eq!(d.size().unwrap(), 1);
}

#[test]
fn scenario_reinsert_same_key_is_an_update_not_a_duplicate() {
    let mut d = str_int_dict();
    let (ndx_a, inserted_a) = d.insert(Key::Str("k".into()), Value::Int(1)).unwrap();
    let (ndx_b, inserted_b) = d.insert(Key::Str("k".into()), Value::Int(2)).unwrap();
    assert!(inserted_a);
    assert!(!inserted_b);
    assert_eq!(ndx_a, ndx_b);
    assert_eq!(d.size().unwrap(), 1);
    assert_eq!(d.get(&Key::Str("k".into())).unwrap(), Value::Int(2));
}

#[test]
fn scenario_unresolved_link_reads_as_null_but_entry_still_contains() {
    let mut objects = InMemoryObjectStore::new();
    objects.create_object(TableKey("People".into()), ObjectKey(1));
    let config = DictConfig::new(KeyType::Str, ValueType::Link, true).with_opposite_table(TableKey("People".into()));
    let mut d = DictionaryHandle::new(config, InMemoryArena::new(), objects, NullReplicationSink);

    d.insert(Key::Str("a".into()), Value::UntypedLink(ObjectKey(1))).unwrap();
    assert_eq!(d.get(&Key::Str("a".into())).unwrap(), Value::UntypedLink(ObjectKey(1)));

    d.objects_mut().tombstone_object(&TableKey("People".into()), ObjectKey(1));
    assert!(d.contains(&Key::Str("a".into())).unwrap());
    assert_eq!(d.get(&Key::Str("a".into())).unwrap(), Value::Null);
}

#[test]
fn scenario_erase_drops_backlink_and_schedules_cascade() {
    let mut objects = InMemoryObjectStore::new();
    objects.create_object(TableKey("People".into()), ObjectKey(1));
    let config = DictConfig::new(KeyType::Str, ValueType::Link, true).with_opposite_table(TableKey("People".into()));
    let mut d = DictionaryHandle::new(config, InMemoryArena::new(), objects, NullReplicationSink);

    d.insert(Key::Str("a".into()), Value::UntypedLink(ObjectKey(1))).unwrap();
    assert_eq!(d.objects().backlink_count(&TableKey("People".into()), ObjectKey(1)), 1);
    d.erase(&Key::Str("a".into())).unwrap();
    assert_eq!(d.objects().backlink_count(&TableKey("People".into()), ObjectKey(1)), 0);
}

#[test]
fn scenario_insert_update_erase_emit_replication_events_in_order() {
    let mut d = str_int_dict();
    d.insert(Key::Str("a".into()), Value::Int(1)).unwrap();
    d.insert(Key::Str("a".into()), Value::Int(2)).unwrap();
    d.erase(&Key::Str("a".into())).unwrap();

    assert_eq!(d.replication().events.len(), 3);
    assert!(matches!(d.replication().events[0], ReplicationEvent::Insert { .. }));
    assert!(matches!(d.replication().events[1], ReplicationEvent::Set { .. }));
    assert!(matches!(d.replication().events[2], ReplicationEvent::Erase { .. }));
}

#[test]
fn scenario_content_version_bumps_on_every_mutation_only() {
    let mut d = str_int_dict();
    assert_eq!(d.content_version(), 0);
    d.insert(Key::Str("a".into()), Value::Int(1)).unwrap();
    assert_eq!(d.content_version(), 1);
    d.get(&Key::Str("a".into())).unwrap();
    assert_eq!(d.content_version(), 1);
    d.erase(&Key::Str("a".into())).unwrap();
    assert_eq!(d.content_version(), 2);
}

#[test]
fn many_entries_survive_splitting_and_stay_reachable_by_key() {
    let config = DictConfig::new(KeyType::Int, ValueType::Int, false).with_cluster_capacity(4);
    let mut d = DictionaryHandle::new(config, InMemoryArena::new(), InMemoryObjectStore::new(), NullReplicationSink);
    for i in 0..500i64 {
        d.insert(Key::Int(i), Value::Int(i)).unwrap();
    }
    assert_eq!(d.size().unwrap(), 500);
    for i in 0..500i64 {
        assert_eq!(d.get(&Key::Int(i)).unwrap(), Value::Int(i));
    }
    let (sum, count) = d.sum().unwrap();
    assert_eq!(count, 500);
    assert_eq!(sum, Value::Int((0..500i64).sum()));
}

#[test]
fn sort_and_distinct_leave_underlying_storage_untouched() {
    let config = DictConfig::new(KeyType::Int, ValueType::Int, false);
    let mut d = DictionaryHandle::new(config, InMemoryArena::new(), InMemoryObjectStore::new(), NullReplicationSink);
    for (k, v) in [(0, 5), (1, 1), (2, 5), (3, 3)] {
        d.insert(Key::Int(k), Value::Int(v)).unwrap();
    }
    let mut idx: Vec<usize> = (0..d.size().unwrap()).collect();
    d.sort_by_value(&mut idx, true).unwrap();
    assert_eq!(idx, vec![1, 3, 0, 2]);

    // Storage order (by ndx / insertion) is unaffected by the sort above.
    assert_eq!(d.get(&Key::Int(0)).unwrap(), Value::Int(5));

    let mut idx2: Vec<usize> = (0..d.size().unwrap()).collect();
    d.distinct_by_value(&mut idx2, Some(true)).unwrap();
    assert_eq!(idx2.len(), 3);
}

#[test]
fn wrong_key_type_is_rejected_before_any_mutation() {
    let mut d = str_int_dict();
    let err = d.insert(Key::Int(1), Value::Int(1)).unwrap_err();
    assert_eq!(err, cluster_dict::DictError::CollectionTypeMismatch);
    assert_eq!(d.size().unwrap(), 0);
}

#[test]
fn reserved_key_names_rejected_only_on_write() {
    let mut d = str_int_dict();
    let err = d.insert(Key::Str("$bad".into()), Value::Int(1)).unwrap_err();
    assert_eq!(err, cluster_dict::DictError::InvalidKey("$bad".into()));
    // A read for the same malformed key still only fails the type check,
    // not the shape check (it was never a reserved-name problem for reads).
    assert!(matches!(d.get(&Key::Str("$bad".into())), Err(cluster_dict::DictError::KeyNotFound)));
}

#[test]
fn typed_link_roundtrips_through_link_column() {
    let mut objects = InMemoryObjectStore::new();
    objects.create_object(TableKey("People".into()), ObjectKey(9));
    let config = DictConfig::new(KeyType::Str, ValueType::Link, true).with_opposite_table(TableKey("People".into()));
    let mut d = DictionaryHandle::new(config, InMemoryArena::new(), objects, NullReplicationSink);
    d.insert(Key::Str("a".into()), Value::UntypedLink(ObjectKey(9))).unwrap();
    let read_back = d.get(&Key::Str("a".into())).unwrap();
    assert_eq!(read_back, Value::UntypedLink(ObjectKey(9)));

    // Directly on a Mixed column, a fully-typed link round-trips unchanged.
    let mut mixed_objects = InMemoryObjectStore::new();
    mixed_objects.create_object(TableKey("People".into()), ObjectKey(9));
    let mixed_config = DictConfig::new(KeyType::Str, ValueType::Mixed, true);
    let mut mixed = DictionaryHandle::new(mixed_config, InMemoryArena::new(), mixed_objects, NullReplicationSink);
    let link = Value::Link(TypedLink { table: TableKey("People".into()), object: ObjectKey(9) });
    mixed.insert(Key::Str("a".into()), link.clone()).unwrap();
    assert_eq!(mixed.get(&Key::Str("a".into())).unwrap(), link);
}
