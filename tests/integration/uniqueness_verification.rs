#![allow(missing_docs)]

use std::cell::Cell;
use std::rc::Rc;

use sombra_schema_index::{
    index::{
        Collector, FieldInfo, MemoryPartition, MemoryPropertyStore, Partition, PartitionSet,
        PointVisitor, PropertyAccessor, Query, TermCursor, UniquenessVerifier,
    },
    types::{CloseErrors, DocId, EntityId, IndexError, PropId, PropValue, Result},
};

const EMAIL: PropId = PropId(1);

fn index(values: &[(u64, PropValue)], partitions: usize) -> (MemoryPropertyStore, PartitionSet<MemoryPartition>) {
    let store = MemoryPropertyStore::new();
    let mut parts: Vec<MemoryPartition> = (0..partitions)
        .map(|_| MemoryPartition::with_leaf_size(2))
        .collect();
    for (idx, (entity, value)) in values.iter().enumerate() {
        store.set(EntityId(*entity), EMAIL, value.clone());
        parts[idx % partitions]
            .add(EntityId(*entity), value)
            .expect("index value");
    }
    (store, PartitionSet::new(parts))
}

fn entities(err: &IndexError) -> (u64, u64) {
    let conflict = err.as_conflict().expect("constraint violation");
    let (a, b) = (conflict.entity_a.0, conflict.entity_b.0);
    (a.min(b), a.max(b))
}

fn verify(values: &[(u64, PropValue)], partitions: usize) -> Result<()> {
    let (store, set) = index(values, partitions);
    UniquenessVerifier::new(&set).verify(&store, EMAIL)
}

#[test]
fn distinct_emails_verify() {
    let values = [(1, "alice@x.com".into()), (2, "bob@x.com".into())];
    for partitions in [1, 2] {
        verify(&values, partitions).expect("unique values");
    }
}

#[test]
fn shared_email_is_a_violation() {
    let values = [(1, "alice@x.com".into()), (3, "alice@x.com".into())];
    for partitions in [1, 2] {
        let err = verify(&values, partitions).unwrap_err();
        let conflict = err.as_conflict().expect("constraint violation");
        assert_eq!(conflict.value, PropValue::from("alice@x.com"));
        assert_eq!(conflict.entity_a, EntityId(1));
        assert_eq!(conflict.entity_b, EntityId(3));
    }
}

#[test]
fn equal_numbers_are_a_violation() {
    let values = [
        (1, PropValue::Float(1.0)),
        (2, PropValue::Float(2.0)),
        (3, PropValue::Float(2.0)),
    ];
    for partitions in [1, 2, 3] {
        let err = verify(&values, partitions).unwrap_err();
        assert_eq!(err.as_conflict().unwrap().value, PropValue::Float(2.0));
        assert_eq!(entities(&err), (2, 3));
    }
}

#[test]
fn targeted_value_skips_unrelated_duplicates() {
    let values = [
        (1, "alice@x.com".into()),
        (3, "alice@x.com".into()),
        (4, "carol@x.com".into()),
    ];
    for partitions in [1, 2, 5] {
        let (store, set) = index(&values, partitions);
        let mut verifier = UniquenessVerifier::new(&set);
        verifier
            .verify_values(&store, EMAIL, &["carol@x.com".into()])
            .expect("carol is unique");
        assert_eq!(verifier.stats().values_checked, 1);
        assert_eq!(verifier.stats().candidates_resolved, 1);

        let err = verifier
            .verify_values(&store, EMAIL, &["alice@x.com".into()])
            .unwrap_err();
        assert_eq!(entities(&err), (1, 3), "partitions = {partitions}");
    }
}

#[test]
fn outcome_does_not_depend_on_partition_count() {
    let values: Vec<(u64, PropValue)> = (0..40u64)
        .map(|i| {
            let value = match i % 4 {
                0 => PropValue::Int(i as i64),
                1 => PropValue::from(format!("user{i}")),
                2 => PropValue::Float(i as f64 + 0.5),
                _ => PropValue::Array(vec![PropValue::Int(i as i64)]),
            };
            (i, value)
        })
        .collect();
    for partitions in [1, 2, 5] {
        verify(&values, partitions).expect("unique values");
    }

    let mut with_dup = values.clone();
    with_dup.push((99, PropValue::from("user17")));
    for partitions in [1, 2, 5] {
        let err = verify(&with_dup, partitions).unwrap_err();
        assert_eq!(entities(&err), (17, 99));
    }
}

#[test]
fn encoding_collisions_are_not_violations() {
    let big = 1i64 << 53;
    let values = [(1, PropValue::Int(big)), (2, PropValue::Int(big + 1))];
    for partitions in [1, 2] {
        verify(&values, partitions).expect("distinct integers sharing a double");
    }
}

#[test]
fn int_and_float_of_same_number_collide() {
    let values = [(1, PropValue::Int(5)), (2, PropValue::Float(5.0))];
    assert!(verify(&values, 2).unwrap_err().as_conflict().is_some());
}

#[test]
fn removed_properties_are_ignored() {
    let values = [(1, "a".into()), (2, "a".into())];
    let (store, set) = index(&values, 1);
    store.remove(EntityId(2), EMAIL);
    UniquenessVerifier::new(&set)
        .verify(&store, EMAIL)
        .expect("stale index entry skipped");
}

#[test]
fn offline_partition_is_unavailable() {
    let (store, set) = index(&[(1, "a".into()), (2, "b".into())], 2);
    set.as_slice()[1].set_online(false);
    let err = UniquenessVerifier::new(&set)
        .verify(&store, EMAIL)
        .unwrap_err();
    assert!(matches!(err, IndexError::IndexUnavailable(_)));
}

struct FailingAccessor;

impl PropertyAccessor for FailingAccessor {
    fn get_property(&self, _: EntityId, _: PropId) -> Result<Option<PropValue>> {
        Err(IndexError::Io(std::io::Error::other("store offline")))
    }
}

#[test]
fn accessor_failures_propagate() {
    let (_, set) = index(&[(1, "a".into()), (2, "a".into())], 1);
    let err = UniquenessVerifier::new(&set)
        .verify(&FailingAccessor, EMAIL)
        .unwrap_err();
    assert!(matches!(err, IndexError::Io(_)));
}

struct CloseTracking {
    inner: MemoryPartition,
    fail: bool,
    closed: Rc<Cell<bool>>,
}

impl Partition for CloseTracking {
    fn fields(&self) -> Result<Vec<FieldInfo>> {
        self.inner.fields()
    }
    fn terms<'a>(&'a self, field: &str) -> Result<Box<dyn TermCursor + 'a>> {
        self.inner.terms(field)
    }
    fn intersect_points(&self, field: &str, visitor: &mut dyn PointVisitor) -> Result<()> {
        self.inner.intersect_points(field, visitor)
    }
    fn search(&self, query: &Query, collector: &mut dyn Collector) -> Result<()> {
        self.inner.search(query, collector)
    }
    fn resolve_entity(&self, doc: DocId) -> Result<EntityId> {
        self.inner.resolve_entity(doc)
    }
    fn document_count(&self) -> Result<u64> {
        self.inner.document_count()
    }
    fn close(&self) -> Result<()> {
        self.closed.set(true);
        self.inner.close()?;
        if self.fail {
            return Err(IndexError::Io(std::io::Error::other("flush failed")));
        }
        Ok(())
    }
}

#[test]
fn verification_then_close_attempts_all_partitions() {
    let store = MemoryPropertyStore::new();
    let flags: Vec<Rc<Cell<bool>>> = (0..3).map(|_| Rc::new(Cell::new(false))).collect();
    let partitions: Vec<CloseTracking> = flags
        .iter()
        .enumerate()
        .map(|(idx, flag)| {
            let mut inner = MemoryPartition::new();
            let value = PropValue::Int(idx as i64);
            store.set(EntityId(idx as u64), EMAIL, value.clone());
            inner.add(EntityId(idx as u64), &value).expect("index value");
            CloseTracking {
                inner,
                fail: idx == 0,
                closed: Rc::clone(flag),
            }
        })
        .collect();
    let set = PartitionSet::new(partitions);
    UniquenessVerifier::new(&set)
        .verify(&store, EMAIL)
        .expect("unique values");
    match set.close() {
        Err(IndexError::Close(CloseErrors(errors))) => assert_eq!(errors.len(), 1),
        other => panic!("expected aggregated close failure, got {other:?}"),
    }
    assert!(flags.iter().all(|flag| flag.get()));
}
