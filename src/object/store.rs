//! Keyed table of object records.
//!
//! Lookups run under the single-threaded server loop, so the store is
//! a plain `HashMap` with a side list preserving insertion order;
//! `object-list[i]` must name the same object at the same index for
//! the whole process lifetime.

use std::collections::HashMap;

use thiserror::Error;

use super::{ObjectIdentifier, ObjectRecord};

/// Inserting the same `(type, instance)` twice is an initialization
/// fault, not a runtime condition.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("duplicate object {0:?}")]
pub struct DuplicateObject(pub ObjectIdentifier);

/// The server's object table.
#[derive(Debug, Default)]
pub struct ObjectStore {
    records: HashMap<ObjectIdentifier, ObjectRecord>,
    order: Vec<ObjectIdentifier>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ObjectRecord) -> Result<(), DuplicateObject> {
        let identifier = record.identifier;
        if self.records.contains_key(&identifier) {
            return Err(DuplicateObject(identifier));
        }
        self.order.push(identifier);
        self.records.insert(identifier, record);
        Ok(())
    }

    pub fn find(&self, identifier: ObjectIdentifier) -> Option<&ObjectRecord> {
        self.records.get(&identifier)
    }

    pub fn find_mut(&mut self, identifier: ObjectIdentifier) -> Option<&mut ObjectRecord> {
        self.records.get_mut(&identifier)
    }

    pub fn contains(&self, identifier: ObjectIdentifier) -> bool {
        self.records.contains_key(&identifier)
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    /// Records in insertion order; the order backs `object-list` and
    /// is stable across calls.
    pub fn iter(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.order.iter().map(|id| &self.records[id])
    }

    /// Identifiers in insertion order.
    pub fn identifiers(&self) -> impl Iterator<Item = ObjectIdentifier> + '_ {
        self.order.iter().copied()
    }

    /// The identifier at a 1-based `object-list` index.
    pub fn identifier_at(&self, index: usize) -> Option<ObjectIdentifier> {
        index.checked_sub(1).and_then(|i| self.order.get(i)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{BinaryPv, ObjectRecord, ObjectType};

    fn sample_store() -> ObjectStore {
        let mut store = ObjectStore::new();
        store.insert(ObjectRecord::device(260, "BACnet4Linux".into())).unwrap();
        store
            .insert(ObjectRecord::binary_output(4018, "Test LED".into(), BinaryPv::Inactive))
            .unwrap();
        store
            .insert(ObjectRecord::analog_input(1020, "Temperature".into(), 20.0))
            .unwrap();
        store
    }

    #[test]
    fn find_and_count() {
        let store = sample_store();
        assert_eq!(store.count(), 3);
        let id = ObjectIdentifier::new(ObjectType::BinaryOutput, 4018);
        assert_eq!(store.find(id).unwrap().name, "Test LED");
        assert!(store.find(ObjectIdentifier::new(ObjectType::BinaryOutput, 4019)).is_none());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut store = sample_store();
        let err = store
            .insert(ObjectRecord::binary_output(4018, "Clone".into(), BinaryPv::Inactive))
            .unwrap_err();
        assert_eq!(err.0, ObjectIdentifier::new(ObjectType::BinaryOutput, 4018));
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let store = sample_store();
        let order: Vec<_> = store.identifiers().collect();
        assert_eq!(
            order,
            vec![
                ObjectIdentifier::new(ObjectType::Device, 260),
                ObjectIdentifier::new(ObjectType::BinaryOutput, 4018),
                ObjectIdentifier::new(ObjectType::AnalogInput, 1020),
            ]
        );
        // Stable across repeated iteration.
        assert_eq!(order, store.identifiers().collect::<Vec<_>>());
    }

    #[test]
    fn object_list_indexing_is_one_based() {
        let store = sample_store();
        assert_eq!(store.identifier_at(1), Some(ObjectIdentifier::new(ObjectType::Device, 260)));
        assert_eq!(store.identifier_at(3), Some(ObjectIdentifier::new(ObjectType::AnalogInput, 1020)));
        assert_eq!(store.identifier_at(0), None);
        assert_eq!(store.identifier_at(4), None);
    }
}
