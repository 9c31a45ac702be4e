use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::contracts::{SequenceDefinition, SequenceId, SequenceStore, StoreError};

/// In-memory sequence store.
///
/// Each record lives in a `DashMap` shard; create-if-absent goes through the
/// entry API and compare-and-set holds the shard's write lock for the
/// compare and the write, so both are atomic per name.
#[derive(Default)]
pub struct MemorySequenceStore {
    records: DashMap<String, (SequenceId, SequenceDefinition)>,
    next_id: AtomicU64,
}

impl MemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored definitions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the id assigned to `name`, if stored.
    pub fn id_of(&self, name: &str) -> Option<SequenceId> {
        self.records.get(name).map(|r| r.value().0)
    }
}

impl SequenceStore for MemorySequenceStore {
    fn find_by_name(&self, name: &str) -> Result<Option<SequenceDefinition>, StoreError> {
        Ok(self.records.get(name).map(|r| r.value().1.clone()))
    }

    fn create_if_absent(&self, definition: SequenceDefinition) -> Result<SequenceId, StoreError> {
        match self.records.entry(definition.name.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateName(definition.name)),
            Entry::Vacant(slot) => {
                let id = SequenceId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
                slot.insert((id, definition));
                Ok(id)
            }
        }
    }

    fn compare_and_set_value(
        &self,
        name: &str,
        expected: &str,
        new_value: &str,
    ) -> Result<(), StoreError> {
        let mut record = self
            .records
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let definition = &mut record.value_mut().1;
        if definition.current_value != expected {
            return Err(StoreError::Conflict(name.to_string()));
        }
        definition.current_value = new_value.to_string();
        Ok(())
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
