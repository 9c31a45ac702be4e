use crate::contracts::error::StoreError;
use crate::contracts::sequence::{SequenceDefinition, SequenceId};

/// Persistence backend for sequence definitions, keyed by name.
///
/// # Invariants
/// - Names are unique: `create_if_absent` checks and inserts atomically
/// - `current_value` only changes through `compare_and_set_value`
/// - Definitions are never deleted through this trait
pub trait SequenceStore: Send + Sync {
    /// Looks up a definition by name.
    fn find_by_name(&self, name: &str) -> Result<Option<SequenceDefinition>, StoreError>;

    /// Inserts a new definition unless one with the same name exists.
    /// Returns `StoreError::DuplicateName` if it does.
    fn create_if_absent(&self, definition: SequenceDefinition) -> Result<SequenceId, StoreError>;

    /// Replaces the stored `current_value` with `new_value` only if it still
    /// equals `expected`. Returns `StoreError::Conflict` otherwise.
    fn compare_and_set_value(
        &self,
        name: &str,
        expected: &str,
        new_value: &str,
    ) -> Result<(), StoreError>;

    /// Lists the names of all stored definitions, sorted.
    fn list_names(&self) -> Result<Vec<String>, StoreError>;
}
