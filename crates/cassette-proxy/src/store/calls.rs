use super::table::Table;
use super::StoreError;
use crate::record::Call;
use std::collections::HashMap;

/// History of every call forwarded through the proxy.
pub struct CallStore {
    table: Table<Call>,
}

impl Default for CallStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CallStore {
    pub fn new() -> Self {
        Self {
            table: Table::new(),
        }
    }

    /// Store a new call. Ids are never reused; an existing id is rejected.
    pub fn insert(&self, call: Call) -> Result<(), StoreError> {
        let id = call.id.clone();
        if self.table.insert_new(id.clone(), call) {
            Ok(())
        } else {
            Err(StoreError::Duplicate(id))
        }
    }

    pub fn get(&self, id: &str) -> Option<Call> {
        self.table.get(id)
    }

    pub fn list(&self) -> HashMap<String, Call> {
        self.table.snapshot()
    }

    pub fn clear(&self) {
        self.table.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
