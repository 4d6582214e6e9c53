use super::table::Table;
use super::StoreError;
use crate::record::{Mapping, Request};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a write does when the id already holds a mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Replace the existing mapping.
    #[default]
    Overwrite,
    /// Refuse the write.
    Reject,
}

/// Stubs served in place of the origin.
pub struct MappingStore {
    table: Table<Mapping>,
    policy: WritePolicy,
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::new(WritePolicy::default())
    }
}

impl MappingStore {
    pub fn new(policy: WritePolicy) -> Self {
        Self {
            table: Table::new(),
            policy,
        }
    }

    /// Write `mapping` under `id`. The mapping's own id must equal `id`.
    /// Returns true when an existing mapping was replaced.
    pub fn put(&self, id: &str, mapping: Mapping) -> Result<bool, StoreError> {
        if mapping.id != id {
            return Err(StoreError::IdMismatch {
                key: id.to_string(),
                id: mapping.id,
            });
        }
        match self.policy {
            WritePolicy::Overwrite => Ok(self.table.upsert(id.to_string(), mapping)),
            WritePolicy::Reject => {
                if self.table.insert_new(id.to_string(), mapping) {
                    Ok(false)
                } else {
                    Err(StoreError::Conflict(id.to_string()))
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Mapping> {
        self.table.get(id)
    }

    pub fn delete(&self, id: &str) -> Result<Mapping, StoreError> {
        self.table
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> HashMap<String, Mapping> {
        self.table.snapshot()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recently written mapping with the request's method and URL.
    pub fn find(&self, request: &Request) -> Option<Mapping> {
        self.table
            .find_latest(|m| m.request.matches(&request.method, &request.url))
    }

    /// Replace the replayed body of an existing mapping.
    pub fn set_body(&self, id: &str, body: Bytes) -> Result<(), StoreError> {
        if self
            .table
            .update(id, |m| m.response.set_decoded_body(body))
        {
            Ok(())
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }
}
