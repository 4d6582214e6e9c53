//! In-memory call history and mapping stores.
//!
//! Both stores live for the lifetime of the process and are shared by every
//! proxy listener and the admin API. No lock is ever held across an await:
//! readers get cloned snapshots.

mod calls;
mod mappings;
mod table;

pub use calls::CallStore;
pub use mappings::{MappingStore, WritePolicy};

use crate::record::{to_mapping, Call, PromoteError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mapping id '{id}' does not match key '{key}'")]
    IdMismatch { key: String, id: String },

    #[error("call '{0}' already exists")]
    Duplicate(String),

    #[error("mapping '{0}' already exists")]
    Conflict(String),

    #[error("'{0}' not found")]
    NotFound(String),
}

/// The two stores, shared behind an `Arc`.
#[derive(Default)]
pub struct Stores {
    pub calls: CallStore,
    pub mappings: MappingStore,
}

impl Stores {
    pub fn new(policy: WritePolicy) -> Self {
        Self {
            calls: CallStore::new(),
            mappings: MappingStore::new(policy),
        }
    }

    /// Promote the call `id` into a mapping under the same id.
    ///
    /// Returns the call as it was before promotion. Nothing is written if the
    /// body cannot be decoded.
    pub fn promote(&self, id: &str) -> Result<Call, PromoteError> {
        let call = self
            .calls
            .get(id)
            .ok_or_else(|| PromoteError::NotFound(id.to_string()))?;
        let mapping = to_mapping(&call)?;
        self.mappings.put(id, mapping)?;
        info!(call_id = %id, "Promoted call to mapping");
        Ok(call)
    }
}
