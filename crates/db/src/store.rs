//! The group store boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use loggroup_core::record::GroupRecord;
use loggroup_core::types::Timestamp;

use crate::error::StoreError;

/// One record to persist as part of a batch save.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupWrite {
    /// A record first seen in this batch. Fails with
    /// [`StoreError::Conflict`] if the id already exists.
    Create(GroupRecord),
    /// A record that was loaded from the store.
    Update(GroupRecord),
}

impl GroupWrite {
    pub fn record(&self) -> &GroupRecord {
        match self {
            GroupWrite::Create(r) | GroupWrite::Update(r) => r,
        }
    }
}

/// Persistent storage for [`GroupRecord`]s.
///
/// Expired records (see [`GroupRecord::expires_at`]) must be invisible to
/// every read.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Load every record among `ids` that exists. Missing ids are absent
    /// from the returned map.
    async fn load_many(&self, ids: &[String]) -> Result<HashMap<String, GroupRecord>, StoreError>;

    /// Persist all writes atomically: either every write lands or none does.
    async fn save_all(&self, writes: Vec<GroupWrite>) -> Result<(), StoreError>;

    /// Stored canonical messages (see [`GroupRecord::canonical_message`])
    /// similar to `text` at `accuracy` (`0.0..=1.0`), most similar first.
    ///
    /// Returns [`StoreError::Unsupported`] when the backend cannot search.
    async fn suggest(&self, text: &str, accuracy: f32) -> Result<Vec<String>, StoreError>;

    /// The most recently active record whose canonical message is `canonical`.
    async fn load_by_canonical(&self, canonical: &str)
        -> Result<Option<GroupRecord>, StoreError>;

    /// Delete records whose expiration passed before `now`. Returns the
    /// number removed.
    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError>;
}
