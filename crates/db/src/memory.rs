//! In-process [`GroupStore`].
//!
//! Holds records in a shared map behind a `tokio` read/write lock. Fuzzy
//! search scores stored canonical messages with [`crate::similarity`], so results
//! track what the PostgreSQL store would return.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use loggroup_core::record::GroupRecord;
use loggroup_core::types::Timestamp;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::similarity::similarity;
use crate::store::{GroupStore, GroupWrite};

/// Upper bound on [`GroupStore::suggest`] results.
const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct MemoryGroupStore {
    records: Arc<RwLock<HashMap<String, GroupRecord>>>,
    fuzzy_search: bool,
}

impl Default for MemoryGroupStore {
    fn default() -> Self {
        Self {
            records: Arc::default(),
            fuzzy_search: true,
        }
    }
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose [`suggest`](GroupStore::suggest) reports
    /// [`StoreError::Unsupported`].
    pub fn without_fuzzy_search() -> Self {
        Self {
            fuzzy_search: false,
            ..Self::default()
        }
    }

    /// Every live record, most recently active first.
    pub async fn snapshot(&self) -> Vec<GroupRecord> {
        let now = Utc::now();
        let records = self.records.read().await;
        let mut live: Vec<GroupRecord> = records
            .values()
            .filter(|r| !r.is_expired(now))
            .cloned()
            .collect();
        live.sort_by(|a, b| b.last_occurrence.cmp(&a.last_occurrence));
        live
    }

    /// Number of stored records, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Insert or replace a record without conflict checks.
    pub async fn insert(&self, record: GroupRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn load_many(&self, ids: &[String]) -> Result<HashMap<String, GroupRecord>, StoreError> {
        let now = Utc::now();
        let records = self.records.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id))
            .filter(|r| !r.is_expired(now))
            .map(|r| (r.id.clone(), r.clone()))
            .collect())
    }

    async fn save_all(&self, writes: Vec<GroupWrite>) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut records = self.records.write().await;

        // Validate everything before applying anything.
        for write in &writes {
            if let GroupWrite::Create(record) = write {
                if records.get(&record.id).is_some_and(|r| !r.is_expired(now)) {
                    return Err(StoreError::Conflict {
                        id: record.id.clone(),
                    });
                }
            }
        }

        for write in writes {
            let record = match write {
                GroupWrite::Create(r) | GroupWrite::Update(r) => r,
            };
            records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn suggest(&self, text: &str, accuracy: f32) -> Result<Vec<String>, StoreError> {
        if !self.fuzzy_search {
            return Err(StoreError::Unsupported("fuzzy search".into()));
        }

        let now = Utc::now();
        let records = self.records.read().await;
        let mut scored: Vec<(f32, &str)> = records
            .values()
            .filter(|r| !r.is_expired(now))
            .map(|r| (similarity(text, &r.canonical_message), r.canonical_message.as_str()))
            .filter(|(score, _)| *score >= accuracy)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut suggestions: Vec<String> = Vec::new();
        for (_, canonical) in scored {
            if !suggestions.iter().any(|s| s == canonical) {
                suggestions.push(canonical.to_string());
            }
            if suggestions.len() == MAX_SUGGESTIONS {
                break;
            }
        }
        Ok(suggestions)
    }

    async fn load_by_canonical(
        &self,
        canonical: &str,
    ) -> Result<Option<GroupRecord>, StoreError> {
        let now = Utc::now();
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| !r.is_expired(now) && r.canonical_message == canonical)
            .max_by_key(|r| r.last_occurrence)
            .cloned())
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;

    use super::*;

    fn record(id: &str, template: &str) -> GroupRecord {
        let mut record = GroupRecord::new(id);
        record.message_template = template.to_string();
        record.canonical_message = template.to_string();
        record.occurrence_count = 1;
        record.last_occurrence = Some(Utc::now());
        record.refresh_expiration(Utc::now(), 365);
        record
    }

    fn expired(id: &str, template: &str) -> GroupRecord {
        let mut record = record(id, template);
        record.expires_at = Some(Utc::now() - Duration::seconds(1));
        record
    }

    // -- load / save ---------------------------------------------------------

    #[tokio::test]
    async fn load_many_returns_only_existing_ids() {
        let store = MemoryGroupStore::new();
        store.insert(record("loggroups/1", "a")).await;

        let loaded = store
            .load_many(&["loggroups/1".into(), "loggroups/2".into()])
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("loggroups/1"));
    }

    #[tokio::test]
    async fn expired_records_are_invisible() {
        let store = MemoryGroupStore::new();
        store.insert(expired("loggroups/1", "gone")).await;

        assert!(store.load_many(&["loggroups/1".into()]).await.unwrap().is_empty());
        assert_eq!(store.load_by_canonical("gone").await.unwrap(), None);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn create_of_existing_id_conflicts_and_applies_nothing() {
        let store = MemoryGroupStore::new();
        store.insert(record("loggroups/1", "original")).await;

        let result = store
            .save_all(vec![
                GroupWrite::Create(record("loggroups/2", "fresh")),
                GroupWrite::Create(record("loggroups/1", "duplicate")),
            ])
            .await;

        assert_matches!(result, Err(StoreError::Conflict { id }) if id == "loggroups/1");
        let loaded = store
            .load_many(&["loggroups/1".into(), "loggroups/2".into()])
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["loggroups/1"].message_template, "original");
    }

    #[tokio::test]
    async fn create_over_expired_record_succeeds() {
        let store = MemoryGroupStore::new();
        store.insert(expired("loggroups/1", "old")).await;

        store
            .save_all(vec![GroupWrite::Create(record("loggroups/1", "new"))])
            .await
            .unwrap();
        let loaded = store.load_many(&["loggroups/1".into()]).await.unwrap();
        assert_eq!(loaded["loggroups/1"].message_template, "new");
    }

    #[tokio::test]
    async fn update_replaces_existing_record() {
        let store = MemoryGroupStore::new();
        store.insert(record("loggroups/1", "a")).await;

        let mut updated = record("loggroups/1", "a");
        updated.occurrence_count = 9;
        store.save_all(vec![GroupWrite::Update(updated)]).await.unwrap();

        let loaded = store.load_many(&["loggroups/1".into()]).await.unwrap();
        assert_eq!(loaded["loggroups/1"].occurrence_count, 9);
    }

    // -- fuzzy search --------------------------------------------------------

    #[tokio::test]
    async fn suggest_ranks_similar_templates() {
        let store = MemoryGroupStore::new();
        store
            .insert(record("loggroups/1", "Cache refresh failed for tenant acme after retries"))
            .await;
        store.insert(record("loggroups/2", "User signed in")).await;

        let suggestions = store
            .suggest("Cache refresh failed for tenant acme after retry", 0.8)
            .await
            .unwrap();
        assert_eq!(
            suggestions,
            ["Cache refresh failed for tenant acme after retries"]
        );
    }

    #[tokio::test]
    async fn suggest_compares_canonical_messages() {
        let store = MemoryGroupStore::new();
        let mut salted = record("loggroups/1", "Request failed");
        salted.canonical_message =
            "Request failed at HomeController.Index() in HomeController.cs line 33".into();
        store.insert(salted).await;

        assert!(store.suggest("Request failed", 0.8).await.unwrap().is_empty());
        assert_eq!(
            store
                .suggest(
                    "Request failed at HomeController.Index() in HomeController.cs line 33",
                    0.8
                )
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn suggest_without_fuzzy_search_is_unsupported() {
        let store = MemoryGroupStore::without_fuzzy_search();
        assert_matches!(
            store.suggest("anything", 0.5).await,
            Err(StoreError::Unsupported(_))
        );
    }

    #[tokio::test]
    async fn load_by_canonical_prefers_latest_activity() {
        let store = MemoryGroupStore::new();
        let mut older = record("loggroups/1", "same");
        older.last_occurrence = Some(Utc::now() - Duration::hours(1));
        store.insert(older).await;
        store.insert(record("loggroups/2", "same")).await;

        let found = store.load_by_canonical("same").await.unwrap().unwrap();
        assert_eq!(found.id, "loggroups/2");
    }

    // -- retention -----------------------------------------------------------

    #[tokio::test]
    async fn purge_removes_only_expired_records() {
        let store = MemoryGroupStore::new();
        store.insert(record("loggroups/1", "live")).await;
        store.insert(expired("loggroups/2", "dead")).await;

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert_eq!(store.snapshot().await.len(), 1);
        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 0);
    }
}
