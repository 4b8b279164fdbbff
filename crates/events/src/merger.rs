//! Merging batches of events into stored groups.
//!
//! [`GroupMerger`] loads every group a batch touches in one call, merges the
//! events in memory and commits all touched groups in one save. Events that
//! share a key in the same batch merge into the same record. A group created
//! concurrently by another writer surfaces as a conflict on save; the whole
//! batch is then retried exactly once.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use loggroup_core::config::LogGroupConfig;
use loggroup_core::event::LogEvent;
use loggroup_core::group_key::group_id;
use loggroup_core::record::GroupRecord;
use loggroup_db::{GroupStore, GroupWrite, StoreError};
use tokio::sync::mpsc;

use crate::error::MergeError;

/// A record touched by the batch being merged.
struct Pending {
    record: GroupRecord,
    created: bool,
}

impl Pending {
    fn into_write(self) -> GroupWrite {
        if self.created {
            GroupWrite::Create(self.record)
        } else {
            GroupWrite::Update(self.record)
        }
    }
}

#[derive(Clone)]
pub struct GroupMerger {
    store: Arc<dyn GroupStore>,
    config: Arc<LogGroupConfig>,
}

impl GroupMerger {
    pub fn new(store: Arc<dyn GroupStore>, config: Arc<LogGroupConfig>) -> Self {
        Self { store, config }
    }

    /// Merge batches one at a time until the batch channel closes.
    ///
    /// A failed batch is logged and dropped; the loop keeps going.
    pub async fn run(self, mut batches: mpsc::Receiver<Vec<LogEvent>>) {
        tracing::info!("Group merger started");

        while let Some(batch) = batches.recv().await {
            let batch_size = batch.len();
            match self.merge_batch(&batch).await {
                Ok(groups) => {
                    tracing::debug!(batch_size, groups, "Merged log batch");
                }
                Err(e) => {
                    tracing::error!(error = %e, batch_size, "Failed to merge log batch, events lost");
                }
            }
        }

        tracing::info!("Group merger stopped");
    }

    /// Merge one batch and persist it. Returns the number of groups written.
    pub async fn merge_batch(&self, events: &[LogEvent]) -> Result<usize, MergeError> {
        if events.is_empty() {
            return Ok(0);
        }

        match self.try_merge(events).await {
            Err(StoreError::Conflict { id }) => {
                tracing::warn!(%id, "Group created concurrently, retrying batch");
                match self.try_merge(events).await {
                    Err(StoreError::Conflict { id }) => Err(MergeError::ConflictAfterRetry { id }),
                    result => Ok(result?),
                }
            }
            result => Ok(result?),
        }
    }

    async fn try_merge(&self, events: &[LogEvent]) -> Result<usize, StoreError> {
        let now = Utc::now();

        let mut seen = HashSet::new();
        let ids: Vec<String> = events
            .iter()
            .map(|e| group_id(e.group_key_hash))
            .filter(|id| seen.insert(id.clone()))
            .collect();
        let mut loaded = self.store.load_many(&ids).await?;

        let mut touched: HashMap<String, Pending> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        // Key id -> id of the record its events merge into.
        let mut resolved: HashMap<String, String> = HashMap::new();

        for event in events {
            let key_id = group_id(event.group_key_hash);

            let target = match resolved.get(&key_id) {
                Some(target) => target.clone(),
                None => {
                    let (target, pending) = self.resolve(&key_id, event, &mut loaded, &touched).await;
                    if let Some(pending) = pending {
                        if let Entry::Vacant(slot) = touched.entry(target.clone()) {
                            order.push(target.clone());
                            slot.insert(pending);
                        }
                    }
                    resolved.insert(key_id, target.clone());
                    target
                }
            };

            if let Some(pending) = touched.get_mut(&target) {
                pending
                    .record
                    .merge(event.clone(), self.config.max_occurrences_per_group);
                pending
                    .record
                    .refresh_expiration(now, self.config.retention_days);
            }
        }

        let writes: Vec<GroupWrite> = order
            .iter()
            .filter_map(|id| touched.remove(id))
            .map(Pending::into_write)
            .collect();
        let groups = writes.len();

        self.store.save_all(writes).await?;
        Ok(groups)
    }

    /// Find the record an event with `key_id` merges into. Returns the
    /// record id and, unless it is already touched, the record itself.
    async fn resolve(
        &self,
        key_id: &str,
        event: &LogEvent,
        loaded: &mut HashMap<String, GroupRecord>,
        touched: &HashMap<String, Pending>,
    ) -> (String, Option<Pending>) {
        if touched.contains_key(key_id) {
            return (key_id.to_string(), None);
        }

        if let Some(record) = loaded.remove(key_id) {
            return (
                key_id.to_string(),
                Some(Pending {
                    record,
                    created: false,
                }),
            );
        }

        if let Some(record) = self.fuzzy_lookup(event).await {
            tracing::debug!(
                key_id,
                matched = %record.id,
                "Event merged into similar group"
            );
            let id = record.id.clone();
            let pending = (!touched.contains_key(&id)).then_some(Pending {
                record,
                created: false,
            });
            return (id, pending);
        }

        (
            key_id.to_string(),
            Some(Pending {
                record: GroupRecord::new(key_id),
                created: true,
            }),
        )
    }

    /// Best similar group for an event without an exact match. Compares
    /// canonical messages, so exceptions from another call site only match
    /// when that site is textually close. Failures count as no match.
    async fn fuzzy_lookup(&self, event: &LogEvent) -> Option<GroupRecord> {
        let suggestions = match self
            .store
            .suggest(&event.canonical_message, self.config.fuzzy_match_accuracy)
            .await
        {
            Ok(suggestions) => suggestions,
            Err(StoreError::Unsupported(reason)) => {
                tracing::warn!(%reason, "Fuzzy group search unavailable");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Fuzzy group search failed");
                return None;
            }
        };

        let canonical = suggestions.into_iter().next()?;
        match self.store.load_by_canonical(&canonical).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load similar group");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
