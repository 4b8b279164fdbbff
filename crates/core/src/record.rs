//! Grouped log records.
//!
//! A [`GroupRecord`] is the persisted aggregate that every [`LogEvent`] with
//! the same group key collapses into. It keeps a lifetime occurrence count
//! and a bounded, most-recent-first history of raw occurrences.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{LogEvent, LogLevel};
use crate::types::Timestamp;

/// Default bound on retained occurrences per group.
pub const DEFAULT_MAX_OCCURRENCES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Derived from the group key hash, see [`crate::group_key::group_id`].
    pub id: String,

    /// Template (or message) of the most recently merged event.
    pub message_template: String,

    /// Salted grouping text of the most recently merged event. Fuzzy search
    /// compares against this, so call sites stay apart.
    #[serde(default)]
    pub canonical_message: String,

    /// Level of the most recent occurrence.
    pub level: LogLevel,

    pub first_occurrence: Option<Timestamp>,
    pub last_occurrence: Option<Timestamp>,

    /// Lifetime count. Independent of how many occurrences are retained.
    pub occurrence_count: i64,

    /// Most recent first, bounded by the configured maximum.
    pub occurrences: VecDeque<LogEvent>,

    pub function: String,
    pub file: String,
    pub line: String,

    /// Sliding expiration marker, refreshed on every merge.
    pub expires_at: Option<Timestamp>,
}

impl GroupRecord {
    /// An empty record that has not seen any event yet.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message_template: String::new(),
            canonical_message: String::new(),
            level: LogLevel::Info,
            first_occurrence: None,
            last_occurrence: None,
            occurrence_count: 0,
            occurrences: VecDeque::new(),
            function: String::new(),
            file: String::new(),
            line: String::new(),
            expires_at: None,
        }
    }

    /// Merge one event into the record.
    ///
    /// The event goes to the front of the history; when the history then
    /// exceeds `max_occurrences` the oldest entry is dropped. The count always
    /// grows by exactly one. `last_occurrence` never moves backwards.
    pub fn merge(&mut self, event: LogEvent, max_occurrences: usize) {
        let at = event.created_at;

        if self.first_occurrence.is_none() {
            self.first_occurrence = Some(at);
        }
        self.last_occurrence = Some(match self.last_occurrence {
            Some(last) if last > at => last,
            _ => at,
        });

        self.level = event.level;
        self.message_template = event.template_or_message().to_string();
        self.canonical_message.clone_from(&event.canonical_message);
        self.function.clone_from(&event.function);
        self.file.clone_from(&event.file);
        self.line.clone_from(&event.line);
        self.occurrence_count += 1;

        self.occurrences.push_front(event);
        while self.occurrences.len() > max_occurrences.max(1) {
            self.occurrences.pop_back();
        }
    }

    /// Push the expiration out to `now + retention_days`, saturating at the
    /// latest representable timestamp.
    pub fn refresh_expiration(&mut self, now: Timestamp, retention_days: i64) {
        let expires_at = chrono::Duration::try_days(retention_days)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expires_at = Some(expires_at);
    }

    /// Whether the record's expiration marker has passed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
