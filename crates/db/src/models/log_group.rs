//! Row model for the `log_groups` table.

use std::collections::VecDeque;

use loggroup_core::event::{LogEvent, LogLevel};
use loggroup_core::record::GroupRecord;
use loggroup_core::types::Timestamp;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `log_groups` table.
#[derive(Debug, Clone, FromRow)]
pub struct LogGroupRow {
    pub id: String,
    pub message_template: String,
    pub canonical_message: String,
    pub level: String,
    pub first_occurrence: Option<Timestamp>,
    pub last_occurrence: Option<Timestamp>,
    pub occurrence_count: i64,
    pub function: String,
    pub file: String,
    pub line: String,
    pub occurrences: Json<VecDeque<LogEvent>>,
    pub expires_at: Option<Timestamp>,
}

impl From<LogGroupRow> for GroupRecord {
    fn from(row: LogGroupRow) -> Self {
        GroupRecord {
            id: row.id,
            message_template: row.message_template,
            canonical_message: row.canonical_message,
            level: LogLevel::from_str(&row.level),
            first_occurrence: row.first_occurrence,
            last_occurrence: row.last_occurrence,
            occurrence_count: row.occurrence_count,
            occurrences: row.occurrences.0,
            function: row.function,
            file: row.file,
            line: row.line,
            expires_at: row.expires_at,
        }
    }
}
