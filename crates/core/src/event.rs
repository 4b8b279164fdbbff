//! Log event data model.
//!
//! A [`LogEvent`] is one emitted occurrence, fully stamped with its group key
//! and call site. Events are produced by [`crate::capture`] and collapse into
//! [`GroupRecord`](crate::record::GroupRecord)s.

use serde::{Deserialize, Serialize};

use crate::types::{GroupKeyHash, Timestamp, ValueMap};

// ---------------------------------------------------------------------------
// LogLevel
// ---------------------------------------------------------------------------

/// Severity of a log event, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// Parse from a string, defaulting to `Info` for unknown values.
    pub fn from_str(s: &str) -> Self {
        match s {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "critical" => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }
}

// ---------------------------------------------------------------------------
// EventId
// ---------------------------------------------------------------------------

/// Numeric event identifier with an optional symbolic name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventId {
    pub id: i32,
    pub name: Option<String>,
}

impl EventId {
    pub fn new(id: i32) -> Self {
        Self { id, name: None }
    }

    pub fn named(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    /// An id of zero with no name carries no information.
    pub fn is_empty(&self) -> bool {
        self.id == 0 && self.name.is_none()
    }
}

// ---------------------------------------------------------------------------
// LogEvent
// ---------------------------------------------------------------------------

/// One emitted log occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Fully rendered human-readable text.
    pub message: String,

    /// Parameterized form, e.g. `"Generated {count} items"`. `None` when it
    /// would equal `message`.
    pub template: Option<String>,

    pub level: LogLevel,

    pub created_at: Timestamp,

    /// Rendered exception dump (type, message, data, inner chain). Never the
    /// exception object itself.
    pub exception_detail: Option<String>,

    /// Logger category, typically the emitting component's name.
    pub category: String,

    pub event_id: Option<EventId>,

    /// Named substitution values in template order.
    pub template_values: Option<ValueMap>,

    /// Flattened ambient scope values plus exception side data.
    pub scope_values: Option<ValueMap>,

    /// Set once at capture time; see [`crate::group_key`].
    pub group_key_hash: GroupKeyHash,

    /// The text `group_key_hash` was computed from, call-site salt included.
    #[serde(default)]
    pub canonical_message: String,

    /// Application call site. Empty strings when unavailable.
    pub function: String,
    pub file: String,
    pub line: String,
}

impl LogEvent {
    /// The grouping text of this event: its template, or the message.
    pub fn template_or_message(&self) -> &str {
        self.template.as_deref().unwrap_or(&self.message)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_round_trips_through_str() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::Critical,
        ] {
            assert_eq!(LogLevel::from_str(level.as_str()), level);
        }
    }

    #[test]
    fn unknown_level_defaults_to_info() {
        assert_eq!(LogLevel::from_str("fatal"), LogLevel::Info);
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Error < LogLevel::Critical);
    }

    #[test]
    fn zero_unnamed_event_id_is_empty() {
        assert!(EventId::new(0).is_empty());
        assert!(!EventId::new(7).is_empty());
        assert!(!EventId::named(0, "Startup").is_empty());
    }
}
