//! Log grouping configuration.
//!
//! One [`LogGroupConfig`] is built at startup and shared (via `Arc`) with the
//! batcher, merger and loggers.

use std::time::Duration;

use crate::error::CoreError;
use crate::record::DEFAULT_MAX_OCCURRENCES;
use crate::stack_frame::{StackFrameExtractor, DEFAULT_FRAME_DENYLIST};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_RETENTION_DAYS: i64 = 365;

/// A century. Longer retention is not a meaningful setting.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// 0.9 is too strict to group messages that belong together.
pub const DEFAULT_FUZZY_MATCH_ACCURACY: f32 = 0.8;

pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_secs(2);

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// LogGroupConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LogGroupConfig {
    /// Raw occurrences retained per group (default: `20`).
    pub max_occurrences_per_group: usize,
    /// Collect ambient scopes (default: `true`).
    pub include_scopes: bool,
    /// Days a group survives without new occurrences (default: `365`).
    pub retention_days: i64,
    /// Fuzzy match threshold, `1.0` exact only, `0.0` very loose (default: `0.8`).
    pub fuzzy_match_accuracy: f32,
    /// Fixed batching window (default: 2 s).
    pub batch_window: Duration,
    /// Producer queue bound; events beyond it are dropped (default: `10000`).
    pub queue_capacity: usize,
    /// Expired-group sweep interval, `Duration::ZERO` disables (default: 1 h).
    pub purge_interval: Duration,
    /// Stack frame prefixes that never identify application code.
    pub frame_denylist: Vec<String>,
}

impl Default for LogGroupConfig {
    fn default() -> Self {
        Self {
            max_occurrences_per_group: DEFAULT_MAX_OCCURRENCES,
            include_scopes: true,
            retention_days: DEFAULT_RETENTION_DAYS,
            fuzzy_match_accuracy: DEFAULT_FUZZY_MATCH_ACCURACY,
            batch_window: DEFAULT_BATCH_WINDOW,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            purge_interval: DEFAULT_PURGE_INTERVAL,
            frame_denylist: DEFAULT_FRAME_DENYLIST.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl LogGroupConfig {
    /// Load configuration from environment variables over the defaults.
    ///
    /// | Env Var                             | Default  |
    /// |-------------------------------------|----------|
    /// | `LOGGING_MAX_OCCURRENCES`           | `20`     |
    /// | `LOGGING_INCLUDE_SCOPES`            | `true`   |
    /// | `LOGGING_EXPIRATION_IN_DAYS`        | `365`    |
    /// | `LOGGING_FUZZY_LOG_SEARCH_ACCURACY` | `0.8`    |
    /// | `LOGGING_BATCH_WINDOW_MS`           | `2000`   |
    /// | `LOGGING_QUEUE_CAPACITY`            | `10000`  |
    /// | `LOGGING_PURGE_INTERVAL_SECS`       | `3600`   |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "LOGGING_MAX_OCCURRENCES")? {
            config.max_occurrences_per_group = v;
        }
        if let Some(v) = parse_var(&lookup, "LOGGING_INCLUDE_SCOPES")? {
            config.include_scopes = v;
        }
        if let Some(v) = parse_var(&lookup, "LOGGING_EXPIRATION_IN_DAYS")? {
            config.retention_days = v;
        }
        if let Some(v) = parse_var(&lookup, "LOGGING_FUZZY_LOG_SEARCH_ACCURACY")? {
            config.fuzzy_match_accuracy = v;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "LOGGING_BATCH_WINDOW_MS")? {
            config.batch_window = Duration::from_millis(ms);
        }
        if let Some(v) = parse_var(&lookup, "LOGGING_QUEUE_CAPACITY")? {
            config.queue_capacity = v;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "LOGGING_PURGE_INTERVAL_SECS")? {
            config.purge_interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every option is within its accepted range.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_occurrences_per_group == 0 {
            return Err(CoreError::Validation(
                "max_occurrences_per_group must be at least 1".into(),
            ));
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.retention_days) {
            return Err(CoreError::Validation(format!(
                "retention_days must be between 1 and {MAX_RETENTION_DAYS}, got {}",
                self.retention_days
            )));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_match_accuracy) {
            return Err(CoreError::Validation(format!(
                "fuzzy_match_accuracy must be between 0 and 1, got {}",
                self.fuzzy_match_accuracy
            )));
        }
        if self.batch_window.is_zero() {
            return Err(CoreError::Validation("batch_window must be non-zero".into()));
        }
        if self.queue_capacity == 0 {
            return Err(CoreError::Validation("queue_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Call-site extractor built from [`frame_denylist`](Self::frame_denylist).
    pub fn frame_extractor(&self) -> StackFrameExtractor {
        StackFrameExtractor::new(self.frame_denylist.iter().cloned())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CoreError::Validation(format!("{key} is invalid ({raw:?}): {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
