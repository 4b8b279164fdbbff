//! Logger front-end adapter.
//!
//! A [`StructuredLogger`] is bound to one category. Each call is captured
//! into a stamped [`LogEvent`](loggroup_core::event::LogEvent) on the
//! calling thread and handed to the batcher without waiting; nothing here
//! touches storage or returns an error.

use std::sync::Arc;

use chrono::Utc;
use loggroup_core::capture::{EventCapture, LogState, RawEvent};
use loggroup_core::event::{EventId, LogLevel};
use loggroup_core::exception::ExceptionInfo;
use loggroup_core::scope::{ScopeGuard, ScopeStack, ScopeValue};
use loggroup_core::template::format_template;
use serde_json::Value;

use crate::batcher::EventSender;

#[derive(Debug, Clone)]
pub struct StructuredLogger {
    category: Arc<str>,
    sender: EventSender,
    capture: Arc<EventCapture>,
    scopes: ScopeStack,
    include_scopes: bool,
}

impl StructuredLogger {
    pub fn new(
        category: impl Into<Arc<str>>,
        sender: EventSender,
        capture: Arc<EventCapture>,
        include_scopes: bool,
    ) -> Self {
        Self {
            category: category.into(),
            sender,
            capture,
            scopes: ScopeStack::new(),
            include_scopes,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Emit one event. `formatter` renders the message from the state.
    pub fn log<F>(
        &self,
        level: LogLevel,
        event_id: Option<EventId>,
        state: &LogState,
        exception: Option<&ExceptionInfo>,
        formatter: F,
    ) where
        F: FnOnce(&LogState, Option<&ExceptionInfo>) -> String,
    {
        let message = formatter(state, exception);
        let scopes = if self.include_scopes {
            self.scopes.snapshot()
        } else {
            None
        };

        let event = self.capture.capture(RawEvent {
            category: &self.category,
            level,
            event_id,
            state,
            message,
            exception,
            scopes,
            created_at: Utc::now(),
        });
        self.sender.submit(event);
    }

    /// Emit a templated event rendered with `{name}` placeholders.
    pub fn log_template(
        &self,
        level: LogLevel,
        exception: Option<&ExceptionInfo>,
        template: &str,
        values: &[(&str, Value)],
    ) {
        let state = LogState::templated(
            template,
            values.iter().map(|(k, v)| (k.to_string(), v.clone())),
        );
        self.log(level, None, &state, exception, render);
    }

    pub fn trace(&self, template: &str, values: &[(&str, Value)]) {
        self.log_template(LogLevel::Trace, None, template, values);
    }

    pub fn debug(&self, template: &str, values: &[(&str, Value)]) {
        self.log_template(LogLevel::Debug, None, template, values);
    }

    pub fn info(&self, template: &str, values: &[(&str, Value)]) {
        self.log_template(LogLevel::Info, None, template, values);
    }

    pub fn warn(&self, template: &str, values: &[(&str, Value)]) {
        self.log_template(LogLevel::Warn, None, template, values);
    }

    pub fn error(&self, exception: Option<&ExceptionInfo>, template: &str, values: &[(&str, Value)]) {
        self.log_template(LogLevel::Error, exception, template, values);
    }

    pub fn critical(
        &self,
        exception: Option<&ExceptionInfo>,
        template: &str,
        values: &[(&str, Value)],
    ) {
        self.log_template(LogLevel::Critical, exception, template, values);
    }

    /// Activate a scope until the guard drops. `None` when scopes are off.
    #[must_use = "the scope ends as soon as the guard is dropped"]
    pub fn begin_scope(&self, value: ScopeValue) -> Option<ScopeGuard> {
        self.include_scopes.then(|| self.scopes.push(value))
    }

    #[must_use = "the scope ends as soon as the guard is dropped"]
    pub fn begin_key_value_scope(&self, pairs: &[(&str, Value)]) -> Option<ScopeGuard> {
        self.begin_scope(ScopeValue::Pairs(
            pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        ))
    }
}

/// Default formatter: substitute the state's values into its template.
pub fn render(state: &LogState, _exception: Option<&ExceptionInfo>) -> String {
    match state.original_format() {
        Some(template) => format_template(template, &state.values()),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
