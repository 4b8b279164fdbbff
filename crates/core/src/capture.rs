//! Turning one logger call into a stamped [`LogEvent`].
//!
//! The front-end hands over the call's state (ordered name/value pairs, one
//! of which may be the `{OriginalFormat}` template), the rendered message,
//! an optional exception and the active scopes. [`EventCapture`] computes the
//! call site and group key and assembles the event.

use serde_json::Value;

use crate::event::{EventId, LogEvent, LogLevel};
use crate::exception::ExceptionInfo;
use crate::group_key::GroupKey;
use crate::stack_frame::StackFrameExtractor;
use crate::template::infer_template;
use crate::types::{Timestamp, ValueMap};

/// State entry carrying the pre-substitution template.
pub const ORIGINAL_FORMAT_KEY: &str = "{OriginalFormat}";

// ---------------------------------------------------------------------------
// LogState
// ---------------------------------------------------------------------------

/// Ordered name/value pairs of one logger call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogState {
    pairs: Vec<(String, Value)>,
}

impl LogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a templated call: `{OriginalFormat}` followed by the values.
    pub fn templated(
        template: impl Into<String>,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let mut state = Self::new();
        state.pairs = values.into_iter().collect();
        state
            .pairs
            .push((ORIGINAL_FORMAT_KEY.to_string(), Value::String(template.into())));
        state
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    pub fn pairs(&self) -> &[(String, Value)] {
        &self.pairs
    }

    /// The explicit template, if the call carried one.
    pub fn original_format(&self) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == ORIGINAL_FORMAT_KEY)
            .and_then(|(_, v)| v.as_str())
    }

    /// Named values without the `{OriginalFormat}` entry.
    pub fn values(&self) -> ValueMap {
        self.pairs
            .iter()
            .filter(|(k, _)| k != ORIGINAL_FORMAT_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// EventCapture
// ---------------------------------------------------------------------------

/// Everything known about one logger call.
#[derive(Debug, Clone)]
pub struct RawEvent<'a> {
    pub category: &'a str,
    pub level: LogLevel,
    pub event_id: Option<EventId>,
    pub state: &'a LogState,
    pub message: String,
    pub exception: Option<&'a ExceptionInfo>,
    pub scopes: Option<ValueMap>,
    pub created_at: Timestamp,
}

/// Builds stamped events using one call-site extractor.
#[derive(Debug, Clone, Default)]
pub struct EventCapture {
    extractor: StackFrameExtractor,
}

impl EventCapture {
    pub fn new(extractor: StackFrameExtractor) -> Self {
        Self { extractor }
    }

    pub fn capture(&self, raw: RawEvent<'_>) -> LogEvent {
        let message = raw.message;

        // A template equal to the message is duplicate data.
        let explicit = raw
            .state
            .original_format()
            .filter(|template| *template != message);
        let values = raw.state.values();

        let inferred = match explicit {
            None if !values.is_empty() => infer_template(&message, &values),
            _ => None,
        };

        let frame = self
            .extractor
            .extract(raw.exception.and_then(|e| e.stack_trace.as_deref()));
        let key = GroupKey::compute(
            &message,
            raw.exception.is_some(),
            explicit,
            inferred.as_deref(),
            &frame,
        );

        let template = explicit
            .map(str::to_string)
            .or(inferred)
            .filter(|t| *t != message);

        let mut scope_values = raw.scopes;
        if let Some(exception) = raw.exception {
            if exception.chain().any(|e| !e.data.is_empty()) {
                exception.merge_data_into(scope_values.get_or_insert_with(ValueMap::new));
            }
        }

        LogEvent {
            template,
            level: raw.level,
            created_at: raw.created_at,
            exception_detail: raw.exception.map(ExceptionInfo::to_detailed_string),
            category: raw.category.to_string(),
            event_id: raw.event_id.filter(|id| !id.is_empty()),
            template_values: (!values.is_empty()).then_some(values),
            scope_values,
            group_key_hash: key.hash,
            canonical_message: key.canonical_message,
            function: frame.function,
            file: frame.file,
            line: frame.line,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::group_key::deterministic_hash;

    fn raw<'a>(state: &'a LogState, message: &str) -> RawEvent<'a> {
        RawEvent {
            category: "app::orders",
            level: LogLevel::Info,
            event_id: None,
            state,
            message: message.to_string(),
            exception: None,
            scopes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn plain_message_has_no_template_or_values() {
        let state = LogState::new();
        let event = EventCapture::default().capture(raw(&state, "Hi there!"));

        assert_eq!(event.template, None);
        assert_eq!(event.template_values, None);
        assert_eq!(event.group_key_hash, deterministic_hash("Hi there!"));
        assert_eq!(event.category, "app::orders");
    }

    #[test]
    fn explicit_template_groups_different_renderings() {
        let capture = EventCapture::default();
        let s1 = LogState::templated("Generated {count} items", [("count".to_string(), json!(5))]);
        let s2 = LogState::templated("Generated {count} items", [("count".to_string(), json!(2))]);

        let a = capture.capture(raw(&s1, "Generated 5 items"));
        let b = capture.capture(raw(&s2, "Generated 2 items"));

        assert_eq!(a.group_key_hash, b.group_key_hash);
        assert_eq!(a.template.as_deref(), Some("Generated {count} items"));
        assert_eq!(a.template_values.unwrap().get("count"), Some(&json!(5)));
    }

    #[test]
    fn original_format_equal_to_message_is_dropped() {
        let state = LogState::templated("Hi there!", []);
        let event = EventCapture::default().capture(raw(&state, "Hi there!"));
        assert_eq!(event.template, None);
        assert_eq!(event.template_values, None);
    }

    #[test]
    fn template_inferred_from_values_without_original_format() {
        let state = LogState::new().with("Elapsed", 2.94);
        let event = EventCapture::default().capture(raw(&state, "Request finished in 2.94ms"));
        assert_eq!(
            event.template.as_deref(),
            Some("Request finished in {Elapsed}ms")
        );
        assert_eq!(
            event.group_key_hash,
            deterministic_hash("Request finished in {Elapsed}ms")
        );
    }

    #[test]
    fn exception_salts_key_with_call_site_and_merges_data() {
        let exception = ExceptionInfo::new("InvalidOperation", "Foobar zanz")
            .with_stack_trace("at System.Linq.First()\nat MyApp.Foo.Bar() in /src/foo.cs:line 42")
            .with_data("orderId", 7);
        let state = LogState::new();
        let mut r = raw(&state, "Woops, an error occurred");
        r.level = LogLevel::Error;
        r.exception = Some(&exception);

        let event = EventCapture::default().capture(r);

        assert_eq!(
            (event.function.as_str(), event.file.as_str(), event.line.as_str()),
            ("Foo.Bar()", "foo.cs", "42")
        );
        assert_eq!(
            event.canonical_message,
            "Woops, an error occurred at Foo.Bar() in foo.cs line 42"
        );
        assert_eq!(
            event.group_key_hash,
            deterministic_hash(&event.canonical_message)
        );
        assert!(event
            .exception_detail
            .as_deref()
            .unwrap()
            .starts_with("Type = InvalidOperation\nMessage = Foobar zanz"));
        assert_eq!(event.scope_values.unwrap().get("orderId"), Some(&json!(7)));
    }

    #[test]
    fn empty_event_id_is_discarded() {
        let state = LogState::new();
        let mut r = raw(&state, "x");
        r.event_id = Some(EventId::new(0));
        assert_eq!(EventCapture::default().capture(r).event_id, None);

        let mut r = raw(&state, "x");
        r.event_id = Some(EventId::named(3, "Startup"));
        assert_eq!(
            EventCapture::default().capture(r).event_id,
            Some(EventId::named(3, "Startup"))
        );
    }

    #[test]
    fn scopes_are_carried_through() {
        let state = LogState::new();
        let mut scopes = ValueMap::new();
        scopes.insert("request".into(), json!("r-1"));
        let mut r = raw(&state, "x");
        r.scopes = Some(scopes);
        let event = EventCapture::default().capture(r);
        assert_eq!(event.scope_values.unwrap().get("request"), Some(&json!("r-1")));
    }
}
