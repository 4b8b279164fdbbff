//! Exception capture and rendering.
//!
//! Exceptions are stored as a detailed string rather than structured data:
//! error graphs may hold cyclic or non-serializable references. An
//! [`ExceptionInfo`] is the plain-data view the logger captures, rendered
//! with [`ExceptionInfo::to_detailed_string`].

use std::fmt::Write as _;

use serde_json::Value;

use crate::template::value_to_text;
use crate::types::ValueMap;

/// Spaces per nesting level of an inner exception.
const INDENT_SPACES: usize = 4;

/// Plain-data view of an exception and its inner chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    pub type_name: String,
    pub message: String,
    /// Rendered stack trace, one frame per line.
    pub stack_trace: Option<String>,
    /// Side data attached to the exception.
    pub data: Vec<(String, Value)>,
    pub inner: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: None,
            data: Vec::new(),
            inner: None,
        }
    }

    /// Capture a `std::error::Error` and its `source()` chain.
    ///
    /// The outer type name comes from `E`; sources are only known as trait
    /// objects and are recorded as `"Error"`.
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut info = Self::new(std::any::type_name::<E>(), error.to_string());
        info.inner = error.source().map(|s| Box::new(Self::from_source(s)));
        info
    }

    fn from_source(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut info = Self::new("Error", error.to_string());
        info.inner = error.source().map(|s| Box::new(Self::from_source(s)));
        info
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.push((key.into(), value.into()));
        self
    }

    pub fn with_inner(mut self, inner: ExceptionInfo) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Iterate this exception and every inner exception, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ExceptionInfo> {
        std::iter::successors(Some(self), |e| e.inner.as_deref())
    }

    /// Merge the data of the whole chain into `scope`, renaming on collision.
    pub fn merge_data_into(&self, scope: &mut ValueMap) {
        for exception in self.chain() {
            for (key, value) in &exception.data {
                crate::scope::insert_unique(scope, key, value.clone());
            }
        }
    }

    /// Render type, message, data, stack trace and inner chain as text.
    pub fn to_detailed_string(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, 0);
        out.trim_end_matches(['\r', '\n']).to_string()
    }

    fn render(&self, out: &mut String, level: usize) {
        let indent = " ".repeat(INDENT_SPACES * level);
        let _ = writeln!(out, "{indent}Type = {}", self.type_name);
        let _ = writeln!(out, "{indent}Message = {}", self.message);

        if !self.data.is_empty() {
            let _ = writeln!(out, "{indent}Data =");
            let item_indent = " ".repeat(INDENT_SPACES * (level + 1));
            for (i, (key, value)) in self.data.iter().enumerate() {
                let _ = writeln!(out, "{item_indent}[{i}] = {key} : {}", value_to_text(value));
            }
        }

        if let Some(trace) = &self.stack_trace {
            let _ = writeln!(out, "{indent}StackTrace = {}", trace.trim());
        }

        if let Some(inner) = &self.inner {
            let _ = writeln!(out, "{indent}InnerException =");
            inner.render(out, level + 1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
