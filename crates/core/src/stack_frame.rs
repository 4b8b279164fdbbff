//! Application call-site extraction from rendered stack traces.
//!
//! Framework and runtime frames are common to many unrelated failures, so
//! they must never contribute to a group key. [`StackFrameExtractor`] picks
//! the first frame that belongs to application code and reduces it to a
//! `(function, file, line)` triple.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Prefix of a call-frame line.
const FRAME_MARKER: &str = "at ";

/// Separator between the function and its source file.
const FILE_MARKER: &str = " in ";

/// Separator between the source file and its line number.
const LINE_MARKER: &str = ":line ";

/// Frames that never identify application code: runtime libraries, this
/// crate's own frames, and generated dispatch frames.
pub const DEFAULT_FRAME_DENYLIST: &[&str] = &[
    "at System.",
    "at Microsoft.",
    "at lambda_method",
    "at std::",
    "at core::",
    "at alloc::",
    "at tokio::",
    "at loggroup_",
];

// ---------------------------------------------------------------------------
// StackFrame
// ---------------------------------------------------------------------------

/// An application call site. Every field is empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// `Type.Method` form, namespaces stripped.
    pub function: String,
    /// File name without directories.
    pub file: String,
    /// Line number text, verbatim.
    pub line: String,
}

impl StackFrame {
    pub fn is_empty(&self) -> bool {
        self.function.is_empty() && self.file.is_empty() && self.line.is_empty()
    }
}

// ---------------------------------------------------------------------------
// StackFrameExtractor
// ---------------------------------------------------------------------------

/// Selects the originating application frame of a stack trace.
#[derive(Debug, Clone)]
pub struct StackFrameExtractor {
    denylist: Vec<String>,
}

impl Default for StackFrameExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_DENYLIST.iter().map(|p| p.to_string()))
    }
}

impl StackFrameExtractor {
    /// Create an extractor with a custom denylist of frame-line prefixes
    /// (each including the leading `"at "`).
    pub fn new(denylist: impl IntoIterator<Item = String>) -> Self {
        Self {
            denylist: denylist.into_iter().collect(),
        }
    }

    /// Extract the application frame from a newline-delimited stack trace.
    ///
    /// Returns an empty [`StackFrame`] when there is no trace or no usable
    /// line. Denylisted frames are never selected. Selection order:
    /// 1. first application frame with a line number;
    /// 2. first application frame;
    /// 3. last remaining line of the trace with a line number;
    /// 4. last remaining line of the trace.
    ///
    /// Steps 3 and 4 also skip denylisted lines, so a trace made only of
    /// framework frames yields an empty call site instead of a framework one.
    pub fn extract(&self, stack_trace: Option<&str>) -> StackFrame {
        let Some(trace) = stack_trace else {
            return StackFrame::default();
        };

        let lines: Vec<&str> = trace
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !self.is_denylisted(l))
            .collect();

        let app_lines: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| l.starts_with(FRAME_MARKER))
            .collect();

        let best = app_lines
            .iter()
            .find(|l| l.contains(LINE_MARKER))
            .or_else(|| app_lines.first())
            .or_else(|| lines.iter().rev().find(|l| l.contains(LINE_MARKER)))
            .or_else(|| lines.last());

        match best {
            Some(line) => parse_frame_line(line),
            None => StackFrame::default(),
        }
    }

    fn is_denylisted(&self, line: &str) -> bool {
        self.denylist.iter().any(|p| line.starts_with(p.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Frame line parsing
// ---------------------------------------------------------------------------

/// Parse a line shaped like `at MyApp.Foo.Bar() in /src/foo.cs:line 42`.
fn parse_frame_line(line: &str) -> StackFrame {
    let body = line.strip_prefix(FRAME_MARKER).unwrap_or(line);

    let Some(in_index) = body.find(FILE_MARKER) else {
        return StackFrame {
            function: function_without_namespaces(body),
            ..StackFrame::default()
        };
    };

    let function = function_without_namespaces(&body[..in_index]);
    let location = &body[in_index + FILE_MARKER.len()..];

    match location.find(LINE_MARKER) {
        Some(line_index) => StackFrame {
            function,
            file: file_without_path(&location[..line_index]),
            line: location[line_index + LINE_MARKER.len()..].to_string(),
        },
        None => StackFrame {
            function,
            file: file_without_path(location),
            line: String::new(),
        },
    }
}

/// Keep at most the last two dot-separated segments:
/// `MyApp.Sample.HomeController.Foo()` becomes `HomeController.Foo()`.
fn function_without_namespaces(function: &str) -> String {
    let parts: Vec<&str> = function.split('.').filter(|p| !p.is_empty()).collect();
    if parts.len() > 2 {
        parts[parts.len() - 2..].join(".")
    } else {
        function.to_string()
    }
}

/// Strip any directory part, for both `/` and `\` separators.
fn file_without_path(file: &str) -> String {
    file.rsplit(['/', '\\']).next().unwrap_or(file).to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
