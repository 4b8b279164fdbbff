//! Deterministic group keys.
//!
//! A group key is computed from the canonical message of an event: its
//! template (or message), cut to the first line, and for exceptions salted
//! with the application call site. The hash must be identical across process
//! runs, so it uses a fixed polynomial string hash rather than `std`'s
//! randomly seeded hasher.

use crate::stack_frame::StackFrame;
use crate::types::GroupKeyHash;

/// Prefix of every group record id.
pub const GROUP_ID_PREFIX: &str = "loggroups/";

const HASH_SEED: i32 = 23;
const HASH_MULTIPLIER: i32 = 31;

/// Hash and canonical text of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    pub hash: GroupKeyHash,
    /// The exact text that was hashed. Also the fuzzy search input.
    pub canonical_message: String,
}

impl GroupKey {
    /// Compute the group key of an event.
    ///
    /// `explicit_template` (from the emitter) wins over `inferred_template`,
    /// which wins over the rendered `message`. The call site is appended only
    /// when an exception is present and a function is known; file and line
    /// are appended only when every part before them was.
    pub fn compute(
        message: &str,
        has_exception: bool,
        explicit_template: Option<&str>,
        inferred_template: Option<&str>,
        frame: &StackFrame,
    ) -> Self {
        let base = explicit_template
            .or(inferred_template)
            .unwrap_or(message)
            .trim();
        let mut canonical = first_line(base).to_string();

        if has_exception && !frame.function.is_empty() {
            canonical.push_str(" at ");
            canonical.push_str(&frame.function);
            if !frame.file.is_empty() {
                canonical.push_str(" in ");
                canonical.push_str(&frame.file);
                if !frame.line.is_empty() {
                    canonical.push_str(" line ");
                    canonical.push_str(&frame.line);
                }
            }
        }

        Self {
            hash: deterministic_hash(&canonical),
            canonical_message: canonical,
        }
    }

    /// Id of the group record this key maps to.
    pub fn group_id(&self) -> String {
        group_id(self.hash)
    }
}

/// Id of the group record for a hash. Stable, so lookups need no query.
pub fn group_id(hash: GroupKeyHash) -> String {
    format!("{GROUP_ID_PREFIX}{hash}")
}

/// Seed-23 / multiplier-31 string hash over UTF-16 code units with 32-bit
/// wraparound.
pub fn deterministic_hash(input: &str) -> GroupKeyHash {
    input.encode_utf16().fold(HASH_SEED, |hash, unit| {
        hash.wrapping_mul(HASH_MULTIPLIER).wrapping_add(i32::from(unit))
    })
}

fn first_line(text: &str) -> &str {
    match text.find(['\r', '\n']) {
        Some(index) => &text[..index],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
