//! Message template inference and rendering.
//!
//! Some emitters supply named values but no explicit template, e.g. the
//! message `"Request finished in 2.94ms"` with `{ "Elapsed": 2.94 }`. When
//! every value is visible in the message, the template can be rebuilt as
//! `"Request finished in {Elapsed}ms"` so that all such messages group
//! together.

use serde_json::Value;

use crate::types::ValueMap;

/// Stringify a value the way it appears inside a rendered message.
///
/// Strings are unquoted; `null` renders as the empty string.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reconstruct a template from a rendered message and its named values.
///
/// Returns `None` unless every value with a non-empty text form occurs in
/// the message. Values are substituted left to right in map order; the scan
/// cursor moves past each replaced occurrence, so repeated or overlapping
/// values are never substituted twice.
pub fn infer_template(message: &str, values: &ValueMap) -> Option<String> {
    let details: Vec<(&str, String)> = values
        .iter()
        .map(|(k, v)| (k.as_str(), value_to_text(v)))
        .filter(|(_, text)| !text.is_empty())
        .collect();

    if details.is_empty() || !details.iter().all(|(_, text)| message.contains(text.as_str())) {
        return None;
    }

    let mut template = String::with_capacity(message.len() * 2);
    let mut cursor = 0;
    for (key, text) in &details {
        if let Some(offset) = message[cursor..].find(text.as_str()) {
            let start = cursor + offset;
            template.push_str(&message[cursor..start]);
            template.push('{');
            template.push_str(key);
            template.push('}');
            cursor = start + text.len();
        }
    }
    template.push_str(&message[cursor..]);

    if template.trim().is_empty() {
        None
    } else {
        Some(template)
    }
}

/// Render `{name}` placeholders in `template` from `values`.
///
/// Unknown placeholders are left as written. `{{` and `}}` escape literal
/// braces.
pub fn format_template(template: &str, values: &ValueMap) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find(['{', '}']) {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        match tail.find('}') {
            Some(close) => {
                let name = &tail[1..close];
                match values.get(name) {
                    Some(value) => out.push_str(&value_to_text(value)),
                    None => out.push_str(&tail[..=close]),
                }
                rest = &tail[close + 1..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    // -- infer_template ------------------------------------------------------

    #[test]
    fn numeric_value_is_replaced_keeping_surrounding_text() {
        let v = values(&[("Elapsed", json!(2.94))]);
        assert_eq!(
            infer_template("Request finished in 2.94ms", &v),
            Some("Request finished in {Elapsed}ms".to_string())
        );
    }

    #[test]
    fn string_value_matching_suffix_replaces_only_matched_text() {
        let v = values(&[("Elapsed", json!("2.94ms"))]);
        assert_eq!(
            infer_template("Request finished in 2.94ms", &v),
            Some("Request finished in {Elapsed}".to_string())
        );
    }

    #[test]
    fn missing_value_returns_none() {
        let v = values(&[("Elapsed", json!(2.94)), ("Path", json!("/home"))]);
        assert_eq!(infer_template("Request finished in 2.94ms", &v), None);
    }

    #[test]
    fn no_usable_values_returns_none() {
        assert_eq!(infer_template("Hello", &ValueMap::new()), None);
        let v = values(&[("Empty", json!("")), ("Nothing", Value::Null)]);
        assert_eq!(infer_template("Hello", &v), None);
    }

    #[test]
    fn empty_values_are_ignored_when_others_match() {
        let v = values(&[("Empty", json!("")), ("Count", json!(5))]);
        assert_eq!(
            infer_template("Generated 5 items", &v),
            Some("Generated {Count} items".to_string())
        );
    }

    #[test]
    fn multiple_values_substituted_in_order() {
        let v = values(&[("user", json!("ann")), ("count", json!(3))]);
        assert_eq!(
            infer_template("ann created 3 projects", &v),
            Some("{user} created {count} projects".to_string())
        );
    }

    #[test]
    fn repeated_values_advance_the_cursor() {
        let v = values(&[("from", json!(1)), ("to", json!(1))]);
        assert_eq!(
            infer_template("Moved 1 to 1", &v),
            Some("Moved {from} to {to}".to_string())
        );
    }

    #[test]
    fn value_found_only_before_cursor_is_skipped() {
        let v = values(&[("first", json!("b")), ("second", json!("a"))]);
        assert_eq!(infer_template("a b", &v), Some("a {first}".to_string()));
    }

    #[test]
    fn whole_message_value_and_blank_text_still_produce_a_template() {
        let v = values(&[("pad", json!("x"))]);
        assert_eq!(infer_template("x", &v), Some("{pad}".to_string()));
        let v = values(&[("a", json!(" "))]);
        assert_eq!(infer_template(" ", &v), Some("{a}".to_string()));
    }

    // -- format_template -----------------------------------------------------

    #[test]
    fn format_substitutes_named_values() {
        let v = values(&[("count", json!(5)), ("user", json!("ann"))]);
        assert_eq!(
            format_template("{user} generated {count} items", &v),
            "ann generated 5 items"
        );
    }

    #[test]
    fn format_keeps_unknown_placeholders_and_escapes() {
        let v = values(&[("a", json!(1))]);
        assert_eq!(format_template("{a} {b} {{literal}}", &v), "1 {b} {literal}");
    }

    #[test]
    fn format_handles_unterminated_placeholder() {
        assert_eq!(format_template("open {brace", &ValueMap::new()), "open {brace");
    }
}
