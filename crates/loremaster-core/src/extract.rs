//! Locating a JSON object inside free text.
//!
//! Both the host pipe and model replies wrap the object we want in noise:
//! prompts echoed back, markdown fences, trailing chatter, sometimes more
//! braces after the object. The scanner tracks open braces (skipping string
//! literals) and stops once the earliest `{` that closes has closed, so
//! anything after the object is ignored.

use serde_json::Value;

use crate::error::{LoreError, Result};

/// Return the first balanced `{...}` span in `text`.
///
/// A `{` that never closes is skipped and the earliest-starting span that
/// does close wins. Single pass over the bytes: braces and quotes are ASCII,
/// so byte offsets never split a UTF-8 sequence.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let mut open: Vec<usize> = Vec::new();
    let mut best: Option<(usize, usize)> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            // Quotes only matter inside an object; noise before it may be unbalanced.
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                let Some(start) = open.pop() else { continue };
                if best.map_or(true, |(s, _)| start < s) {
                    best = Some((start, i));
                }
                if open.is_empty() {
                    // No earlier `{` is still waiting to close.
                    break;
                }
            }
            _ => {}
        }
    }

    best.map(|(start, end)| &text[start..=end])
}

/// Extract and parse the first balanced object in `text`.
pub fn parse_first_object(text: &str) -> Result<Value> {
    let span = first_balanced_object(text)
        .ok_or_else(|| LoreError::Serialization("no JSON object found in text".to_string()))?;
    Ok(serde_json::from_str(span)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        assert_eq!(first_balanced_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_object_surrounded_by_noise() {
        let text = "Output:\n```json\n{\"game\":\"Hades\"}\n```\nHope that helps!";
        assert_eq!(first_balanced_object(text), Some("{\"game\":\"Hades\"}"));
    }

    #[test]
    fn test_stops_at_first_balanced_span() {
        // A greedy first-{ to last-} match would swallow both objects.
        let text = r#"{"a":1} and then {"b":2}"#;
        assert_eq!(first_balanced_object(text), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_trailing_stray_brace_is_ignored() {
        let text = r#"{"a":{"b":2}} }"#;
        assert_eq!(first_balanced_object(text), Some(r#"{"a":{"b":2}}"#));
    }

    #[test]
    fn test_nested_objects() {
        let text = r#"xx{"tool_calls":[{"func":"talk","params":{"input":"hi"}}]}yy"#;
        assert_eq!(
            first_balanced_object(text),
            Some(r#"{"tool_calls":[{"func":"talk","params":{"input":"hi"}}]}"#)
        );
    }

    #[test]
    fn test_braces_inside_strings_do_not_count() {
        let text = r#"{"message":"use } and { freely","x":"\"}"}"#;
        assert_eq!(first_balanced_object(text), Some(text));
    }

    #[test]
    fn test_unclosed_brace_then_valid_object() {
        let text = r#"{ broken {"ok":true}"#;
        assert_eq!(first_balanced_object(text), Some(r#"{"ok":true}"#));
    }

    #[test]
    fn test_no_object() {
        assert_eq!(first_balanced_object("no braces here"), None);
        assert_eq!(first_balanced_object("} backwards {"), None);
        assert_eq!(first_balanced_object(""), None);
    }

    #[test]
    fn test_multibyte_text_around_object() {
        let text = "ゼウス → {\"character\":\"Zeus ⚡\"} ← 雷";
        assert_eq!(
            first_balanced_object(text),
            Some("{\"character\":\"Zeus ⚡\"}")
        );
    }

    #[test]
    fn test_long_run_of_open_braces_scans_in_linear_time() {
        let braces = "{".repeat(200_000);
        let started = std::time::Instant::now();
        assert_eq!(first_balanced_object(&braces), None);

        let text = format!("{}{}", braces, r#"{"ok":true}"#);
        assert_eq!(first_balanced_object(&text), Some(r#"{"ok":true}"#));
        assert!(
            started.elapsed() < std::time::Duration::from_secs(2),
            "scan took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn test_outer_object_wins_over_inner() {
        let text = r#"{ broken {"outer":{"inner":1}} tail"#;
        assert_eq!(first_balanced_object(text), Some(r#"{"outer":{"inner":1}}"#));
    }

    #[test]
    fn test_quote_in_leading_noise_is_ignored() {
        let text = r#"host said "hello {"a":1}"#;
        assert_eq!(first_balanced_object(text), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_parse_first_object() {
        let value = parse_first_object(r#"reply: {"sex":"female","game":"Greek Mythology"}"#)
            .unwrap();
        assert_eq!(value["sex"], "female");
    }

    #[test]
    fn test_parse_first_object_no_span() {
        let err = parse_first_object("I cannot help with that.").unwrap_err();
        assert!(matches!(err, LoreError::Serialization(_)));
    }

    #[test]
    fn test_parse_first_object_malformed_span() {
        let err = parse_first_object("{not: json}").unwrap_err();
        assert!(matches!(err, LoreError::Serialization(_)));
    }
}
