//! Structured-value recovery from free-form backend output.
//!
//! The backend is prompted for a single JSON object or array, but routinely
//! wraps it in prose or a fenced code block, and emits raw control characters
//! inside string fields (literal newlines inside a code template, for
//! example). Recovery order:
//!
//! 1. Field-scoped escaping pre-pass for known free-text-prone fields.
//! 2. Fenced ```json block, if present.
//! 3. Brace-balanced scan from the first `{` or `[`, tracking string and
//!    escape state so braces inside string values are ignored.
//! 4. The whole trimmed text as-is.
//!
//! On success, literal `\n`/`\t`/`\r` sequences inside the free-text fields
//! are unescaped back to real control characters for display. On failure the
//! raw text is preserved; callers fall back to a documented default structure
//! rather than guessing content.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Fields that routinely carry multi-line free text on the wire.
const FREE_TEXT_FIELDS: [&str; 3] = ["codeTemplate", "description", "input"];

/// The raw text with, when known, the byte column of the last parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    pub raw_text: String,
    pub error_position: Option<usize>,
}

fn free_text_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Non-greedy, field-bounded: the value ends at the first quote that is
        // directly followed by a comma or a closing delimiter.
        Regex::new(r#"(?s)"(codeTemplate|description|input)"\s*:\s*"(.*?)"(\s*[,}\]])"#)
            .expect("free-text field pattern is valid")
    })
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:[A-Za-z]*)\s*(.*?)```").expect("fence pattern is valid")
    })
}

/// Escapes raw control characters inside one field value so the surrounding
/// document parses as JSON. A backslash already starting a legal escape is
/// emitted verbatim together with the character it escapes, so that
/// character is never re-processed by the escaping arms below.
fn escape_control_chars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek().copied() {
                Some(next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                    chars.next();
                    out.push('\\');
                    out.push(next);
                }
                _ => out.push_str("\\\\"),
            },
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{000c}' => out.push_str("\\f"),
            '\u{000b}' => out.push_str("\\u000b"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Pre-pass: rewrite unescaped control characters inside the known free-text
/// fields so a literal newline in a string value does not break the parse.
fn escape_free_text_fields(text: &str) -> String {
    free_text_field_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            format!(
                "\"{}\": \"{}\"{}",
                &caps[1],
                escape_control_chars(&caps[2]),
                &caps[3]
            )
        })
        .into_owned()
}

/// Slice from the first `{`/`[` to the matching closer, ignoring delimiters
/// inside string literals.
fn balanced_slice(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Inverse of the pre-pass: literal `\n`/`\t`/`\r` sequences that survived
/// into parsed free-text field values become real control characters.
fn unescape_free_text_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if FREE_TEXT_FIELDS.contains(&key.as_str()) {
                    if let Value::String(s) = field {
                        if s.contains("\\n") || s.contains("\\t") || s.contains("\\r") {
                            *s = s.replace("\\n", "\n").replace("\\t", "\t").replace("\\r", "\r");
                        }
                        continue;
                    }
                }
                unescape_free_text_fields(field);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                unescape_free_text_fields(item);
            }
        }
        _ => {}
    }
}

/// Best-effort repair of output cut short by a token budget: close an
/// unterminated string, drop a dangling separator, then append the missing
/// closing delimiters.
pub fn repair_truncated(text: &str) -> String {
    let trimmed = text.trim();
    let start = match trimmed.find(['{', '[']) {
        Some(i) => i,
        None => return trimmed.to_string(),
    };

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in trimmed[start..].chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut repaired = trimmed[start..].to_string();
    if escaped {
        repaired.pop();
    }
    if in_string {
        repaired.push('"');
    }
    while repaired
        .trim_end()
        .ends_with([',', ':'])
    {
        let end = repaired.trim_end().len();
        repaired.truncate(end - 1);
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}

/// Recovers the single JSON value embedded in `text`.
pub fn extract(text: &str) -> Result<Value, ExtractionFailure> {
    let prepared = escape_free_text_fields(text);

    let mut error_position = None;

    if let Some(caps) = fenced_block_re().captures(&prepared) {
        let inner = caps[1].trim();
        match serde_json::from_str::<Value>(inner) {
            Ok(mut value) => {
                unescape_free_text_fields(&mut value);
                return Ok(value);
            }
            Err(e) => error_position = Some(e.column()),
        }
    }

    if let Some(slice) = balanced_slice(&prepared) {
        match serde_json::from_str::<Value>(slice) {
            Ok(mut value) => {
                unescape_free_text_fields(&mut value);
                return Ok(value);
            }
            Err(e) => error_position = Some(e.column()),
        }
    }

    match serde_json::from_str::<Value>(prepared.trim()) {
        Ok(mut value) => {
            unescape_free_text_fields(&mut value);
            Ok(value)
        }
        Err(e) => Err(ExtractionFailure {
            raw_text: text.to_string(),
            error_position: error_position.or(Some(e.column())),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fenced_block_with_prose() {
        let text = "prefix ```json\n{\"a\":1}\n``` suffix";
        assert_eq!(extract(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_extract_fenced_block_without_language_tag() {
        let text = "Here you go:\n```\n[1, 2, 3]\n```";
        assert_eq!(extract(text).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_extract_balanced_scan_ignores_braces_in_strings() {
        let text = "The result is {\"expr\": \"if (x) { y(); }\", \"ok\": true} as requested.";
        assert_eq!(
            extract(text).unwrap(),
            json!({"expr": "if (x) { y(); }", "ok": true})
        );
    }

    #[test]
    fn test_extract_whole_text_as_is() {
        assert_eq!(extract("  {\"n\": 2}  ").unwrap(), json!({"n": 2}));
    }

    #[test]
    fn test_extract_repairs_unescaped_newline_in_description() {
        let text = "{\"description\": \"line one\nline two\", \"score\": 4}";
        let value = extract(text).unwrap();
        assert_eq!(value["description"], "line one\nline two");
        assert_eq!(value["score"], 4);
    }

    #[test]
    fn test_extract_repairs_tabs_and_backslashes_in_code_template() {
        let text = "{\"codeTemplate\": \"int main() {\n\treturn 0;\n}\"}";
        let value = extract(text).unwrap();
        assert_eq!(value["codeTemplate"], "int main() {\n\treturn 0;\n}");

        // An illegal escape gets its backslash doubled instead of breaking the parse.
        let text = r#"{"codeTemplate": "path: C:\qemu"}"#;
        let value = extract(text).unwrap();
        assert_eq!(value["codeTemplate"], "path: C:\\qemu");
    }

    #[test]
    fn test_extract_preserves_legal_escapes_in_free_text_fields() {
        // Already-valid JSON must survive the pre-pass untouched: an escaped
        // quote inside an allowlisted field is not a string terminator.
        let text = r#"{"description": "he said \"hi\", done", "x": 1}"#;
        let value = extract(text).unwrap();
        assert_eq!(value["description"], "he said \"hi\", done");
        assert_eq!(value["x"], 1);

        // An escaped backslash stays a single backslash after parsing.
        let text = r#"{"codeTemplate": "dir C:\\build"}"#;
        let value = extract(text).unwrap();
        assert_eq!(value["codeTemplate"], "dir C:\\build");
    }

    #[test]
    fn test_extract_round_trips_quotes_in_free_text_fields() {
        let first = extract(r#"{"description": "say \"hi\"", "x": 1}"#).unwrap();
        let second = extract(&serde_json::to_string(&first).unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(second["description"], "say \"hi\"");
    }

    #[test]
    fn test_extract_leaves_non_allowlisted_fields_alone() {
        // A raw newline outside the allowlist still fails the parse; the
        // pre-pass must not touch arbitrary fields.
        let text = "{\"other\": \"a\nb\"}";
        assert!(extract(text).is_err());
    }

    #[test]
    fn test_extract_unescapes_literal_sequences_in_free_text_fields() {
        // Double-escaped on the wire: parsing leaves the two-character sequence.
        let text = r#"{"description": "first\\nsecond", "title": "keep\\nliteral"}"#;
        let value = extract(text).unwrap();
        assert_eq!(value["description"], "first\nsecond");
        // Not in the allowlist, so the two-character sequence is preserved.
        assert_eq!(value["title"], "keep\\nliteral");
    }

    #[test]
    fn test_extract_failure_keeps_raw_text() {
        let failure = extract("no structured content here").unwrap_err();
        assert_eq!(failure.raw_text, "no structured content here");
        assert!(failure.error_position.is_some());
    }

    #[test]
    fn test_extract_round_trips_to_equivalent_value() {
        let text = "noise ```json\n{\"a\": [1, {\"b\": \"x\"}]}\n``` noise";
        let first = extract(text).unwrap();
        let second = extract(&serde_json::to_string(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_repair_truncated_closes_string_and_delimiters() {
        let repaired = repair_truncated("{\"strengths\": [\"good naming\", \"clear struct");
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["strengths"][1], "clear struct");
    }

    #[test]
    fn test_repair_truncated_drops_dangling_separator() {
        let repaired = repair_truncated("{\"a\": 1,");
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_repair_truncated_without_json_start_is_identity() {
        assert_eq!(repair_truncated("  plain text  "), "plain text");
    }

    #[test]
    fn test_balanced_slice_nested_array() {
        let text = "take [\"a\", [\"b\"], \"c\"] please";
        assert_eq!(balanced_slice(text), Some("[\"a\", [\"b\"], \"c\"]"));
    }
}
