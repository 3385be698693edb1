// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lenient JBeam reader.
//!
//! JBeam files are JSON as written by hand: comments, dangling commas,
//! `.5`-style numbers and, frequently, missing commas. Reading happens in two
//! passes:
//!
//! 1. Clean-up (always): strip comments, trim lines, drop dangling commas,
//!    prefix bare-dot numbers with `0`, then parse strictly.
//! 2. Repair (only when pass 1 fails): insert the commas a line-oriented
//!    heuristic thinks are missing, then parse strictly again.
//!
//! Each stage is a small function over `&str` so it can be tested on its own.

use crate::error::ParseError;
use crate::parser::parse_strict;
use crate::value::JValue;

/// Parses JBeam / `.pc` text into a [`JValue`].
///
/// # Example
///
/// ```
/// use jbeam_lite_core::{parse_lenient, JValue};
///
/// let v = parse_lenient("{\"a\": [1, 2,], // note\n \"b\": .5}").unwrap();
/// let obj = v.as_object().unwrap();
/// assert_eq!(obj["b"], JValue::Float(0.5));
/// ```
pub fn parse_lenient(text: &str) -> Result<JValue, ParseError> {
    let cleaned = clean(text);
    match parse_strict(&cleaned) {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::debug!(
                line = first.line,
                column = first.column,
                "strict parse failed, trying comma repair: {}",
                first.message
            );
            let repaired = remove_dangling_commas(&repair_missing_commas(&cleaned));
            parse_strict(&repaired)
        }
    }
}

/// Runs the always-on clean-up stages in order.
pub fn clean(text: &str) -> String {
    let text = strip_comments(text);
    let text = trim_lines(&text);
    let text = remove_dangling_commas(&text);
    fix_bare_dot_numbers(&text)
}

/// Scanner state shared by the string-aware passes.
#[derive(Debug, Default)]
struct StringTracker {
    in_string: bool,
    escaped: bool,
}

impl StringTracker {
    /// Feeds one character; returns `true` if the character is inside (or
    /// delimits) a string literal.
    fn feed(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            true
        } else if c == '"' {
            self.in_string = true;
            true
        } else {
            false
        }
    }
}

/// Removes `/* */`, `//` and `#` comments outside string literals.
///
/// Newlines inside block comments are kept so line numbers stay meaningful.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut tracker = StringTracker::default();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if tracker.feed(c) {
            out.push(c);
            continue;
        }
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            '/' if chars.peek() == Some(&'/') => skip_to_eol(&mut chars, &mut out),
            '#' => skip_to_eol(&mut chars, &mut out),
            c => out.push(c),
        }
    }
    out
}

fn skip_to_eol(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    for inner in chars.by_ref() {
        if inner == '\n' {
            out.push('\n');
            break;
        }
    }
}

/// Trims leading and trailing whitespace on every line.
///
/// JSON strings cannot span raw newlines, so per-line trimming never touches
/// string contents beyond their own line's outer whitespace.
pub fn trim_lines(text: &str) -> String {
    text.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}

/// Drops a comma whose next significant character is `]` or `}`.
pub fn remove_dangling_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut tracker = StringTracker::default();

    for (i, &c) in chars.iter().enumerate() {
        if tracker.feed(c) {
            out.push(c);
            continue;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Prefixes `0` to numbers written as `.5` after `:`, `[`, `,` or `-`.
pub fn fix_bare_dot_numbers(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut tracker = StringTracker::default();
    let mut prev_significant: Option<char> = None;

    for (i, &c) in chars.iter().enumerate() {
        if tracker.feed(c) {
            out.push(c);
            prev_significant = Some('"');
            continue;
        }
        if c == '.'
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
            && matches!(prev_significant, Some(':' | '[' | ',' | '-'))
        {
            // `-` only counts when it is glued to the dot.
            if prev_significant != Some('-') || chars.get(i.wrapping_sub(1)) == Some(&'-') {
                out.push('0');
            }
        }
        out.push(c);
        if !c.is_whitespace() {
            prev_significant = Some(c);
        }
    }
    out
}

/// Heuristic comma insertion used by the repair pass.
///
/// Line rule: a line that does not end in `,`, `{`, `[` or `:` gets a comma
/// appended unless the next non-empty line starts with `}` or `]`.
/// Inline rule: see [`repair_inline_commas`].
pub fn repair_missing_commas(text: &str) -> String {
    let lines: Vec<String> = text.lines().map(repair_inline_commas).collect();
    let mut out = String::with_capacity(text.len() + lines.len());

    for (i, line) in lines.iter().enumerate() {
        out.push_str(line);
        let trimmed = line.trim_end();
        // Look ahead only from lines that could take a comma.
        let needs_comma = !trimmed.is_empty()
            && !trimmed.ends_with([',', '{', '[', ':'])
            && lines[i + 1..]
                .iter()
                .map(|l| l.trim_start())
                .find(|l| !l.is_empty())
                .is_some_and(|n| !n.starts_with(['}', ']']));
        if needs_comma {
            out.push(',');
        }
        if i + 1 < lines.len() {
            out.push('\n');
        }
    }
    out
}

/// Lexical class of the last token seen on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    None,
    /// A string, number, literal, `]` or `}`.
    ValueEnd,
    /// A string that is followed by `:` (an object key) or any punctuation.
    Other,
}

/// Inserts commas between adjacent values on one line.
///
/// Covers the common hand-edit mistakes: `"n1" 0 0 0`, `"id" {..}`, `] {`,
/// `} {` and `0 {`. A comma is inserted where a value ends and, after only
/// whitespace, another value begins.
pub fn repair_inline_commas(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len() + 4);
    let mut prev = Prev::None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            out.push(c);
            i += 1;
            continue;
        }

        let starts_value = c == '"'
            || c == '{'
            || c == '['
            || c == '-'
            || c == '.'
            || c.is_ascii_digit()
            || starts_literal(&chars[i..]);
        if prev == Prev::ValueEnd && starts_value {
            let ws_start = out.trim_end().len();
            out.insert(ws_start, ',');
        }

        match c {
            '"' => {
                let end = string_end(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
                let next = chars[i..].iter().find(|ch| !ch.is_whitespace());
                prev = if next == Some(&':') {
                    Prev::Other
                } else {
                    Prev::ValueEnd
                };
                continue;
            }
            ']' | '}' => prev = Prev::ValueEnd,
            c if c.is_ascii_digit() || c == '-' || c == '.' || c.is_ascii_alphabetic() => {
                let end = chars[i..]
                    .iter()
                    .position(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '+' | '_')))
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                i = end;
                prev = Prev::ValueEnd;
                continue;
            }
            _ => prev = Prev::Other,
        }
        out.push(c);
        i += 1;
    }
    out
}

fn starts_literal(chars: &[char]) -> bool {
    ["true", "false", "null"].iter().any(|lit| {
        lit.chars().count() <= chars.len() && lit.chars().zip(chars).all(|(a, b)| a == *b)
    })
}

/// Index one past the closing quote of the string starting at `start`.
fn string_end(chars: &[char], start: usize) -> usize {
    let mut escaped = false;
    for (offset, &c) in chars[start + 1..].iter().enumerate() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return start + offset + 2;
        }
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_all_comment_styles() {
        let text = "{\"a\": 1, // line\n# hash\n\"b\": /* block\nspans */ 2}";
        let out = strip_comments(text);
        assert!(!out.contains("line"));
        assert!(!out.contains("hash"));
        assert!(!out.contains("block"));
        assert_eq!(out.matches('\n').count(), 3);
    }

    #[test]
    fn comments_inside_strings_survive() {
        let text = r#"{"url": "http://x#y", "esc": "a\"//b"}"#;
        assert_eq!(strip_comments(text), text);
    }

    #[test]
    fn dangling_commas_dropped() {
        assert_eq!(remove_dangling_commas("[1, 2, ]"), "[1, 2 ]");
        assert_eq!(remove_dangling_commas("{\"a\": [1,],\n}"), "{\"a\": [1]\n}");
        assert_eq!(remove_dangling_commas(r#"[",]"]"#), r#"[",]"]"#);
    }

    #[test]
    fn bare_dot_numbers() {
        assert_eq!(fix_bare_dot_numbers("[.5, -.25]"), "[0.5, -0.25]");
        assert_eq!(fix_bare_dot_numbers("{\"a\": .1}"), "{\"a\": 0.1}");
        assert_eq!(fix_bare_dot_numbers("[1.5, \".5\"]"), "[1.5, \".5\"]");
    }

    #[test]
    fn line_rule_appends_commas() {
        let text = "{\n\"a\": 1\n\"b\": [\n1\n2\n]\n}";
        let repaired = repair_missing_commas(text);
        assert_eq!(repaired, "{\n\"a\": 1,\n\"b\": [\n1,\n2\n]\n}");
    }

    #[test]
    fn line_rule_looks_past_blank_runs() {
        let text = "[\n1\n\n\n   \n2\n\n]";
        assert_eq!(repair_missing_commas(text), "[\n1,\n\n\n   \n2\n\n]");

        let gap = "\n".repeat(100_000);
        let text = format!("[\n1{gap}2{gap}]");
        let repaired = repair_missing_commas(&text);
        assert_eq!(repaired, format!("[\n1,{gap}2{gap}]"));
    }

    #[test]
    fn inline_rule_separates_values() {
        assert_eq!(repair_inline_commas(r#"["n1" 0 0 0]"#), r#"["n1", 0, 0, 0]"#);
        assert_eq!(repair_inline_commas(r#"["a", "b" {"k": 1}]"#), r#"["a", "b", {"k": 1}]"#);
        assert_eq!(repair_inline_commas("[1] {"), "[1], {");
        assert_eq!(repair_inline_commas(r#"{"k": true "j": null}"#), r#"{"k": true, "j": null}"#);
    }

    #[test]
    fn inline_rule_leaves_keys_alone() {
        assert_eq!(repair_inline_commas(r#""a" : 1"#), r#""a" : 1"#);
    }

    #[test]
    fn strict_json_passes_through() {
        let v = parse_lenient(r#"{"a": [1, 2.5, "x", true, null]}"#).unwrap();
        assert_eq!(v.as_object().unwrap()["a"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn missing_commas_recovered() {
        let v = parse_lenient(r#"{"p":{"nodes":[["n1" 0 0 0]]}}"#).unwrap();
        let row = &v.as_object().unwrap()["p"].as_object().unwrap()["nodes"]
            .as_array()
            .unwrap()[0];
        assert_eq!(row.as_array().unwrap().len(), 4);
    }

    #[test]
    fn multiline_jbeam_recovered() {
        let text = r#"{
            "body": {
                "nodes": [
                    ["id", "posX", "posY", "posZ"]
                    {"nodeWeight": 10}
                    ["n1", -.5, 0, 1]
                    ["n2", 0.5, 0, 1],
                ]
                "beams": [
                    ["id1:", "id2:"]
                    ["n1", "n2"]
                ]
            }
        }"#;
        let v = parse_lenient(text).unwrap();
        let body = v.as_object().unwrap()["body"].as_object().unwrap();
        assert_eq!(body["nodes"].as_array().unwrap().len(), 4);
        assert_eq!(body["beams"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["nodes"].as_array().unwrap()[2].as_array().unwrap()[1],
            JValue::Float(-0.5)
        );
    }

    #[test]
    fn unrecoverable_reports_position() {
        let err = parse_lenient("{\"a\": [1, 2}").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(!err.snippet.is_empty());
    }
}
