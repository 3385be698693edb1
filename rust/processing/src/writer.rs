// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JBeam text output.
//!
//! Two modes are offered:
//!
//! - full rendering of parts ([`write_part`], [`write_jbeam`]), with one table
//!   row per line, a header row on top of every table and single-line scope
//!   rows;
//! - in-place patching ([`patch_table`]), which swaps only the rows of one
//!   table inside existing text and leaves everything around it, comments
//!   included, byte for byte.
//!
//! Output is plain JSON (no trailing commas) so strict readers accept it too.

use jbeam_lite_core::{
    format_float, write_string, JValue, Part, TableShape, BEAMS, NODES, QUADS, TRIANGLES,
};

use crate::compress::{export_part_tables, PartTables};
use crate::error::{Error, Result};

/// Layout settings for written JBeam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Decimal places kept for element-row floats. `None` writes the
    /// shortest text that reads back to the same `f64`.
    pub float_precision: Option<usize>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            float_precision: None,
        }
    }
}

impl WriterOptions {
    fn pad(&self, level: usize) -> String {
        " ".repeat(self.indent * level)
    }
}

const SLOTS_HEADER: [&str; 3] = ["type", "default", "description"];

/// Renders one part as a complete JBeam document.
pub fn write_part(part: &Part, options: &WriterOptions) -> String {
    write_jbeam(std::slice::from_ref(part), options)
}

/// Renders several parts into one JBeam document, in the given order.
pub fn write_jbeam(parts: &[Part], options: &WriterOptions) -> String {
    let rendered: Vec<(&Part, PartTables)> = parts
        .iter()
        .map(|part| (part, export_part_tables(part, None)))
        .collect();
    render_document(&rendered, options)
}

/// Renders one part with tables that were already compressed, e.g. with a
/// source filter applied.
pub fn write_part_tables(part: &Part, tables: &PartTables, options: &WriterOptions) -> String {
    render_document(&[(part, tables.clone())], options)
}

fn render_document(parts: &[(&Part, PartTables)], options: &WriterOptions) -> String {
    let mut out = String::from("{\n");
    for (i, (part, tables)) in parts.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        render_part(&mut out, part, tables, options);
    }
    out.push_str("\n}\n");
    out
}

fn render_part(out: &mut String, part: &Part, tables: &PartTables, options: &WriterOptions) {
    let outer = options.pad(1);
    let inner = options.pad(2);
    out.push_str(&outer);
    write_string(out, &part.part_name);
    out.push_str(": {\n");

    let mut sections: Vec<(String, String)> = Vec::new();
    if let Some(slot_type) = &part.slot_type {
        sections.push(("slotType".into(), JValue::from(slot_type.as_str()).to_json_string()));
    }
    for (key, value) in &part.raw_sections {
        sections.push((key.clone(), render_value(value, &inner, options)));
    }
    if !part.slot_specs.is_empty() {
        let rows: Vec<JValue> = part
            .slot_specs
            .iter()
            .map(|spec| {
                JValue::Array(vec![
                    JValue::from(spec.slot_type.as_str()),
                    JValue::from(spec.default.as_deref().unwrap_or("")),
                    JValue::from(spec.description.as_deref().unwrap_or("")),
                ])
            })
            .collect();
        sections.push(("slots".into(), render_table(Some(SLOTS_HEADER.as_slice()), &rows, &inner, options, false)));
    }
    if !part.refnodes.is_empty() {
        let (labels, nodes): (Vec<JValue>, Vec<JValue>) = part
            .refnodes
            .iter()
            .map(|(label, node)| (JValue::from(format!("{}:", label.as_str())), JValue::from(node)))
            .unzip();
        let rows = [JValue::Array(labels), JValue::Array(nodes)];
        sections.push(("refNodes".into(), render_table(None, &rows, &inner, options, false)));
    }
    for (shape, rows) in tables.tables() {
        sections.push((shape.section.into(), render_shape(shape, rows, &inner, options)));
    }
    sections.push((QUADS.section.into(), render_shape(QUADS, &[], &inner, options)));

    for (i, (key, body)) in sections.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        out.push_str(&inner);
        write_string(out, key);
        out.push_str(": ");
        out.push_str(body);
    }
    out.push('\n');
    out.push_str(&outer);
    out.push('}');
}

fn render_shape(shape: TableShape, rows: &[JValue], base: &str, options: &WriterOptions) -> String {
    render_table(Some(shape.header), rows, base, options, true)
}

/// Renders `[ header, rows... ]` with one row per line. `base` is the
/// indentation of the line the opening bracket sits on.
fn render_table(
    header: Option<&[&str]>,
    rows: &[JValue],
    base: &str,
    options: &WriterOptions,
    coord_floats: bool,
) -> String {
    let item_pad = format!("{base}{}", options.pad(1));
    let mut lines: Vec<String> = Vec::with_capacity(rows.len() + 1);
    if let Some(header) = header {
        let labels: Vec<JValue> = header.iter().map(|h| JValue::from(*h)).collect();
        lines.push(JValue::Array(labels).to_json_string());
    }
    for row in rows {
        lines.push(match row {
            JValue::Object(_) => render_scope_row(row),
            JValue::Array(items) => render_element_row(items, options, coord_floats),
            other => other.to_json_string(),
        });
    }
    if lines.is_empty() {
        return "[]".into();
    }

    let mut out = String::from("[\n");
    for (i, line) in lines.iter().enumerate() {
        out.push_str(&item_pad);
        out.push_str(line);
        if i + 1 < lines.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(base);
    out.push(']');
    out
}

/// `{"key": value}` on one line; the strings `"true"` and `"false"` go out bare.
fn render_scope_row(row: &JValue) -> String {
    let Some(map) = row.as_object() else {
        return row.to_json_string();
    };
    let mut out = String::from("{");
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_string(&mut out, key);
        out.push_str(": ");
        match value {
            JValue::Str(s) if s == "true" || s == "false" => out.push_str(s),
            other => out.push_str(&other.to_json_string()),
        }
    }
    out.push('}');
    out
}

fn render_element_row(items: &[JValue], options: &WriterOptions, coord_floats: bool) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match item {
            JValue::Float(f) if coord_floats => out.push_str(&format_coord(*f, options.float_precision)),
            JValue::Object(_) => out.push_str(&render_scope_row(item)),
            other => out.push_str(&other.to_json_string()),
        }
    }
    out.push(']');
    out
}

/// Formats a coordinate. With a precision it is rounded to that many
/// decimals, trailing zeros trimmed down to one; without, the shortest
/// round-trip form is used. Negative zero is written as `0.0`.
pub fn format_coord(value: f64, precision: Option<usize>) -> String {
    let Some(precision) = precision.filter(|_| value.is_finite()) else {
        return format_float(if value == 0.0 { 0.0 } else { value });
    };
    let mut s = format!("{value:.precision$}");
    if s.contains('.') {
        while s.ends_with('0') && !s.ends_with(".0") {
            s.pop();
        }
    } else {
        s.push_str(".0");
    }
    if s.starts_with('-') && s[1..].bytes().all(|b| b == b'0' || b == b'.') {
        s.remove(0);
    }
    s
}

fn is_flat(value: &JValue) -> bool {
    match value {
        JValue::Array(items) => items.iter().all(|v| !matches!(v, JValue::Array(_) | JValue::Object(_))),
        JValue::Object(map) => map.values().all(|v| !matches!(v, JValue::Array(_) | JValue::Object(_))),
        _ => true,
    }
}

/// Pretty rendering that keeps every value's type, so reading it back gives
/// the same tree. Containers holding only scalars stay on one line.
fn render_value(value: &JValue, base: &str, options: &WriterOptions) -> String {
    if is_flat(value) {
        return value.to_json_string();
    }
    let item_pad = format!("{base}{}", options.pad(1));
    let (open, close, items): (char, char, Vec<String>) = match value {
        JValue::Array(items) => (
            '[',
            ']',
            items.iter().map(|v| render_value(v, &item_pad, options)).collect(),
        ),
        JValue::Object(map) => (
            '{',
            '}',
            map.iter()
                .map(|(k, v)| {
                    let mut entry = String::new();
                    write_string(&mut entry, k);
                    entry.push_str(": ");
                    entry.push_str(&render_value(v, &item_pad, options));
                    entry
                })
                .collect(),
        ),
        _ => return value.to_json_string(),
    };

    let mut out = String::new();
    out.push(open);
    out.push('\n');
    for (i, item) in items.iter().enumerate() {
        out.push_str(&item_pad);
        out.push_str(item);
        if i + 1 < items.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(base);
    out.push(close);
    out
}

/// Renders any value as indented JBeam text.
pub fn to_jbeam_string(value: &JValue, options: &WriterOptions) -> String {
    let mut out = render_value(value, "", options);
    out.push('\n');
    out
}

// ---------------------------------------------------------------------------
// In-place patching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Str(&'a str),
    Open(u8),
    Close(u8),
    Colon,
    Other,
}

/// Structural tokens of lenient JSON with byte offsets. Comments, commas and
/// whitespace are skipped; string contents are returned raw.
struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn skip_until(&mut self, needle: &str) {
        self.pos = match self.text[self.pos..].find(needle) {
            Some(i) => self.pos + i + needle.len(),
            None => self.text.len(),
        };
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = (usize, Token<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();
        loop {
            let start = self.pos;
            let b = *bytes.get(start)?;
            match b {
                b' ' | b'\t' | b'\r' | b'\n' | b',' => self.pos += 1,
                b'/' if bytes.get(start + 1) == Some(&b'/') => self.skip_until("\n"),
                b'/' if bytes.get(start + 1) == Some(&b'*') => {
                    self.pos += 2;
                    self.skip_until("*/");
                }
                b'#' => self.skip_until("\n"),
                b'"' => {
                    let mut i = start + 1;
                    while i < bytes.len() && bytes[i] != b'"' {
                        i += if bytes[i] == b'\\' { 2 } else { 1 };
                    }
                    let end = i.min(bytes.len());
                    self.pos = (end + 1).min(bytes.len());
                    return Some((start, Token::Str(&self.text[start + 1..end])));
                }
                b'{' | b'[' => {
                    self.pos += 1;
                    return Some((start, Token::Open(b)));
                }
                b'}' | b']' => {
                    self.pos += 1;
                    return Some((start, Token::Close(b)));
                }
                b':' => {
                    self.pos += 1;
                    return Some((start, Token::Colon));
                }
                _ => {
                    let mut i = start + 1;
                    while i < bytes.len()
                        && !matches!(
                            bytes[i],
                            b' ' | b'\t' | b'\r' | b'\n' | b',' | b':' | b'"' | b'{' | b'}' | b'[' | b']' | b'/' | b'#'
                        )
                    {
                        i += 1;
                    }
                    self.pos = i;
                    return Some((start, Token::Other));
                }
            }
        }
    }
}

struct Frame<'a> {
    kind: u8,
    key: Option<&'a str>,
    start: usize,
}

/// Byte offsets of the `[` and matching `]` of `part_name.table`.
fn find_table_span(text: &str, part_name: &str, table: &str) -> Option<(usize, usize)> {
    let mut stack: Vec<Frame<'_>> = Vec::new();
    let mut last_str: Option<&str> = None;
    let mut pending_key: Option<&str> = None;

    for (pos, token) in Lexer::new(text) {
        match token {
            Token::Str(s) => {
                last_str = Some(s);
                pending_key = None;
                continue;
            }
            Token::Colon => {
                pending_key = last_str.take();
                continue;
            }
            Token::Open(kind) => stack.push(Frame {
                kind,
                key: pending_key.take(),
                start: pos,
            }),
            Token::Close(_) => {
                let frame = stack.pop()?;
                let is_target = stack.len() == 2
                    && frame.kind == b'['
                    && frame.key == Some(table)
                    && stack[1].kind == b'{'
                    && stack[1].key == Some(part_name);
                if is_target {
                    return Some((frame.start, pos));
                }
            }
            Token::Other => {}
        }
        last_str = None;
        pending_key = None;
    }
    None
}

/// Replaces the rows of one table inside existing JBeam text.
///
/// `rows` are the table's compressed rows without header; the known tables
/// (`nodes`, `beams`, `triangles`, `quads`) get their header row prepended.
/// Everything outside the table's brackets is kept byte for byte.
pub fn patch_table(
    text: &str,
    part_name: &str,
    table: &str,
    rows: &[JValue],
    options: &WriterOptions,
) -> Result<String> {
    let (open, close) =
        find_table_span(text, part_name, table).ok_or_else(|| Error::TableNotFound {
            part_name: part_name.to_string(),
            table: table.to_string(),
        })?;

    let line_start = text[..open].rfind('\n').map_or(0, |i| i + 1);
    let base: String = text[line_start..open]
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();

    let shape = [NODES, BEAMS, TRIANGLES, QUADS]
        .into_iter()
        .find(|s| s.section == table);
    let rendered = match shape {
        Some(shape) => render_shape(shape, rows, &base, options),
        None => render_table(None, rows, &base, options, false),
    };

    tracing::debug!(part = part_name, table, rows = rows.len(), "patched table in place");
    let mut out = String::with_capacity(text.len() + rendered.len());
    out.push_str(&text[..open]);
    out.push_str(&rendered);
    out.push_str(&text[close + 1..]);
    Ok(out)
}
