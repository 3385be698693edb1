// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error and diagnostic types for JBeam reading and loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The reader gave up on a document, even after the comma-repair pass.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at line {line}, column {column} (byte {byte_offset}): `{snippet}`")]
pub struct ParseError {
    pub message: String,
    pub byte_offset: usize,
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed, in characters.
    pub column: usize,
    /// Source text surrounding the failing offset.
    pub snippet: String,
}

impl ParseError {
    /// Builds an error for `offset` inside `text`, computing line, column and snippet.
    pub fn at(text: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = floor_char_boundary(text, offset.min(text.len()));
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = text[line_start..offset].chars().count() + 1;

        let start = floor_char_boundary(text, offset.saturating_sub(SNIPPET_RADIUS));
        let end = floor_char_boundary(text, (offset + SNIPPET_RADIUS).min(text.len()));
        let snippet = text[start..end].replace(['\n', '\r'], " ");

        Self {
            message: message.into(),
            byte_offset: offset,
            line,
            column,
            snippet,
        }
    }
}

const SNIPPET_RADIUS: usize = 24;

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Errors that abort reading a file or resolving a configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Lenient JSON reading failed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A section or field has the wrong shape.
    #[error("schema error in `{context}`: {message}")]
    Schema { context: String, message: String },

    /// A requested part is absent from every scanned file.
    #[error("part `{part_name}` for slot `{slot_type}` not found")]
    NotFound {
        part_name: String,
        slot_type: String,
    },

    /// Filesystem or decoding failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a schema error.
    pub fn schema(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error tagged with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Kind of a non-fatal problem found while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A section had the wrong shape and was ignored.
    Schema,
    /// An element referenced a node no part of its group defines.
    Reference,
    /// A node id was declared twice; the later one was skipped.
    Duplicate,
    /// An element row was malformed and skipped.
    Row,
    /// A slot was left deliberately empty in a part configuration.
    EmptySlot,
    /// A whole file could not be read or parsed; its parts were skipped.
    File,
}

/// A non-fatal problem, kept alongside whatever did parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Part (or file) the diagnostic refers to.
    pub context: String,
    pub message: String,
}

/// Accumulated diagnostics for a load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic and logs it at `warn` level.
    pub fn push(&mut self, kind: DiagnosticKind, context: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(kind = ?kind, context = %context, "{}", message);
        self.items.push(Diagnostic {
            kind,
            context: context.to_string(),
            message,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of diagnostics of the given kind.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_position() {
        let text = "{\n  \"a\": 1\n  \"b\": 2\n}";
        let offset = text.find("\"b\"").unwrap();
        let err = ParseError::at(text, offset, "expected ','");
        assert_eq!(err.line, 3);
        assert_eq!(err.column, 3);
        assert!(err.snippet.contains("\"b\": 2"));
    }

    #[test]
    fn parse_error_offset_clamped() {
        let err = ParseError::at("[1,", 99, "unexpected end");
        assert_eq!(err.byte_offset, 3);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn diagnostics_count_by_kind() {
        let mut diags = Diagnostics::new();
        diags.push(DiagnosticKind::Duplicate, "body", "node n1 declared twice");
        diags.push(DiagnosticKind::Reference, "body", "dummy node n9");
        diags.push(DiagnosticKind::Reference, "body", "dummy node n8");
        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count(DiagnosticKind::Reference), 2);
        assert_eq!(diags.count(DiagnosticKind::Schema), 0);
    }
}
