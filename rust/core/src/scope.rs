// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scope-modifier decompression.
//!
//! An element table is an ordered list of rows. Object rows update a running
//! modifier state; array rows materialise one element with a snapshot of that
//! state plus any inline object carried as the row's last entry. Inline props
//! apply to their row only and never leak into the state.

use crate::error::{DiagnosticKind, Diagnostics};
use crate::model::PropMap;
use crate::value::{JObject, JValue};

/// Row layout of one element table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableShape {
    /// Section name inside a part (`"nodes"`, `"beams"`, ...).
    pub section: &'static str,
    /// Number of leading positional entries per element row.
    pub arity: usize,
    /// Header row written at the top of the table.
    pub header: &'static [&'static str],
}

pub const NODES: TableShape = TableShape {
    section: "nodes",
    arity: 4,
    header: &["id", "posX", "posY", "posZ"],
};

pub const BEAMS: TableShape = TableShape {
    section: "beams",
    arity: 2,
    header: &["id1:", "id2:"],
};

pub const TRIANGLES: TableShape = TableShape {
    section: "triangles",
    arity: 3,
    header: &["id1:", "id2:", "id3:"],
};

pub const QUADS: TableShape = TableShape {
    section: "quads",
    arity: 4,
    header: &["id1:", "id2:", "id3:", "id4:"],
};

/// Labels that mark a leading all-string row as a header.
const HEADER_LABELS: &[&str] = &["id", "id1", "id1:", "type", "name"];

/// Whether `row` is a header: every entry a string and the first a known label.
pub fn is_header_row(row: &[JValue]) -> bool {
    !row.is_empty()
        && row.iter().all(|v| matches!(v, JValue::Str(_)))
        && row[0]
            .as_str()
            .is_some_and(|first| HEADER_LABELS.contains(&first))
}

/// Modifier keys with a known default value.
pub const DEFAULT_MODIFIER_KEYS: [&str; 18] = [
    "frictionCoef",
    "nodeMaterial",
    "nodeWeight",
    "collision",
    "selfCollision",
    "fixed",
    "group",
    "disable",
    "beamPrecompression",
    "beamType",
    "beamLongBound",
    "beamShortBound",
    "beamSpring",
    "beamDamp",
    "beamDeform",
    "beamStrength",
    "breakGroup",
    "groundModel",
];

/// Value a modifier takes when no scope row sets it.
///
/// Only the compressor consults these; decompression never invents values.
pub fn default_modifier(key: &str) -> Option<JValue> {
    let value = match key {
        "frictionCoef" => JValue::Float(1.0),
        "nodeMaterial" => JValue::from("|NM_METAL"),
        "nodeWeight" => JValue::Int(25),
        "collision" => JValue::from("true"),
        "selfCollision" => JValue::from("false"),
        "fixed" => JValue::from("false"),
        "group" | "disable" | "breakGroup" => JValue::from(""),
        "beamPrecompression" | "beamLongBound" | "beamShortBound" => JValue::Int(1),
        "beamType" => JValue::from("|NORMAL"),
        "beamSpring" => JValue::Int(10_000_000),
        "beamDamp" => JValue::Int(0),
        "beamDeform" | "beamStrength" => JValue::from("FLT_MAX"),
        "groundModel" => JValue::from("asphalt"),
        _ => return None,
    };
    Some(value)
}

/// The running modifier state of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeCursor {
    state: PropMap,
}

impl ScopeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a scope row into the state; later keys override earlier ones.
    pub fn apply(&mut self, update: &JObject) {
        for (k, v) in update {
            self.state.insert(k.clone(), v.clone());
        }
    }

    pub fn state(&self) -> &PropMap {
        &self.state
    }

    /// Props for one element: the current state overlaid with inline props.
    pub fn resolve(&self, inline: Option<&JObject>) -> PropMap {
        let mut props = self.state.clone();
        if let Some(inline) = inline {
            for (k, v) in inline {
                props.insert(k.clone(), v.clone());
            }
        }
        props
    }
}

/// One element row with its resolved props.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRow<'a> {
    /// Position of the row in the table (header included).
    pub index: usize,
    /// The first `arity` entries.
    pub positional: &'a [JValue],
    /// Trailing inline object, if any.
    pub inline: Option<&'a JObject>,
    /// Scope state at this row merged with `inline`.
    pub props: PropMap,
}

/// Flattens a table into element rows, applying scope rows as it goes.
///
/// Malformed rows are reported to `diags` and skipped.
pub fn decompress<'a>(
    rows: &'a [JValue],
    shape: TableShape,
    context: &str,
    diags: &mut Diagnostics,
) -> Vec<ElementRow<'a>> {
    let mut cursor = ScopeCursor::new();
    let mut out = Vec::with_capacity(rows.len());
    let mut seen_element_row = false;

    for (index, row) in rows.iter().enumerate() {
        match row {
            JValue::Object(update) => cursor.apply(update),
            JValue::Array(items) => {
                if !seen_element_row {
                    seen_element_row = true;
                    if is_header_row(items) {
                        continue;
                    }
                }
                let (positional, inline) = match items.split_last() {
                    Some((JValue::Object(inline), rest)) => (rest, Some(inline)),
                    _ => (items.as_slice(), None),
                };
                if positional.len() < shape.arity {
                    diags.push(
                        DiagnosticKind::Row,
                        context,
                        format!(
                            "{} row {} has {} entries, expected {}",
                            shape.section,
                            index,
                            positional.len(),
                            shape.arity
                        ),
                    );
                    continue;
                }
                out.push(ElementRow {
                    index,
                    positional: &positional[..shape.arity],
                    inline,
                    props: cursor.resolve(inline),
                });
            }
            other => diags.push(
                DiagnosticKind::Row,
                context,
                format!(
                    "{} row {} is a {}, expected array or object",
                    shape.section,
                    index,
                    other.type_name()
                ),
            ),
        }
    }
    out
}
