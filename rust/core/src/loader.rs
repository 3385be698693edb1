// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JBeam part loader: JSON document → typed [`Part`]s.
//!
//! Each element table is decompressed with [`crate::scope::decompress`] and
//! its rows handed to a [`TableElement`] constructor. Beams and triangles
//! receive instance numbers in discovery order; node ids referenced but not
//! defined get dummy nodes so every reference resolves.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{DiagnosticKind, Diagnostics, Error, Result};
use crate::model::{Beam, BeamId, Node, Part, PropMap, RefLabel, SlotSpec, Triangle, TriangleId};
use crate::reader::parse_lenient;
use crate::scope::{decompress, ElementRow, TableShape, BEAMS, NODES, QUADS, TRIANGLES};
use crate::value::{JObject, JValue};

/// Sections the loader interprets; everything else lands in `raw_sections`.
const KNOWN_SECTIONS: &[&str] = &[
    "slotType", "slots", "slots2", "refNodes", "nodes", "beams", "triangles", "quads",
];

/// Parts of one file plus whatever went wrong along the way.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub parts: Vec<Part>,
    pub diagnostics: Diagnostics,
}

/// Per-part state shared by the table constructors.
pub struct BuildContext<'a> {
    pub part_name: &'a str,
    pub source_file: &'a str,
    pub diagnostics: &'a mut Diagnostics,
    beam_instances: FxHashMap<BeamId, u32>,
    triangle_instances: FxHashMap<TriangleId, u32>,
}

impl<'a> BuildContext<'a> {
    pub fn new(part_name: &'a str, source_file: &'a str, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            part_name,
            source_file,
            diagnostics,
            beam_instances: FxHashMap::default(),
            triangle_instances: FxHashMap::default(),
        }
    }

    fn next_beam_instance(&mut self, id: &BeamId) -> u32 {
        let n = self.beam_instances.entry(id.clone()).or_insert(0);
        *n += 1;
        *n
    }

    fn next_triangle_instance(&mut self, id: &TriangleId) -> u32 {
        let n = self.triangle_instances.entry(id.clone()).or_insert(0);
        *n += 1;
        *n
    }

    fn row_error(&mut self, section: &str, row: usize, message: &str) {
        self.diagnostics.push(
            DiagnosticKind::Row,
            self.part_name,
            format!("{section} row {row}: {message}"),
        );
    }
}

/// An element kind built from one decompressed row.
pub trait TableElement: Sized {
    const SHAPE: TableShape;

    /// Builds the element, or reports the row and returns `None`.
    fn from_row(row: ElementRow<'_>, ctx: &mut BuildContext<'_>) -> Option<Self>;
}

fn ids<const N: usize>(
    row: &ElementRow<'_>,
    section: &str,
    ctx: &mut BuildContext<'_>,
) -> Option<[String; N]> {
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, value) in out.iter_mut().zip(row.positional) {
        match value.to_id() {
            Some(id) => *slot = id,
            None => {
                ctx.row_error(section, row.index, &format!("invalid node id {value}"));
                return None;
            }
        }
    }
    Some(out)
}

impl TableElement for Node {
    const SHAPE: TableShape = NODES;

    fn from_row(row: ElementRow<'_>, ctx: &mut BuildContext<'_>) -> Option<Self> {
        let [id] = ids::<1>(&row, NODES.section, ctx)?;
        let mut position = [0.0; 3];
        for (axis, value) in position.iter_mut().zip(&row.positional[1..4]) {
            match value.as_f64() {
                Some(v) => *axis = v,
                None => {
                    ctx.row_error(
                        NODES.section,
                        row.index,
                        &format!("coordinate of `{id}` is a {}", value.type_name()),
                    );
                    return None;
                }
            }
        }
        Some(Node {
            id,
            position,
            props: row.props,
            source_file: ctx.source_file.to_string(),
            dummy: false,
        })
    }
}

impl TableElement for Beam {
    const SHAPE: TableShape = BEAMS;

    fn from_row(row: ElementRow<'_>, ctx: &mut BuildContext<'_>) -> Option<Self> {
        let endpoints = ids::<2>(&row, BEAMS.section, ctx)?;
        let id = BeamId::new(&endpoints[0], &endpoints[1]);
        let instance = ctx.next_beam_instance(&id);
        Some(Beam {
            id,
            endpoints,
            instance,
            props: row.props,
            source_file: ctx.source_file.to_string(),
        })
    }
}

impl TableElement for Triangle {
    const SHAPE: TableShape = TRIANGLES;

    fn from_row(row: ElementRow<'_>, ctx: &mut BuildContext<'_>) -> Option<Self> {
        let vertices = ids::<3>(&row, TRIANGLES.section, ctx)?;
        Some(make_triangle(vertices, row.props, ctx))
    }
}

fn make_triangle(vertices: [String; 3], props: PropMap, ctx: &mut BuildContext<'_>) -> Triangle {
    let id = TriangleId::new(&vertices[0], &vertices[1], &vertices[2]);
    let instance = ctx.next_triangle_instance(&id);
    Triangle {
        id,
        vertices,
        instance,
        props,
        source_file: ctx.source_file.to_string(),
    }
}

/// Splits a quad row into triangles `(n1,n2,n3)` and `(n3,n4,n1)`, each with
/// its own copy of the row's props.
fn split_quad(row: ElementRow<'_>, ctx: &mut BuildContext<'_>) -> Option<[Triangle; 2]> {
    let [a, b, c, d] = ids::<4>(&row, QUADS.section, ctx)?;
    let first = make_triangle([a.clone(), b, c.clone()], row.props.clone(), ctx);
    let second = make_triangle([c, d, a], row.props, ctx);
    Some([first, second])
}

fn table_rows<'v>(
    raw: &'v JObject,
    shape: TableShape,
    ctx: &mut BuildContext<'_>,
) -> Vec<ElementRow<'v>> {
    match raw.get(shape.section) {
        None => Vec::new(),
        Some(JValue::Array(rows)) => decompress(rows, shape, ctx.part_name, ctx.diagnostics),
        Some(other) => {
            ctx.diagnostics.push(
                DiagnosticKind::Schema,
                ctx.part_name,
                format!("`{}` is a {}, expected array", shape.section, other.type_name()),
            );
            Vec::new()
        }
    }
}

/// Decompresses one table into elements of type `T`.
pub fn load_table<T: TableElement>(raw: &JObject, ctx: &mut BuildContext<'_>) -> Vec<T> {
    table_rows(raw, T::SHAPE, ctx)
        .into_iter()
        .filter_map(|row| T::from_row(row, ctx))
        .collect()
}

fn parse_refnodes(raw: &JObject, part: &mut Part, diags: &mut Diagnostics) {
    let Some(value) = raw.get("refNodes") else {
        return;
    };
    let rows = value.as_array().unwrap_or_default();
    let (labels, nodes) = match rows {
        [JValue::Array(labels), JValue::Array(nodes), ..] => (labels, nodes),
        _ => {
            diags.push(
                DiagnosticKind::Schema,
                &part.part_name,
                "`refNodes` must be two arrays: labels and node ids",
            );
            return;
        }
    };
    for (label, node) in labels.iter().zip(nodes) {
        let (Some(label), Some(node)) = (label.as_str(), node.to_id()) else {
            continue;
        };
        match RefLabel::parse(label) {
            Some(l) => part.refnodes.set(l, node),
            None => tracing::debug!(part = %part.part_name, label, "ignoring unknown refNodes label"),
        }
    }
}

fn opt_string(row: &[JValue], index: usize) -> Option<String> {
    row.get(index).and_then(|v| v.as_str()).map(str::to_string)
}

fn parse_slots(raw: &JObject, part: &mut Part, diags: &mut Diagnostics) {
    for (section, v2) in [("slots", false), ("slots2", true)] {
        let Some(value) = raw.get(section) else {
            continue;
        };
        let Some(rows) = value.as_array() else {
            diags.push(
                DiagnosticKind::Schema,
                &part.part_name,
                format!("`{section}` is a {}, expected array", value.type_name()),
            );
            continue;
        };
        // Row 0 is the header.
        for row in rows.iter().skip(1) {
            let Some(row) = row.as_array() else {
                continue;
            };
            if v2 {
                // ["name", "allowTypes", "denyTypes", "default", "description"]
                let allowed: Vec<String> = row
                    .get(1)
                    .and_then(|v| v.as_array())
                    .map(|types| types.iter().filter_map(|t| t.as_str()).map(str::to_string).collect())
                    .unwrap_or_default();
                let types = if allowed.is_empty() {
                    opt_string(row, 0).into_iter().collect()
                } else {
                    allowed
                };
                for slot_type in types {
                    push_slot(part, slot_type, opt_string(row, 3), opt_string(row, 4));
                }
            } else {
                // ["type", "default", "description"]; a nested array names the type first.
                let slot_type = match row.first() {
                    Some(JValue::Str(s)) => Some(s.clone()),
                    Some(JValue::Array(inner)) => opt_string(inner, 0),
                    _ => None,
                };
                if let Some(slot_type) = slot_type {
                    push_slot(part, slot_type, opt_string(row, 1), opt_string(row, 2));
                }
            }
        }
    }
}

fn push_slot(part: &mut Part, slot_type: String, default: Option<String>, description: Option<String>) {
    if !part.slots.contains(&slot_type) {
        part.slots.push(slot_type.clone());
    }
    part.slot_specs.push(SlotSpec {
        slot_type,
        default,
        description,
    });
}

/// Builds one part from its raw JSON object.
pub fn parse_part(part_name: &str, raw: &JObject, source_file: &str, diags: &mut Diagnostics) -> Part {
    let mut part = Part::new(part_name, source_file);

    match raw.get("slotType") {
        Some(JValue::Str(s)) => part.slot_type = Some(s.clone()),
        Some(other) => diags.push(
            DiagnosticKind::Schema,
            part_name,
            format!("`slotType` is a {}, expected string", other.type_name()),
        ),
        None => {}
    }
    parse_slots(raw, &mut part, diags);
    parse_refnodes(raw, &mut part, diags);

    let mut ctx = BuildContext::new(part_name, source_file, diags);

    for node in load_table::<Node>(raw, &mut ctx) {
        if part.nodes.contains_key(&node.id) {
            ctx.diagnostics.push(
                DiagnosticKind::Duplicate,
                part_name,
                format!("duplicate node `{}` ignored", node.id),
            );
            continue;
        }
        part.nodes.insert(node.id.clone(), node);
    }

    part.beams = load_table::<Beam>(raw, &mut ctx);
    part.triangles = load_table::<Triangle>(raw, &mut ctx);

    if let Some(JValue::Array(rows)) = raw.get(QUADS.section) {
        part.raw_quads = rows.clone();
    }
    for row in table_rows(raw, QUADS, &mut ctx) {
        if let Some(pair) = split_quad(row, &mut ctx) {
            part.triangles.extend(pair);
        }
    }

    for (key, value) in raw {
        if !KNOWN_SECTIONS.contains(&key.as_str()) {
            part.raw_sections.insert(key.clone(), value.clone());
        }
    }

    add_dummy_nodes(&mut part);
    part
}

/// Nodes the part references but does not define become dummies. A parent
/// part may still define them, so nothing is reported here.
fn add_dummy_nodes(part: &mut Part) {
    let referenced = part
        .beams
        .iter()
        .flat_map(|b| b.endpoints.iter())
        .chain(part.triangles.iter().flat_map(|t| t.vertices.iter()));

    let mut missing = Vec::new();
    for id in referenced {
        if !part.nodes.contains_key(id) && !part.dummy_nodes.contains_key(id) && !missing.contains(id) {
            missing.push(id.clone());
        }
    }
    for id in missing {
        tracing::debug!(part = %part.part_name, node = %id, "dummy node");
        let dummy = Node::dummy(&id, &part.source_file);
        part.dummy_nodes.insert(id, dummy);
    }
}

/// Converts a parsed JBeam document into parts.
///
/// Parts whose value is not an object are reported and skipped. An error is
/// returned only when the root is not an object, or when every part failed.
pub fn parse_jbeam_json(root: &JValue, source_file: &str) -> Result<ParsedFile> {
    let JValue::Object(map) = root else {
        return Err(Error::schema(
            source_file,
            format!("root is a {}, expected object", root.type_name()),
        ));
    };

    let mut parsed = ParsedFile::default();
    let mut failed = 0usize;
    for (name, value) in map {
        match value {
            JValue::Object(raw) => {
                let part = parse_part(name, raw, source_file, &mut parsed.diagnostics);
                tracing::debug!(
                    part = %name,
                    nodes = part.nodes.len(),
                    beams = part.beams.len(),
                    triangles = part.triangles.len(),
                    "parsed part"
                );
                parsed.parts.push(part);
            }
            other => {
                failed += 1;
                parsed.diagnostics.push(
                    DiagnosticKind::Schema,
                    name,
                    format!("part is a {}, expected object", other.type_name()),
                );
            }
        }
    }

    if parsed.parts.is_empty() && failed > 0 {
        return Err(Error::schema(source_file, "no part could be parsed"));
    }
    Ok(parsed)
}

/// Reads and parses JBeam text.
pub fn parse_jbeam_str(text: &str, source_file: &str) -> Result<ParsedFile> {
    let root = parse_lenient(text)?;
    parse_jbeam_json(&root, source_file)
}

/// Reads a `.jbeam` file from disk. The handle is closed before parsing.
pub fn load_jbeam_file(path: &Path) -> Result<ParsedFile> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_jbeam_str(&text, &path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobject;

    fn parse(text: &str) -> ParsedFile {
        parse_jbeam_str(text, "test.jbeam").unwrap()
    }

    #[test]
    fn nodes_with_scope() {
        let parsed = parse(
            r#"{"p": {"nodes": [
                ["id", "posX", "posY", "posZ"],
                {"nodeWeight": 1},
                ["n1", 0, 0, 0],
                {"nodeWeight": 2},
                ["n2", 1, 0, 0],
                ["n3", 2, 0.5, -1]
            ]}}"#,
        );
        let part = &parsed.parts[0];
        assert_eq!(part.nodes.len(), 3);
        assert_eq!(part.nodes["n1"].props["nodeWeight"], JValue::Int(1));
        assert_eq!(part.nodes["n3"].props["nodeWeight"], JValue::Int(2));
        assert_eq!(part.nodes["n3"].position, [2.0, 0.5, -1.0]);
        assert_eq!(part.nodes["n3"].source_file, "test.jbeam");
    }

    #[test]
    fn duplicate_beams_get_instances() {
        let parsed = parse(
            r#"{"p": {
                "nodes": [["n1",0,0,0], ["n2",1,0,0]],
                "beams": [{"beamSpring":100}, ["n1","n2"], ["n2","n1"]]
            }}"#,
        );
        let part = &parsed.parts[0];
        assert_eq!(part.beams.len(), 2);
        assert_eq!(part.beams[0].id, part.beams[1].id);
        assert_eq!(part.beams[0].instance, 1);
        assert_eq!(part.beams[1].instance, 2);
        assert_eq!(part.beams[1].endpoints, ["n2".to_string(), "n1".to_string()]);
        for beam in &part.beams {
            assert_eq!(beam.props["beamSpring"], JValue::Int(100));
        }
    }

    #[test]
    fn duplicate_node_skipped() {
        let parsed = parse(r#"{"p": {"nodes": [["n1",0,0,0], ["n1",5,5,5]]}}"#);
        let part = &parsed.parts[0];
        assert_eq!(part.nodes.len(), 1);
        assert_eq!(part.nodes["n1"].position, [0.0, 0.0, 0.0]);
        assert_eq!(parsed.diagnostics.count(DiagnosticKind::Duplicate), 1);
    }

    #[test]
    fn quads_split_into_triangles() {
        let parsed = parse(
            r#"{"p": {"quads": [["id1:","id2:","id3:","id4:"], {"s":1}, ["a","b","c","d",{"k":"v"}]]}}"#,
        );
        let part = &parsed.parts[0];
        assert_eq!(part.triangles.len(), 2);
        assert_eq!(part.triangles[0].vertices, ["a", "b", "c"].map(String::from));
        assert_eq!(part.triangles[1].vertices, ["c", "d", "a"].map(String::from));
        for tri in &part.triangles {
            assert_eq!(tri.props, jobject! { "s" => 1, "k" => "v" });
        }
        assert_eq!(part.raw_quads.len(), 3);
    }

    #[test]
    fn missing_nodes_become_dummies() {
        let parsed = parse(r#"{"p": {"nodes": [["a",0,0,0]], "beams": [["a","x"]]}}"#);
        let part = &parsed.parts[0];
        assert!(part.nodes.get("x").is_none());
        let dummy = part.node("x").unwrap();
        assert!(dummy.dummy);
        assert_eq!(dummy.position, [0.0; 3]);
        assert_eq!(parsed.diagnostics.count(DiagnosticKind::Reference), 0);
    }

    #[test]
    fn refnodes_and_slots() {
        let parsed = parse(
            r#"{"body": {
                "slotType": "main",
                "slots": [["type", "default", "description"], ["door_L", "door_a", "Left door"], ["engine", "", "Engine"]],
                "slots2": [["name","allowTypes","denyTypes","default","description"], ["wheel", ["wheel_F", "wheel_R"], [], "", "Wheels"]],
                "refNodes": [["ref:", "back:", "left:", "up:"], ["r", "b", "l", "u"]],
                "flexbodies": [["mesh", "[group]:"]]
            }}"#,
        );
        let part = &parsed.parts[0];
        assert_eq!(part.slot_type.as_deref(), Some("main"));
        assert_eq!(part.slots, ["door_L", "engine", "wheel_F", "wheel_R"]);
        assert_eq!(part.slot_specs[0].default.as_deref(), Some("door_a"));
        assert_eq!(part.refnodes.get(RefLabel::Up), Some("u"));
        assert_eq!(part.refnodes.get(RefLabel::LeftCorner), None);
        assert!(part.raw_sections.contains_key("flexbodies"));
    }

    #[test]
    fn bad_refnodes_is_schema_diagnostic() {
        let parsed = parse(r#"{"p": {"refNodes": ["ref:", "r"]}}"#);
        assert!(parsed.parts[0].refnodes.is_empty());
        assert_eq!(parsed.diagnostics.count(DiagnosticKind::Schema), 1);
    }

    #[test]
    fn partial_result_when_some_parts_fail() {
        let parsed = parse(r#"{"good": {"nodes": []}, "bad": 3}"#);
        assert_eq!(parsed.parts.len(), 1);
        assert_eq!(parsed.diagnostics.count(DiagnosticKind::Schema), 1);

        assert!(parse_jbeam_str(r#"{"bad": 3}"#, "x.jbeam").is_err());
        assert!(parse_jbeam_str("[1, 2]", "x.jbeam").is_err());
    }

    #[test]
    fn comma_repair_end_to_end() {
        let parsed = parse(r#"{"p":{"nodes":[["n1" 0 0 0]]}}"#);
        assert_eq!(parsed.parts[0].nodes.len(), 1);
    }

    #[test]
    fn instance_numbers_consecutive_across_quads() {
        let parsed = parse(
            r#"{"p": {"triangles": [["a","b","c"]], "quads": [["a","b","c","d"]]}}"#,
        );
        let part = &parsed.parts[0];
        let abc = TriangleId::new("a", "b", "c");
        let instances: Vec<u32> = part.triangle_instances(&abc).map(|t| t.instance).collect();
        assert_eq!(instances, [1, 2]);
    }
}
