// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed JBeam entities: parts, nodes, beams, triangles and composition records.

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{JObject, JValue};

/// Node identifier, unique within a part.
pub type NodeId = String;

/// Scope-modifier key → value map attached to one element.
pub type PropMap = JObject;

/// Unordered pair of node ids. Stored sorted so `{a,b} == {b,a}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeamId([NodeId; 2]);

impl BeamId {
    pub fn new(a: &str, b: &str) -> Self {
        let mut ids = [a.to_string(), b.to_string()];
        ids.sort();
        Self(ids)
    }

    pub fn nodes(&self) -> &[NodeId; 2] {
        &self.0
    }
}

impl fmt::Display for BeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0[0], self.0[1])
    }
}

/// Unordered triple of node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriangleId([NodeId; 3]);

impl TriangleId {
    pub fn new(a: &str, b: &str, c: &str) -> Self {
        let mut ids = [a.to_string(), b.to_string(), c.to_string()];
        ids.sort();
        Self(ids)
    }

    pub fn nodes(&self) -> &[NodeId; 3] {
        &self.0
    }
}

impl fmt::Display for TriangleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.0[0], self.0[1], self.0[2])
    }
}

/// A node: a named point mass.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub position: [f64; 3],
    pub props: PropMap,
    pub source_file: String,
    /// Placeholder for a node referenced but not defined by its part.
    pub dummy: bool,
}

impl Node {
    /// A placeholder at the origin for an unresolved reference.
    pub fn dummy(id: &str, source_file: &str) -> Self {
        Self {
            id: id.to_string(),
            position: [0.0; 3],
            props: PropMap::new(),
            source_file: source_file.to_string(),
            dummy: true,
        }
    }
}

/// A beam between two nodes. `(id, instance)` is unique within a part.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub id: BeamId,
    /// Endpoints in the order they were written.
    pub endpoints: [NodeId; 2],
    /// 1-based occurrence number of `id` in discovery order.
    pub instance: u32,
    pub props: PropMap,
    pub source_file: String,
}

/// A triangle over three nodes. `(id, instance)` is unique within a part.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub id: TriangleId,
    /// Vertices in the order they were written (winding matters).
    pub vertices: [NodeId; 3],
    pub instance: u32,
    pub props: PropMap,
    pub source_file: String,
}

/// Fixed reference-node labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefLabel {
    Ref,
    Back,
    Left,
    Up,
    LeftCorner,
    RightCorner,
}

impl RefLabel {
    pub const ALL: [RefLabel; 6] = [
        RefLabel::Ref,
        RefLabel::Back,
        RefLabel::Left,
        RefLabel::Up,
        RefLabel::LeftCorner,
        RefLabel::RightCorner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RefLabel::Ref => "ref",
            RefLabel::Back => "back",
            RefLabel::Left => "left",
            RefLabel::Up => "up",
            RefLabel::LeftCorner => "leftCorner",
            RefLabel::RightCorner => "rightCorner",
        }
    }

    /// Parses a label, with or without the trailing colon used in files.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.strip_suffix(':').unwrap_or(label);
        Self::ALL.into_iter().find(|l| l.as_str() == label)
    }
}

/// Reference node assignments of a part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefNodes {
    map: IndexMap<RefLabel, NodeId>,
}

impl RefNodes {
    pub fn get(&self, label: RefLabel) -> Option<&str> {
        self.map.get(&label).map(|s| s.as_str())
    }

    pub fn set(&mut self, label: RefLabel, node: impl Into<NodeId>) {
        self.map.insert(label, node.into());
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Assigned labels in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (RefLabel, &str)> {
        self.map.iter().map(|(l, n)| (*l, n.as_str()))
    }
}

/// One slot declared by a part.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSpec {
    /// Slot type children must declare as their `slotType`.
    pub slot_type: String,
    pub default: Option<String>,
    pub description: Option<String>,
}

/// Identity of a part within a vehicle: `(slot_type, part_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartId {
    pub slot_type: String,
    pub part_name: String,
}

impl PartId {
    pub fn new(slot_type: impl Into<String>, part_name: impl Into<String>) -> Self {
        Self {
            slot_type: slot_type.into(),
            part_name: part_name.into(),
        }
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot_type, self.part_name)
    }
}

/// A named sub-structure of a JBeam file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    pub part_name: String,
    pub slot_type: Option<String>,
    pub refnodes: RefNodes,
    /// Defined nodes in declaration order.
    pub nodes: IndexMap<NodeId, Node>,
    /// Placeholders for nodes referenced but defined elsewhere.
    pub dummy_nodes: IndexMap<NodeId, Node>,
    pub beams: Vec<Beam>,
    pub triangles: Vec<Triangle>,
    /// Slot types this part exposes for children.
    pub slots: Vec<String>,
    pub slot_specs: Vec<SlotSpec>,
    /// Quad rows as written; their triangles are already in `triangles`.
    pub raw_quads: Vec<JValue>,
    /// Sections this library does not interpret, kept verbatim.
    pub raw_sections: JObject,
    pub source_file: String,
}

impl Part {
    pub fn new(part_name: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            part_name: part_name.into(),
            source_file: source_file.into(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> PartId {
        PartId::new(self.slot_type.clone().unwrap_or_default(), &self.part_name)
    }

    /// Looks a node up among defined nodes, then dummies.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).or_else(|| self.dummy_nodes.get(id))
    }

    /// Every instance of a beam id, in instance order.
    pub fn beam_instances<'a>(&'a self, id: &'a BeamId) -> impl Iterator<Item = &'a Beam> + 'a {
        self.beams.iter().filter(move |b| &b.id == id)
    }

    pub fn triangle_instances<'a>(
        &'a self,
        id: &'a TriangleId,
    ) -> impl Iterator<Item = &'a Triangle> + 'a {
        self.triangles.iter().filter(move |t| &t.id == id)
    }
}

/// Parsed `.pc` part configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PcConfig {
    pub format: i64,
    pub model: String,
    /// slot_type → part_name. An empty part name leaves the slot empty.
    pub parts: IndexMap<String, String>,
    /// Directory holding the `.pc` file.
    pub directory: PathBuf,
}

impl PcConfig {
    /// Requested `(slot_type, part_name)` pairs, including empty ones.
    pub fn requests(&self) -> impl Iterator<Item = PartId> + '_ {
        self.parts
            .iter()
            .map(|(slot, part)| PartId::new(slot.as_str(), part.as_str()))
    }
}

/// A part located on disk, ready to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadItem {
    pub file_path: PathBuf,
    pub part_name: String,
    pub slot_type: String,
}

/// One member of an asset group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetEntry {
    /// Index into the part pool the group was resolved from.
    pub part: usize,
    /// Distance from the group's root part.
    pub depth: u32,
}

/// Parts sharing a root, in discovery (BFS) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetGroup {
    pub entries: Vec<AssetEntry>,
}

impl AssetGroup {
    /// Pool index of the root part.
    pub fn root(&self) -> Option<usize> {
        self.entries.first().map(|e| e.part)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries by descending depth, so children precede their parents.
    /// Entries at equal depth keep discovery order.
    pub fn assembly_order(&self) -> Vec<AssetEntry> {
        let mut ordered = self.entries.clone();
        ordered.sort_by(|a, b| b.depth.cmp(&a.depth));
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beam_id_is_unordered() {
        assert_eq!(BeamId::new("b", "a"), BeamId::new("a", "b"));
        assert_eq!(BeamId::new("b", "a").to_string(), "a-b");
    }

    #[test]
    fn triangle_id_is_unordered() {
        assert_eq!(TriangleId::new("c", "a", "b"), TriangleId::new("a", "b", "c"));
    }

    #[test]
    fn ref_label_parse() {
        assert_eq!(RefLabel::parse("ref:"), Some(RefLabel::Ref));
        assert_eq!(RefLabel::parse("leftCorner"), Some(RefLabel::LeftCorner));
        assert_eq!(RefLabel::parse("bogus:"), None);
    }

    #[test]
    fn part_node_falls_back_to_dummy() {
        let mut part = Part::new("body", "body.jbeam");
        part.dummy_nodes
            .insert("x".into(), Node::dummy("x", "body.jbeam"));
        assert!(part.node("x").unwrap().dummy);
        assert!(part.node("y").is_none());
    }

    #[test]
    fn assembly_order_is_descending_depth() {
        let group = AssetGroup {
            entries: vec![
                AssetEntry { part: 0, depth: 0 },
                AssetEntry { part: 1, depth: 1 },
                AssetEntry { part: 2, depth: 2 },
                AssetEntry { part: 3, depth: 1 },
            ],
        };
        let order: Vec<usize> = group.assembly_order().iter().map(|e| e.part).collect();
        assert_eq!(order, [2, 1, 3, 0]);
        assert_eq!(group.root(), Some(0));
    }
}
