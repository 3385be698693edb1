// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for assembled JBeam meshes.
//!
//! The [`MeshArena`] owns every vertex, edge and face of one assembled
//! vehicle. Elements live in slot maps with stable, generational keys and are
//! indexed by their JBeam identity: node id for vertices, unordered node pair
//! for edges, unordered node triple for faces.
//!
//! ## Instances
//!
//! Several beams over the same two nodes share one edge; each beam is one
//! *instance* of that edge and keeps its own props in the property store
//! under the edge's storage key. Faces work the same way for triangles.

use indexmap::IndexMap;
use jbeam_lite_core::{BeamId, NodeId, TriangleId};
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use crate::keys::*;
use crate::store::StorageKey;

/// Data stored for a vertex: one node.
#[derive(Debug, Clone)]
pub struct VertexData {
    pub node_id: NodeId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Referenced before any part defined it.
    pub dummy: bool,
    pub storage_key: StorageKey,
    pub source_file: String,
}

/// One beam over an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeInstance {
    /// Endpoints in the order the beam was written.
    pub endpoints: [NodeId; 2],
    pub source_file: String,
}

/// Data stored for an edge: all beams between two vertices.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub start: VertexKey,
    pub end: VertexKey,
    pub storage_key: StorageKey,
    /// Instance `i` (1-based) is `instances[i - 1]`.
    pub instances: Vec<EdgeInstance>,
}

/// One triangle over a face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceInstance {
    /// Vertices in the order (winding) the triangle was written.
    pub vertices: [NodeId; 3],
    pub source_file: String,
}

/// Data stored for a face: all triangles over three vertices.
#[derive(Debug, Clone)]
pub struct FaceData {
    pub vertices: [VertexKey; 3],
    pub storage_key: StorageKey,
    pub instances: Vec<FaceInstance>,
}

/// Element and key counts of an arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub vertices: usize,
    pub dummy_vertices: usize,
    pub edges: usize,
    pub beam_instances: usize,
    pub faces: usize,
    pub triangle_instances: usize,
    /// Distinct storage keys referenced per domain: `[verts, edges, faces]`.
    pub distinct_keys: [usize; 3],
}

/// The central arena that owns all mesh elements and their indices.
///
/// # Example
///
/// ```
/// use jbeam_lite_topology::MeshArena;
///
/// let mut arena = MeshArena::new();
/// let a = arena.add_vertex("a", [0.0, 0.0, 0.0], "k0".into(), "body.jbeam");
/// let b = arena.add_vertex("b", [1.0, 0.0, 0.0], "k1".into(), "body.jbeam");
///
/// assert_eq!(arena.vertex_count(), 2);
/// assert_eq!(arena.vertex_by_node("b"), Some(b));
/// # let _ = a;
/// ```
#[derive(Debug, Default)]
pub struct MeshArena {
    // Element storage
    pub(crate) vertices: SlotMap<VertexKey, VertexData>,
    pub(crate) edges: SlotMap<EdgeKey, EdgeData>,
    pub(crate) faces: SlotMap<FaceKey, FaceData>,

    // Identity indices; vertex order is node insertion order
    pub(crate) vertex_index: IndexMap<NodeId, VertexKey>,
    pub(crate) edge_index: FxHashMap<BeamId, EdgeKey>,
    pub(crate) face_index: FxHashMap<TriangleId, FaceKey>,
    pub(crate) edge_order: Vec<EdgeKey>,
    pub(crate) face_order: Vec<FaceKey>,

    // Upward adjacency: vertex → edges using it
    pub(crate) vertex_to_edges: FxHashMap<VertexKey, FxHashSet<EdgeKey>>,
}

impl MeshArena {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Vertex operations ---

    /// Adds a real vertex for `node_id`.
    pub fn add_vertex(
        &mut self,
        node_id: &str,
        position: [f64; 3],
        storage_key: StorageKey,
        source_file: &str,
    ) -> VertexKey {
        self.insert_vertex(node_id, position, false, storage_key, source_file)
    }

    /// Adds a placeholder vertex at the origin for a node not yet defined.
    pub fn add_dummy_vertex(
        &mut self,
        node_id: &str,
        storage_key: StorageKey,
        source_file: &str,
    ) -> VertexKey {
        self.insert_vertex(node_id, [0.0; 3], true, storage_key, source_file)
    }

    fn insert_vertex(
        &mut self,
        node_id: &str,
        [x, y, z]: [f64; 3],
        dummy: bool,
        storage_key: StorageKey,
        source_file: &str,
    ) -> VertexKey {
        let key = self.vertices.insert(VertexData {
            node_id: node_id.to_string(),
            x,
            y,
            z,
            dummy,
            storage_key,
            source_file: source_file.to_string(),
        });
        self.vertex_index.insert(node_id.to_string(), key);
        key
    }

    /// Returns the vertex data for the given key, or `None` if not found.
    pub fn vertex(&self, key: VertexKey) -> Option<&VertexData> {
        self.vertices.get(key)
    }

    pub(crate) fn vertex_mut(&mut self, key: VertexKey) -> Option<&mut VertexData> {
        self.vertices.get_mut(key)
    }

    /// Looks a vertex up by node id.
    pub fn vertex_by_node(&self, node_id: &str) -> Option<VertexKey> {
        self.vertex_index.get(node_id).copied()
    }

    /// Returns the number of vertices in the arena.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the coordinates of a vertex as `[x, y, z]`.
    pub fn vertex_coords(&self, key: VertexKey) -> Option<[f64; 3]> {
        self.vertices.get(key).map(|v| [v.x, v.y, v.z])
    }

    /// Vertices in node insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexKey, &VertexData)> {
        self.vertex_index
            .values()
            .filter_map(|&k| self.vertices.get(k).map(|v| (k, v)))
    }

    // --- Edge operations ---

    /// Adds an edge with one instance, or appends an instance to the edge
    /// already joining these vertices. Returns the edge and the 1-based
    /// instance number.
    pub fn add_edge_instance(
        &mut self,
        id: &BeamId,
        start: VertexKey,
        end: VertexKey,
        instance: EdgeInstance,
        mint_key: impl FnOnce() -> StorageKey,
    ) -> (EdgeKey, u32) {
        if let Some(&key) = self.edge_index.get(id) {
            if let Some(edge) = self.edges.get_mut(key) {
                edge.instances.push(instance);
                return (key, edge.instances.len() as u32);
            }
        }
        let key = self.edges.insert(EdgeData {
            start,
            end,
            storage_key: mint_key(),
            instances: vec![instance],
        });
        self.edge_index.insert(id.clone(), key);
        self.edge_order.push(key);
        self.link_vertex_edge(start, key);
        self.link_vertex_edge(end, key);
        (key, 1)
    }

    /// Returns the edge data for the given key, or `None` if not found.
    pub fn edge(&self, key: EdgeKey) -> Option<&EdgeData> {
        self.edges.get(key)
    }

    pub fn edge_by_id(&self, id: &BeamId) -> Option<EdgeKey> {
        self.edge_index.get(id).copied()
    }

    /// Returns the number of edges in the arena.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges in creation order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKey, &EdgeData)> {
        self.edge_order
            .iter()
            .filter_map(|&k| self.edges.get(k).map(|e| (k, e)))
    }

    /// Removes instance `index` (0-based) of an edge. The edge itself goes
    /// when its last instance does. Returns the removed instance and whether
    /// the edge was dropped.
    pub fn remove_edge_instance(&mut self, key: EdgeKey, index: usize) -> Option<(EdgeInstance, bool)> {
        let edge = self.edges.get_mut(key)?;
        if index >= edge.instances.len() {
            return None;
        }
        let instance = edge.instances.remove(index);
        if !edge.instances.is_empty() {
            return Some((instance, false));
        }
        if let Some(edge) = self.edges.remove(key) {
            for vertex in [edge.start, edge.end] {
                if let Some(set) = self.vertex_to_edges.get_mut(&vertex) {
                    set.remove(&key);
                    if set.is_empty() {
                        self.vertex_to_edges.remove(&vertex);
                    }
                }
            }
        }
        self.edge_index.retain(|_, k| *k != key);
        self.edge_order.retain(|k| *k != key);
        Some((instance, true))
    }

    /// Edges touching a vertex.
    pub fn vertex_edges(&self, key: VertexKey) -> Vec<EdgeKey> {
        self.vertex_to_edges
            .get(&key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    // --- Face operations ---

    /// Face counterpart of [`MeshArena::add_edge_instance`].
    pub fn add_face_instance(
        &mut self,
        id: &TriangleId,
        vertices: [VertexKey; 3],
        instance: FaceInstance,
        mint_key: impl FnOnce() -> StorageKey,
    ) -> (FaceKey, u32) {
        if let Some(&key) = self.face_index.get(id) {
            if let Some(face) = self.faces.get_mut(key) {
                face.instances.push(instance);
                return (key, face.instances.len() as u32);
            }
        }
        let key = self.faces.insert(FaceData {
            vertices,
            storage_key: mint_key(),
            instances: vec![instance],
        });
        self.face_index.insert(id.clone(), key);
        self.face_order.push(key);
        (key, 1)
    }

    /// Returns the face data for the given key, or `None` if not found.
    pub fn face(&self, key: FaceKey) -> Option<&FaceData> {
        self.faces.get(key)
    }

    pub fn face_by_id(&self, id: &TriangleId) -> Option<FaceKey> {
        self.face_index.get(id).copied()
    }

    /// Returns the number of faces in the arena.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Face counterpart of [`MeshArena::remove_edge_instance`].
    pub fn remove_face_instance(&mut self, key: FaceKey, index: usize) -> Option<(FaceInstance, bool)> {
        let face = self.faces.get_mut(key)?;
        if index >= face.instances.len() {
            return None;
        }
        let instance = face.instances.remove(index);
        if !face.instances.is_empty() {
            return Some((instance, false));
        }
        self.faces.remove(key);
        self.face_index.retain(|_, k| *k != key);
        self.face_order.retain(|k| *k != key);
        Some((instance, true))
    }

    /// Faces in creation order.
    pub fn faces(&self) -> impl Iterator<Item = (FaceKey, &FaceData)> {
        self.face_order
            .iter()
            .filter_map(|&k| self.faces.get(k).map(|f| (k, f)))
    }

    // --- Storage keys ---

    /// Storage key attached to an element.
    pub fn storage_key(&self, key: MeshKey) -> Option<&str> {
        match key {
            MeshKey::Vertex(k) => self.vertices.get(k).map(|v| v.storage_key.as_str()),
            MeshKey::Edge(k) => self.edges.get(k).map(|e| e.storage_key.as_str()),
            MeshKey::Face(k) => self.faces.get(k).map(|f| f.storage_key.as_str()),
        }
    }

    /// Re-points an element at another storage key. Returns `false` if the
    /// element does not exist.
    pub fn set_storage_key(&mut self, key: MeshKey, storage_key: StorageKey) -> bool {
        let slot = match key {
            MeshKey::Vertex(k) => self.vertices.get_mut(k).map(|v| &mut v.storage_key),
            MeshKey::Edge(k) => self.edges.get_mut(k).map(|e| &mut e.storage_key),
            MeshKey::Face(k) => self.faces.get_mut(k).map(|f| &mut f.storage_key),
        };
        match slot {
            Some(slot) => {
                *slot = storage_key;
                true
            }
            None => false,
        }
    }

    /// Every element of one domain with its storage key, in arena order.
    pub fn domain_keys(&self, domain: Domain) -> Vec<(MeshKey, &str)> {
        match domain {
            Domain::Verts => self
                .vertices()
                .map(|(k, v)| (MeshKey::from(k), v.storage_key.as_str()))
                .collect(),
            Domain::Edges => self
                .edges()
                .map(|(k, e)| (MeshKey::from(k), e.storage_key.as_str()))
                .collect(),
            Domain::Faces => self
                .faces()
                .map(|(k, f)| (MeshKey::from(k), f.storage_key.as_str()))
                .collect(),
        }
    }

    /// Counts elements, instances, dummies and distinct storage keys.
    pub fn stats(&self) -> MeshStats {
        let distinct = |domain: Domain| {
            self.domain_keys(domain)
                .into_iter()
                .map(|(_, k)| k)
                .collect::<FxHashSet<_>>()
                .len()
        };
        MeshStats {
            vertices: self.vertices.len(),
            dummy_vertices: self.vertices.values().filter(|v| v.dummy).count(),
            edges: self.edges.len(),
            beam_instances: self.edges.values().map(|e| e.instances.len()).sum(),
            faces: self.faces.len(),
            triangle_instances: self.faces.values().map(|f| f.instances.len()).sum(),
            distinct_keys: [
                distinct(Domain::Verts),
                distinct(Domain::Edges),
                distinct(Domain::Faces),
            ],
        }
    }

    // --- Adjacency index helpers ---

    /// Register that an edge uses a vertex (upward adjacency).
    pub(crate) fn link_vertex_edge(&mut self, vertex: VertexKey, edge: EdgeKey) {
        self.vertex_to_edges.entry(vertex).or_default().insert(edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_instance(a: &str, b: &str) -> EdgeInstance {
        EdgeInstance {
            endpoints: [a.to_string(), b.to_string()],
            source_file: "t.jbeam".into(),
        }
    }

    #[test]
    fn new_arena_is_empty() {
        let arena = MeshArena::new();
        assert_eq!(arena.vertex_count(), 0);
        assert_eq!(arena.edge_count(), 0);
        assert_eq!(arena.face_count(), 0);
        assert_eq!(arena.stats(), MeshStats::default());
    }

    #[test]
    fn add_and_retrieve_vertex() {
        let mut arena = MeshArena::new();
        let key = arena.add_vertex("n1", [1.0, 2.0, 3.0], "k".into(), "t.jbeam");

        let v = arena.vertex(key).unwrap();
        assert_eq!(v.node_id, "n1");
        assert!(!v.dummy);
        assert_eq!(arena.vertex_coords(key), Some([1.0, 2.0, 3.0]));
        assert_eq!(arena.vertex_by_node("n1"), Some(key));
    }

    #[test]
    fn duplicate_edges_share_key() {
        let mut arena = MeshArena::new();
        let a = arena.add_vertex("a", [0.0; 3], "ka".into(), "t.jbeam");
        let b = arena.add_vertex("b", [1.0, 0.0, 0.0], "kb".into(), "t.jbeam");
        let id = BeamId::new("a", "b");

        let (e1, i1) = arena.add_edge_instance(&id, a, b, edge_instance("a", "b"), || "e".into());
        let (e2, i2) =
            arena.add_edge_instance(&id, b, a, edge_instance("b", "a"), || "other".into());
        assert_eq!(e1, e2);
        assert_eq!((i1, i2), (1, 2));
        assert_eq!(arena.edge_count(), 1);
        assert_eq!(arena.storage_key(e1.into()), Some("e"));
        assert_eq!(arena.vertex_edges(a), vec![e1]);

        let stats = arena.stats();
        assert_eq!(stats.beam_instances, 2);
        assert_eq!(stats.distinct_keys, [2, 1, 0]);
    }

    #[test]
    fn removing_last_instance_drops_edge() {
        let mut arena = MeshArena::new();
        let a = arena.add_vertex("a", [0.0; 3], "ka".into(), "t.jbeam");
        let b = arena.add_vertex("b", [1.0, 0.0, 0.0], "kb".into(), "t.jbeam");
        let id = BeamId::new("a", "b");
        let (e, _) = arena.add_edge_instance(&id, a, b, edge_instance("a", "b"), || "e".into());
        arena.add_edge_instance(&id, b, a, edge_instance("b", "a"), || "e".into());

        let (removed, dropped) = arena.remove_edge_instance(e, 0).unwrap();
        assert_eq!(removed.endpoints, ["a", "b"]);
        assert!(!dropped);
        assert_eq!(arena.edge(e).unwrap().instances.len(), 1);
        assert!(arena.remove_edge_instance(e, 1).is_none());

        let (_, dropped) = arena.remove_edge_instance(e, 0).unwrap();
        assert!(dropped);
        assert_eq!(arena.edge_count(), 0);
        assert_eq!(arena.edge_by_id(&id), None);
        assert!(arena.vertex_edges(a).is_empty());
        assert_eq!(arena.edges().count(), 0);
        assert!(arena.remove_edge_instance(e, 0).is_none());
    }

    #[test]
    fn faces_and_dummies() {
        let mut arena = MeshArena::new();
        let a = arena.add_vertex("a", [0.0; 3], "ka".into(), "t.jbeam");
        let b = arena.add_vertex("b", [1.0, 0.0, 0.0], "kb".into(), "t.jbeam");
        let c = arena.add_dummy_vertex("c", "kc".into(), "t.jbeam");
        let instance = FaceInstance {
            vertices: ["a".into(), "b".into(), "c".into()],
            source_file: "t.jbeam".into(),
        };
        let (f, n) = arena.add_face_instance(
            &TriangleId::new("c", "b", "a"),
            [a, b, c],
            instance,
            || "f".into(),
        );
        assert_eq!(n, 1);
        assert_eq!(arena.face_by_id(&TriangleId::new("a", "b", "c")), Some(f));
        assert_eq!(arena.stats().dummy_vertices, 1);
    }

    #[test]
    fn set_storage_key_replaces() {
        let mut arena = MeshArena::new();
        let a = arena.add_vertex("a", [0.0; 3], "ka".into(), "t.jbeam");
        assert!(arena.set_storage_key(a.into(), "kz".into()));
        assert_eq!(arena.domain_keys(Domain::Verts), vec![(MeshKey::Vertex(a), "kz")]);
    }
}
