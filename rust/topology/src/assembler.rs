// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builds a [`MeshArena`] from parts and turns it back into parts.
//!
//! Parts are added children first. A node a child references but does not
//! define enters the arena as a dummy vertex and is upgraded in place when
//! the defining parent is added, so edges keep pointing at the same vertex.

use jbeam_lite_core::{Beam, Node, Part, PropMap, Triangle, TriangleId};

use crate::arena::{EdgeInstance, FaceInstance, MeshArena};
use crate::error::{Error, Result};
use crate::integrity;
use crate::keys::{Domain, EdgeKey, FaceKey, VertexKey};
use crate::store::PropertyStore;

/// Assembles parts of one owner into a mesh, storing element props in a
/// [`PropertyStore`] under that owner.
#[derive(Debug)]
pub struct MeshAssembler {
    owner: String,
    arena: MeshArena,
}

impl MeshAssembler {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            arena: MeshArena::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn arena(&self) -> &MeshArena {
        &self.arena
    }

    pub fn into_arena(self) -> MeshArena {
        self.arena
    }

    /// Adds every node, beam and triangle of `part`.
    pub fn add_part(&mut self, store: &mut PropertyStore, part: &Part) {
        let before = self.arena.stats();
        for node in part.nodes.values() {
            self.add_node(store, node);
        }
        for node in part.dummy_nodes.values() {
            self.add_node(store, node);
        }
        for beam in &part.beams {
            self.add_beam(store, beam);
        }
        for triangle in &part.triangles {
            self.add_triangle(store, triangle);
        }
        let after = self.arena.stats();
        tracing::debug!(
            owner = %self.owner,
            part = %part.part_name,
            vertices = after.vertices - before.vertices,
            beams = after.beam_instances - before.beam_instances,
            triangles = after.triangle_instances - before.triangle_instances,
            "assembled part"
        );
    }

    /// Adds a node, or upgrades the dummy standing in for it.
    pub fn add_node(&mut self, store: &mut PropertyStore, node: &Node) -> VertexKey {
        let Some(key) = self.arena.vertex_by_node(&node.id) else {
            let storage_key = store.store(&self.owner, Domain::Verts, None, &node.props, 1);
            return if node.dummy {
                self.arena.add_dummy_vertex(&node.id, storage_key, &node.source_file)
            } else {
                self.arena.add_vertex(&node.id, node.position, storage_key, &node.source_file)
            };
        };
        if node.dummy {
            return key;
        }
        if let Some(vertex) = self.arena.vertex_mut(key) {
            if vertex.dummy {
                [vertex.x, vertex.y, vertex.z] = node.position;
                vertex.dummy = false;
                vertex.source_file = node.source_file.clone();
                store.store(&self.owner, Domain::Verts, Some(vertex.storage_key.as_str()), &node.props, 1);
            } else {
                tracing::debug!(node = %node.id, kept = %vertex.source_file, "node defined twice; keeping first");
            }
        }
        key
    }

    fn vertex_for(&mut self, store: &mut PropertyStore, node_id: &str, source_file: &str) -> VertexKey {
        match self.arena.vertex_by_node(node_id) {
            Some(key) => key,
            None => self.add_node(store, &Node::dummy(node_id, source_file)),
        }
    }

    /// Adds a beam as a new instance of its edge. Returns the instance number.
    pub fn add_beam(&mut self, store: &mut PropertyStore, beam: &Beam) -> u32 {
        let start = self.vertex_for(store, &beam.endpoints[0], &beam.source_file);
        let end = self.vertex_for(store, &beam.endpoints[1], &beam.source_file);
        let instance = EdgeInstance {
            endpoints: beam.endpoints.clone(),
            source_file: beam.source_file.clone(),
        };
        let owner = &self.owner;
        let (edge, n) = self.arena.add_edge_instance(&beam.id, start, end, instance, || {
            store.store(owner, Domain::Edges, None, &beam.props, 1)
        });
        if n > 1 {
            if let Some(key) = self.arena.storage_key(edge.into()) {
                store.store(owner, Domain::Edges, Some(key), &beam.props, n);
            }
        }
        n
    }

    /// Adds a triangle as a new instance of its face. Returns the instance number.
    pub fn add_triangle(&mut self, store: &mut PropertyStore, triangle: &Triangle) -> u32 {
        let [a, b, c] = &triangle.vertices;
        let vertices = [
            self.vertex_for(store, a, &triangle.source_file),
            self.vertex_for(store, b, &triangle.source_file),
            self.vertex_for(store, c, &triangle.source_file),
        ];
        let instance = FaceInstance {
            vertices: triangle.vertices.clone(),
            source_file: triangle.source_file.clone(),
        };
        let owner = &self.owner;
        let (face, n) = self.arena.add_face_instance(&triangle.id, vertices, instance, || {
            store.store(owner, Domain::Faces, None, &triangle.props, 1)
        });
        if n > 1 {
            if let Some(key) = self.arena.storage_key(face.into()) {
                store.store(owner, Domain::Faces, Some(key), &triangle.props, n);
            }
        }
        n
    }

    /// Removes instance `instance` (1-based) of a beam edge from both the
    /// arena and the store. Later instances shift down by one on both sides.
    /// Returns `true` when the edge had no instances left and was dropped.
    pub fn remove_beam_instance(&mut self, store: &mut PropertyStore, edge: EdgeKey, instance: u32) -> Result<bool> {
        let data = self.arena.edge(edge).ok_or(Error::EdgeNotFound(edge))?;
        let count = data.instances.len() as u32;
        if instance == 0 || instance > count {
            return Err(Error::InstanceOutOfRange { instance, count });
        }
        let storage_key = data.storage_key.clone();
        let (_, dropped) = self
            .arena
            .remove_edge_instance(edge, instance as usize - 1)
            .ok_or(Error::EdgeNotFound(edge))?;
        store.delete(&self.owner, Domain::Edges, &storage_key, Some(instance));
        Ok(dropped)
    }

    /// Face counterpart of [`MeshAssembler::remove_beam_instance`].
    pub fn remove_triangle_instance(
        &mut self,
        store: &mut PropertyStore,
        face: FaceKey,
        instance: u32,
    ) -> Result<bool> {
        let data = self.arena.face(face).ok_or(Error::FaceNotFound(face))?;
        let count = data.instances.len() as u32;
        if instance == 0 || instance > count {
            return Err(Error::InstanceOutOfRange { instance, count });
        }
        let storage_key = data.storage_key.clone();
        let (_, dropped) = self
            .arena
            .remove_face_instance(face, instance as usize - 1)
            .ok_or(Error::FaceNotFound(face))?;
        store.delete(&self.owner, Domain::Faces, &storage_key, Some(instance));
        Ok(dropped)
    }

    /// Re-keys elements that share a storage key. See [`integrity::integrity_check`].
    pub fn integrity_check(&mut self, store: &mut PropertyStore) -> usize {
        integrity::integrity_check(store, &self.owner, &mut self.arena)
    }

    /// Rebuilds a part from the mesh, with props read back from `store`.
    ///
    /// Identity fields (name, slots, refNodes, unknown sections) come from
    /// `template`. With `source_filter`, only elements materialised from that
    /// file are included. Instance numbers are renumbered per exported part.
    pub fn export_part(
        &self,
        store: &PropertyStore,
        template: &Part,
        source_filter: Option<&str>,
    ) -> Part {
        let keep = |source: &str| source_filter.map_or(true, |f| f == source);
        let mut part = Part::new(&template.part_name, &template.source_file);
        part.slot_type = template.slot_type.clone();
        part.refnodes = template.refnodes.clone();
        part.slots = template.slots.clone();
        part.slot_specs = template.slot_specs.clone();
        part.raw_sections = template.raw_sections.clone();

        for (_, v) in self.arena.vertices() {
            if v.dummy || !keep(&v.source_file) {
                continue;
            }
            let props = store.fetch(&self.owner, Domain::Verts, &v.storage_key, 1);
            part.nodes.insert(
                v.node_id.clone(),
                Node {
                    id: v.node_id.clone(),
                    position: [v.x, v.y, v.z],
                    props,
                    source_file: v.source_file.clone(),
                    dummy: false,
                },
            );
        }

        for (_, edge) in self.arena.edges() {
            let mut n = 0;
            for (i, inst) in edge.instances.iter().enumerate() {
                if !keep(&inst.source_file) {
                    continue;
                }
                n += 1;
                let [a, b] = &inst.endpoints;
                part.beams.push(Beam {
                    id: jbeam_lite_core::BeamId::new(a, b),
                    endpoints: inst.endpoints.clone(),
                    instance: n,
                    props: self.instance_props(store, Domain::Edges, &edge.storage_key, i),
                    source_file: inst.source_file.clone(),
                });
            }
        }

        for (_, face) in self.arena.faces() {
            let mut n = 0;
            for (i, inst) in face.instances.iter().enumerate() {
                if !keep(&inst.source_file) {
                    continue;
                }
                n += 1;
                let [a, b, c] = &inst.vertices;
                part.triangles.push(Triangle {
                    id: TriangleId::new(a, b, c),
                    vertices: inst.vertices.clone(),
                    instance: n,
                    props: self.instance_props(store, Domain::Faces, &face.storage_key, i),
                    source_file: inst.source_file.clone(),
                });
            }
        }

        let referenced: Vec<String> = part
            .beams
            .iter()
            .flat_map(|b| b.endpoints.iter())
            .chain(part.triangles.iter().flat_map(|t| t.vertices.iter()))
            .filter(|id| !part.nodes.contains_key(*id))
            .cloned()
            .collect();
        for id in referenced {
            if !part.dummy_nodes.contains_key(&id) {
                let dummy = Node::dummy(&id, &template.source_file);
                part.dummy_nodes.insert(id, dummy);
            }
        }
        part
    }

    fn instance_props(&self, store: &PropertyStore, domain: Domain, key: &str, index: usize) -> PropMap {
        store.fetch(&self.owner, domain, key, index as u32 + 1)
    }

    /// Drops the owner's props from `store`.
    pub fn release(self, store: &mut PropertyStore) -> MeshArena {
        store.release_owner(&self.owner);
        self.arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use jbeam_lite_core::{jobject, parse_jbeam_str, JValue};

    fn part(text: &str, source: &str) -> Part {
        parse_jbeam_str(text, source).unwrap().parts.remove(0)
    }

    #[test]
    fn duplicate_beams_keep_separate_props() {
        let body = part(
            r#"{"body": {
                "nodes": [["n1",0,0,0], ["n2",1,0,0]],
                "beams": [{"beamSpring":100}, ["n1","n2"], {"beamSpring":200}, ["n2","n1"]]
            }}"#,
            "body.jbeam",
        );
        let mut store = PropertyStore::new();
        let mut asm = MeshAssembler::new("car");
        asm.add_part(&mut store, &body);

        let arena = asm.arena();
        assert_eq!(arena.edge_count(), 1);
        let edge = arena.edge(arena.edges().next().unwrap().0).unwrap();
        assert_eq!(store.instance_count("car", Domain::Edges, &edge.storage_key), 2);
        assert_eq!(
            store.fetch("car", Domain::Edges, &edge.storage_key, 2),
            jobject! { "beamSpring" => 200 }
        );
    }

    #[test]
    fn removed_beam_instance_leaves_mesh_and_store_in_step() {
        let body = part(
            r#"{"body": {
                "nodes": [["a",0,0,0], ["b",1,0,0], ["c",0,1,0]],
                "beams": [{"beamSpring":1}, ["a","b"], {"beamSpring":2}, ["a","b"]],
                "triangles": [["a","b","c"]]
            }}"#,
            "body.jbeam",
        );
        let mut store = PropertyStore::new();
        let mut asm = MeshAssembler::new("car");
        asm.add_part(&mut store, &body);
        let edge = asm.arena().edge_by_id(&jbeam_lite_core::BeamId::new("a", "b")).unwrap();
        let key = asm.arena().edge(edge).unwrap().storage_key.clone();

        assert!(!asm.remove_beam_instance(&mut store, edge, 1).unwrap());
        assert_eq!(store.instance_count("car", Domain::Edges, &key), 1);
        let exported = asm.export_part(&store, &body, None);
        let beams: Vec<(u32, PropMap)> = exported.beams.iter().map(|b| (b.instance, b.props.clone())).collect();
        assert_eq!(beams, [(1, jobject! { "beamSpring" => 2 })]);

        assert!(matches!(
            asm.remove_beam_instance(&mut store, edge, 2),
            Err(Error::InstanceOutOfRange { instance: 2, count: 1 })
        ));
        assert!(asm.remove_beam_instance(&mut store, edge, 1).unwrap());
        assert_eq!(asm.arena().edge_count(), 0);
        assert!(!store.contains_key("car", Domain::Edges, &key));
        assert!(matches!(
            asm.remove_beam_instance(&mut store, edge, 1),
            Err(Error::EdgeNotFound(k)) if k == edge
        ));

        let face = asm.arena().faces().next().unwrap().0;
        assert!(asm.remove_triangle_instance(&mut store, face, 1).unwrap());
        assert_eq!(asm.arena().face_count(), 0);
        assert!(asm.export_part(&store, &body, None).triangles.is_empty());
        assert!(matches!(
            asm.remove_triangle_instance(&mut store, face, 1),
            Err(Error::FaceNotFound(_))
        ));
    }

    #[test]
    fn child_dummy_upgraded_by_parent() {
        let child = part(
            r#"{"door": {"slotType": "door", "nodes": [["d1", 0, 1, 0]], "beams": [["d1", "b1"]]}}"#,
            "door.jbeam",
        );
        let parent = part(
            r#"{"body": {"slots": [["type"], ["door"]], "nodes": [{"nodeWeight": 4}, ["b1", 2.5, 0, 0]]}}"#,
            "body.jbeam",
        );
        let mut store = PropertyStore::new();
        let mut asm = MeshAssembler::new("car");
        asm.add_part(&mut store, &child);
        assert_eq!(asm.arena().stats().dummy_vertices, 1);
        asm.add_part(&mut store, &parent);

        let arena = asm.arena();
        let stats = arena.stats();
        assert_eq!(stats.vertices, 2);
        assert_eq!(stats.dummy_vertices, 0);
        let b1 = arena.vertex(arena.vertex_by_node("b1").unwrap()).unwrap();
        assert_relative_eq!(b1.x, 2.5);
        assert_eq!(b1.source_file, "body.jbeam");
        assert_eq!(
            store.fetch("car", Domain::Verts, &b1.storage_key, 1)["nodeWeight"],
            JValue::Int(4)
        );
        // The edge still points at the upgraded vertex.
        let (_, edge) = arena.edges().next().unwrap();
        assert_eq!(arena.vertex(edge.end).unwrap().node_id, "b1");
    }

    #[test]
    fn export_filters_by_source() {
        let child = part(
            r#"{"door": {"nodes": [["d1", 0, 1, 0]], "beams": [["d1", "b1"]], "triangles": [["d1","b1","b2"]]}}"#,
            "door.jbeam",
        );
        let parent = part(
            r#"{"body": {"nodes": [["b1", 1, 0, 0], ["b2", 2, 0, 0]], "beams": [{"beamDamp": 5}, ["b1", "b2"]]}}"#,
            "body.jbeam",
        );
        let mut store = PropertyStore::new();
        let mut asm = MeshAssembler::new("car");
        asm.add_part(&mut store, &child);
        asm.add_part(&mut store, &parent);

        let body = asm.export_part(&store, &parent, Some("body.jbeam"));
        assert_eq!(body.nodes.len(), 2);
        assert_eq!(body.beams.len(), 1);
        assert_eq!(body.beams[0].props, jobject! { "beamDamp" => 5 });
        assert!(body.triangles.is_empty());

        let door = asm.export_part(&store, &child, Some("door.jbeam"));
        assert_eq!(door.nodes.len(), 1);
        assert_eq!(door.triangles.len(), 1);
        assert!(door.dummy_nodes.contains_key("b1"));

        let all = asm.export_part(&store, &parent, None);
        assert_eq!(all.nodes.len(), 3);
        assert_eq!(all.beams.len(), 2);
    }

    #[test]
    fn release_drops_owner() {
        let body = part(r#"{"body": {"nodes": [["n1",0,0,0]]}}"#, "body.jbeam");
        let mut store = PropertyStore::new();
        let mut asm = MeshAssembler::new("car");
        asm.add_part(&mut store, &body);
        assert_eq!(store.owners(), vec!["car"]);
        let arena = asm.release(&mut store);
        assert!(store.owners().is_empty());
        assert_eq!(arena.vertex_count(), 1);
    }
}
