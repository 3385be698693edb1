// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON persistence for the property store and mesh arenas.
//!
//! An owner's props are saved as one blob under the key `saved_jbeam_props`
//! so a host can keep it as a single custom property. The arena snapshot maps
//! slot-map keys to sequential indices so it survives a reload.

use jbeam_lite_core::{BeamId, TriangleId};
use serde::{Deserialize, Serialize};

use crate::arena::{EdgeInstance, FaceInstance, MeshArena};
use crate::error::{Error, Result};
use crate::keys::VertexKey;
use crate::store::{OwnerProps, PropertyStore};

/// Property name the store blob is saved under.
pub const SAVED_PROPS_KEY: &str = "saved_jbeam_props";

#[derive(Debug, Serialize, Deserialize)]
struct SavedProps {
    saved_jbeam_props: OwnerProps,
}

impl PropertyStore {
    /// Serializes everything stored for `owner`.
    pub fn to_json(&self, owner: &str) -> Result<String> {
        let props = self
            .owner_props(owner)
            .ok_or_else(|| Error::UnknownOwner(owner.to_string()))?;
        let blob = SavedProps {
            saved_jbeam_props: props.clone(),
        };
        serde_json::to_string(&blob).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Replaces everything stored for `owner` with a blob from [`PropertyStore::to_json`].
    pub fn restore_json(&mut self, owner: &str, json: &str) -> Result<()> {
        let blob: SavedProps =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        tracing::debug!(
            owner,
            verts = blob.saved_jbeam_props.verts.len(),
            edges = blob.saved_jbeam_props.edges.len(),
            faces = blob.saved_jbeam_props.faces.len(),
            "restored property store"
        );
        self.owners.insert(owner.to_string(), blob.saved_jbeam_props);
        Ok(())
    }
}

/// Serializable representation of a mesh arena.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub vertices: Vec<VertexSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
    pub faces: Vec<FaceSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VertexSnapshot {
    pub node_id: String,
    pub position: [f64; 3],
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dummy: bool,
    pub storage_key: String,
    pub source_file: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub nodes: Vec<String>,
    pub source_file: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub start: usize,
    pub end: usize,
    pub storage_key: String,
    pub instances: Vec<InstanceSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FaceSnapshot {
    pub vertices: [usize; 3],
    pub storage_key: String,
    pub instances: Vec<InstanceSnapshot>,
}

impl MeshArena {
    /// Serializes the arena to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        let snapshot = self.to_snapshot();
        serde_json::to_string_pretty(&snapshot).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Creates a serializable snapshot of the arena.
    ///
    /// SlotMap keys are mapped to sequential vertex indices for portability.
    pub fn to_snapshot(&self) -> ArenaSnapshot {
        use rustc_hash::FxHashMap;

        let mut vertex_ids: FxHashMap<VertexKey, usize> = FxHashMap::default();
        let vertices: Vec<VertexSnapshot> = self
            .vertices()
            .enumerate()
            .map(|(i, (k, v))| {
                vertex_ids.insert(k, i);
                VertexSnapshot {
                    node_id: v.node_id.clone(),
                    position: [v.x, v.y, v.z],
                    dummy: v.dummy,
                    storage_key: v.storage_key.clone(),
                    source_file: v.source_file.clone(),
                }
            })
            .collect();

        let edges = self
            .edges()
            .map(|(_, e)| EdgeSnapshot {
                start: vertex_ids[&e.start],
                end: vertex_ids[&e.end],
                storage_key: e.storage_key.clone(),
                instances: e
                    .instances
                    .iter()
                    .map(|inst| InstanceSnapshot {
                        nodes: inst.endpoints.to_vec(),
                        source_file: inst.source_file.clone(),
                    })
                    .collect(),
            })
            .collect();

        let faces = self
            .faces()
            .map(|(_, f)| FaceSnapshot {
                vertices: f.vertices.map(|v| vertex_ids[&v]),
                storage_key: f.storage_key.clone(),
                instances: f
                    .instances
                    .iter()
                    .map(|inst| InstanceSnapshot {
                        nodes: inst.vertices.to_vec(),
                        source_file: inst.source_file.clone(),
                    })
                    .collect(),
            })
            .collect();

        ArenaSnapshot {
            vertices,
            edges,
            faces,
        }
    }

    /// Deserializes an arena from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: ArenaSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_snapshot(&snapshot)
    }

    /// Reconstructs an arena from a snapshot.
    pub fn from_snapshot(snap: &ArenaSnapshot) -> Result<Self> {
        let mut arena = MeshArena::new();

        let mut vertex_keys: Vec<VertexKey> = Vec::with_capacity(snap.vertices.len());
        for vs in &snap.vertices {
            let vk = if vs.dummy {
                arena.add_dummy_vertex(&vs.node_id, vs.storage_key.clone(), &vs.source_file)
            } else {
                arena.add_vertex(&vs.node_id, vs.position, vs.storage_key.clone(), &vs.source_file)
            };
            vertex_keys.push(vk);
        }
        let vertex = |i: usize| {
            vertex_keys
                .get(i)
                .copied()
                .ok_or_else(|| Error::Serialization(format!("vertex index {i} out of range")))
        };
        let node_id = |i: usize| -> Result<String> {
            let key = vertex(i)?;
            arena
                .vertex(key)
                .map(|v| v.node_id.clone())
                .ok_or(Error::VertexNotFound(key))
        };

        let mut edges = Vec::with_capacity(snap.edges.len());
        for es in &snap.edges {
            let (start, end) = (vertex(es.start)?, vertex(es.end)?);
            let id = BeamId::new(&node_id(es.start)?, &node_id(es.end)?);
            let instances = es
                .instances
                .iter()
                .map(|inst| {
                    let endpoints: [String; 2] = inst.nodes.clone().try_into().map_err(|_| {
                        Error::Serialization("edge instance needs 2 nodes".into())
                    })?;
                    Ok(EdgeInstance {
                        endpoints,
                        source_file: inst.source_file.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            edges.push((id, start, end, es.storage_key.clone(), instances));
        }

        let mut faces = Vec::with_capacity(snap.faces.len());
        for fs in &snap.faces {
            let keys = [vertex(fs.vertices[0])?, vertex(fs.vertices[1])?, vertex(fs.vertices[2])?];
            let id = TriangleId::new(
                &node_id(fs.vertices[0])?,
                &node_id(fs.vertices[1])?,
                &node_id(fs.vertices[2])?,
            );
            let instances = fs
                .instances
                .iter()
                .map(|inst| {
                    let vertices: [String; 3] = inst.nodes.clone().try_into().map_err(|_| {
                        Error::Serialization("face instance needs 3 nodes".into())
                    })?;
                    Ok(FaceInstance {
                        vertices,
                        source_file: inst.source_file.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            faces.push((id, keys, fs.storage_key.clone(), instances));
        }

        for (id, start, end, storage_key, instances) in edges {
            for instance in instances {
                let key = storage_key.clone();
                arena.add_edge_instance(&id, start, end, instance, || key);
            }
        }
        for (id, keys, storage_key, instances) in faces {
            for instance in instances {
                let key = storage_key.clone();
                arena.add_face_instance(&id, keys, instance, || key);
            }
        }

        Ok(arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Domain;
    use jbeam_lite_core::{jobject, JValue};

    #[test]
    fn store_roundtrip_under_saved_key() {
        let mut store = PropertyStore::new();
        let key = store.store("car", Domain::Edges, None, &jobject! { "beamSpring" => 100 }, 1);
        store.store("car", Domain::Edges, Some(key.as_str()), &jobject! { "beamSpring" => 200.5 }, 2);
        store.store("car", Domain::Verts, None, &jobject! { "group" => JValue::Array(vec![JValue::from("a")]) }, 1);

        let json = store.to_json("car").unwrap();
        let raw: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(raw.get(SAVED_PROPS_KEY).is_some());

        let mut restored = PropertyStore::new();
        restored.restore_json("car", &json).unwrap();
        assert_eq!(restored.owner_props("car"), store.owner_props("car"));
        assert_eq!(restored.instance_count("car", Domain::Edges, &key), 2);
    }

    #[test]
    fn unknown_owner_and_bad_blob() {
        let store = PropertyStore::new();
        assert!(matches!(store.to_json("nobody"), Err(Error::UnknownOwner(_))));
        let mut store = PropertyStore::new();
        assert!(matches!(
            store.restore_json("car", "{\"other\": 1}"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn arena_roundtrip() {
        let mut arena = MeshArena::new();
        let a = arena.add_vertex("a", [0.0, 1.0, 2.0], "ka".into(), "body.jbeam");
        let b = arena.add_dummy_vertex("b", "kb".into(), "body.jbeam");
        let c = arena.add_vertex("c", [3.0, 0.0, 0.0], "kc".into(), "door.jbeam");
        let id = BeamId::new("a", "b");
        for endpoints in [["a", "b"], ["b", "a"]] {
            let instance = EdgeInstance {
                endpoints: endpoints.map(String::from),
                source_file: "body.jbeam".into(),
            };
            arena.add_edge_instance(&id, a, b, instance, || "ke".into());
        }
        let tri = FaceInstance {
            vertices: ["a", "b", "c"].map(String::from),
            source_file: "door.jbeam".into(),
        };
        arena.add_face_instance(&TriangleId::new("a", "b", "c"), [a, b, c], tri, || "kf".into());

        let json = arena.to_json().unwrap();
        let restored = MeshArena::from_json(&json).unwrap();
        assert_eq!(restored.stats(), arena.stats());
        let rb = restored.vertex_by_node("b").unwrap();
        assert!(restored.vertex(rb).unwrap().dummy);
        let edge = restored.edge(restored.edge_by_id(&id).unwrap()).unwrap();
        assert_eq!(edge.instances[1].endpoints, ["b".to_string(), "a".to_string()]);
        assert_eq!(edge.storage_key, "ke");
    }

    #[test]
    fn arena_bad_index() {
        let json = r#"{"vertices": [], "edges": [{"start": 0, "end": 1, "storage_key": "k", "instances": []}], "faces": []}"#;
        assert!(matches!(MeshArena::from_json(json), Err(Error::Serialization(_))));
    }
}
