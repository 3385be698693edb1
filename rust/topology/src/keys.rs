// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh key types for arena-based storage.
//!
//! Each mesh element gets a unique, type-safe key for O(1) lookup in the
//! arena. Keys are created by `slotmap::SlotMap` and remain valid even after
//! other elements are removed (generational indices).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::error::Error;

new_key_type! {
    /// Key for a vertex (one node).
    pub struct VertexKey;

    /// Key for an edge (every beam between the same two nodes).
    pub struct EdgeKey;

    /// Key for a face (every triangle over the same three nodes).
    pub struct FaceKey;
}

/// A key that can reference any mesh element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKey {
    Vertex(VertexKey),
    Edge(EdgeKey),
    Face(FaceKey),
}

impl MeshKey {
    /// Property-store domain the element's props live in.
    pub fn domain(&self) -> Domain {
        match self {
            MeshKey::Vertex(_) => Domain::Verts,
            MeshKey::Edge(_) => Domain::Edges,
            MeshKey::Face(_) => Domain::Faces,
        }
    }
}

impl From<VertexKey> for MeshKey {
    fn from(k: VertexKey) -> Self {
        MeshKey::Vertex(k)
    }
}

impl From<EdgeKey> for MeshKey {
    fn from(k: EdgeKey) -> Self {
        MeshKey::Edge(k)
    }
}

impl From<FaceKey> for MeshKey {
    fn from(k: FaceKey) -> Self {
        MeshKey::Face(k)
    }
}

/// Element family of the property store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Verts = 0,
    Edges = 1,
    Faces = 2,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Verts, Domain::Edges, Domain::Faces];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Verts => "verts",
            Domain::Edges => "edges",
            Domain::Faces => "faces",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verts" => Ok(Domain::Verts),
            "edges" => Ok(Domain::Edges),
            "faces" => Ok(Domain::Faces),
            other => Err(Error::Domain(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_names() {
        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
        assert_eq!(Domain::Edges.to_string(), "edges");
    }

    #[test]
    fn invalid_domain() {
        let err = "loops".parse::<Domain>().unwrap_err();
        assert!(matches!(err, Error::Domain(ref d) if d == "loops"));
    }

    #[test]
    fn mesh_key_domain() {
        let mut map = slotmap::SlotMap::<EdgeKey, ()>::with_key();
        let k = map.insert(());
        assert_eq!(MeshKey::from(k).domain(), Domain::Edges);
    }
}
