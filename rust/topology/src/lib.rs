// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # JBeam-Lite Topology
//!
//! Mesh data structure and instance-aware property store for assembled
//! JBeam vehicles.
//!
//! Vertices, edges and faces live in slot maps inside a [`MeshArena`]. Their
//! props live in a [`PropertyStore`] keyed by `(owner, domain, storage_key,
//! instance)`, so two beams over the same nodes share an edge yet keep
//! independent props. [`MeshAssembler`] fills an arena from parsed parts and
//! exports it back.

pub mod arena;
pub mod assembler;
pub mod error;
pub mod integrity;
pub mod keys;
pub mod serialization;
pub mod store;

pub use arena::{EdgeData, EdgeInstance, FaceData, FaceInstance, MeshArena, MeshStats, VertexData};
pub use assembler::MeshAssembler;
pub use error::{Error, Result};
pub use integrity::{collect_garbage, integrity_check};
pub use keys::{Domain, EdgeKey, FaceKey, MeshKey, VertexKey};
pub use serialization::{ArenaSnapshot, SAVED_PROPS_KEY};
pub use store::{DomainTable, OwnerProps, PropertyStore, StorageKey, STORAGE_KEY_LEN};
