// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for mesh and property-store operations.

use crate::keys::{EdgeKey, FaceKey, VertexKey};

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during mesh and property-store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Property-store domain other than `verts`, `edges` or `faces`.
    #[error("invalid property domain `{0}`")]
    Domain(String),

    /// The store holds nothing for this owner.
    #[error("no properties stored for owner `{0}`")]
    UnknownOwner(String),

    /// Vertex key not found in the arena.
    #[error("vertex not found: {0:?}")]
    VertexNotFound(VertexKey),

    /// Edge key not found in the arena.
    #[error("edge not found: {0:?}")]
    EdgeNotFound(EdgeKey),

    /// Face key not found in the arena.
    #[error("face not found: {0:?}")]
    FaceNotFound(FaceKey),

    /// Element exists but has fewer instances than requested.
    #[error("instance {instance} out of range (element has {count})")]
    InstanceOutOfRange { instance: u32, count: u32 },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}
