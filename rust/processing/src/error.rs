// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for composition, compression and writing.

use thiserror::Error;

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading a vehicle or writing JBeam.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading, loading or locating parts failed.
    #[error(transparent)]
    Core(#[from] jbeam_lite_core::Error),

    /// Property store or mesh failure.
    #[error(transparent)]
    Topology(#[from] jbeam_lite_topology::Error),

    /// None of the requested parts could be loaded.
    #[error("no parts could be loaded for `{0}`")]
    NoParts(String),

    /// In-place patching could not find the table to replace.
    #[error("table `{table}` not found in part `{part_name}`")]
    TableNotFound { part_name: String, table: String },
}

impl From<jbeam_lite_core::ParseError> for Error {
    fn from(e: jbeam_lite_core::ParseError) -> Self {
        Error::Core(e.into())
    }
}
