// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JBeam-Lite Processing
//!
//! Vehicle composition and the write path: resolving parts into asset groups,
//! compressing per-element props back into scope rows, and rendering JBeam
//! text, either whole or by patching one table in place.

pub mod compress;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod writer;

pub use compress::{compress_table, export_part_tables, normalize_scope_value, PartTables, TableEntry};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{assemble, load_items, load_vehicle, Vehicle};
pub use resolver::resolve_groups;
pub use writer::{format_coord, patch_table, to_jbeam_string, write_jbeam, write_part, write_part_tables, WriterOptions};
