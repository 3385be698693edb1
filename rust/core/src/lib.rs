// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # JBeam-Lite Core
//!
//! Lenient JBeam reader and typed part model built with [nom](https://docs.rs/nom).
//!
//! ## Overview
//!
//! - **Lenient reading**: comments, dangling commas, bare-dot numbers and
//!   missing commas are repaired before strict parsing
//! - **Typed model**: parts, nodes, beams and triangles with per-element props
//! - **Scope decompression**: scope-modifier rows are folded into each element
//! - **Part discovery**: `.pc` configurations and a fast `.jbeam` scanner
//!   using [memchr](https://docs.rs/memchr)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jbeam_lite_core::parse_jbeam_str;
//!
//! let text = r#"{"body": {"nodes": [
//!     ["id", "posX", "posY", "posZ"],
//!     {"nodeWeight": 2},
//!     ["n1", 0, 0, 0],
//! ]}}"#;
//! let parsed = parse_jbeam_str(text, "body.jbeam")?;
//! assert_eq!(parsed.parts[0].nodes["n1"].props["nodeWeight"], 2.into());
//! ```

pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod pc;
pub mod reader;
pub mod scanner;
pub mod scope;
pub mod value;

pub use error::{Diagnostic, DiagnosticKind, Diagnostics, Error, ParseError, Result};
pub use loader::{load_jbeam_file, parse_jbeam_json, parse_jbeam_str, parse_part, ParsedFile};
pub use model::{
    AssetEntry, AssetGroup, Beam, BeamId, LoadItem, Node, NodeId, Part, PartId, PcConfig, PropMap,
    RefLabel, RefNodes, SlotSpec, Triangle, TriangleId,
};
pub use parser::parse_strict;
pub use pc::{load_pc, parse_pc_value, PcSource};
pub use reader::parse_lenient;
pub use scanner::{find_parts, jbeam_files, scan_part_headers, scan_roots, PartHeader};
pub use scope::{
    decompress, default_modifier, is_header_row, ElementRow, ScopeCursor, TableShape, BEAMS,
    DEFAULT_MODIFIER_KEYS, NODES, QUADS, TRIANGLES,
};
pub use value::{format_float, parse_numeric_str, write_string, JObject, JValue};
