// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `.pc` part-configuration files.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::model::PcConfig;
use crate::reader::parse_lenient;
use crate::value::{JObject, JValue};

const DEFAULT_FORMAT: i64 = 2;
const DEFAULT_MODEL: &str = "undefined";

/// What a `.pc` file resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum PcSource {
    /// A regular configuration listing slot → part assignments.
    Config(PcConfig),
    /// No parts listed; the sibling `<model>.jbeam` is loaded directly.
    Delegate { model: String, jbeam_path: PathBuf },
}

/// Returns the flat configuration object, unwrapping the legacy single-key form.
fn flatten(root: &JValue) -> Option<&JObject> {
    let map = root.as_object()?;
    if map.contains_key("parts") || map.contains_key("model") || map.contains_key("format") {
        return Some(map);
    }
    match map.values().next() {
        Some(JValue::Object(inner)) if map.len() == 1 => Some(inner),
        _ => Some(map),
    }
}

/// Interprets an already-read `.pc` document located in `directory`.
pub fn parse_pc_value(root: &JValue, directory: &Path) -> Result<PcSource> {
    let context = directory.display().to_string();
    let map = flatten(root).ok_or_else(|| {
        Error::schema(&context, format!("pc root is a {}, expected object", root.type_name()))
    })?;

    let format = map
        .get("format")
        .and_then(JValue::as_i64)
        .unwrap_or(DEFAULT_FORMAT);
    let model = map
        .get("model")
        .and_then(JValue::as_str)
        .unwrap_or(DEFAULT_MODEL)
        .to_string();

    let mut parts = IndexMap::new();
    match map.get("parts") {
        Some(JValue::Object(entries)) => {
            for (slot_type, part_name) in entries {
                let part_name = match part_name {
                    JValue::Str(s) => s.clone(),
                    JValue::Null => String::new(),
                    other => {
                        return Err(Error::schema(
                            &context,
                            format!("part for slot `{slot_type}` is a {}", other.type_name()),
                        ))
                    }
                };
                parts.insert(slot_type.clone(), part_name);
            }
        }
        Some(other) if !matches!(other, JValue::Null) => {
            return Err(Error::schema(
                &context,
                format!("`parts` is a {}, expected object", other.type_name()),
            ));
        }
        _ => {}
    }

    if parts.is_empty() {
        let jbeam_path = directory.join(format!("{model}.jbeam"));
        if jbeam_path.is_file() {
            tracing::info!(model = %model, path = %jbeam_path.display(), "pc delegates to jbeam file");
            return Ok(PcSource::Delegate { model, jbeam_path });
        }
        return Err(Error::schema(
            &context,
            format!("pc lists no parts and `{model}.jbeam` does not exist"),
        ));
    }

    Ok(PcSource::Config(PcConfig {
        format,
        model,
        parts,
        directory: directory.to_path_buf(),
    }))
}

/// Reads and interprets a `.pc` file.
pub fn load_pc(path: &Path) -> Result<PcSource> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let root = parse_lenient(&text)?;
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    parse_pc_value(&root, directory)
}
