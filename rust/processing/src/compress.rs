// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Redundancy reduction: per-element props → scope rows + element rows.
//!
//! The inverse of [`jbeam_lite_core::decompress`]. Elements are sorted so that
//! equal modifier values form runs, then swept last-to-first. Whenever a
//! modifier changes between two neighbours, the value that holds *below* the
//! change is flushed as a scope row; reversing the sweep yields rows in
//! forward order with one scope row per run boundary.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use jbeam_lite_core::{
    default_modifier, parse_numeric_str, JObject, JValue, Part, PropMap, TableShape, BEAMS, NODES,
    TRIANGLES,
};

/// One element to compress: its positional row prefix and its props.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub positional: Vec<JValue>,
    pub props: PropMap,
}

/// Compressed tables of one part, without header rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartTables {
    pub nodes: Vec<JValue>,
    pub beams: Vec<JValue>,
    pub triangles: Vec<JValue>,
}

impl PartTables {
    /// Tables paired with their row layout, in writing order.
    pub fn tables(&self) -> [(TableShape, &[JValue]); 3] {
        [
            (NODES, self.nodes.as_slice()),
            (BEAMS, self.beams.as_slice()),
            (TRIANGLES, self.triangles.as_slice()),
        ]
    }
}

/// Value a scope row carries for `value`: an empty list becomes `""` and
/// numeric strings become numbers.
pub fn normalize_scope_value(value: &JValue) -> JValue {
    match value {
        JValue::Array(items) if items.is_empty() => JValue::from(""),
        JValue::Str(s) => parse_numeric_str(s).unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// Modifier keys in sort priority: `group` first, then alphabetical.
fn sort_keys(keys: &BTreeSet<String>) -> Vec<&str> {
    let mut ordered: Vec<&str> = Vec::with_capacity(keys.len());
    if keys.contains("group") {
        ordered.push("group");
    }
    ordered.extend(keys.iter().map(String::as_str).filter(|k| *k != "group"));
    ordered
}

fn scope_row(key: &str, value: JValue) -> JValue {
    let mut row = JObject::with_capacity(1);
    row.insert(key.to_string(), value);
    JValue::Object(row)
}

/// Compresses a table into the shortest row sequence that decompresses back
/// to every element's props, with absent keys filled by their defaults.
///
/// Keys without a known default fill with `""`. The output ends with one
/// scope row per defaulted key, resetting the state for whatever follows.
pub fn compress_table(entries: &[TableEntry]) -> Vec<JValue> {
    let keys: BTreeSet<String> = entries
        .iter()
        .flat_map(|e| e.props.keys().cloned())
        .collect();
    let priority = sort_keys(&keys);

    // Effective props, one value per key in `priority` order.
    let effective: Vec<Vec<JValue>> = entries
        .iter()
        .map(|e| {
            priority
                .iter()
                .map(|&k| {
                    let value = e
                        .props
                        .get(k)
                        .cloned()
                        .or_else(|| default_modifier(k))
                        .unwrap_or_else(|| JValue::from(""));
                    normalize_scope_value(&value)
                })
                .collect()
        })
        .collect();

    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| {
        effective[a]
            .iter()
            .zip(&effective[b])
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    // Sweep bottom-up; keys visited in reverse so reversal restores key order.
    let mut rows = Vec::with_capacity(entries.len() * 2);
    let mut current: Vec<Option<JValue>> = vec![None; priority.len()];
    for &index in order.iter().rev() {
        for k in (0..priority.len()).rev() {
            let value = &effective[index][k];
            match &current[k] {
                Some(active) if active == value => {}
                Some(active) => {
                    rows.push(scope_row(priority[k], active.clone()));
                    current[k] = Some(value.clone());
                }
                None => current[k] = Some(value.clone()),
            }
        }
        rows.push(JValue::Array(entries[index].positional.clone()));
    }
    for k in (0..priority.len()).rev() {
        if let Some(active) = current[k].take() {
            rows.push(scope_row(priority[k], active));
        }
    }
    rows.reverse();

    for key in &keys {
        if let Some(default) = default_modifier(key) {
            rows.push(scope_row(key, normalize_scope_value(&default)));
        }
    }
    rows
}

fn node_entries(part: &Part, keep: impl Fn(&str) -> bool) -> Vec<TableEntry> {
    part.nodes
        .values()
        .filter(|n| keep(&n.source_file))
        .map(|n| {
            let [x, y, z] = n.position;
            TableEntry {
                positional: vec![
                    JValue::from(n.id.as_str()),
                    JValue::Float(x),
                    JValue::Float(y),
                    JValue::Float(z),
                ],
                props: n.props.clone(),
            }
        })
        .collect()
}

/// Compresses the node, beam and triangle tables of `part`.
///
/// With `source_filter`, only elements whose `source_file` equals it are
/// emitted. Quad-derived triangles come out as triangles.
pub fn export_part_tables(part: &Part, source_filter: Option<&str>) -> PartTables {
    let keep = move |source: &str| source_filter.map_or(true, |f| f == source);

    let beams: Vec<TableEntry> = part
        .beams
        .iter()
        .filter(|b| keep(&b.source_file))
        .map(|b| TableEntry {
            positional: b.endpoints.iter().map(|id| JValue::from(id.as_str())).collect(),
            props: b.props.clone(),
        })
        .collect();
    let triangles: Vec<TableEntry> = part
        .triangles
        .iter()
        .filter(|t| keep(&t.source_file))
        .map(|t| TableEntry {
            positional: t.vertices.iter().map(|id| JValue::from(id.as_str())).collect(),
            props: t.props.clone(),
        })
        .collect();

    PartTables {
        nodes: compress_table(&node_entries(part, keep)),
        beams: compress_table(&beams),
        triangles: compress_table(&triangles),
    }
}
