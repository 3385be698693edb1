// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end vehicle loading: `.pc` → part files → asset groups → meshes,
//! and the way back to JBeam text.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use jbeam_lite_core::{
    find_parts, jbeam_files, load_jbeam_file, load_pc, scan_roots, AssetGroup, DiagnosticKind,
    Diagnostics, LoadItem, ParsedFile, Part, PartId, PcSource,
};
use jbeam_lite_topology::{MeshAssembler, MeshStats, PropertyStore};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::resolve_groups;
use crate::writer::{write_jbeam, WriterOptions};

/// Everything loaded for one part configuration.
#[derive(Debug)]
pub struct Vehicle {
    pub model: String,
    /// Part pool the groups index into.
    pub parts: Vec<Part>,
    pub groups: Vec<AssetGroup>,
    /// One assembler per group, same order as `groups`.
    pub assemblers: Vec<MeshAssembler>,
    pub store: PropertyStore,
    pub diagnostics: Diagnostics,
}

/// Loads the vehicle a `.pc` file describes.
///
/// A configuration with no parts and a sibling `<model>.jbeam` loads that file
/// directly; otherwise the `.pc` directory and the shared `common` directory
/// are scanned for the requested parts. Files that fail to parse are reported
/// in the diagnostics and skipped; the load fails only when no requested part
/// could be parsed at all.
pub fn load_vehicle(pc_path: &Path, config: &Config) -> Result<Vehicle> {
    let mut diagnostics = Diagnostics::new();

    let (model, pool, seeds) = match load_pc(pc_path)? {
        PcSource::Delegate { model, jbeam_path } => {
            tracing::info!(model = %model, file = %jbeam_path.display(), "loading model file directly");
            let parsed = load_jbeam_file(&jbeam_path)?;
            diagnostics.extend(parsed.diagnostics);
            let seeds: Vec<PartId> = parsed.parts.iter().map(Part::id).collect();
            (model, parsed.parts, seeds)
        }
        PcSource::Config(pc) => {
            let requests: Vec<PartId> = pc.requests().collect();
            let roots = scan_roots(&pc.directory, config.common_dir.as_deref());
            let files = jbeam_files(&roots);
            tracing::debug!(model = %pc.model, roots = roots.len(), files = files.len(), "scanning for parts");

            let items = find_parts(&files, &requests, &mut diagnostics)?;
            let pool = load_items(&items, config.parallel_load, &mut diagnostics);
            let seeds: Vec<PartId> = requests.into_iter().filter(|r| !r.part_name.is_empty()).collect();
            (pc.model, pool, seeds)
        }
    };

    assemble(model, pool, &seeds, diagnostics)
}

/// Parses every file holding a located part, once per file, and keeps the
/// located parts.
pub fn load_items(items: &[LoadItem], parallel: bool, diagnostics: &mut Diagnostics) -> Vec<Part> {
    let mut files: Vec<&PathBuf> = Vec::new();
    for item in items {
        if !files.contains(&&item.file_path) {
            files.push(&item.file_path);
        }
    }

    let results: Vec<(&PathBuf, jbeam_lite_core::Result<ParsedFile>)> = if parallel {
        files.par_iter().map(|path| (*path, load_jbeam_file(path))).collect()
    } else {
        files.iter().map(|path| (*path, load_jbeam_file(path))).collect()
    };

    let wanted: FxHashSet<(String, String, String)> = items
        .iter()
        .map(|item| {
            (
                item.file_path.to_string_lossy().into_owned(),
                item.slot_type.clone(),
                item.part_name.clone(),
            )
        })
        .collect();

    let mut pool = Vec::with_capacity(items.len());
    for (path, result) in results {
        match result {
            Ok(parsed) => {
                diagnostics.extend(parsed.diagnostics);
                pool.extend(parsed.parts.into_iter().filter(|part| {
                    let id = part.id();
                    wanted.contains(&(part.source_file.clone(), id.slot_type, id.part_name))
                }));
            }
            Err(e) => diagnostics.push(DiagnosticKind::File, &path.to_string_lossy(), e.to_string()),
        }
    }
    pool
}

/// Groups `pool` under its roots and builds one mesh per group.
///
/// Parts are added deepest first, so a node a child borrows from its parent
/// is upgraded in place once the parent arrives. Nodes still undefined after
/// the whole group is in are reported as reference diagnostics.
pub fn assemble(model: String, pool: Vec<Part>, seeds: &[PartId], mut diagnostics: Diagnostics) -> Result<Vehicle> {
    if pool.is_empty() {
        return Err(Error::NoParts(model));
    }

    let groups = resolve_groups(&pool, seeds);
    let mut store = PropertyStore::new();
    let mut assemblers = Vec::with_capacity(groups.len());
    for group in &groups {
        let Some(root) = group.root() else {
            continue;
        };
        let mut assembler = MeshAssembler::new(format!("{model}/{}", pool[root].id()));
        for entry in group.assembly_order() {
            assembler.add_part(&mut store, &pool[entry.part]);
        }
        for (_, vertex) in assembler.arena().vertices().filter(|(_, v)| v.dummy) {
            diagnostics.push(
                DiagnosticKind::Reference,
                assembler.owner(),
                format!("node `{}` used in {} is defined by no part; kept as a dummy", vertex.node_id, vertex.source_file),
            );
        }
        let rekeyed = assembler.integrity_check(&mut store);
        let stats = assembler.arena().stats();
        tracing::info!(
            owner = assembler.owner(),
            parts = group.len(),
            vertices = stats.vertices,
            edges = stats.edges,
            faces = stats.faces,
            rekeyed,
            "assembled group"
        );
        assemblers.push(assembler);
    }

    Ok(Vehicle {
        model,
        parts: pool,
        groups,
        assemblers,
        store,
        diagnostics,
    })
}

impl Vehicle {
    /// Index of the group holding pool entry `part`.
    fn group_of(&self, part: usize) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| g.entries.iter().any(|e| e.part == part))
    }

    /// Pool index of the part with the given name.
    pub fn part_index(&self, part_name: &str) -> Option<usize> {
        self.parts.iter().position(|p| p.part_name == part_name)
    }

    /// Rebuilds one part from its group's mesh and the property store.
    ///
    /// Only elements the part itself declared come back, so parts sharing a
    /// file or a node stay apart.
    pub fn export_part(&self, part_name: &str) -> Option<Part> {
        let index = self.part_index(part_name)?;
        let template = &self.parts[index];
        let assembler = &self.assemblers[self.group_of(index)?];
        let mut part = assembler.export_part(&self.store, template, Some(template.source_file.as_str()));

        part.nodes.retain(|id, _| template.nodes.contains_key(id));
        let beams: FxHashSet<_> = template.beams.iter().map(|b| &b.id).collect();
        part.beams.retain(|b| beams.contains(&b.id));
        let triangles: FxHashSet<_> = template.triangles.iter().map(|t| &t.id).collect();
        part.triangles.retain(|t| triangles.contains(&t.id));
        Some(part)
    }

    /// Renders every part of a group, root first.
    pub fn write_group(&self, group: usize, options: &WriterOptions) -> Option<String> {
        let parts: Vec<Part> = self
            .groups
            .get(group)?
            .entries
            .iter()
            .filter_map(|e| self.export_part(&self.parts[e.part].part_name))
            .collect();
        Some(write_jbeam(&parts, options))
    }

    /// Renders the parts loaded from one source file, in pool order.
    pub fn write_source_file(&self, source_file: &str, options: &WriterOptions) -> String {
        let parts: Vec<Part> = self
            .parts
            .iter()
            .filter(|p| p.source_file == source_file)
            .filter_map(|p| self.export_part(&p.part_name))
            .collect();
        write_jbeam(&parts, options)
    }

    /// Mesh statistics per group.
    pub fn stats(&self) -> Vec<MeshStats> {
        self.assemblers.iter().map(|a| a.arena().stats()).collect()
    }
}
