// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Locating requested parts among `.jbeam` files without fully parsing them.
//!
//! Files are first filtered with a substring search for any requested part
//! name, then tokenised just enough to see top-level part names and their
//! `slotType`.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use walkdir::WalkDir;

use crate::error::{DiagnosticKind, Diagnostics, Error, Result};
use crate::model::{LoadItem, PartId};
use crate::reader::strip_comments;

/// Top-level part declaration found by [`scan_part_headers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeader {
    pub part_name: String,
    pub slot_type: Option<String>,
}

/// Directories to scan for a `.pc` in `pc_dir`: the directory itself and the
/// shared `common` directory (by default the sibling `common/`).
pub fn scan_roots(pc_dir: &Path, common_override: Option<&Path>) -> Vec<PathBuf> {
    let mut roots = vec![pc_dir.to_path_buf()];
    let common = match common_override {
        Some(dir) => Some(dir.to_path_buf()),
        None => pc_dir.parent().map(|p| p.join("common")),
    };
    if let Some(common) = common {
        if common.is_dir() && common != pc_dir {
            roots.push(common);
        }
    }
    roots
}

/// Every `*.jbeam` file below `roots`, in a stable order.
pub fn jbeam_files(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in roots {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("jbeam"))
            {
                files.push(path.to_path_buf());
            }
        }
    }
    files
}

/// Lists top-level parts of a JBeam document with their `slotType`.
///
/// `text` must already be free of comments. Braces and brackets are counted
/// outside strings; a part is a key at depth 1 opening an object, and its
/// slot type a `"slotType": "..."` member at depth 2.
pub fn scan_part_headers(text: &str) -> Vec<PartHeader> {
    let bytes = text.as_bytes();
    let mut headers: Vec<PartHeader> = Vec::new();
    let mut depth = 0usize;
    let mut last_string: Option<&str> = None;
    let mut pending_key: Option<&str> = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] != b'"' {
                    j += if bytes[j] == b'\\' { 2 } else { 1 };
                }
                let end = j.min(bytes.len());
                let s = &text[start..end];
                if depth == 2 && pending_key == Some("slotType") {
                    if let Some(part) = headers.last_mut() {
                        if part.slot_type.is_none() {
                            part.slot_type = Some(s.to_string());
                        }
                    }
                    pending_key = None;
                } else {
                    last_string = Some(s);
                }
                i = end + 1;
                continue;
            }
            b':' => pending_key = last_string.take(),
            open @ (b'{' | b'[') => {
                if depth == 1 && open == b'{' {
                    if let Some(name) = pending_key {
                        headers.push(PartHeader {
                            part_name: name.to_string(),
                            slot_type: None,
                        });
                    }
                }
                depth += 1;
                pending_key = None;
                last_string = None;
            }
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                pending_key = None;
                last_string = None;
            }
            b',' => {
                pending_key = None;
                last_string = None;
            }
            _ => {}
        }
        i += 1;
    }
    headers
}

/// Finds the file declaring each requested `(slot_type, part_name)`.
///
/// Requests with an empty part name are reported as [`DiagnosticKind::EmptySlot`]
/// and skipped. When a part is declared in several files the first one wins.
/// Files that cannot be read as UTF-8 text are reported as
/// [`DiagnosticKind::File`] and skipped. Any other request left unmatched fails with [`Error::NotFound`].
pub fn find_parts(
    files: &[PathBuf],
    requests: &[PartId],
    diags: &mut Diagnostics,
) -> Result<Vec<LoadItem>> {
    let mut wanted: IndexMap<PartId, Option<LoadItem>> = IndexMap::new();
    for request in requests {
        if request.part_name.is_empty() {
            diags.push(
                DiagnosticKind::EmptySlot,
                &request.slot_type,
                "slot left empty in part configuration",
            );
            continue;
        }
        wanted.insert(request.clone(), None);
    }
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    for path in files {
        if wanted.values().all(Option::is_some) {
            break;
        }
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                diags.push(
                    DiagnosticKind::File,
                    &path.to_string_lossy(),
                    format!("skipped while scanning for parts: {e}"),
                );
                continue;
            }
        };
        let mentions_any = wanted.iter().any(|(id, found)| {
            found.is_none() && memchr::memmem::find(text.as_bytes(), id.part_name.as_bytes()).is_some()
        });
        if !mentions_any {
            continue;
        }

        let cleaned = strip_comments(&text);
        for header in scan_part_headers(&cleaned) {
            let Some(slot_type) = header.slot_type else {
                continue;
            };
            let id = PartId::new(slot_type, header.part_name);
            match wanted.get_mut(&id) {
                Some(Some(first)) => tracing::warn!(
                    part = %id,
                    kept = %first.file_path.display(),
                    ignored = %path.display(),
                    "part declared in several files"
                ),
                Some(slot) => {
                    tracing::debug!(part = %id, file = %path.display(), "located part");
                    *slot = Some(LoadItem {
                        file_path: path.clone(),
                        part_name: id.part_name.clone(),
                        slot_type: id.slot_type.clone(),
                    });
                }
                None => {}
            }
        }
    }

    let mut items = Vec::with_capacity(wanted.len());
    for (id, found) in wanted {
        match found {
            Some(item) => items.push(item),
            None => {
                return Err(Error::NotFound {
                    part_name: id.part_name,
                    slot_type: id.slot_type,
                })
            }
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn headers_from_nested_document() {
        let text = r#"{
            "body_a": {
                "information": {"name": "Body", "slotType": "not_this"},
                "slotType": "main",
                "nodes": [["id", "posX", "posY", "posZ"], ["n1", 0, 0, 0]]
            },
            "door": {"slotType": "door_L", "slots": [["type"], ["hinge"]]}
        }"#;
        let headers = scan_part_headers(text);
        assert_eq!(
            headers,
            vec![
                PartHeader {
                    part_name: "body_a".into(),
                    slot_type: Some("main".into())
                },
                PartHeader {
                    part_name: "door".into(),
                    slot_type: Some("door_L".into())
                },
            ]
        );
    }

    #[test]
    fn strings_with_braces_do_not_confuse_depth() {
        let text = r#"{"p": {"note": "a { b [", "slotType": "x"}, "q": {"slotType": "y"}}"#;
        let headers = scan_part_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].slot_type.as_deref(), Some("y"));
    }

    #[test]
    fn find_parts_across_files() {
        let dir = tempdir().unwrap();
        let vehicle = dir.path().join("pickup");
        let common = dir.path().join("common");
        std::fs::create_dir_all(&vehicle).unwrap();
        std::fs::create_dir_all(common.join("wheels")).unwrap();
        std::fs::write(
            vehicle.join("body.jbeam"),
            "{\n\"body\": {\n// main part\n\"slotType\": \"main\",\n\"nodes\": []\n}\n}",
        )
        .unwrap();
        std::fs::write(
            common.join("wheels").join("wheel.jbeam"),
            r#"{"wheel_a": {"slotType": "wheel"}}"#,
        )
        .unwrap();
        std::fs::write(vehicle.join("notes.txt"), "body wheel_a").unwrap();

        let roots = scan_roots(&vehicle, None);
        assert_eq!(roots.len(), 2);
        let files = jbeam_files(&roots);
        assert_eq!(files.len(), 2);

        let requests = [
            PartId::new("main", "body"),
            PartId::new("wheel", "wheel_a"),
            PartId::new("door", ""),
        ];
        let mut diags = Diagnostics::new();
        let items = find_parts(&files, &requests, &mut diags).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].part_name, "body");
        assert!(items[1].file_path.ends_with("wheel.jbeam"));
        assert_eq!(diags.count(DiagnosticKind::EmptySlot), 1);
    }

    #[test]
    fn slot_type_must_match() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.jbeam"), r#"{"body": {"slotType": "main"}}"#).unwrap();
        let files = jbeam_files(&[dir.path().to_path_buf()]);
        let err = find_parts(&files, &[PartId::new("other", "body")], &mut Diagnostics::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref part_name, .. } if part_name == "body"));
    }

    #[test]
    fn first_declaration_wins() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.jbeam"), r#"{"body": {"slotType": "main"}}"#).unwrap();
        std::fs::write(dir.path().join("b.jbeam"), r#"{"body": {"slotType": "main"}}"#).unwrap();
        let files = jbeam_files(&[dir.path().to_path_buf()]);
        let items = find_parts(&files, &[PartId::new("main", "body")], &mut Diagnostics::new())
            .unwrap();
        assert!(items[0].file_path.ends_with("a.jbeam"));
    }

    #[test]
    fn unreadable_sibling_is_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a_latin1.jbeam"), b"{\"seat\": {\"name\": \"Si\xe8ge\"}}").unwrap();
        std::fs::write(dir.path().join("b.jbeam"), r#"{"body": {"slotType": "main"}}"#).unwrap();
        let files = jbeam_files(&[dir.path().to_path_buf()]);
        assert_eq!(files.len(), 2);

        let mut diags = Diagnostics::new();
        let items = find_parts(&files, &[PartId::new("main", "body")], &mut diags).unwrap();
        assert!(items[0].file_path.ends_with("b.jbeam"));
        assert_eq!(diags.count(DiagnosticKind::File), 1);

        let err = find_parts(&files, &[PartId::new("main", "seat")], &mut Diagnostics::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref part_name, .. } if part_name == "seat"));
    }
}
