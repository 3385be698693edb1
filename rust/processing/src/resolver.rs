// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Slot-based composition: grouping a pool of parts under their roots.

use std::collections::VecDeque;

use jbeam_lite_core::{AssetEntry, AssetGroup, Part, PartId};

/// Groups `pool` into trees by repeated breadth-first search over slots.
///
/// Each group starts at a root at depth 0: preferably a seed (a part the
/// configuration asked for) that no other unvisited part can hold in a slot,
/// then any other seed, then any remaining part. A part joins the group at
/// depth `d + 1` when its `slotType` is one of the slots of a member at depth
/// `d`. Every part ends up in exactly one group.
pub fn resolve_groups(pool: &[Part], seeds: &[PartId]) -> Vec<AssetGroup> {
    let ids: Vec<PartId> = pool.iter().map(Part::id).collect();
    let mut visited = vec![false; pool.len()];
    let mut groups = Vec::new();

    while let Some(root) = pick_root(pool, &ids, seeds, &visited) {
        visited[root] = true;
        let mut group = AssetGroup::default();
        let mut queue = VecDeque::from([(root, 0u32)]);

        while let Some((index, depth)) = queue.pop_front() {
            group.entries.push(AssetEntry { part: index, depth });
            for slot in &pool[index].slots {
                for (candidate, part) in pool.iter().enumerate() {
                    if !visited[candidate] && part.slot_type.as_deref() == Some(slot.as_str()) {
                        visited[candidate] = true;
                        queue.push_back((candidate, depth + 1));
                    }
                }
            }
        }

        tracing::debug!(
            root = %ids[root],
            parts = group.len(),
            "resolved asset group"
        );
        groups.push(group);
    }
    groups
}

fn pick_root(pool: &[Part], ids: &[PartId], seeds: &[PartId], visited: &[bool]) -> Option<usize> {
    let unvisited_seeds: Vec<usize> = seeds
        .iter()
        .filter_map(|seed| ids.iter().position(|id| id == seed))
        .filter(|&i| !visited[i])
        .collect();

    let has_parent = |i: usize| {
        let Some(slot_type) = pool[i].slot_type.as_deref() else {
            return false;
        };
        pool.iter()
            .enumerate()
            .any(|(j, p)| j != i && !visited[j] && p.slots.iter().any(|s| s == slot_type))
    };

    unvisited_seeds
        .iter()
        .copied()
        .find(|&i| !has_parent(i))
        .or_else(|| unvisited_seeds.first().copied())
        .or_else(|| visited.iter().position(|v| !v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, slot_type: &str, slots: &[&str]) -> Part {
        let mut p = Part::new(name, format!("{name}.jbeam"));
        p.slot_type = Some(slot_type.to_string());
        p.slots = slots.iter().map(|s| s.to_string()).collect();
        p
    }

    #[test]
    fn bfs_depths_and_assembly_order() {
        let pool = vec![
            part("hinge", "door_hinge", &[]),
            part("door", "door_L", &["door_hinge"]),
            part("body", "main", &["door_L", "engine"]),
            part("engine", "engine", &[]),
        ];
        let seeds: Vec<PartId> = pool.iter().map(Part::id).collect();
        let groups = resolve_groups(&pool, &seeds);
        assert_eq!(groups.len(), 1);

        let group = &groups[0];
        assert_eq!(group.root(), Some(2));
        let depths: Vec<(usize, u32)> = group.entries.iter().map(|e| (e.part, e.depth)).collect();
        assert_eq!(depths, [(2, 0), (1, 1), (3, 1), (0, 2)]);

        let order: Vec<usize> = group.assembly_order().iter().map(|e| e.part).collect();
        assert_eq!(order, [0, 1, 3, 2]);
    }

    #[test]
    fn disconnected_parts_form_own_groups() {
        let pool = vec![
            part("body", "main", &["door"]),
            part("door", "door", &[]),
            part("trailer", "trailer", &[]),
        ];
        let groups = resolve_groups(&pool, &[PartId::new("main", "body")]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].root(), Some(2));
    }

    #[test]
    fn empty_pool() {
        assert!(resolve_groups(&[], &[]).is_empty());
    }
}
