// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Storage-key integrity between an arena and the property store.

use rustc_hash::FxHashSet;

use crate::arena::MeshArena;
use crate::keys::Domain;
use crate::store::PropertyStore;

/// Gives every element sharing a storage key with an earlier element its own
/// key, holding a deep copy of the shared props.
///
/// Elements are visited in arena order, so the first holder keeps the
/// original key. Returns the number of elements re-keyed; a second run on
/// the same arena returns 0.
pub fn integrity_check(store: &mut PropertyStore, owner: &str, arena: &mut MeshArena) -> usize {
    let mut reassigned = 0;
    for domain in Domain::ALL {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let elements: Vec<_> = arena
            .domain_keys(domain)
            .into_iter()
            .map(|(element, key)| (element, key.to_string()))
            .collect();

        for (element, key) in elements {
            if seen.insert(key.clone()) {
                continue;
            }
            let fresh = store.duplicate(owner, domain, &key);
            tracing::warn!(owner, %domain, shared = %key, fresh = %fresh, "storage key shared by two elements; re-keyed");
            seen.insert(fresh.clone());
            arena.set_storage_key(element, fresh);
            reassigned += 1;
        }
    }
    reassigned
}

/// Removes store entries no element of `arena` references. Returns how many
/// keys were dropped.
pub fn collect_garbage(store: &mut PropertyStore, owner: &str, arena: &MeshArena) -> usize {
    let mut removed = 0;
    for domain in Domain::ALL {
        let live: FxHashSet<&str> = arena
            .domain_keys(domain)
            .into_iter()
            .map(|(_, key)| key)
            .collect();
        let unused: Vec<String> = store
            .keys(owner, domain)
            .into_iter()
            .filter(|k| !live.contains(k.as_str()))
            .collect();
        removed += store.cleanup(owner, domain, unused.iter().map(String::as_str));
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbeam_lite_core::{jobject, BeamId};

    use crate::arena::EdgeInstance;

    #[test]
    fn shared_keys_are_split_once() {
        let mut store = PropertyStore::new();
        let mut arena = MeshArena::new();
        let shared = store.store("car", Domain::Verts, None, &jobject! { "nodeWeight" => 3 }, 1);
        let a = arena.add_vertex("a", [0.0; 3], shared.clone(), "t.jbeam");
        let b = arena.add_vertex("b", [1.0, 0.0, 0.0], shared.clone(), "t.jbeam");

        assert_eq!(integrity_check(&mut store, "car", &mut arena), 1);
        assert_eq!(arena.storage_key(a.into()), Some(shared.as_str()));
        let b_key = arena.storage_key(b.into()).unwrap().to_string();
        assert_ne!(b_key, shared);
        assert_eq!(
            store.fetch("car", Domain::Verts, &b_key, 1),
            jobject! { "nodeWeight" => 3 }
        );

        // The copy is independent of the original.
        store.store("car", Domain::Verts, Some(shared.as_str()), &jobject! { "nodeWeight" => 7 }, 1);
        assert_eq!(
            store.fetch("car", Domain::Verts, &b_key, 1),
            jobject! { "nodeWeight" => 3 }
        );

        assert_eq!(integrity_check(&mut store, "car", &mut arena), 0);
    }

    #[test]
    fn garbage_collection_keeps_live_keys() {
        let mut store = PropertyStore::new();
        let mut arena = MeshArena::new();
        let ka = store.store("car", Domain::Verts, None, &Default::default(), 1);
        let kb = store.store("car", Domain::Verts, None, &Default::default(), 1);
        let a = arena.add_vertex("a", [0.0; 3], ka.clone(), "t.jbeam");
        let b = arena.add_vertex("b", [0.0; 3], kb.clone(), "t.jbeam");
        let ke = store.store("car", Domain::Edges, None, &Default::default(), 1);
        store.store("car", Domain::Edges, None, &Default::default(), 1);
        let instance = EdgeInstance {
            endpoints: ["a".into(), "b".into()],
            source_file: "t.jbeam".into(),
        };
        arena.add_edge_instance(&BeamId::new("a", "b"), a, b, instance, || ke.clone());

        assert_eq!(collect_garbage(&mut store, "car", &arena), 1);
        assert_eq!(store.keys("car", Domain::Edges), vec![ke]);
        assert_eq!(store.keys("car", Domain::Verts).len(), 2);
    }
}
