// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instance-aware property store.
//!
//! Props are addressed by `(owner, domain, storage_key, instance)`. A storage
//! key names one mesh element; each key holds one prop bag per instance, so
//! overlapping beams or triangles over the same nodes keep independent props.
//! Instances are 1-based and always numbered `1..=N` without gaps.
//!
//! The store is an explicit value passed to whoever needs it rather than a
//! global. One store must not be mutated from several threads for the same
//! owner.

use indexmap::IndexMap;
use jbeam_lite_core::PropMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::keys::Domain;

/// Opaque 12-hex-character handle for one element's props.
pub type StorageKey = String;

/// Length of a minted storage key.
pub const STORAGE_KEY_LEN: usize = 12;

/// Per-instance prop bags of one domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainTable {
    entries: IndexMap<StorageKey, Vec<PropMap>>,
}

impl DomainTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn mint(&self) -> StorageKey {
        loop {
            let key: StorageKey = uuid::Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(STORAGE_KEY_LEN)
                .collect();
            if !self.entries.contains_key(&key) {
                return key;
            }
        }
    }
}

/// Everything stored for one owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerProps {
    pub verts: DomainTable,
    pub edges: DomainTable,
    pub faces: DomainTable,
}

impl OwnerProps {
    pub fn table(&self, domain: Domain) -> &DomainTable {
        match domain {
            Domain::Verts => &self.verts,
            Domain::Edges => &self.edges,
            Domain::Faces => &self.faces,
        }
    }

    pub fn table_mut(&mut self, domain: Domain) -> &mut DomainTable {
        match domain {
            Domain::Verts => &mut self.verts,
            Domain::Edges => &mut self.edges,
            Domain::Faces => &mut self.faces,
        }
    }
}

/// Owner-keyed registry of element props.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    pub(crate) owners: FxHashMap<String, OwnerProps>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, owner: &str, domain: Domain) -> Option<&DomainTable> {
        self.owners.get(owner).map(|o| o.table(domain))
    }

    fn table_mut(&mut self, owner: &str, domain: Domain) -> &mut DomainTable {
        self.owners
            .entry(owner.to_string())
            .or_default()
            .table_mut(domain)
    }

    /// Stores a deep copy of `props` at `instance` (treated as 1 when 0).
    ///
    /// A missing or unknown `key` gets a freshly minted one. Setting an
    /// instance past the end fills the gap with empty bags so numbering stays
    /// contiguous. Returns the key the props were stored under.
    pub fn store(
        &mut self,
        owner: &str,
        domain: Domain,
        key: Option<&str>,
        props: &PropMap,
        instance: u32,
    ) -> StorageKey {
        let table = self.table_mut(owner, domain);
        let key = match key {
            Some(k) if table.contains(k) => k.to_string(),
            _ => table.mint(),
        };
        let slot = instance.max(1) as usize;
        let instances = table.entries.entry(key.clone()).or_default();
        if instances.len() < slot {
            instances.resize_with(slot, PropMap::new);
        }
        instances[slot - 1] = props.clone();
        key
    }

    /// Stores `props` as a new last instance of `key`, returning the instance number.
    pub fn push_instance(&mut self, owner: &str, domain: Domain, key: &str, props: &PropMap) -> u32 {
        let instances = self
            .table_mut(owner, domain)
            .entries
            .entry(key.to_string())
            .or_default();
        instances.push(props.clone());
        instances.len() as u32
    }

    /// A copy of the props at `instance`, or an empty map if absent.
    pub fn fetch(&self, owner: &str, domain: Domain, key: &str, instance: u32) -> PropMap {
        self.table(owner, domain)
            .and_then(|t| t.entries.get(key))
            .and_then(|instances| instances.get((instance.max(1) - 1) as usize))
            .cloned()
            .unwrap_or_default()
    }

    /// Every instance's props for `key`, in instance order.
    pub fn fetch_all(&self, owner: &str, domain: Domain, key: &str) -> Vec<PropMap> {
        self.table(owner, domain)
            .and_then(|t| t.entries.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Deletes one instance (renumbering the rest) or, with `None`, the whole key.
    ///
    /// The key disappears once its last instance is gone. Returns whether
    /// anything was removed; unknown keys are logged and left alone.
    pub fn delete(&mut self, owner: &str, domain: Domain, key: &str, instance: Option<u32>) -> bool {
        let Some(table) = self.owners.get_mut(owner).map(|o| o.table_mut(domain)) else {
            tracing::warn!(owner, %domain, key, "delete on unknown owner");
            return false;
        };
        let Some(instances) = table.entries.get_mut(key) else {
            tracing::warn!(owner, %domain, key, "delete of unknown storage key");
            return false;
        };
        match instance {
            Some(n) if n >= 1 && (n as usize) <= instances.len() => {
                instances.remove(n as usize - 1);
                if instances.is_empty() {
                    table.entries.shift_remove(key);
                }
                true
            }
            Some(n) => {
                tracing::warn!(owner, %domain, key, instance = n, "delete of unknown instance");
                false
            }
            None => {
                table.entries.shift_remove(key);
                true
            }
        }
    }

    /// Number of instances stored under `key` (0 if unknown).
    pub fn instance_count(&self, owner: &str, domain: Domain, key: &str) -> u32 {
        self.table(owner, domain)
            .and_then(|t| t.entries.get(key))
            .map_or(0, |instances| instances.len() as u32)
    }

    pub fn contains_key(&self, owner: &str, domain: Domain, key: &str) -> bool {
        self.table(owner, domain).is_some_and(|t| t.contains(key))
    }

    /// Keys stored for one owner and domain, in insertion order.
    pub fn keys(&self, owner: &str, domain: Domain) -> Vec<StorageKey> {
        self.table(owner, domain)
            .map(|t| t.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Copies every instance of `key` under a freshly minted key.
    pub fn duplicate(&mut self, owner: &str, domain: Domain, key: &str) -> StorageKey {
        let table = self.table_mut(owner, domain);
        let copy = table.entries.get(key).cloned().unwrap_or_default();
        let fresh = table.mint();
        table.entries.insert(fresh.clone(), copy);
        fresh
    }

    /// Removes every listed key. Returns how many existed.
    pub fn cleanup<'k>(
        &mut self,
        owner: &str,
        domain: Domain,
        unused_keys: impl IntoIterator<Item = &'k str>,
    ) -> usize {
        let Some(owner_props) = self.owners.get_mut(owner) else {
            return 0;
        };
        let table = owner_props.table_mut(domain);
        let removed = unused_keys
            .into_iter()
            .filter(|k| table.entries.shift_remove(*k).is_some())
            .count();
        if removed > 0 {
            tracing::debug!(owner, %domain, removed, "cleaned up storage keys");
        }
        removed
    }

    /// Drops everything stored for `owner`.
    pub fn release_owner(&mut self, owner: &str) -> bool {
        self.owners.remove(owner).is_some()
    }

    /// Owners with stored props, sorted.
    pub fn owners(&self) -> Vec<&str> {
        let mut owners: Vec<&str> = self.owners.keys().map(String::as_str).collect();
        owners.sort_unstable();
        owners
    }

    pub fn owner_props(&self, owner: &str) -> Option<&OwnerProps> {
        self.owners.get(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbeam_lite_core::jobject;

    #[test]
    fn mints_twelve_hex_keys() {
        let mut store = PropertyStore::new();
        let key = store.store("car", Domain::Edges, None, &jobject! { "beamSpring" => 100 }, 1);
        assert_eq!(key.len(), STORAGE_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));

        let other = store.store("car", Domain::Edges, Some("not-a-key"), &PropMap::new(), 1);
        assert_ne!(other, "not-a-key");
        assert_ne!(other, key);
    }

    #[test]
    fn fetch_is_a_copy() {
        let mut store = PropertyStore::new();
        let mut props = jobject! { "nodeWeight" => 2 };
        let key = store.store("car", Domain::Verts, None, &props, 1);
        props.insert("nodeWeight".into(), 5.into());

        let mut fetched = store.fetch("car", Domain::Verts, &key, 1);
        assert_eq!(fetched, jobject! { "nodeWeight" => 2 });
        fetched.clear();
        assert_eq!(store.fetch("car", Domain::Verts, &key, 1).len(), 1);

        assert!(store.fetch("car", Domain::Verts, "missing", 1).is_empty());
        assert!(store.fetch("nobody", Domain::Verts, &key, 1).is_empty());
    }

    #[test]
    fn instances_pad_and_renumber() {
        let mut store = PropertyStore::new();
        let key = store.store("car", Domain::Edges, None, &jobject! { "i" => 1 }, 1);
        store.store("car", Domain::Edges, Some(key.as_str()), &jobject! { "i" => 3 }, 3);
        assert_eq!(store.instance_count("car", Domain::Edges, &key), 3);
        assert!(store.fetch("car", Domain::Edges, &key, 2).is_empty());

        assert!(store.delete("car", Domain::Edges, &key, Some(1)));
        assert_eq!(store.instance_count("car", Domain::Edges, &key), 2);
        assert_eq!(store.fetch("car", Domain::Edges, &key, 2), jobject! { "i" => 3 });

        store.delete("car", Domain::Edges, &key, Some(1));
        store.delete("car", Domain::Edges, &key, Some(1));
        assert!(!store.contains_key("car", Domain::Edges, &key));
    }

    #[test]
    fn delete_whole_key_and_unknown() {
        let mut store = PropertyStore::new();
        let key = store.store("car", Domain::Faces, None, &PropMap::new(), 1);
        store.push_instance("car", Domain::Faces, &key, &PropMap::new());
        assert!(store.delete("car", Domain::Faces, &key, None));
        assert_eq!(store.instance_count("car", Domain::Faces, &key), 0);
        assert!(!store.delete("car", Domain::Faces, &key, None));
        assert!(!store.delete("car", Domain::Faces, "abc", Some(1)));
    }

    #[test]
    fn duplicate_deep_copies() {
        let mut store = PropertyStore::new();
        let key = store.store("car", Domain::Edges, None, &jobject! { "a" => 1 }, 1);
        store.push_instance("car", Domain::Edges, &key, &jobject! { "a" => 2 });
        let copy = store.duplicate("car", Domain::Edges, &key);
        assert_ne!(copy, key);
        store.store("car", Domain::Edges, Some(key.as_str()), &jobject! { "a" => 9 }, 1);
        assert_eq!(
            store.fetch_all("car", Domain::Edges, &copy),
            vec![jobject! { "a" => 1 }, jobject! { "a" => 2 }]
        );
    }

    #[test]
    fn cleanup_and_release() {
        let mut store = PropertyStore::new();
        let a = store.store("car", Domain::Verts, None, &PropMap::new(), 1);
        let b = store.store("car", Domain::Verts, None, &PropMap::new(), 1);
        store.store("truck", Domain::Verts, None, &PropMap::new(), 1);
        assert_eq!(store.cleanup("car", Domain::Verts, [a.as_str(), "zzz"]), 1);
        assert_eq!(store.keys("car", Domain::Verts), vec![b]);
        assert_eq!(store.owners(), vec!["car", "truck"]);
        assert!(store.release_owner("car"));
        assert_eq!(store.owners(), vec!["truck"]);
    }
}
