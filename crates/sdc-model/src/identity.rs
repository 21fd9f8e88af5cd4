use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::btree_map::Iter;
use std::collections::BTreeMap;

pub const COMPONENT_NAME_KEY: &str = "component-name";
pub const COMPONENT_VERSION_KEY: &str = "component-version";
pub const RESOURCE_NAME_KEY: &str = "resource-name";
pub const RESOURCE_VERSION_KEY: &str = "resource-version";

/// The addressing key set for a materialized snapshot.
///
/// Backed by a `BTreeMap` so the key order, and therefore the digest,
/// is independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(BTreeMap<String, String>);

impl Identity {
    /// Identity with the four fixed keys filled in.
    pub fn new(
        component_name: impl Into<String>,
        component_version: impl Into<String>,
        resource_name: impl Into<String>,
        resource_version: impl Into<String>,
    ) -> Self {
        let mut map = BTreeMap::new();
        map.insert(COMPONENT_NAME_KEY.to_string(), component_name.into());
        map.insert(COMPONENT_VERSION_KEY.to_string(), component_version.into());
        map.insert(RESOURCE_NAME_KEY.to_string(), resource_name.into());
        map.insert(RESOURCE_VERSION_KEY.to_string(), resource_version.into());
        Self(map)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable hex digest over the canonical `key=value` line encoding.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in &self.0 {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

impl<'a> IntoIterator for &'a Identity {
    type Item = (&'a String, &'a String);
    type IntoIter = Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
