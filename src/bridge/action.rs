use std::fmt;
use std::ops::Index;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;

/// Every entry of local storage at the moment a bridge mounted.
///
/// Keeps storage enumeration order, and serializes as a JSON object in
/// that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSnapshot {
    entries: Vec<(String, String)>,
}

impl BulkSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, keeping its position if already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in enumeration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BulkSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (key, value) in iter {
            snapshot.insert(key, value);
        }
        snapshot
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for BulkSnapshot {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Index<&str> for BulkSnapshot {
    type Output = str;

    fn index(&self, key: &str) -> &str {
        match self.get(key) {
            Some(value) => value,
            None => panic!("no entry for key {key:?} in snapshot"),
        }
    }
}

impl Serialize for BulkSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BulkSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = BulkSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of string keys to string values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<BulkSnapshot, A::Error> {
                let mut snapshot = BulkSnapshot::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    snapshot.insert(key, value);
                }
                Ok(snapshot)
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}

/// An update sent to the application's dispatcher.
///
/// Serializes with a `kind` tag:
///
/// ```
/// use pantry::Action;
///
/// let action = Action::update("theme", Some("dark"));
/// assert_eq!(
///     action.to_json().unwrap(),
///     r#"{"kind":"local-storage-update","key":"theme","value":"dark"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Action {
    /// The full contents of local storage, sent once per mount.
    #[serde(rename = "local-storage-bulk")]
    LocalStorageBulk { data: BulkSnapshot },
    /// One key changed; `value` is `None` when it was removed.
    #[serde(rename = "local-storage-update")]
    LocalStorageUpdate { key: String, value: Option<String> },
}

impl Action {
    pub fn bulk(data: BulkSnapshot) -> Self {
        Self::LocalStorageBulk { data }
    }

    pub fn update(key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self::LocalStorageUpdate {
            key: key.into(),
            value: value.map(Into::into),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Receives actions produced by a bridge.
///
/// Implemented for any `Fn(Action)` closure.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, action: Action);
}

impl<F> Dispatcher for F
where
    F: Fn(Action) + Send + Sync,
{
    fn dispatch(&self, action: Action) {
        self(action)
    }
}
