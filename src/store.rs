//! # Store Module
//!
//! The remote store contract and an in-memory implementation. Paths are
//! slash-separated node names (`requests/-Nabc`); leading and trailing
//! slashes are ignored.

use crate::error::{Result, SyncError};
use crate::pushid::PushIdGenerator;
use serde_json::{Map, Value};
use tracing::debug;

/// Path-addressed JSON store.
pub trait RemoteStore {
    /// Read the node at `path`; a missing node is `Ok(None)`.
    fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Merge the fields of `data` into the node at `path`, leaving siblings untouched.
    fn patch(&mut self, path: &str, data: &Value) -> Result<Option<Value>>;

    /// Append `data` under a freshly generated child id and return that id.
    fn post(&mut self, path: &str, data: &Value) -> Result<String>;

    /// Remove the node at `path`.
    fn delete(&mut self, path: &str) -> Result<()>;

    /// Read an object node as `(child id, child value)` pairs; missing or
    /// non-object nodes read as empty.
    fn get_children(&self, path: &str) -> Result<Vec<(String, Value)>> {
        Ok(match self.get(path)? {
            Some(Value::Object(map)) => map.into_iter().collect(),
            _ => Vec::new(),
        })
    }
}

impl<S: RemoteStore + ?Sized> RemoteStore for &mut S {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        (**self).get(path)
    }

    fn patch(&mut self, path: &str, data: &Value) -> Result<Option<Value>> {
        (**self).patch(path, data)
    }

    fn post(&mut self, path: &str, data: &Value) -> Result<String> {
        (**self).post(path, data)
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        (**self).delete(path)
    }
}

pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// In-memory store holding one JSON tree.
#[derive(Debug)]
pub struct MemoryStore {
    root: Value,
    ids: PushIdGenerator,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_root(Value::Object(Map::new()))
    }

    /// Start from an existing tree, e.g. a JSON export.
    pub fn with_root(root: Value) -> Self {
        Self {
            root,
            ids: PushIdGenerator::new(),
            writes: 0,
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Number of successful patch/post/delete calls.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Number of children under `path`.
    pub fn child_count(&self, path: &str) -> usize {
        match self.node(path) {
            Some(Value::Object(map)) => map.len(),
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    fn node(&self, path: &str) -> Option<&Value> {
        split_path(path)
            .into_iter()
            .try_fold(&self.root, |node, segment| match node {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Walk to `path`, creating (or replacing non-object nodes with) empty objects.
    fn node_mut_or_create(&mut self, path: &str) -> &mut Map<String, Value> {
        let mut node = &mut self.root;
        for segment in split_path(path) {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                unreachable!("node was just made an object")
            };
            node = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        match node {
            Value::Object(map) => map,
            _ => unreachable!("node was just made an object"),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        Ok(self.node(path).filter(|v| !v.is_null()).cloned())
    }

    fn patch(&mut self, path: &str, data: &Value) -> Result<Option<Value>> {
        let Value::Object(fields) = data else {
            return Err(SyncError::transport(
                "PATCH",
                path,
                Some(400),
                "patch body must be a JSON object",
            ));
        };
        let target = self.node_mut_or_create(path);
        for (key, value) in fields {
            if value.is_null() {
                target.remove(key);
            } else {
                target.insert(key.clone(), value.clone());
            }
        }
        self.writes += 1;
        debug!(path, fields = fields.len(), "memory patch");
        Ok(Some(data.clone()))
    }

    fn post(&mut self, path: &str, data: &Value) -> Result<String> {
        let id = self.ids.generate().0;
        let target = self.node_mut_or_create(path);
        target.insert(id.clone(), data.clone());
        self.writes += 1;
        debug!(path, id = %id, "memory post");
        Ok(id)
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        let segments = split_path(path);
        match segments.split_last() {
            None => self.root = Value::Object(Map::new()),
            Some((last, parents)) => {
                let parent = parents
                    .iter()
                    .try_fold(&mut self.root, |node, segment| node.get_mut(*segment));
                if let Some(Value::Object(map)) = parent {
                    map.remove(*last);
                }
            }
        }
        self.writes += 1;
        debug!(path, "memory delete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nothing/here").unwrap(), None);
        assert!(store.get_children("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_patch_merges_without_overwriting_siblings() {
        let mut store = MemoryStore::new();
        store.patch("requests", &json!({"a": {"x": 1}})).unwrap();
        store.patch("requests", &json!({"b": {"y": 2}})).unwrap();
        store.patch("/requests/a/", &json!({"z": 3})).unwrap();

        let node = store.get("requests").unwrap().unwrap();
        assert_eq!(node, json!({"a": {"x": 1, "z": 3}, "b": {"y": 2}}));
        assert_eq!(store.write_count(), 3);
    }

    #[test]
    fn test_post_appends_under_sortable_ids() {
        let mut store = MemoryStore::new();
        let first = store.post("requests", &json!({"n": 1})).unwrap();
        let second = store.post("requests", &json!({"n": 2})).unwrap();
        assert!(first < second);
        assert_eq!(store.child_count("requests"), 2);
        assert_eq!(store.get(&format!("requests/{second}")).unwrap(), Some(json!({"n": 2})));
    }

    #[test]
    fn test_delete_removes_node_only() {
        let mut store = MemoryStore::with_root(json!({"a": {"b": 1}, "c": 2}));
        store.delete("a").unwrap();
        assert_eq!(store.root(), &json!({"c": 2}));
        store.delete("a/missing").unwrap();
    }

    #[test]
    fn test_patch_rejects_non_objects() {
        let mut store = MemoryStore::new();
        let err = store.patch("requests", &json!([1, 2])).unwrap_err();
        assert!(matches!(err, SyncError::Transport { status: Some(400), .. }));
    }
}
