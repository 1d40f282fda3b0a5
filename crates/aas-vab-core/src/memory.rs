//! In-memory backing store.
//!
//! Holds a single JSON tree. Invokable behavior cannot live inside JSON, so
//! functions are bound to store paths separately and dropped together with
//! the subtree they belong to.

use crate::convert::internalize;
use crate::error::{VabError, VabResult};
use crate::path::Path;
use crate::store::BackingStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Behavior bound to a store path.
pub type OperationFn = Arc<dyn Fn(&[Value]) -> VabResult<Value> + Send + Sync>;

/// JSON tree store with path-bound functions.
pub struct MemoryStore {
    root: RwLock<Value>,
    functions: RwLock<HashMap<String, OperationFn>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Value::Object(serde_json::Map::new()))
    }
}

impl MemoryStore {
    /// Create a store holding `root` as-is.
    #[must_use]
    pub fn new(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
            functions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store holding a submodel given in the external representation.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] if the submodel cannot be
    /// converted (missing, duplicate or reserved idShorts).
    pub fn with_submodel(submodel: &Value) -> VabResult<Self> {
        Ok(Self::new(internalize(submodel)?))
    }

    /// Bind a function to a store path.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] if `path` cannot be parsed.
    pub fn bind_function<F>(&self, path: &str, function: F) -> VabResult<()>
    where
        F: Fn(&[Value]) -> VabResult<Value> + Send + Sync + 'static,
    {
        let key = Path::parse(path)?.to_string();
        tracing::debug!(path = %key, "Binding function");
        self.functions.write().insert(key, Arc::new(function));
        Ok(())
    }

    /// Whether a function is bound at `path`.
    #[must_use]
    pub fn has_function(&self, path: &str) -> bool {
        Path::parse(path).is_ok_and(|p| self.functions.read().contains_key(&p.to_string()))
    }

    /// Snapshot of the whole tree.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.root.read().clone()
    }

    fn unbind_subtree(&self, path: &Path) {
        let key = path.to_string();
        let prefix = format!("{key}/");
        self.functions
            .write()
            .retain(|bound, _| !(key.is_empty() || *bound == key || bound.starts_with(&prefix)));
    }
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(list) => segment.parse::<usize>().ok().and_then(|i| list.get_mut(i)),
        _ => None,
    }
}

fn lookup<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |node, s| step(node, s))
}

fn lookup_mut<'a>(root: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    segments.iter().try_fold(root, |node, s| step_mut(node, s))
}

/// Resolve the parent object of `path`, returning it with the final key.
fn parent_mut<'a>(
    root: &'a mut Value,
    path: &Path,
) -> VabResult<(&'a mut serde_json::Map<String, Value>, String)> {
    let Some((key, parent)) = path.segments().split_last() else {
        return Err(VabError::malformed("operation requires a non-empty path"));
    };
    match lookup_mut(root, parent) {
        Some(Value::Object(map)) => Ok((map, key.clone())),
        Some(_) => Err(VabError::malformed(format!(
            "parent of '{path}' is not a container"
        ))),
        None => Err(VabError::not_found(format!("parent of '{path}'"))),
    }
}

impl BackingStore for MemoryStore {
    fn get(&self, path: &Path) -> VabResult<Value> {
        let root = self.root.read();
        lookup(&root, path.segments())
            .cloned()
            .ok_or_else(|| VabError::not_found(path.to_string()))
    }

    fn set(&self, path: &Path, value: Value) -> VabResult<()> {
        {
            let mut root = self.root.write();
            if path.is_empty() {
                *root = value;
            } else {
                let (parent, key) = parent_mut(&mut root, path)?;
                parent.insert(key, value);
            }
        }
        self.unbind_subtree(path);
        tracing::trace!(%path, "Stored value");
        Ok(())
    }

    fn create(&self, path: &Path, value: Value) -> VabResult<()> {
        let mut root = self.root.write();
        if let Some(Value::Array(list)) = lookup_mut(&mut root, path.segments()) {
            list.push(value);
            return Ok(());
        }
        let (parent, key) = parent_mut(&mut root, path)?;
        if parent.contains_key(&key) {
            return Err(VabError::already_exists(path.to_string()));
        }
        parent.insert(key, value);
        tracing::trace!(%path, "Created value");
        Ok(())
    }

    fn delete(&self, path: &Path) -> VabResult<()> {
        {
            let mut root = self.root.write();
            let (parent, key) = parent_mut(&mut root, path)?;
            if parent.shift_remove(&key).is_none() {
                return Err(VabError::not_found(path.to_string()));
            }
        }
        self.unbind_subtree(path);
        tracing::trace!(%path, "Deleted value");
        Ok(())
    }

    fn delete_value(&self, path: &Path, value: &Value) -> VabResult<()> {
        let mut root = self.root.write();
        match lookup_mut(&mut root, path.segments()) {
            Some(Value::Array(list)) => {
                let index = list
                    .iter()
                    .position(|entry| entry == value)
                    .ok_or_else(|| VabError::not_found(format!("value in '{path}'")))?;
                list.remove(index);
                Ok(())
            }
            Some(_) => Err(VabError::malformed(format!("'{path}' is not a list"))),
            None => Err(VabError::not_found(path.to_string())),
        }
    }

    fn invoke(&self, path: &Path, args: &[Value]) -> VabResult<Value> {
        let function = self.functions.read().get(&path.to_string()).cloned();
        match function {
            Some(function) => function(args),
            None if lookup(&self.root.read(), path.segments()).is_some() => Err(
                VabError::malformed(format!("'{path}' is not invokable")),
            ),
            None => Err(VabError::not_found(path.to_string())),
        }
    }
}
