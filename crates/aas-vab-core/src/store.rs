//! Backing store contract and the per-node view handed down the dispatch chain.

use crate::encoding::encode_bytes;
use crate::error::VabResult;
use crate::path::Path;
use serde_json::Value;
use std::sync::Arc;

/// Key-path store that the access protocol delegates raw verbs to.
///
/// Implementations must distinguish at least "not found", "already exists"
/// and "malformed" in their errors.
pub trait BackingStore: Send + Sync {
    /// Read whatever is stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VabError::ResourceNotFound`] if nothing is stored there.
    fn get(&self, path: &Path) -> VabResult<Value>;

    /// Store `value` at `path`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns error if the parent of `path` does not exist.
    fn set(&self, path: &Path, value: Value) -> VabResult<()>;

    /// Store `value` at a new `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VabError::ResourceAlreadyExists`] if `path` is taken.
    fn create(&self, path: &Path, value: Value) -> VabResult<()>;

    /// Remove the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VabError::ResourceNotFound`] if nothing is stored there.
    fn delete(&self, path: &Path) -> VabResult<()>;

    /// Remove `value` from the list stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if `path` does not hold a list containing `value`.
    fn delete_value(&self, path: &Path, value: &Value) -> VabResult<()>;

    /// Invoke the behavior bound at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if nothing invokable is bound at `path`, or the
    /// behavior itself fails.
    fn invoke(&self, path: &Path, args: &[Value]) -> VabResult<Value>;
}

/// A value written through the `write` verb.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured JSON value
    Json(Value),
    /// Opaque byte stream (e.g. a file upload)
    Stream(Vec<u8>),
}

impl Payload {
    /// Whether this is an opaque byte stream.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        matches!(self, Payload::Stream(_))
    }

    /// The JSON form stored in a backing store.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Payload::Json(value) => value,
            Payload::Stream(bytes) => Value::String(encode_bytes(&bytes)),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Stream(bytes)
    }
}

/// A view onto one node of a backing store.
///
/// Every verb takes a path relative to the node. Query strings are never
/// forwarded to the store.
#[derive(Clone)]
pub struct ElementProxy {
    store: Arc<dyn BackingStore>,
    base: Path,
}

impl ElementProxy {
    /// Create a view rooted at `base`.
    pub fn new(store: Arc<dyn BackingStore>, base: Path) -> Self {
        Self { store, base }
    }

    /// The store path of the viewed node.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    /// A view onto a node below this one.
    #[must_use]
    pub fn deeper(&self, relative: &Path) -> Self {
        Self {
            store: Arc::clone(&self.store),
            base: self.resolve(relative),
        }
    }

    fn resolve(&self, relative: &Path) -> Path {
        self.base.join(relative).without_query()
    }

    /// Read at a relative path.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn get(&self, relative: &Path) -> VabResult<Value> {
        self.store.get(&self.resolve(relative))
    }

    /// Replace at a relative path.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn set(&self, relative: &Path, value: Value) -> VabResult<()> {
        self.store.set(&self.resolve(relative), value)
    }

    /// Create at a relative path.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn create(&self, relative: &Path, value: Value) -> VabResult<()> {
        self.store.create(&self.resolve(relative), value)
    }

    /// Delete at a relative path.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn delete(&self, relative: &Path) -> VabResult<()> {
        self.store.delete(&self.resolve(relative))
    }

    /// Delete a list entry at a relative path.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn delete_value(&self, relative: &Path, value: &Value) -> VabResult<()> {
        self.store.delete_value(&self.resolve(relative), value)
    }

    /// Invoke at a relative path.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn invoke(&self, relative: &Path, args: &[Value]) -> VabResult<Value> {
        self.store.invoke(&self.resolve(relative), args)
    }
}

impl std::fmt::Debug for ElementProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementProxy")
            .field("base", &self.base.to_string())
            .finish_non_exhaustive()
    }
}
