//! Collection handler: named children, structural and flattened views.
//!
//! The same handler serves the submodel root, whose children live under
//! `submodelElements` instead of `value`.

use crate::element::ElementProvider;
use crate::registry::InvocationRegistry;
use aas_vab_core::convert::{check_id_short, children_to_map, externalize, internalize, map_to_children};
use aas_vab_core::element::{classify, id_short, ID_SHORT, VALUE};
use aas_vab_core::{
    ElementKind, ElementProxy, ErrorKind, InvokeResult, Path, Payload, VabError, VabResult,
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Handles verbs addressed to a collection of elements.
#[derive(Debug, Clone)]
pub struct CollectionHandler {
    proxy: ElementProxy,
    id: Path,
    registry: Arc<InvocationRegistry>,
    children_key: &'static str,
}

impl CollectionHandler {
    /// Create a handler for a collection element.
    #[must_use]
    pub fn new(proxy: ElementProxy, id: Path, registry: Arc<InvocationRegistry>) -> Self {
        Self::with_children_key(proxy, id, registry, VALUE)
    }

    /// Create a handler whose children are stored under `children_key`.
    #[must_use]
    pub fn with_children_key(
        proxy: ElementProxy,
        id: Path,
        registry: Arc<InvocationRegistry>,
        children_key: &'static str,
    ) -> Self {
        Self {
            proxy,
            id,
            registry,
            children_key,
        }
    }

    fn children_path(&self) -> Path {
        Path::from_segments([self.children_key])
    }

    fn child_path(&self, name: &str) -> Path {
        Path::from_segments([self.children_key, name])
    }

    /// Open the dispatcher of a direct child.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::ResourceNotFound`] if there is no such child.
    pub fn child(&self, name: &str) -> VabResult<ElementProvider> {
        ElementProvider::open(
            self.proxy.deeper(&self.child_path(name)),
            self.id.child(name),
            Arc::clone(&self.registry),
        )
    }

    /// The internal child map. A collection without children yields an
    /// empty map.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] if the children are not a map.
    pub fn children(&self) -> VabResult<Map<String, Value>> {
        match self.proxy.get(&self.children_path()) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => children_to_map(&other),
            Err(err) if err.kind() == ErrorKind::ResourceNotFound => {
                // Distinguish a missing collection from a missing child map
                self.proxy.get(&Path::root())?;
                Ok(Map::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Direct children in the external representation.
    ///
    /// # Errors
    ///
    /// See [`CollectionHandler::children`].
    pub fn elements(&self) -> VabResult<Value> {
        Ok(Value::Array(map_to_children(&self.children()?)))
    }

    /// Read the structural view (empty path), the flattened value view
    /// (`value`) or a child path.
    ///
    /// # Errors
    ///
    /// Propagates child and store errors.
    pub fn get(&self, path: &Path) -> VabResult<Value> {
        if path.is_empty() {
            return Ok(externalize(&self.proxy.get(&Path::root())?));
        }
        if path.is_value() {
            return self.flattened();
        }
        let Some((name, rest)) = path.split_first() else {
            return Err(VabError::malformed("empty path"));
        };
        self.child(name)?.get(&rest)
    }

    /// The flattened value view: `idShort -> value`, recursing into nested
    /// collections. Operations have no value and are omitted.
    ///
    /// # Errors
    ///
    /// Propagates child and store errors.
    pub fn flattened(&self) -> VabResult<Value> {
        let mut values = Map::new();
        for (name, raw) in self.children()? {
            match classify(&raw) {
                ElementKind::Property | ElementKind::Collection => {
                    values.insert(name.clone(), self.child(&name)?.value()?);
                }
                ElementKind::Plain => {
                    if let Some(value) = raw.get(VALUE) {
                        values.insert(name, value.clone());
                    }
                }
                ElementKind::Operation => {}
            }
        }
        Ok(Value::Object(values))
    }

    /// Replace all children (empty path or `value`) or write below a child.
    ///
    /// # Errors
    ///
    /// Writing a bare child idShort is malformed; use create instead.
    pub fn set(&self, path: &Path, payload: Payload) -> VabResult<()> {
        if path.is_empty() || path.is_value() {
            let Payload::Json(children) = payload else {
                return Err(VabError::malformed("collection children must be elements"));
            };
            let map = children_to_map(&children)?;
            tracing::debug!(collection = %self.id, children = map.len(), "Replacing children");
            return self.proxy.set(&self.children_path(), Value::Object(map));
        }

        let Some((name, rest)) = path.split_first() else {
            return Err(VabError::malformed("empty path"));
        };
        if rest.is_empty() {
            return Err(VabError::malformed(format!(
                "cannot write element '{name}' directly; create it or write its value"
            )));
        }
        self.child(name)?.set(&rest, payload)
    }

    /// Insert or overwrite a child, or create below a child.
    ///
    /// At the empty path the element's own idShort names the child.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] for reserved idShorts or
    /// non-element values.
    pub fn create(&self, path: &Path, element: Value) -> VabResult<()> {
        if path.is_empty() {
            let name = id_short(&element)
                .ok_or_else(|| VabError::malformed("element without idShort"))?
                .to_string();
            return self.upsert(&name, element);
        }
        let Some((name, rest)) = path.split_first() else {
            return Err(VabError::malformed("empty path"));
        };
        if rest.is_empty() {
            return self.upsert(name, element);
        }
        self.child(name)?.create(&rest, element)
    }

    fn upsert(&self, name: &str, element: Value) -> VabResult<()> {
        check_id_short(name)?;
        if !element.is_object() {
            return Err(VabError::malformed(format!("'{name}' is not an element")));
        }
        let mut element = internalize(&element)?;
        element[ID_SHORT] = Value::String(name.to_string());

        let exists = match self.proxy.get(&self.children_path()) {
            Ok(Value::Object(map)) => map.contains_key(name),
            Ok(_) => {
                return Err(VabError::malformed(format!(
                    "children of '{}' are not a map",
                    self.id
                )))
            }
            Err(err) if err.kind() == ErrorKind::ResourceNotFound => {
                self.proxy
                    .set(&self.children_path(), Value::Object(Map::new()))?;
                false
            }
            Err(err) => return Err(err),
        };

        tracing::debug!(collection = %self.id, child = name, overwrite = exists, "Creating element");
        if exists {
            self.proxy.set(&self.child_path(name), element)
        } else {
            self.proxy.create(&self.child_path(name), element)
        }
    }

    /// Remove a direct child, or delete below a child.
    ///
    /// # Errors
    ///
    /// The empty path and `value` are malformed; a missing child is not found.
    pub fn delete(&self, path: &Path) -> VabResult<()> {
        if path.is_empty() || path.is_value() {
            return Err(VabError::malformed(format!(
                "cannot delete '{path}' of a collection"
            )));
        }
        let Some((name, rest)) = path.split_first() else {
            return Err(VabError::malformed("empty path"));
        };
        if rest.is_empty() {
            tracing::debug!(collection = %self.id, child = name, "Deleting element");
            return self.proxy.delete(&self.child_path(name));
        }
        self.child(name)?.delete(&rest)
    }

    /// Forward an invocation to a child.
    ///
    /// # Errors
    ///
    /// Collections themselves are not invokable.
    pub fn invoke(&self, path: &Path, args: &[Value]) -> VabResult<InvokeResult> {
        let Some((name, rest)) = path.split_first().filter(|_| !path.is_value()) else {
            return Err(VabError::malformed("collections are not invokable"));
        };
        self.child(name)?.invoke(&rest, args)
    }
}
