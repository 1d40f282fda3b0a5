//! Per-node dispatch.
//!
//! Opening a node reads and classifies its stored shape; the verb is then
//! routed to the matching handler. Nothing is cached between calls, so a node
//! whose content changed out of band is reclassified on the next access.

use crate::collection::CollectionHandler;
use crate::operation::OperationHandler;
use crate::property::PropertyHandler;
use crate::registry::InvocationRegistry;
use aas_vab_core::path::VALUE;
use aas_vab_core::{
    classify, ElementKind, ElementProxy, InvokeResult, Path, Payload, VabError, VabResult,
};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Handler {
    Plain(ElementProxy),
    Property(PropertyHandler),
    Collection(CollectionHandler),
    Operation(OperationHandler),
}

/// Entry point for verbs addressed to one element.
#[derive(Debug, Clone)]
pub struct ElementProvider {
    id: Path,
    kind: ElementKind,
    handler: Handler,
}

impl ElementProvider {
    /// Open the element viewed by `proxy`.
    ///
    /// `id` is the element's idShort path below the submodel elements; it
    /// scopes asynchronous invocations of operations.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::ResourceNotFound`] if nothing is stored there.
    pub fn open(proxy: ElementProxy, id: Path, registry: Arc<InvocationRegistry>) -> VabResult<Self> {
        let raw = proxy.get(&Path::root())?;
        let kind = classify(&raw);
        tracing::debug!(element = %id, %kind, "Dispatching element");

        let handler = match kind {
            ElementKind::Plain => Handler::Plain(proxy),
            ElementKind::Property => Handler::Property(PropertyHandler::new(proxy)),
            ElementKind::Collection => {
                Handler::Collection(CollectionHandler::new(proxy, id.clone(), registry))
            }
            ElementKind::Operation => {
                Handler::Operation(OperationHandler::new(proxy, id.clone(), registry))
            }
        };

        Ok(Self { id, kind, handler })
    }

    /// The kind decided when the element was opened.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// The element's idShort path.
    #[must_use]
    pub fn id(&self) -> &Path {
        &self.id
    }

    /// Open a direct child of a collection element.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] if this element is not a
    /// collection.
    pub fn child(&self, name: &str) -> VabResult<ElementProvider> {
        match &self.handler {
            Handler::Collection(collection) => collection.child(name),
            _ => Err(VabError::malformed(format!(
                "{} '{}' has no child '{name}'",
                self.kind, self.id
            ))),
        }
    }

    /// Read the value facet.
    ///
    /// # Errors
    ///
    /// See [`ElementProvider::get`].
    pub fn value(&self) -> VabResult<Value> {
        self.get(&Path::from_segments([VALUE]))
    }

    /// Read at a path relative to this element.
    ///
    /// # Errors
    ///
    /// Propagates handler and store errors.
    pub fn get(&self, path: &Path) -> VabResult<Value> {
        match &self.handler {
            Handler::Plain(proxy) => proxy.get(path),
            Handler::Property(property) => property.get(path),
            Handler::Collection(collection) => collection.get(path),
            Handler::Operation(operation) => operation.get(path),
        }
    }

    /// Write at a path relative to this element.
    ///
    /// # Errors
    ///
    /// Propagates handler and store errors.
    pub fn set(&self, path: &Path, payload: Payload) -> VabResult<()> {
        match &self.handler {
            Handler::Plain(proxy) => proxy.set(path, payload.into_json()),
            Handler::Property(property) => property.set(path, payload),
            Handler::Collection(collection) => collection.set(path, payload),
            Handler::Operation(operation) => operation.set(path),
        }
    }

    /// Create at a path relative to this element.
    ///
    /// # Errors
    ///
    /// Propagates handler and store errors.
    pub fn create(&self, path: &Path, value: Value) -> VabResult<()> {
        match &self.handler {
            Handler::Plain(proxy) => proxy.create(path, value),
            Handler::Property(property) => property.create(path, value),
            Handler::Collection(collection) => collection.create(path, value),
            Handler::Operation(operation) => operation.create(path),
        }
    }

    /// Delete at a path relative to this element.
    ///
    /// # Errors
    ///
    /// Propagates handler and store errors.
    pub fn delete(&self, path: &Path) -> VabResult<()> {
        match &self.handler {
            Handler::Plain(proxy) => proxy.delete(path),
            Handler::Property(property) => property.delete(path),
            Handler::Collection(collection) => collection.delete(path),
            Handler::Operation(operation) => operation.delete(path),
        }
    }

    /// Invoke at a path relative to this element.
    ///
    /// # Errors
    ///
    /// Propagates handler and store errors.
    pub fn invoke(&self, path: &Path, args: &[Value]) -> VabResult<InvokeResult> {
        match &self.handler {
            Handler::Plain(proxy) => proxy.invoke(path, args).map(InvokeResult::Raw),
            Handler::Property(property) => property.invoke(path).map(InvokeResult::Raw),
            Handler::Collection(collection) => collection.invoke(path, args),
            Handler::Operation(operation) => operation.invoke(path, args),
        }
    }
}
