//! Submodel-level entry point.
//!
//! # Path grammar
//!
//! ```text
//! submodel                                            -> whole submodel
//! submodel/values                                     -> flattened values
//! submodel/submodelElements                           -> direct children
//! submodel/submodelElements/<idShort>[/...]           -> element access
//! submodel/submodelElements/<idShort>[/...]/value     -> value facet
//! submodel/submodelElements/.../invoke[?async=true]   -> invocation
//! submodel/submodelElements/.../invocationList/<id>   -> async result
//! ```
//!
//! The leading `submodel` qualifier may be omitted only for the empty path.

use crate::collection::CollectionHandler;
use crate::config::ProviderConfig;
use crate::element::ElementProvider;
use crate::registry::InvocationRegistry;
use aas_vab_core::element::SUBMODEL_ELEMENTS;
use aas_vab_core::{
    BackingStore, ElementProxy, InvokeResult, Path, Payload, VabError, VabResult,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Qualifier every submodel path starts with.
pub const SUBMODEL: &str = "submodel";
/// Segment selecting the flattened value view of all elements.
pub const VALUES: &str = "values";

/// Entry point for the five verbs on one submodel.
#[derive(Debug, Clone)]
pub struct SubmodelProvider {
    proxy: ElementProxy,
    registry: Arc<InvocationRegistry>,
}

impl SubmodelProvider {
    /// Serve the submodel stored at the root of `store`.
    pub fn new(store: Arc<dyn BackingStore>, registry: Arc<InvocationRegistry>) -> Self {
        Self {
            proxy: ElementProxy::new(store, Path::root()),
            registry,
        }
    }

    /// Serve `store` with a fresh registry spawning workers on `runtime`.
    ///
    /// Unclaimed invocation results are swept per `config.result_retention`.
    pub fn with_config(store: Arc<dyn BackingStore>, runtime: Handle, config: &ProviderConfig) -> Self {
        Self::new(store, InvocationRegistry::start(runtime, config))
    }

    /// The registry tracking asynchronous invocations.
    #[must_use]
    pub fn registry(&self) -> &Arc<InvocationRegistry> {
        &self.registry
    }

    fn elements(&self) -> CollectionHandler {
        CollectionHandler::with_children_key(
            self.proxy.clone(),
            Path::root(),
            Arc::clone(&self.registry),
            SUBMODEL_ELEMENTS,
        )
    }

    fn route(path: &str) -> VabResult<Path> {
        Path::parse(path)?.strip_prefix(SUBMODEL)
    }

    /// Open the element at an idShort path.
    fn element(&self, path: &Path) -> VabResult<ElementProvider> {
        let Some((first, rest)) = path.split_first() else {
            return Err(VabError::malformed("element path is empty"));
        };
        rest.segments()
            .iter()
            .try_fold(self.elements().child(first)?, |element, name| element.child(name))
    }

    /// Read at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] for paths outside the grammar,
    /// and propagates element errors with the path as context.
    pub fn read(&self, path: &str) -> VabResult<Value> {
        let route = Self::route(path)?;
        tracing::debug!(path = %route, "read");
        let result = match route.split_first() {
            None => self.elements().get(&Path::root()),
            Some((VALUES, rest)) if rest.is_empty() => self.elements().flattened(),
            Some((SUBMODEL_ELEMENTS, rest)) => self.read_elements(&rest),
            Some(_) => Err(VabError::malformed(format!("unknown path '{route}'"))),
        };
        result.map_err(|e| e.with_context(&route))
    }

    fn read_elements(&self, rest: &Path) -> VabResult<Value> {
        if rest.is_empty() {
            return self.elements().elements();
        }
        if let Some((owner, request_id)) = rest.invocation_tail() {
            if owner.is_empty() {
                return Err(VabError::malformed("invocationList requires an operation"));
            }
            let response = self.registry.retrieve(&owner.to_string(), &request_id)?;
            return serde_json::to_value(response).map_err(|e| VabError::provider(e.to_string()));
        }
        if let Some(bare) = rest.strip_value_suffix() {
            return self.element(&bare)?.value();
        }
        self.elements().get(rest)
    }

    /// Write at `path`.
    ///
    /// # Errors
    ///
    /// The submodel itself and the element list cannot be written.
    pub fn write(&self, path: &str, value: impl Into<Payload>) -> VabResult<()> {
        let route = Self::route(path)?;
        tracing::debug!(path = %route, "write");
        let result = match route.split_first() {
            Some((SUBMODEL_ELEMENTS, rest)) if !rest.is_empty() && !rest.is_value() => {
                self.elements().set(&rest, value.into())
            }
            _ => Err(VabError::malformed(format!("cannot write '{route}'"))),
        };
        result.map_err(|e| e.with_context(&route))
    }

    /// Create at `path`.
    ///
    /// `submodelElements` alone creates a child named by the element's
    /// idShort; existing children are overwritten.
    ///
    /// # Errors
    ///
    /// The empty path and paths outside the element list are malformed.
    pub fn create(&self, path: &str, value: Value) -> VabResult<()> {
        let route = Self::route(path)?;
        tracing::debug!(path = %route, "create");
        let result = match route.split_first() {
            Some((SUBMODEL_ELEMENTS, rest)) => self.elements().create(&rest, value),
            _ => Err(VabError::malformed(format!("cannot create '{route}'"))),
        };
        result.map_err(|e| e.with_context(&route))
    }

    /// Delete at `path`.
    ///
    /// # Errors
    ///
    /// At least one element idShort is required.
    pub fn delete(&self, path: &str) -> VabResult<()> {
        let route = Self::route(path)?;
        tracing::debug!(path = %route, "delete");
        let result = match route.split_first() {
            Some((SUBMODEL_ELEMENTS, rest)) if !rest.is_empty() => self.elements().delete(&rest),
            _ => Err(VabError::malformed(format!("cannot delete '{route}'"))),
        };
        result.map_err(|e| e.with_context(&route))
    }

    /// Delete by value is not supported at this layer.
    ///
    /// # Errors
    ///
    /// Always malformed.
    pub fn delete_value(&self, path: &str, _value: &Value) -> VabResult<()> {
        let route = Self::route(path)?;
        Err(VabError::malformed(format!(
            "delete by value is not supported for '{route}'"
        )))
    }

    /// Invoke the operation at `path`.
    ///
    /// # Errors
    ///
    /// Paths outside the element list are malformed; see
    /// [`crate::OperationHandler::invoke`] for argument errors.
    pub fn invoke(&self, path: &str, args: &[Value]) -> VabResult<InvokeResult> {
        let route = Self::route(path)?;
        tracing::debug!(path = %route, is_async = route.is_async(), "invoke");
        let result = match route.split_first() {
            Some((SUBMODEL_ELEMENTS, rest)) if !rest.is_empty() => {
                self.elements().invoke(&rest, args)
            }
            _ => Err(VabError::malformed(format!("cannot invoke '{route}'"))),
        };
        result.map_err(|e| e.with_context(&route))
    }
}
