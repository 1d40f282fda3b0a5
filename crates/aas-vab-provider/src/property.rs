//! Property handler: the whole payload and its value facet.

use aas_vab_core::element::{DELEGATE, VALUE, VALUE_TYPE};
use aas_vab_core::{ElementProxy, Path, Payload, VabError, VabResult, ValueType};
use serde_json::Value;

/// Handles verbs addressed to a single property.
#[derive(Debug, Clone)]
pub struct PropertyHandler {
    proxy: ElementProxy,
}

impl PropertyHandler {
    /// Create a handler for the property viewed by `proxy`.
    #[must_use]
    pub fn new(proxy: ElementProxy) -> Self {
        Self { proxy }
    }

    /// Store path the property's value is redirected to, if any.
    ///
    /// The redirect lives next to `value`, never inside it, so writing an
    /// object with a `delegate` key stores plain data. A target at or above
    /// the property itself is refused.
    fn delegate_target(&self, raw: &Value) -> VabResult<Option<Path>> {
        let Some(target) = raw.get(DELEGATE) else {
            return Ok(None);
        };
        let target = target
            .as_str()
            .ok_or_else(|| VabError::malformed("property delegate must be a store path"))
            .and_then(Path::parse)?;
        if self.proxy.base().starts_with(&target) {
            return Err(VabError::malformed(format!(
                "property '{}' cannot delegate to its own ancestor '{target}'",
                self.proxy.base()
            )));
        }
        Ok(Some(target))
    }

    /// Read the payload (empty path) or the value (`value`).
    ///
    /// # Errors
    ///
    /// Any other sub-path is malformed.
    pub fn get(&self, path: &Path) -> VabResult<Value> {
        if path.is_empty() {
            let mut raw = self.proxy.get(&Path::root())?;
            if let Some(target) = self.delegate_target(&raw)? {
                raw[VALUE] = self.proxy.store().get(&target)?;
            }
            return Ok(raw);
        }
        if path.is_value() {
            return self.value();
        }
        Err(VabError::malformed(format!(
            "'{path}' is not a facet of a property"
        )))
    }

    /// Read the value, resolving a delegated value.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn value(&self) -> VabResult<Value> {
        let raw = self.proxy.get(&Path::root())?;
        match self.delegate_target(&raw)? {
            Some(target) => self.proxy.store().get(&target),
            None => Ok(raw.get(VALUE).cloned().unwrap_or(Value::Null)),
        }
    }

    /// Write the value facet.
    ///
    /// The value type is re-derived from the new value unless the value is
    /// delegated or the payload is an opaque byte stream.
    ///
    /// # Errors
    ///
    /// Any path other than `value` is malformed.
    pub fn set(&self, path: &Path, payload: Payload) -> VabResult<()> {
        if !path.is_value() {
            return Err(VabError::malformed(format!(
                "only the value of a property can be written, not '{path}'"
            )));
        }

        let mut raw = self.proxy.get(&Path::root())?;
        if let Some(target) = self.delegate_target(&raw)? {
            tracing::debug!(property = %self.proxy.base(), %target, "Writing delegated value");
            return self.proxy.store().set(&target, payload.into_json());
        }
        if payload.is_stream() {
            return self
                .proxy
                .set(&Path::from_segments([VALUE]), payload.into_json());
        }

        let value = payload.into_json();
        let value_type = ValueType::derive(&value);
        raw[VALUE] = value;
        raw[VALUE_TYPE] = Value::String(value_type.as_str().to_string());
        self.proxy.set(&Path::root(), raw)
    }

    /// Properties have no children to create.
    ///
    /// # Errors
    ///
    /// Always malformed.
    pub fn create(&self, path: &Path, _value: Value) -> VabResult<()> {
        Err(VabError::malformed(format!(
            "cannot create '{path}' inside a property"
        )))
    }

    /// Properties are removed by their parent.
    ///
    /// # Errors
    ///
    /// Always malformed.
    pub fn delete(&self, path: &Path) -> VabResult<()> {
        Err(VabError::malformed(format!(
            "cannot delete '{path}' inside a property"
        )))
    }

    /// Properties are not invokable.
    ///
    /// # Errors
    ///
    /// Always malformed.
    pub fn invoke(&self, path: &Path) -> VabResult<Value> {
        Err(VabError::malformed(format!(
            "cannot invoke '{path}' on a property"
        )))
    }
}
