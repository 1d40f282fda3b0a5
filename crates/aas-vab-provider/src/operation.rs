//! Operation handler: synchronous and asynchronous invocation.
//!
//! Arguments arrive either as one wrapped [`InvocationRequest`] or as direct
//! positional values. Wrapped arguments are matched to the declared inputs
//! by idShort and reordered before dispatch; direct arguments are unwrapped
//! from `{valueType, value}` shapes when needed.

use crate::registry::{panic_message, InvocationRegistry, PendingInvocation};
use aas_vab_core::element::{
    classify, variable_id_short, INPUT_VARIABLES, INVOKABLE, OUTPUT_VARIABLES, VALUE,
};
use aas_vab_core::{
    Argument, BackingStore, ElementKind, ElementProxy, ExecutionState, InvocationRequest,
    InvocationResponse, InvokeResult, Path, ValueType, VabError, VabResult,
};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Handles verbs addressed to an operation.
#[derive(Debug, Clone)]
pub struct OperationHandler {
    proxy: ElementProxy,
    id: Path,
    registry: Arc<InvocationRegistry>,
}

/// Arguments resolved for dispatch.
struct Call {
    request: Option<InvocationRequest>,
    request_id: String,
    values: Vec<Value>,
    inputs: Vec<Argument>,
}

/// Put a raw result into the first output slot.
///
/// Without any declared output a `result` slot is synthesized so the value
/// is not lost.
pub(crate) fn package_result(outputs: &mut Vec<Argument>, value: Value) {
    match outputs.first_mut() {
        Some(first) => {
            if first.value_type.is_none() {
                first.value_type = Some(ValueType::derive(&value));
            }
            first.value = value;
        }
        None => outputs.push(Argument::new("result", value)),
    }
}

/// Strip a `{valueType, value}` or variable wrapper from a direct argument.
fn unwrap_argument(arg: &Value) -> Value {
    if arg.is_object() && classify(arg) == ElementKind::Property {
        return arg.get(VALUE).cloned().unwrap_or(Value::Null);
    }
    match arg.get(VALUE) {
        Some(inner) if inner.is_object() && classify(inner) == ElementKind::Property => {
            inner.get(VALUE).cloned().unwrap_or(Value::Null)
        }
        _ => arg.clone(),
    }
}

/// Order wrapped arguments by the declared input names.
fn order_arguments(declared: &[String], supplied: &[Argument]) -> VabResult<Vec<Value>> {
    if supplied.len() < declared.len() {
        return Err(VabError::malformed(format!(
            "expected {} arguments, got {}",
            declared.len(),
            supplied.len()
        )));
    }
    if supplied.len() != declared.len() {
        return Err(VabError::malformed(format!(
            "expected arguments {declared:?}, got {} arguments",
            supplied.len()
        )));
    }
    declared
        .iter()
        .map(|name| {
            supplied
                .iter()
                .find(|arg| &arg.id_short == name)
                .map(|arg| arg.value.clone())
                .ok_or_else(|| VabError::malformed(format!("missing argument '{name}'")))
        })
        .collect()
}

fn variables(raw: &Value, key: &str) -> Vec<Value> {
    raw.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

impl OperationHandler {
    /// Create a handler for the operation viewed by `proxy`.
    #[must_use]
    pub fn new(proxy: ElementProxy, id: Path, registry: Arc<InvocationRegistry>) -> Self {
        Self {
            proxy,
            id,
            registry,
        }
    }

    /// Owner id under which asynchronous invocations are recorded.
    #[must_use]
    pub fn owner(&self) -> String {
        self.id.to_string()
    }

    /// Read the declaration (empty path) or poll `invocationList/{id}`.
    ///
    /// # Errors
    ///
    /// The value facet and any other sub-path are malformed; unknown or
    /// already consumed invocations are not found.
    pub fn get(&self, path: &Path) -> VabResult<Value> {
        if path.is_empty() {
            let mut raw = self.proxy.get(&Path::root())?;
            if let Some(obj) = raw.as_object_mut() {
                obj.remove(INVOKABLE);
            }
            return Ok(raw);
        }
        if let Some((owner, request_id)) = path.invocation_tail() {
            if owner.is_empty() {
                let response = self.registry.retrieve(&self.owner(), &request_id)?;
                return serde_json::to_value(response).map_err(|e| VabError::provider(e.to_string()));
            }
        }
        if path.is_value() {
            return Err(VabError::malformed("operations have no value"));
        }
        Err(VabError::malformed(format!(
            "'{path}' is not a facet of an operation"
        )))
    }

    /// Operations cannot be written.
    ///
    /// # Errors
    ///
    /// Always malformed.
    pub fn set(&self, path: &Path) -> VabResult<()> {
        Err(VabError::malformed(format!(
            "cannot write '{path}' of an operation"
        )))
    }

    /// Operations have no children.
    ///
    /// # Errors
    ///
    /// Always malformed.
    pub fn create(&self, path: &Path) -> VabResult<()> {
        Err(VabError::malformed(format!(
            "cannot create '{path}' inside an operation"
        )))
    }

    /// Operations are removed by their parent.
    ///
    /// # Errors
    ///
    /// Always malformed.
    pub fn delete(&self, path: &Path) -> VabResult<()> {
        Err(VabError::malformed(format!(
            "cannot delete '{path}' of an operation"
        )))
    }

    /// Invoke the operation, synchronously or with `?async=true`.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] if the path is not the operation
    /// (or its `invoke` endpoint) or the arguments do not match the declared
    /// inputs. Failures of the bound behavior surface directly (sync) or as a
    /// `FAILED` record (async).
    pub fn invoke(&self, path: &Path, args: &[Value]) -> VabResult<InvokeResult> {
        if !path.strip_invoke_suffix().is_empty() {
            return Err(VabError::malformed(format!(
                "'{path}' is not an invocation endpoint"
            )));
        }

        let raw = self.proxy.get(&Path::root())?;
        let call = Self::resolve_arguments(&raw, args)?;
        let target = self.invocation_target(&raw)?;
        let store = Arc::clone(self.proxy.store());

        if path.is_async() {
            return self.invoke_async(&raw, call, store, target);
        }

        tracing::debug!(operation = %self.id, %target, "Invoking operation");
        let values = call.values;
        let result = catch_unwind(AssertUnwindSafe(|| store.invoke(&target, &values)))
            .map_err(|payload| VabError::provider(panic_message(payload.as_ref())))??;

        if call.request.is_none() {
            return Ok(InvokeResult::Raw(result));
        }

        let mut outputs = Self::output_templates(&raw);
        package_result(&mut outputs, result);

        Ok(InvokeResult::Response(InvocationResponse {
            request_id: call.request_id,
            input_arguments: call.inputs,
            output_arguments: outputs,
            execution_state: ExecutionState::Completed,
            message: None,
        }))
    }

    fn invoke_async(
        &self,
        raw: &Value,
        call: Call,
        store: Arc<dyn BackingStore>,
        target: Path,
    ) -> VabResult<InvokeResult> {
        let timeout = call
            .request
            .as_ref()
            .and_then(|r| r.timeout_millis)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let pending = PendingInvocation {
            owner: self.owner(),
            request_id: call.request_id,
            input_arguments: call.inputs,
            output_arguments: Self::output_templates(raw),
            timeout,
        };
        let values = call.values;
        let ack = self
            .registry
            .submit(pending, move || store.invoke(&target, &values))?;
        Ok(InvokeResult::Accepted(ack))
    }

    fn resolve_arguments(raw: &Value, args: &[Value]) -> VabResult<Call> {
        let declared: Vec<String> = variables(raw, INPUT_VARIABLES)
            .iter()
            .filter_map(|v| variable_id_short(v).map(str::to_string))
            .collect();

        if let Some(request) = InvocationRequest::detect(args)? {
            let values = order_arguments(&declared, &request.input_arguments)?;
            let request_id = request
                .request_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            return Ok(Call {
                inputs: request.input_arguments.clone(),
                request: Some(request),
                request_id,
                values,
            });
        }

        if args.len() < declared.len() {
            return Err(VabError::malformed(format!(
                "expected {} arguments, got {}",
                declared.len(),
                args.len()
            )));
        }
        let values: Vec<Value> = args.iter().map(unwrap_argument).collect();
        let inputs = declared
            .iter()
            .zip(&values)
            .map(|(name, value)| Argument::new(name.clone(), value.clone()))
            .collect();
        Ok(Call {
            request: None,
            request_id: Uuid::new_v4().to_string(),
            values,
            inputs,
        })
    }

    /// Deep copy of the declared output templates.
    fn output_templates(raw: &Value) -> Vec<Argument> {
        variables(raw, OUTPUT_VARIABLES)
            .iter()
            .filter_map(Argument::template)
            .collect()
    }

    /// Store path the call is dispatched to.
    ///
    /// A string `invokable` redirects to that store path; any other
    /// `invokable` value selects the facet below the operation.
    fn invocation_target(&self, raw: &Value) -> VabResult<Path> {
        match raw.get(INVOKABLE) {
            Some(Value::String(redirect)) => Path::parse(redirect),
            Some(_) => Ok(self.proxy.base().child(INVOKABLE)),
            None => Ok(self.proxy.base().clone()),
        }
    }
}
