//! Operation invocation messages.

use crate::element::{variable_id_short, variable_value_type, ValueType, ID_SHORT, VALUE, VALUE_TYPE};
use crate::error::{VabError, VabResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key whose presence marks a single argument as a wrapped request.
const INPUT_ARGUMENTS: &str = "inputArguments";

/// A named, typed operation argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    /// Name of the declared variable
    pub id_short: String,
    /// Argument value (`null` in templates)
    #[serde(default)]
    pub value: Value,
    /// Declared value type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
}

impl Argument {
    /// Create an argument, deriving its value type.
    #[must_use]
    pub fn new(id_short: impl Into<String>, value: Value) -> Self {
        let value_type = Some(ValueType::derive(&value));
        Self {
            id_short: id_short.into(),
            value,
            value_type,
        }
    }

    /// Build an empty template from an operation variable declaration.
    #[must_use]
    pub fn template(variable: &Value) -> Option<Self> {
        Some(Self {
            id_short: variable_id_short(variable)?.to_string(),
            value: Value::Null,
            value_type: variable_value_type(variable),
        })
    }

    /// Parse an argument given either flat or as a wrapped variable.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] if no idShort can be found.
    pub fn from_value(raw: &Value) -> VabResult<Self> {
        let inner = match raw.get(VALUE) {
            Some(wrapped) if wrapped.get(ID_SHORT).is_some() => wrapped,
            _ => raw,
        };
        let id_short = inner
            .get(ID_SHORT)
            .and_then(Value::as_str)
            .ok_or_else(|| VabError::malformed("argument without idShort"))?;
        let value_type = inner
            .get(VALUE_TYPE)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());
        Ok(Self {
            id_short: id_short.to_string(),
            value: inner.get(VALUE).cloned().unwrap_or(Value::Null),
            value_type,
        })
    }
}

/// A wrapped invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    /// Caller supplied id; generated when absent
    #[serde(default)]
    pub request_id: Option<String>,
    /// Input arguments, matched to declared inputs by idShort
    #[serde(default)]
    pub input_arguments: Vec<Argument>,
    /// Output slots to fill with the result
    #[serde(default)]
    pub output_arguments_template: Vec<Argument>,
    /// Wait bound for asynchronous execution
    #[serde(default)]
    pub timeout_millis: Option<u64>,
}

impl InvocationRequest {
    /// Recognize a single wrapped request among invocation arguments.
    ///
    /// Returns `Ok(None)` for direct positional arguments.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] if the request is recognized
    /// but its arguments cannot be parsed.
    pub fn detect(args: &[Value]) -> VabResult<Option<Self>> {
        let [single] = args else {
            return Ok(None);
        };
        if single.get(INPUT_ARGUMENTS).is_none() {
            return Ok(None);
        }
        Self::from_value(single).map(Some)
    }

    /// Parse a wrapped request.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] on an invalid request shape.
    pub fn from_value(raw: &Value) -> VabResult<Self> {
        let parse_list = |key: &str| -> VabResult<Vec<Argument>> {
            match raw.get(key) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Array(items)) => items.iter().map(Argument::from_value).collect(),
                Some(_) => Err(VabError::malformed(format!("'{key}' must be a list"))),
            }
        };

        Ok(Self {
            request_id: raw
                .get("requestId")
                .and_then(Value::as_str)
                .map(str::to_string),
            input_arguments: parse_list(INPUT_ARGUMENTS)?,
            output_arguments_template: parse_list("outputArgumentsTemplate")?,
            timeout_millis: raw.get("timeoutMillis").and_then(Value::as_u64),
        })
    }
}

/// Execution state of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    /// Accepted, not yet started
    Initiated,
    /// Executing
    Running,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
    /// Wait bound elapsed before completion
    Timeout,
}

impl ExecutionState {
    /// Whether the state is final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Completed | ExecutionState::Failed | ExecutionState::Timeout
        )
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionState::Initiated => write!(f, "INITIATED"),
            ExecutionState::Running => write!(f, "RUNNING"),
            ExecutionState::Completed => write!(f, "COMPLETED"),
            ExecutionState::Failed => write!(f, "FAILED"),
            ExecutionState::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Result of a wrapped or asynchronous invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    /// Id of the originating request
    pub request_id: String,
    /// Inputs as supplied
    pub input_arguments: Vec<Argument>,
    /// Output slots, filled on completion
    pub output_arguments: Vec<Argument>,
    /// Current or final state
    pub execution_state: ExecutionState,
    /// Captured error for failed invocations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Acknowledgement of an accepted asynchronous invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    /// Id to poll under `invocationList/{requestId}`
    pub request_id: String,
    /// Never populated; results are polled on the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Outcome of an `invoke` verb.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeResult {
    /// Raw result of a direct synchronous call
    Raw(Value),
    /// Full response of a wrapped synchronous call
    Response(InvocationResponse),
    /// Acknowledgement of an asynchronous call
    Accepted(CallbackResponse),
}

impl InvokeResult {
    /// Render the outcome as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::ProviderFailure`] if serialization fails.
    pub fn into_value(self) -> VabResult<Value> {
        let rendered = match self {
            InvokeResult::Raw(value) => return Ok(value),
            InvokeResult::Response(response) => serde_json::to_value(response),
            InvokeResult::Accepted(ack) => serde_json::to_value(ack),
        };
        rendered.map_err(|e| VabError::provider(e.to_string()))
    }
}
