//! Registry of asynchronous operation invocations.
//!
//! Each accepted invocation gets a record keyed by `(owner, requestId)` and
//! runs on its own worker task. Record lifecycle:
//!
//! ```text
//! INITIATED -> RUNNING -> COMPLETED | FAILED
//!     \____________\_____> TIMEOUT
//! ```
//!
//! The first terminal transition wins; later results are discarded. A
//! terminal record is removed by the poll that returns it, so a second poll
//! reports "not found". Terminal records nobody polls are swept once they
//! are older than the configured retention.

use crate::config::ProviderConfig;
use crate::operation::package_result;
use aas_vab_core::{
    Argument, CallbackResponse, ExecutionState, InvocationResponse, VabError, VabResult,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    owner: String,
    request_id: String,
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.owner, self.request_id)
    }
}

#[derive(Debug, Clone)]
struct InvocationRecord {
    state: ExecutionState,
    input_arguments: Vec<Argument>,
    output_arguments: Vec<Argument>,
    message: Option<String>,
    created_at: DateTime<Utc>,
}

impl InvocationRecord {
    fn response(&self, request_id: &str) -> InvocationResponse {
        InvocationResponse {
            request_id: request_id.to_string(),
            input_arguments: self.input_arguments.clone(),
            output_arguments: self.output_arguments.clone(),
            execution_state: self.state,
            message: self.message.clone(),
        }
    }
}

/// How a worker task ended.
#[derive(Debug)]
enum Outcome {
    Completed(Value),
    Failed(String),
    TimedOut(Duration),
}

/// An invocation about to be handed to a worker.
#[derive(Debug, Clone)]
pub struct PendingInvocation {
    /// Path of the owning operation, relative to the submodel elements
    pub owner: String,
    /// Request id to poll under
    pub request_id: String,
    /// Inputs as supplied by the caller
    pub input_arguments: Vec<Argument>,
    /// Deep copy of the operation's output templates
    pub output_arguments: Vec<Argument>,
    /// Per-request wait bound; the registry default applies when absent
    pub timeout: Option<Duration>,
}

/// Tracks outstanding asynchronous invocations.
pub struct InvocationRegistry {
    runtime: Handle,
    default_timeout: Duration,
    records: Mutex<HashMap<RecordKey, InvocationRecord>>,
}

impl InvocationRegistry {
    /// Create a registry that spawns workers on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle, config: &ProviderConfig) -> Self {
        Self {
            runtime,
            default_timeout: config.async_timeout,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry on `runtime` and start sweeping unclaimed results.
    ///
    /// The sweep runs every `config.result_retention` and stops once the
    /// registry is dropped. A zero retention disables it.
    #[must_use]
    pub fn start(runtime: Handle, config: &ProviderConfig) -> Arc<Self> {
        let registry = Arc::new(Self::new(runtime.clone(), config));
        let retention = config.result_retention;
        if retention.is_zero() {
            return registry;
        }

        let age = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let weak: Weak<Self> = Arc::downgrade(&registry);
        runtime.spawn(async move {
            loop {
                tokio::time::sleep(retention).await;
                let Some(registry) = weak.upgrade() else {
                    tracing::debug!("Invocation registry dropped, stopping sweep");
                    return;
                };
                registry.purge_older_than(age);
            }
        });
        registry
    }

    /// Create a registry on the runtime of the calling context.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::ProviderFailure`] when called outside a tokio runtime.
    pub fn current(config: &ProviderConfig) -> VabResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| VabError::provider(format!("no async runtime available: {e}")))?;
        Ok(Self::new(runtime, config))
    }

    /// Wait bound applied when a request carries none.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Number of records not yet consumed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no records are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Register an invocation and run `job` on a worker task.
    ///
    /// Returns as soon as the record is registered.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::ResourceAlreadyExists`] if an unconsumed record
    /// with the same owner and request id exists.
    pub fn submit<F>(self: &Arc<Self>, pending: PendingInvocation, job: F) -> VabResult<CallbackResponse>
    where
        F: FnOnce() -> VabResult<Value> + Send + 'static,
    {
        let key = RecordKey {
            owner: pending.owner,
            request_id: pending.request_id,
        };
        let timeout = pending.timeout.unwrap_or(self.default_timeout);

        match self.records.lock().entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(VabError::already_exists(format!("invocation {key}")));
            }
            Entry::Vacant(slot) => {
                slot.insert(InvocationRecord {
                    state: ExecutionState::Initiated,
                    input_arguments: pending.input_arguments,
                    output_arguments: pending.output_arguments,
                    message: None,
                    created_at: Utc::now(),
                });
            }
        }

        tracing::info!(
            owner = %key.owner,
            request_id = %key.request_id,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "Accepted asynchronous invocation"
        );

        let ack = CallbackResponse {
            request_id: key.request_id.clone(),
            callback_url: None,
        };

        let registry = Arc::clone(self);
        self.runtime.spawn(async move {
            let worker = Arc::clone(&registry);
            let worker_key = key.clone();
            let task = tokio::task::spawn_blocking(move || {
                worker.mark_running(&worker_key);
                job()
            });

            let outcome = match tokio::time::timeout(timeout, task).await {
                Ok(Ok(Ok(value))) => Outcome::Completed(value),
                Ok(Ok(Err(err))) => Outcome::Failed(err.to_string()),
                Ok(Err(join_err)) if join_err.is_panic() => {
                    Outcome::Failed(panic_message(join_err.into_panic().as_ref()))
                }
                Ok(Err(join_err)) => Outcome::Failed(join_err.to_string()),
                Err(_) => Outcome::TimedOut(timeout),
            };
            registry.settle(&key, outcome);
        });

        Ok(ack)
    }

    fn mark_running(&self, key: &RecordKey) {
        if let Some(record) = self.records.lock().get_mut(key) {
            if record.state == ExecutionState::Initiated {
                record.state = ExecutionState::Running;
                tracing::debug!(invocation = %key, "Invocation running");
            }
        }
    }

    /// Apply a terminal outcome unless another one already won.
    fn settle(&self, key: &RecordKey, outcome: Outcome) -> bool {
        let mut records = self.records.lock();
        let Some(record) = records.get_mut(key) else {
            tracing::warn!(invocation = %key, "Discarding result of unknown invocation");
            return false;
        };
        if record.state.is_terminal() {
            tracing::debug!(
                invocation = %key,
                state = %record.state,
                "Discarding late invocation result"
            );
            return false;
        }

        match outcome {
            Outcome::Completed(value) => {
                package_result(&mut record.output_arguments, value);
                record.state = ExecutionState::Completed;
                tracing::debug!(invocation = %key, "Invocation completed");
            }
            Outcome::Failed(message) => {
                tracing::warn!(invocation = %key, error = %message, "Invocation failed");
                record.state = ExecutionState::Failed;
                record.message = Some(message);
            }
            Outcome::TimedOut(timeout) => {
                tracing::warn!(
                    invocation = %key,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Invocation timed out"
                );
                record.state = ExecutionState::Timeout;
                record.message = Some(format!("no result within {timeout:?}"));
            }
        }
        true
    }

    /// Poll an invocation.
    ///
    /// Pending records are reported without being consumed. A terminal
    /// record is removed and returned in the same step.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::ResourceNotFound`] if no record exists for this
    /// owner and request id, including after a terminal poll.
    pub fn retrieve(&self, owner: &str, request_id: &str) -> VabResult<InvocationResponse> {
        let key = RecordKey {
            owner: owner.to_string(),
            request_id: request_id.to_string(),
        };

        match self.records.lock().entry(key) {
            Entry::Vacant(slot) => Err(VabError::not_found(format!(
                "invocation {}",
                slot.key()
            ))),
            Entry::Occupied(slot) if slot.get().state.is_terminal() => {
                let record = slot.remove();
                tracing::debug!(
                    owner,
                    request_id,
                    state = %record.state,
                    "Consumed invocation result"
                );
                Ok(record.response(request_id))
            }
            Entry::Occupied(slot) => Ok(slot.get().response(request_id)),
        }
    }

    /// Drop terminal records created more than `age` ago.
    ///
    /// Returns the number of records removed.
    pub fn purge_older_than(&self, age: chrono::Duration) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(age) else {
            return 0;
        };
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| !(record.state.is_terminal() && record.created_at < cutoff));
        let purged = before - records.len();
        if purged > 0 {
            tracing::info!(purged, "Purged unclaimed invocation results");
        }
        purged
    }
}

impl std::fmt::Debug for InvocationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationRegistry")
            .field("default_timeout", &self.default_timeout)
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("operation panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("operation panicked: {s}")
    } else {
        "operation panicked".to_string()
    }
}
