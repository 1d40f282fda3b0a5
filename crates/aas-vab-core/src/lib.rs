//! # AAS VAB Core
//!
//! Building blocks for path-addressed access to a tree of AAS submodel
//! elements.
//!
//! This crate provides:
//! - Path model (segment splitting, qualifier stripping, facet suffixes)
//! - Error taxonomy shared by every dispatch layer
//! - Shape-based element classification and value type derivation
//! - Invocation request/response messages
//! - The backing store contract and an in-memory store
//!
//! ## Path encoding
//!
//! Segments are percent-encoded when a path is re-assembled, so idShorts with
//! reserved characters stay addressable.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod convert;
pub mod element;
pub mod encoding;
pub mod error;
pub mod invocation;
pub mod memory;
pub mod path;
pub mod store;

pub use element::{classify, ElementKind, ValueType};
pub use error::{ErrorKind, VabError, VabResult};
pub use invocation::{
    Argument, CallbackResponse, ExecutionState, InvocationRequest, InvocationResponse,
    InvokeResult,
};
pub use memory::{MemoryStore, OperationFn};
pub use path::Path;
pub use store::{BackingStore, ElementProxy, Payload};
