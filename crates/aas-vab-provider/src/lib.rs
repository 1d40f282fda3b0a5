//! # AAS VAB Provider
//!
//! Path-addressed access to a submodel's element tree: read, write, create,
//! delete and invoke, with behavior depending on the kind of node addressed.
//!
//! ## Dispatch chain
//!
//! 1. [`SubmodelProvider`] strips the `submodel` qualifier and routes to the
//!    element list, the value view or a single element
//! 2. [`ElementProvider`] classifies the addressed node on every access
//! 3. [`PropertyHandler`], [`CollectionHandler`] or [`OperationHandler`]
//!    handle the verb; collections recurse into their children
//! 4. Asynchronous invocations are handed to the [`InvocationRegistry`]
//!    and polled under `invocationList/{requestId}`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod config;
pub mod element;
pub mod operation;
pub mod property;
pub mod registry;
pub mod submodel;

pub use collection::CollectionHandler;
pub use config::ProviderConfig;
pub use element::ElementProvider;
pub use operation::OperationHandler;
pub use property::PropertyHandler;
pub use registry::{InvocationRegistry, PendingInvocation};
pub use submodel::SubmodelProvider;
