//! Error taxonomy shared by every dispatch layer.
//!
//! Lower layers raise typed errors; upper layers may add path context with
//! [`VabError::with_context`] but never change an error's kind.

use serde::{Deserialize, Serialize};

/// Result alias used throughout the access protocol.
pub type VabResult<T> = Result<T, VabError>;

/// The kind of a [`VabError`], independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Path or arguments do not fit the addressed node
    MalformedRequest,
    /// Addressed node or polled record does not exist
    ResourceNotFound,
    /// Create targeted a path that already holds a value
    ResourceAlreadyExists,
    /// Any other backing-store or operation failure
    ProviderFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedRequest => write!(f, "malformed request"),
            ErrorKind::ResourceNotFound => write!(f, "resource not found"),
            ErrorKind::ResourceAlreadyExists => write!(f, "resource already exists"),
            ErrorKind::ProviderFailure => write!(f, "provider failure"),
        }
    }
}

/// Errors raised by path handling, handlers, dispatchers and backing stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VabError {
    /// Path does not match the grammar of the target, or arguments do not
    /// match an operation's signature
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    /// The addressed resource does not exist
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// The resource already exists and the target does not overwrite
    #[error("resource already exists: {0}")]
    ResourceAlreadyExists(String),
    /// Backing store or invoked behavior failed
    #[error("provider failure: {0}")]
    ProviderFailure(String),
}

impl VabError {
    /// Shorthand for [`VabError::MalformedRequest`].
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }

    /// Shorthand for [`VabError::ResourceNotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::ResourceNotFound(message.into())
    }

    /// Shorthand for [`VabError::ResourceAlreadyExists`].
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::ResourceAlreadyExists(message.into())
    }

    /// Shorthand for [`VabError::ProviderFailure`].
    pub fn provider(message: impl Into<String>) -> Self {
        Self::ProviderFailure(message.into())
    }

    /// The kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            VabError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            VabError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            VabError::ResourceAlreadyExists(_) => ErrorKind::ResourceAlreadyExists,
            VabError::ProviderFailure(_) => ErrorKind::ProviderFailure,
        }
    }

    /// The message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            VabError::MalformedRequest(m)
            | VabError::ResourceNotFound(m)
            | VabError::ResourceAlreadyExists(m)
            | VabError::ProviderFailure(m) => m,
        }
    }

    /// Prefix the message with the path at which the error surfaced.
    ///
    /// The kind is preserved.
    #[must_use]
    pub fn with_context(self, path: impl std::fmt::Display) -> Self {
        let wrap = |m: String| format!("{path}: {m}");
        match self {
            VabError::MalformedRequest(m) => VabError::MalformedRequest(wrap(m)),
            VabError::ResourceNotFound(m) => VabError::ResourceNotFound(wrap(m)),
            VabError::ResourceAlreadyExists(m) => VabError::ResourceAlreadyExists(wrap(m)),
            VabError::ProviderFailure(m) => VabError::ProviderFailure(wrap(m)),
        }
    }
}

impl From<crate::encoding::EncodingError> for VabError {
    fn from(err: crate::encoding::EncodingError) -> Self {
        VabError::MalformedRequest(err.to_string())
    }
}

impl From<serde_json::Error> for VabError {
    fn from(err: serde_json::Error) -> Self {
        VabError::MalformedRequest(err.to_string())
    }
}
