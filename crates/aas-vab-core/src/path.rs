//! Path model for the element tree.
//!
//! A path is a `/`-separated list of percent-encoded segments with an
//! optional query string. Empty segments are discarded, so `/a//b/` and
//! `a/b` address the same node, and the empty path denotes the node itself.

use crate::encoding::{decode_segment, encode_segment};
use crate::error::{VabError, VabResult};
use std::str::FromStr;

/// Segment selecting the value facet of a node.
pub const VALUE: &str = "value";
/// Segment selecting the invocation endpoint of an operation.
pub const INVOKE: &str = "invoke";
/// Segment preceding the request id of a polled asynchronous invocation.
pub const INVOCATION_LIST: &str = "invocationList";
/// Query parameter requesting asynchronous invocation.
pub const ASYNC_PARAM: &str = "async";

/// A parsed element path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
    query: Option<String>,
}

impl Path {
    /// The empty path (the node itself).
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] if a segment is not valid
    /// percent-encoded UTF-8.
    pub fn parse(path: &str) -> VabResult<Self> {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (path, None),
        };

        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode_segment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments, query })
    }

    /// Parse a path that may be absent.
    ///
    /// An absent path is always malformed, unlike the empty path.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] for `None` or an unparsable path.
    pub fn parse_opt(path: Option<&str>) -> VabResult<Self> {
        path.map_or_else(|| Err(VabError::malformed("path is absent")), Self::parse)
    }

    /// Build a path from already-decoded segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            query: None,
        }
    }

    /// The decoded segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path addresses the node itself.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first segment, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// The last segment, if any.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The query string, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Split off the first segment. The remainder keeps the query.
    #[must_use]
    pub fn split_first(&self) -> Option<(&str, Path)> {
        let (first, rest) = self.segments.split_first()?;
        Some((
            first.as_str(),
            Path {
                segments: rest.to_vec(),
                query: self.query.clone(),
            },
        ))
    }

    /// Append a segment.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self {
            segments,
            query: self.query.clone(),
        }
    }

    /// Concatenate two paths. The query of `other` wins if present.
    #[must_use]
    pub fn join(&self, other: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self {
            segments,
            query: other.query.clone().or_else(|| self.query.clone()),
        }
    }

    /// Remove a required leading literal segment.
    ///
    /// The empty path is accepted as-is.
    ///
    /// # Errors
    ///
    /// Returns [`VabError::MalformedRequest`] if the path is non-empty and
    /// does not start with `literal`.
    pub fn strip_prefix(&self, literal: &str) -> VabResult<Self> {
        match self.split_first() {
            None => Ok(self.clone()),
            Some((first, rest)) if first == literal => Ok(rest),
            Some(_) => Err(VabError::malformed(format!(
                "path '{self}' must start with '{literal}'"
            ))),
        }
    }

    /// Whether `prefix` addresses this node or one of its ancestors.
    /// Queries are ignored; the root is a prefix of every path.
    #[must_use]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Whether the path is exactly the value facet.
    #[must_use]
    pub fn is_value(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == VALUE
    }

    /// Strip a trailing `value` segment from a path addressing a node below
    /// the current one. Returns `None` when there is no such suffix.
    #[must_use]
    pub fn strip_value_suffix(&self) -> Option<Path> {
        if self.segments.len() < 2 || self.last() != Some(VALUE) {
            return None;
        }
        Some(Path {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            query: self.query.clone(),
        })
    }

    /// Split an `invocationList/{requestId}` tail.
    ///
    /// Returns the leading segments and the request id.
    #[must_use]
    pub fn invocation_tail(&self) -> Option<(Path, String)> {
        let n = self.segments.len();
        if n < 2 || self.segments[n - 2] != INVOCATION_LIST {
            return None;
        }
        Some((
            Path::from_segments(self.segments[..n - 2].iter().cloned()),
            self.segments[n - 1].clone(),
        ))
    }

    /// Drop a trailing `invoke` segment, if present.
    #[must_use]
    pub fn strip_invoke_suffix(&self) -> Path {
        if self.last() == Some(INVOKE) {
            Path {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
                query: self.query.clone(),
            }
        } else {
            self.clone()
        }
    }

    /// Whether the query requests asynchronous invocation (`async=true`).
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.query.as_deref().is_some_and(|q| {
            q.split('&').any(|pair| {
                pair.split_once('=')
                    .is_some_and(|(k, v)| k == ASYNC_PARAM && v.eq_ignore_ascii_case("true"))
            })
        })
    }

    /// The path with its query removed.
    #[must_use]
    pub fn without_query(&self) -> Path {
        Path {
            segments: self.segments.clone(),
            query: None,
        }
    }
}

impl std::fmt::Display for Path {
    /// Re-assembles the encoded segments, without the query.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoded: Vec<String> = self.segments.iter().map(|s| encode_segment(s)).collect();
        write!(f, "{}", encoded.join("/"))
    }
}

impl FromStr for Path {
    type Err = VabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
