//! Path segment and byte payload encoding.
//!
//! - Path segments are percent-encoded so that an idShort containing `/`,
//!   `?` or whitespace survives re-assembly into a store path.
//! - Opaque byte payloads (file uploads) are stored as base64url strings
//!   without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters that must be percent-encoded inside a single path segment.
const SEGMENT_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

/// Percent-encode one path segment.
///
/// # Examples
///
/// ```
/// use aas_vab_core::encoding::encode_segment;
///
/// assert_eq!(encode_segment("integerProperty"), "integerProperty");
/// assert_eq!(encode_segment("a/b"), "a%2Fb");
/// ```
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT_ESCAPE).to_string()
}

/// Decode a percent-encoded path segment.
///
/// # Errors
///
/// Returns error if the decoded bytes are not valid UTF-8.
pub fn decode_segment(encoded: &str) -> Result<String, EncodingError> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| EncodingError::Utf8Decode(e.to_string()))
}

/// Encode an opaque byte payload for storage as a JSON string.
#[must_use]
pub fn encode_bytes(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a byte payload previously stored with [`encode_bytes`].
///
/// # Errors
///
/// Returns error if the input is not valid base64url.
pub fn decode_bytes(encoded: &str) -> Result<Vec<u8>, EncodingError> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| EncodingError::Base64Decode(e.to_string()))
}

/// Errors that can occur during encoding/decoding.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EncodingError {
    /// Base64 decoding failed
    #[error("base64 decode error: {0}")]
    Base64Decode(String),
    /// UTF-8 decoding failed
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(String),
}
