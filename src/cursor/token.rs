//! Cursor Token Encoding
//!
//! The continuation token exchanged with external callers is
//! base64url(JSON(array of values in binding insertion order)). Decoding
//! reverses exactly this; length validation against the binding count happens
//! in [`crate::cursor::PageCursor`].

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde_json::Value;

use crate::error::CursorError;

/// Encode an ordered value list into an opaque token.
pub fn encode_values(values: &[Value]) -> String {
    // Serializing a Vec<Value> to JSON cannot fail.
    let json = serde_json::to_vec(values).unwrap_or_default();
    URL_SAFE.encode(json)
}

/// Decode an opaque token back into its ordered value list.
pub fn decode_values(token: &str) -> Result<Vec<Value>, CursorError> {
    let invalid = || CursorError::InvalidToken {
        token: token.to_string(),
    };
    let bytes = URL_SAFE.decode(token.as_bytes()).map_err(|_| invalid())?;
    serde_json::from_slice(&bytes).map_err(|_| invalid())
}
