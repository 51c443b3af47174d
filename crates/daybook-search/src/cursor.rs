//! Opaque keyset pagination cursor: base64url(JSON `{rank, id}`), per §4.L.
//! The next-page predicate is `rank < c.rank OR (rank = c.rank AND id >
//! c.id)`, matching the `(rank DESC, id ASC)` ordering search results use.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use daybook_core::error::{DaybookError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub rank: f64,
    pub id: String,
}

impl Cursor {
    #[must_use]
    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).expect("Cursor fields always serialize");
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(raw: &str) -> Result<Cursor> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| DaybookError::InvalidInput { message: "cursor is not valid base64url".to_string() })?;
        serde_json::from_slice(&bytes)
            .map_err(|_| DaybookError::InvalidInput { message: "cursor is not valid JSON".to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cursor = Cursor { rank: 0.125, id: "atom-1".to_string() };
        let encoded = cursor.encode();
        let decoded = Cursor::decode(&encoded).unwrap();
        assert_eq!(cursor, decoded);
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert!(Cursor::decode("not base64!!").is_err());
    }

    #[test]
    fn decode_rejects_valid_base64_with_bad_json() {
        let encoded = URL_SAFE_NO_PAD.encode(b"not json");
        assert!(Cursor::decode(&encoded).is_err());
    }

    #[test]
    fn encoded_cursor_is_url_safe() {
        let cursor = Cursor { rank: 1.0, id: "x".to_string() };
        let encoded = cursor.encode();
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
    }
}
