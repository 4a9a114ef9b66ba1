/// Opaque pagination cursors
///
/// Both listings share one cursor shape: base64 of `sort_key|id`. The report
/// listing resolves it natively in SQL with a tuple predicate; the merged
/// flagged queue resolves it against its bounded in-memory sorted set.

use crate::error::{ModError, ModResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// Decoded cursor: the sort key value and ID of the last item the client saw
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub sort_key: String,
    pub id: String,
}

impl Cursor {
    pub fn new(sort_key: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            sort_key: sort_key.into(),
            id: id.into(),
        }
    }

    /// Encode to the opaque token handed to clients
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}|{}", self.sort_key, self.id))
    }

    /// Decode a client-supplied token
    pub fn decode(token: &str) -> ModResult<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| ModError::Validation("Invalid cursor".to_string()))?;
        let decoded = String::from_utf8(raw)
            .map_err(|_| ModError::Validation("Invalid cursor".to_string()))?;

        let (sort_key, id) = decoded
            .rsplit_once('|')
            .ok_or_else(|| ModError::Validation("Invalid cursor".to_string()))?;

        if id.is_empty() {
            return Err(ModError::Validation("Invalid cursor".to_string()));
        }

        Ok(Cursor::new(sort_key, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let cursor = Cursor::new("2026-01-05T10:00:00Z", "c42");
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_sort_key_may_contain_separator() {
        // rsplit keeps the ID intact even if the sort key holds a pipe
        let cursor = Cursor::new("a|b", "c1");
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded.sort_key, "a|b");
        assert_eq!(decoded.id, "c1");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Cursor::decode("not base64 !!!").is_err());
        assert!(Cursor::decode(&URL_SAFE_NO_PAD.encode("no-separator")).is_err());
    }
}
