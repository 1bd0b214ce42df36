//! Binary record format for stored sessions.
//!
//! ```text
//! ┌──────────┬─────────┬──────────────────────────┐
//! │ "DCNT"   │ version │ postcard(ChatSession)    │
//! │ 4 bytes  │ 1 byte  │ remaining bytes          │
//! └──────────┴─────────┴──────────────────────────┘
//! ```

use crate::error::{CoreError, Result};
use crate::session::ChatSession;

/// Record magic.
pub const MAGIC: &[u8; 4] = b"DCNT";

/// Current record version.
pub const VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1;

/// Encode a session into a stored record.
pub fn encode(session: &ChatSession) -> Result<Vec<u8>> {
    let body = postcard::to_stdvec(session)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a stored record.
pub fn decode(bytes: &[u8]) -> Result<ChatSession> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(CoreError::Format("missing session record header".into()));
    }
    let version = bytes[MAGIC.len()];
    if version != VERSION {
        return Err(CoreError::Format(format!(
            "unsupported session record version {} (expected {})",
            version, VERSION
        )));
    }
    Ok(postcard::from_bytes(&bytes[HEADER_LEN..])?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::scope::Scope;
    use crate::session::SessionId;

    #[test]
    fn session_survives_encoding() {
        let mut session = ChatSession::new(SessionId(3), Scope::data_science());
        session.attach(Document::from_text("a.txt", "PCA reduces dimensions").unwrap());
        let pending = session.begin_turn("What does PCA do?").unwrap();
        session.complete_turn(pending, "It projects data onto principal axes.");

        let bytes = encode(&session).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(decode(&bytes).unwrap(), session);
    }

    #[test]
    fn wrong_magic_rejected() {
        assert!(matches!(decode(b"NOPE\x01abc"), Err(CoreError::Format(_))));
        assert!(matches!(decode(b"DC"), Err(CoreError::Format(_))));
    }

    #[test]
    fn future_version_rejected() {
        let session = ChatSession::new(SessionId(1), Scope::open());
        let mut bytes = encode(&session).unwrap();
        bytes[4] = VERSION + 1;
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported session record version"));
    }

    #[test]
    fn truncated_body_is_encoding_error() {
        let session = ChatSession::new(SessionId(1), Scope::data_science());
        let bytes = encode(&session).unwrap();
        let result = decode(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(CoreError::Encoding(_))));
    }
}
