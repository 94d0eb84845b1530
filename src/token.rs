//! Activity token codec.
//!
//! An activity token binds `{source, project, exercice}` into one opaque
//! string carried in activity-export URLs. The payload is JSON encrypted with
//! the process-wide [`Cipher`]; the wire field for the activity id is
//! `exercice`, kept for compatibility with already-exported packages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Cipher;
use crate::types::Result;

/// Decoded activity token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityToken {
    /// Deployment tag the token was minted for
    pub source: String,
    /// Project id
    pub project: String,
    /// Activity id (key into the project's activity map)
    #[serde(rename = "exercice")]
    pub activity: String,
}

impl ActivityToken {
    /// Whether this token authorizes access under the configured source.
    ///
    /// The source check is the system's sole deployment binding: tokens
    /// minted for another source are rejected even when otherwise well
    /// formed.
    pub fn authorizes(&self, allowed_source: &str) -> bool {
        self.source == allowed_source && !self.project.is_empty() && !self.activity.is_empty()
    }
}

/// Failure to turn an opaque string back into an [`ActivityToken`]
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Base64/decryption/UTF-8 failure (wrong key, tampering, garbage input)
    #[error("token does not decrypt")]
    Undecryptable,
    /// Decrypted cleartext is not the expected JSON shape
    #[error("token payload is malformed")]
    Malformed,
}

/// Encode/decode activity tokens with the process-wide cipher
#[derive(Clone)]
pub struct TokenCodec {
    cipher: Cipher,
}

impl TokenCodec {
    pub fn new(cipher: Cipher) -> Self {
        Self { cipher }
    }

    /// Encrypt a payload into an opaque URL-safe token.
    pub fn encode(&self, payload: &ActivityToken) -> Result<String> {
        let json = serde_json::to_string(payload)
            .map_err(|e| crate::types::LogbookError::Internal(format!("Token serialize: {e}")))?;
        self.cipher.encrypt(&json)
    }

    /// Decrypt and parse an opaque token.
    pub fn decode(&self, raw: &str) -> std::result::Result<ActivityToken, DecodeError> {
        let cleartext = self
            .cipher
            .decrypt(raw)
            .map_err(|_| DecodeError::Undecryptable)?;

        serde_json::from_str(&cleartext).map_err(|_| DecodeError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(Cipher::new("test-secret"))
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = codec();
        let payload = ActivityToken {
            source: "brioeducation".to_string(),
            project: "p1".to_string(),
            activity: "champ_texte_3".to_string(),
        };

        let token = codec.encode(&payload).unwrap();
        let decoded = codec.decode(&token).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_wire_field_name_is_exercice() {
        let payload = ActivityToken {
            source: "brioeducation".to_string(),
            project: "p1".to_string(),
            activity: "a1".to_string(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"exercice\""));
        assert!(!json.contains("\"activity\""));
    }

    #[test]
    fn test_authorizes_checks_source_and_ids() {
        let token = ActivityToken {
            source: "brioeducation".to_string(),
            project: "p1".to_string(),
            activity: "a1".to_string(),
        };
        assert!(token.authorizes("brioeducation"));

        // Foreign source rejected even with valid ids
        assert!(!token.authorizes("other-deployment"));

        let empty_project = ActivityToken {
            project: String::new(),
            ..token.clone()
        };
        assert!(!empty_project.authorizes("brioeducation"));

        let empty_activity = ActivityToken {
            activity: String::new(),
            ..token
        };
        assert!(!empty_activity.authorizes("brioeducation"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let codec = codec();
        assert!(matches!(
            codec.decode("definitely-not-a-token"),
            Err(DecodeError::Undecryptable)
        ));
    }

    #[test]
    fn test_decode_wrong_key_fails() {
        let codec = codec();
        let other = TokenCodec::new(Cipher::new("other-secret"));

        let token = codec
            .encode(&ActivityToken {
                source: "brioeducation".to_string(),
                project: "p1".to_string(),
                activity: "a1".to_string(),
            })
            .unwrap();

        assert!(matches!(
            other.decode(&token),
            Err(DecodeError::Undecryptable)
        ));
    }

    #[test]
    fn test_decode_wrong_shape_fails() {
        let cipher = Cipher::new("test-secret");
        let codec = TokenCodec::new(cipher.clone());

        // Valid ciphertext, but not the expected payload shape
        let not_a_token = cipher.encrypt(r#"{"hello": "world"}"#).unwrap();
        assert!(matches!(
            codec.decode(&not_a_token),
            Err(DecodeError::Malformed)
        ));

        let not_json = cipher.encrypt("plain text").unwrap();
        assert!(matches!(codec.decode(&not_json), Err(DecodeError::Malformed)));
    }
}
