//! Actor blob decoding
//!
//! Embedding players pass an opaque `actor` blob identifying the learner.
//! Two producers exist in the wild: the encrypt endpoint (cipher output) and
//! players that send plain base64 JSON. Either way the blob is URL-encoded
//! in transit, sometimes twice, so decoding peels percent-encoding before
//! trying the cipher and then base64.
//!
//! Malformed blobs never fail a request; they decode to no hints.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::crypto::Cipher;

/// Placeholder name players send when they don't know the learner
pub const DEFAULT_ACTOR_NAME: &str = "Unknown User";

/// Placeholder mailbox players send when they don't know the learner
pub const DEFAULT_ACTOR_MBOX: &str = "mailto:unknown@mail.com";

#[derive(Debug, Deserialize)]
struct ActorPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mbox: Option<String>,
}

/// Identity hints decoded from the player's actor blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorHints {
    /// The blob exactly as received: the actor-link key and the alternate
    /// history key
    pub raw: String,
    pub name: String,
    pub mbox: String,
}

impl ActorHints {
    /// Decode a raw actor blob. Returns None when the blob is absent,
    /// a placeholder, or undecodable.
    pub fn parse(raw: &str, cipher: &Cipher) -> Option<Self> {
        if raw.is_empty() || raw == "N/A" {
            return None;
        }

        // Peel up to two layers of percent-encoding
        let once = urlencoding::decode(raw).map(|c| c.into_owned()).ok()?;
        let twice = urlencoding::decode(&once)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| once.clone());

        let json = decode_blob(&twice, cipher).or_else(|| decode_blob(&once, cipher))?;

        let payload: ActorPayload = serde_json::from_str(&json).ok()?;
        Some(Self {
            raw: raw.to_string(),
            name: payload.name.unwrap_or_else(|| DEFAULT_ACTOR_NAME.to_string()),
            mbox: payload.mbox.unwrap_or_else(|| DEFAULT_ACTOR_MBOX.to_string()),
        })
    }

    /// Whether the hints carry a usable identity: both values present and
    /// neither the placeholder. Anonymous defaults must never be used for
    /// cross-device lookup or every anonymous learner would collide onto
    /// one subject.
    pub fn has_valid_identity(&self) -> bool {
        !self.name.is_empty()
            && self.name != DEFAULT_ACTOR_NAME
            && !self.mbox.is_empty()
            && self.mbox != DEFAULT_ACTOR_MBOX
    }
}

/// Try the cipher first (encrypt endpoint output), then plain base64
fn decode_blob(blob: &str, cipher: &Cipher) -> Option<String> {
    if let Ok(cleartext) = cipher.decrypt(blob) {
        return Some(cleartext);
    }

    let bytes = STANDARD.decode(blob.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> Cipher {
        Cipher::new("test-secret")
    }

    fn b64(json: &str) -> String {
        STANDARD.encode(json.as_bytes())
    }

    #[test]
    fn test_parse_base64_actor() {
        let raw = b64(r#"{"name": "Alice Tremblay", "mbox": "mailto:alice@school.test"}"#);
        let hints = ActorHints::parse(&raw, &cipher()).unwrap();
        assert_eq!(hints.name, "Alice Tremblay");
        assert_eq!(hints.mbox, "mailto:alice@school.test");
        assert_eq!(hints.raw, raw);
        assert!(hints.has_valid_identity());
    }

    #[test]
    fn test_parse_encrypted_actor() {
        let c = cipher();
        let raw = c
            .encrypt(r#"{"name": "Bob", "mbox": "mailto:bob@school.test"}"#)
            .unwrap();
        let hints = ActorHints::parse(&raw, &c).unwrap();
        assert_eq!(hints.name, "Bob");
        assert!(hints.has_valid_identity());
    }

    #[test]
    fn test_parse_double_url_encoded() {
        let raw = b64(r#"{"name": "Chloé", "mbox": "mailto:chloe@school.test"}"#);
        let encoded = urlencoding::encode(&urlencoding::encode(&raw).into_owned()).into_owned();
        let hints = ActorHints::parse(&encoded, &cipher()).unwrap();
        assert_eq!(hints.name, "Chloé");
    }

    #[test]
    fn test_default_values_are_not_an_identity() {
        let raw = b64(r#"{"name": "Unknown User", "mbox": "mailto:unknown@mail.com"}"#);
        let hints = ActorHints::parse(&raw, &cipher()).unwrap();
        assert!(!hints.has_valid_identity());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let raw = b64(r#"{}"#);
        let hints = ActorHints::parse(&raw, &cipher()).unwrap();
        assert_eq!(hints.name, DEFAULT_ACTOR_NAME);
        assert_eq!(hints.mbox, DEFAULT_ACTOR_MBOX);
        assert!(!hints.has_valid_identity());
    }

    #[test]
    fn test_one_sided_identity_is_not_valid() {
        let raw = b64(r#"{"name": "Alice", "mbox": "mailto:unknown@mail.com"}"#);
        let hints = ActorHints::parse(&raw, &cipher()).unwrap();
        assert!(!hints.has_valid_identity());
    }

    #[test]
    fn test_malformed_degrades_to_none() {
        let c = cipher();
        assert!(ActorHints::parse("", &c).is_none());
        assert!(ActorHints::parse("N/A", &c).is_none());
        assert!(ActorHints::parse("!!not base64!!", &c).is_none());
        assert!(ActorHints::parse(&b64("not json"), &c).is_none());
    }
}
