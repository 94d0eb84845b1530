//! Symmetric cipher for opaque strings.
//!
//! One primitive covers activity tokens, subject cookies, and stored answer
//! content: ChaCha20-Poly1305 under a key derived from the configured
//! passphrase. Ciphertexts are URL-safe base64 of `nonce || ciphertext`, so
//! they can travel in query strings and cookie values unescaped.
//!
//! There is no key versioning. Rotating `SECRET_KEY` invalidates every
//! outstanding token and cookie; decryption of old material simply fails.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::types::{LogbookError, Result};

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Reversible string cipher keyed by the process-wide secret
#[derive(Clone)]
pub struct Cipher {
    key: Key,
}

impl Cipher {
    /// Derive the 256-bit cipher key from the configured passphrase.
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        Self {
            key: *Key::from_slice(&digest),
        }
    }

    /// Encrypt a UTF-8 string to an opaque URL-safe token.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = ChaCha20Poly1305::new(&self.key);

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| LogbookError::Crypto(format!("Encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(out))
    }

    /// Decrypt an opaque token back to its UTF-8 cleartext.
    ///
    /// Fails on malformed base64, truncated input, auth-tag mismatch (wrong
    /// key or tampering), or non-UTF-8 plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|e| LogbookError::Crypto(format!("Invalid token encoding: {e}")))?;

        if raw.len() <= NONCE_LEN {
            return Err(LogbookError::Crypto("Ciphertext too short".into()));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(&self.key);

        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| LogbookError::Crypto("Decryption failed".into()))?;

        String::from_utf8(plaintext)
            .map_err(|_| LogbookError::Crypto("Decrypted content is not UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = Cipher::new("test-secret");
        let plaintext = "<p>bonjour le monde</p>";

        let encoded = cipher.encrypt(plaintext).unwrap();
        assert_ne!(encoded, plaintext);

        let decoded = cipher.decrypt(&encoded).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn test_ciphertexts_are_unique() {
        let cipher = Cipher::new("test-secret");

        // Random nonce: same plaintext encrypts differently each time
        let a = cipher.encrypt("same input").unwrap();
        let b = cipher.encrypt("same input").unwrap();
        assert_ne!(a, b);

        assert_eq!(cipher.decrypt(&a).unwrap(), cipher.decrypt(&b).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher = Cipher::new("correct-secret");
        let other = Cipher::new("wrong-secret");

        let encoded = cipher.encrypt("payload").unwrap();
        assert!(other.decrypt(&encoded).is_err());
    }

    #[test]
    fn test_garbage_input_fails() {
        let cipher = Cipher::new("test-secret");

        assert!(cipher.decrypt("not base64 at all!!!").is_err());
        assert!(cipher.decrypt("c2hvcnQ").is_err()); // valid base64, too short
        assert!(cipher.decrypt("").is_err());
    }

    #[test]
    fn test_output_is_url_and_cookie_safe() {
        let cipher = Cipher::new("test-secret");
        let encoded = cipher.encrypt("some fairly long content with spaces").unwrap();

        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains(';'));
    }
}
