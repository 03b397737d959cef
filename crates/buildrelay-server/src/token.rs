/*
 * Copyright (c) 2025 the buildrelay authors
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Notification token codec.
//!
//! The only state that survives the gap between "job submitted" and "job
//! completed" is an encrypted token embedded in the completion callback URL.
//! Anyone holding a valid token can post status updates for the referenced
//! commit (and trigger an automerge), so tokens use authenticated encryption:
//! AES-256-GCM under a key derived from the server-wide secret with
//! PBKDF2-HMAC-SHA256 (100,000 iterations, 256-bit output).
//!
//! The codec is constructed once at startup from `Settings` and passed by
//! reference wherever tokens are minted or checked; the key is never
//! re-derived per call.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;

const KDF_ITERATIONS: u32 = 100_000;
const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Tampered, truncated, or otherwise undecodable token.
    #[error("invalid notification token")]
    InvalidToken,
    /// The payload could not be serialized (programming error).
    #[error("failed to encode token payload: {0}")]
    Encode(String),
}

/// Encrypts and decrypts notification token payloads.
pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl TokenCodec {
    /// Derives the token key from the server-wide secret and builds the
    /// cipher. The secret doubles as the KDF salt, matching how the key is
    /// provisioned: one configured string, one derived key per process.
    pub fn new(secret_key: &str) -> Self {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(
            secret_key.as_bytes(),
            secret_key.as_bytes(),
            KDF_ITERATIONS,
            &mut key,
        );
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        TokenCodec { cipher }
    }

    /// Serializes and encrypts a payload into a URL-safe token string.
    ///
    /// # Format
    /// base64url(nonce (12 bytes) || ciphertext || GCM tag), unpadded.
    pub fn encode<T: Serialize>(&self, payload: &T) -> Result<String, TokenError> {
        let plaintext = serde_json::to_vec(payload).map_err(|e| TokenError::Encode(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|e| TokenError::Encode(e.to_string()))?;

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(&nonce);
        raw.extend(ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Decrypts and deserializes a token string.
    ///
    /// Fails closed: any corruption, truncation, or tampering (including a
    /// flipped bit anywhere in nonce, ciphertext, or tag) yields
    /// `TokenError::InvalidToken` with no further detail.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| TokenError::InvalidToken)?;
        if raw.len() < NONCE_LEN {
            return Err(TokenError::InvalidToken);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenError::InvalidToken)?;

        serde_json::from_slice(&plaintext).map_err(|_| TokenError::InvalidToken)
    }

    /// Mints a completion callback URL carrying an encrypted payload, e.g.
    /// `{origin}/github/complete_build/{token}`.
    pub fn notify_url<T: Serialize>(
        &self,
        origin: &str,
        route: &str,
        payload: &T,
    ) -> Result<String, TokenError> {
        let token = self.encode(payload)?;
        Ok(format!("{}{}/{}", origin, route, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        full_name: String,
        oauth_token: String,
        username: String,
        sha: String,
        context: String,
    }

    fn payload() -> Payload {
        Payload {
            full_name: "owner/repo".to_string(),
            oauth_token: "gho_abc123".to_string(),
            username: "mirell".to_string(),
            sha: "0badc0de0badc0de0badc0de0badc0de0badc0de".to_string(),
            context: "builds.sr.ht: a.yml".to_string(),
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.encode(&payload()).unwrap();
        let decoded: Payload = codec.decode(&token).unwrap();
        assert_eq!(decoded, payload());
    }

    #[test]
    fn test_roundtrip_arbitrary_mapping() {
        let codec = TokenCodec::new("test-secret");
        let mut map = BTreeMap::new();
        map.insert("pr".to_string(), serde_json::json!(17));
        map.insert("automerge".to_string(), serde_json::json!(true));
        let token = codec.encode(&map).unwrap();
        let decoded: BTreeMap<String, serde_json::Value> = codec.decode(&token).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.encode(&payload()).unwrap();

        // Flip one character in every position; every mutation must fail.
        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            if tampered == token {
                continue;
            }
            let result: Result<Payload, _> = codec.decode(&tampered);
            assert!(result.is_err(), "tampered token accepted at index {}", i);
        }
    }

    #[test]
    fn test_truncated_token_rejected() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.encode(&payload()).unwrap();
        let result: Result<Payload, _> = codec.decode(&token[..8]);
        assert!(result.is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let codec = TokenCodec::new("test-secret");
        let result: Result<Payload, _> = codec.decode("not!!valid!!base64%%");
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let codec = TokenCodec::new("test-secret");
        let other = TokenCodec::new("different-secret");
        let token = codec.encode(&payload()).unwrap();
        let result: Result<Payload, _> = other.decode(&token);
        assert!(result.is_err());
    }

    #[test]
    fn test_tokens_are_url_safe() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.encode(&payload()).unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_notify_url_shape() {
        let codec = TokenCodec::new("test-secret");
        let url = codec
            .notify_url("https://relay.example.org", "/github/complete_build", &payload())
            .unwrap();
        assert!(url.starts_with("https://relay.example.org/github/complete_build/"));
    }
}
