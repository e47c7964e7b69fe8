// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential encryption at rest.
//!
//! Encrypted values carry the `enc:` prefix followed by
//! base64(nonce || ciphertext) under AES-256-GCM. Values without the prefix
//! are legacy plaintext: `reveal` passes them through so existing
//! configurations keep working, and the daemon re-encrypts them once a key
//! is configured.

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

/// Marker distinguishing ciphertext from legacy plaintext.
pub const ENC_PREFIX: &str = "enc:";

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("no encryption key configured")]
    NoKey,
    #[error("secret key must be 32 bytes base64, got {0} bytes")]
    BadKeyLength(usize),
    #[error("invalid base64 in key or secret: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext too short")]
    TooShort,
    #[error("decryption failed (wrong key or tampered value)")]
    Decrypt,
    #[error("decrypted value is not valid UTF-8")]
    Utf8,
}

/// Encrypts and reveals credentials with an optional configured key.
///
/// Without a key, encrypted values cannot be revealed and `encrypt` is
/// unavailable, but plaintext values still pass through.
#[derive(Clone, Default)]
pub struct SecretBox {
    key: Option<Key<Aes256Gcm>>,
}

impl SecretBox {
    /// Build from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, SecretError> {
        let bytes = BASE64.decode(encoded.trim())?;
        if bytes.len() != 32 {
            return Err(SecretError::BadKeyLength(bytes.len()));
        }
        Ok(Self {
            key: Some(*Key::<Aes256Gcm>::from_slice(&bytes)),
        })
    }

    /// A box with no key: plaintext passthrough only.
    pub fn unkeyed() -> Self {
        Self::default()
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(ENC_PREFIX)
    }

    /// Encrypt a plaintext credential into the tagged format.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, SecretError> {
        let key = self.key.as_ref().ok_or(SecretError::NoKey)?;
        let cipher = Aes256Gcm::new(key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SecretError::Decrypt)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(format!("{ENC_PREFIX}{}", BASE64.encode(payload)))
    }

    /// Reveal a stored credential: decrypt tagged values, pass legacy
    /// plaintext through unchanged.
    pub fn reveal(&self, stored: &str) -> Result<String, SecretError> {
        let Some(encoded) = stored.strip_prefix(ENC_PREFIX) else {
            return Ok(stored.to_string());
        };

        let key = self.key.as_ref().ok_or(SecretError::NoKey)?;
        let payload = BASE64.decode(encoded)?;
        if payload.len() <= NONCE_LEN {
            return Err(SecretError::TooShort);
        }
        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecretError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| SecretError::Utf8)
    }
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
