// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

fn keyed() -> SecretBox {
    SecretBox::from_base64_key(&BASE64.encode([7u8; 32])).unwrap()
}

#[test]
fn encrypt_reveal_roundtrip() {
    let secrets = keyed();
    let stored = secrets.encrypt("api-key-123").unwrap();

    assert!(stored.starts_with(ENC_PREFIX));
    assert!(SecretBox::is_encrypted(&stored));
    assert_eq!(secrets.reveal(&stored).unwrap(), "api-key-123");
}

#[test]
fn nonces_differ_between_encryptions() {
    let secrets = keyed();
    let a = secrets.encrypt("same").unwrap();
    let b = secrets.encrypt("same").unwrap();
    assert_ne!(a, b);
    assert_eq!(secrets.reveal(&a).unwrap(), secrets.reveal(&b).unwrap());
}

#[test]
fn legacy_plaintext_passes_through() {
    let secrets = keyed();
    assert_eq!(secrets.reveal("plain-key").unwrap(), "plain-key");
    assert!(!SecretBox::is_encrypted("plain-key"));

    // Even without a key
    let unkeyed = SecretBox::unkeyed();
    assert_eq!(unkeyed.reveal("plain-key").unwrap(), "plain-key");
}

#[test]
fn reveal_without_key_fails_for_ciphertext() {
    let stored = keyed().encrypt("x").unwrap();
    let err = SecretBox::unkeyed().reveal(&stored).unwrap_err();
    assert!(matches!(err, SecretError::NoKey));
}

#[test]
fn wrong_key_fails_to_decrypt() {
    let stored = keyed().encrypt("x").unwrap();
    let other = SecretBox::from_base64_key(&BASE64.encode([9u8; 32])).unwrap();
    let err = other.reveal(&stored).unwrap_err();
    assert!(matches!(err, SecretError::Decrypt));
}

#[test]
fn tampered_ciphertext_is_rejected() {
    let secrets = keyed();
    let stored = secrets.encrypt("x").unwrap();

    // Flip a character in the payload
    let mut chars: Vec<char> = stored.chars().collect();
    let last = chars.len() - 1;
    chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    assert!(secrets.reveal(&tampered).is_err());
}

#[test]
fn bad_key_lengths_are_rejected() {
    let err = SecretBox::from_base64_key(&BASE64.encode([1u8; 16]))
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, SecretError::BadKeyLength(16)));
}

#[test]
fn truncated_payload_is_rejected() {
    let secrets = keyed();
    let stored = format!("{ENC_PREFIX}{}", BASE64.encode([1u8; 4]));
    let err = secrets.reveal(&stored).unwrap_err();
    assert!(matches!(err, SecretError::TooShort));
}
