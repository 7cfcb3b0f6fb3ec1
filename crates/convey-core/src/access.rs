//! Sealing record payloads for a set of recipients.
//!
//! A fresh content key encrypts the payload with ChaCha20-Poly1305; the
//! content key is then wrapped once per recipient via X25519 agreement
//! with a per-recipient ephemeral key. Every failure on the open path
//! collapses into the opaque access-denied error so a wrong password and
//! a missing grant are indistinguishable.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use ciborium::value::Value;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

use bytes::Bytes;

use crate::canonical::{as_map, decode_value, encode_canonical, require_bytes};
use crate::crypto::{Keypair, X25519PublicKey};
use crate::error::CoreError;
use crate::record::RecordAccess;

/// Domain-separation context for deriving wrap keys from shared secrets.
const WRAP_CONTEXT: &str = "convey-record-key-v0";

mod sealed_keys {
    pub const NONCE: u64 = 0;
    pub const CIPHERTEXT: u64 = 1;
}

/// Derive the key-wrap key from an X25519 shared secret.
fn wrap_key(shared: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(WRAP_CONTEXT);
    hasher.update(shared);
    *hasher.finalize().as_bytes()
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Seal a payload for the given recipients.
///
/// Returns the sealed payload bytes and one access entry per recipient.
pub fn seal_payload(
    plaintext: &[u8],
    recipients: &[(String, X25519PublicKey)],
) -> Result<(Bytes, Vec<RecordAccess>), CoreError> {
    let content_key: [u8; 32] = random_bytes();
    let payload_nonce: [u8; 12] = random_bytes();

    let cipher = ChaCha20Poly1305::new_from_slice(&content_key)
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&payload_nonce), plaintext)
        .map_err(|e| CoreError::EncodingError(e.to_string()))?;

    let sealed = Value::Map(vec![
        (
            Value::Integer(sealed_keys::NONCE.into()),
            Value::Bytes(payload_nonce.to_vec()),
        ),
        (
            Value::Integer(sealed_keys::CIPHERTEXT.into()),
            Value::Bytes(ciphertext),
        ),
    ]);

    let mut access = Vec::with_capacity(recipients.len());
    for (alias, agreement_key) in recipients {
        let ephemeral = StaticSecret::from(random_bytes::<32>());
        let ephemeral_public = X25519PublicKey(*PublicKey::from(&ephemeral).as_bytes());

        let shared = ephemeral.diffie_hellman(&agreement_key.to_dalek());
        let wrap = ChaCha20Poly1305::new_from_slice(&wrap_key(shared.as_bytes()))
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;

        let wrap_nonce: [u8; 12] = random_bytes();
        let wrapped_key = wrap
            .encrypt(Nonce::from_slice(&wrap_nonce), content_key.as_slice())
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;

        access.push(RecordAccess {
            alias: alias.clone(),
            ephemeral_key: ephemeral_public,
            nonce: wrap_nonce,
            wrapped_key,
        });
    }

    Ok((Bytes::from(encode_canonical(&sealed)), access))
}

/// Open a sealed payload using one access entry and the recipient's keypair.
pub fn open_payload(
    sealed_payload: &[u8],
    entry: &RecordAccess,
    keypair: &Keypair,
) -> Result<Vec<u8>, CoreError> {
    let shared = keypair.diffie_hellman(&entry.ephemeral_key);
    let wrap =
        ChaCha20Poly1305::new_from_slice(&wrap_key(&shared)).map_err(|_| CoreError::AccessDenied)?;

    let content_key: [u8; 32] = wrap
        .decrypt(Nonce::from_slice(&entry.nonce), entry.wrapped_key.as_slice())
        .map_err(|_| CoreError::AccessDenied)?
        .try_into()
        .map_err(|_| CoreError::AccessDenied)?;

    let value = decode_value(sealed_payload).map_err(|_| CoreError::AccessDenied)?;
    let map = as_map(&value, "sealed payload").map_err(|_| CoreError::AccessDenied)?;
    let nonce = require_bytes(map, sealed_keys::NONCE, "sealed nonce")
        .map_err(|_| CoreError::AccessDenied)?;
    let ciphertext = require_bytes(map, sealed_keys::CIPHERTEXT, "sealed ciphertext")
        .map_err(|_| CoreError::AccessDenied)?;
    if nonce.len() != 12 {
        return Err(CoreError::AccessDenied);
    }

    let cipher =
        ChaCha20Poly1305::new_from_slice(&content_key).map_err(|_| CoreError::AccessDenied)?;
    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| CoreError::AccessDenied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let bob = Keypair::generate();
        let (payload, access) =
            seal_payload(b"hello bob", &[("bob".to_string(), bob.agreement_key())]).unwrap();

        assert_eq!(access.len(), 1);
        let plaintext = open_payload(&payload, &access[0], &bob).unwrap();
        assert_eq!(plaintext, b"hello bob");
    }

    #[test]
    fn test_each_recipient_gets_distinct_wrap() {
        let bob = Keypair::generate();
        let carol = Keypair::generate();
        let (_, access) = seal_payload(
            b"shared",
            &[
                ("bob".to_string(), bob.agreement_key()),
                ("carol".to_string(), carol.agreement_key()),
            ],
        )
        .unwrap();

        assert_ne!(access[0].wrapped_key, access[1].wrapped_key);
        assert_ne!(access[0].ephemeral_key, access[1].ephemeral_key);
    }

    #[test]
    fn test_open_with_wrong_key_is_opaque() {
        let bob = Keypair::generate();
        let mallory = Keypair::generate();
        let (payload, access) =
            seal_payload(b"secret", &[("bob".to_string(), bob.agreement_key())]).unwrap();

        let err = open_payload(&payload, &access[0], &mallory).unwrap_err();
        assert!(matches!(err, CoreError::AccessDenied));
    }

    #[test]
    fn test_tampered_ciphertext_is_opaque() {
        let bob = Keypair::generate();
        let (payload, access) =
            seal_payload(b"secret", &[("bob".to_string(), bob.agreement_key())]).unwrap();

        let mut tampered = payload.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;

        let err = open_payload(&tampered, &access[0], &bob).unwrap_err();
        assert!(matches!(err, CoreError::AccessDenied));
    }
}
