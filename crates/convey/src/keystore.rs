//! Password-protected key storage on the filesystem.
//!
//! One file per alias holding the 32-byte keypair seed sealed with
//! ChaCha20-Poly1305 under a Blake3-derived password key. Wrong
//! password, missing file, and corrupt file are all the same opaque
//! access-denied error.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::RngCore;
use tracing::warn;

use convey_core::Keypair;

use crate::error::{ConveyError, Result};

/// Domain-separation context for deriving seal keys from passwords.
const KEYSTORE_CONTEXT: &str = "convey-keystore-v0";

/// A directory of sealed keypair seeds.
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File path for an alias. Aliases are base64url-encoded so any
    /// alias is a safe file name.
    fn key_path(&self, alias: &str) -> PathBuf {
        self.dir
            .join(format!("{}.key", URL_SAFE_NO_PAD.encode(alias)))
    }

    fn seal_key(password: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_derive_key(KEYSTORE_CONTEXT);
        hasher.update(password);
        *hasher.finalize().as_bytes()
    }

    /// Whether key material exists for an alias.
    pub fn has(&self, alias: &str) -> bool {
        self.key_path(alias).exists()
    }

    /// Seal and store a keypair. Fails if the alias already has one.
    pub fn add(&self, alias: &str, password: &[u8], keypair: &Keypair) -> Result<()> {
        if self.has(alias) {
            return Err(ConveyError::KeyAlreadyExists(alias.to_string()));
        }

        std::fs::create_dir_all(&self.dir)?;

        let cipher = ChaCha20Poly1305::new_from_slice(&Self::seal_key(password))
            .map_err(|e| ConveyError::Io(std::io::Error::other(e.to_string())))?;
        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), keypair.seed().as_slice())
            .map_err(|e| ConveyError::Io(std::io::Error::other(e.to_string())))?;

        let mut contents = nonce.to_vec();
        contents.extend_from_slice(&sealed);
        write_atomically(&self.key_path(alias), &contents)?;
        Ok(())
    }

    /// Recover a keypair. Every failure is the opaque access-denied
    /// error so the keystore is not a password oracle.
    pub fn get(&self, alias: &str, password: &[u8]) -> Result<Keypair> {
        let contents = match std::fs::read(self.key_path(alias)) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(alias, %err, "keystore read failed");
                return Err(ConveyError::AccessDenied);
            }
        };

        if contents.len() < 12 {
            return Err(ConveyError::AccessDenied);
        }
        let (nonce, sealed) = contents.split_at(12);

        let cipher = ChaCha20Poly1305::new_from_slice(&Self::seal_key(password))
            .map_err(|_| ConveyError::AccessDenied)?;
        let seed: [u8; 32] = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| ConveyError::AccessDenied)?
            .try_into()
            .map_err(|_| ConveyError::AccessDenied)?;

        Ok(Keypair::from_seed(&seed))
    }
}

/// Write via a temp file and rename so a crash never leaves a torn key.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
