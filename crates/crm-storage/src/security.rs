//! Value sealing for the on-disk secure store
//!
//! ChaCha20-Poly1305 with the item key as associated data, and Argon2id for
//! deriving the store key from a passphrase.

use crate::config::KdfParams;
use crate::{Error, Result};
use argon2::{Argon2, ParamsBuilder, Version};
use chacha20poly1305::aead::{Aead, KeyInit, OsRng, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

/// Current sealed value format version
const SEAL_VERSION: u8 = 1;

/// Nonce length for ChaCha20-Poly1305
const NONCE_LEN: usize = 12;

/// Minimum salt length accepted for key derivation
pub const MIN_SALT_LEN: usize = 16;

/// Generate a random 32-byte salt
pub fn generate_salt() -> [u8; 32] {
    let mut salt = [0u8; 32];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// 256-bit key sealing stored values
#[derive(Clone)]
pub struct StoreKey {
    key: Zeroizing<[u8; 32]>,
}

impl StoreKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Create from raw key bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(Error::Encryption("Invalid key length".to_string()));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(Self {
            key: Zeroizing::new(key),
        })
    }

    /// Derive from a passphrase using Argon2id
    pub fn from_passphrase(passphrase: &str, salt: &[u8], params: &KdfParams) -> Result<Self> {
        if salt.len() < MIN_SALT_LEN {
            return Err(Error::Encryption("Salt too short".to_string()));
        }

        let params = ParamsBuilder::new()
            .m_cost(params.memory_kib)
            .t_cost(params.iterations)
            .p_cost(params.parallelism)
            .output_len(32)
            .build()
            .map_err(|e| Error::Encryption(e.to_string()))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut *key)
            .map_err(|e| Error::Encryption(e.to_string()))?;
        Ok(Self { key })
    }

    /// Get key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Seal `plaintext`, binding it to `aad`
    ///
    /// Format: `[version(1)][nonce(12)][ciphertext(variable)]`
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(self.key.as_ref().into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        sealed.push(SEAL_VERSION);
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a value produced by [`StoreKey::seal`] with the same `aad`
    pub fn open(&self, sealed: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if sealed.len() < 1 + NONCE_LEN {
            return Err(Error::Encryption("Invalid ciphertext length".to_string()));
        }
        let (version, rest) = sealed.split_at(1);
        if version[0] != SEAL_VERSION {
            return Err(Error::Encryption(format!(
                "Unsupported encryption version: {}",
                version[0]
            )));
        }
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let cipher = ChaCha20Poly1305::new(self.key.as_ref().into());
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: ciphertext, aad })
            .map(Zeroizing::new)
            .map_err(|e| Error::Encryption(e.to_string()))
    }
}

impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StoreKey(..)")
    }
}
