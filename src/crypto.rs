// ABOUTME: AES-256-GCM encryption for provider tokens stored at rest
// ABOUTME: Each ciphertext carries its own random nonce, base64 encoded as [nonce][ciphertext+tag]
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Token encryption at rest
//!
//! Provider access and refresh tokens never reach the database in clear text.
//! [`TokenCipher`] seals each value with an independent 12-byte nonce which is
//! prepended to the ciphertext before base64 encoding.

use base64::{engine::general_purpose, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use thiserror::Error;

/// Token encryption failures
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key is not a valid AES-256 key
    #[error("invalid encryption key length: expected 32 bytes, got {0}")]
    InvalidKey(usize),
    /// System RNG failed to produce a nonce
    #[error("failed to generate nonce")]
    Rng,
    /// Sealing failed
    #[error("encryption failed")]
    Seal,
    /// Stored value is not valid base64 or is too short
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
    /// Authentication tag mismatch (wrong key or tampered data)
    #[error("decryption failed")]
    Open,
}

/// AES-256-GCM cipher for provider tokens
#[derive(Clone)]
pub struct TokenCipher {
    key_bytes: Vec<u8>,
    rng: SystemRandom,
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Create a cipher from a 32-byte key
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] for any other key length
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        UnboundKey::new(&AES_256_GCM, key).map_err(|_| CryptoError::InvalidKey(key.len()))?;
        Ok(Self {
            key_bytes: key.to_vec(),
            rng: SystemRandom::new(),
        })
    }

    fn key(&self) -> Result<LessSafeKey, CryptoError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key_bytes)
            .map_err(|_| CryptoError::InvalidKey(self.key_bytes.len()))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Encrypt a plaintext token
    ///
    /// # Errors
    ///
    /// Returns an error if nonce generation or sealing fails
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::Rng)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut data = plaintext.as_bytes().to_vec();
        self.key()?
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut data)
            .map_err(|_| CryptoError::Seal)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(data);
        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// Decrypt a value produced by [`TokenCipher::encrypt`]
    ///
    /// # Errors
    ///
    /// Returns an error if the value is malformed or was sealed with another key
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let combined = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        if combined.len() < NONCE_LEN {
            return Err(CryptoError::Malformed("ciphertext shorter than nonce".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CryptoError::Malformed("invalid nonce".into()))?;

        let mut data = ciphertext.to_vec();
        let plaintext = self
            .key()?
            .open_in_place(nonce, Aad::empty(), &mut data)
            .map_err(|_| CryptoError::Open)?;

        String::from_utf8(plaintext.to_vec()).map_err(|e| CryptoError::Malformed(e.to_string()))
    }

    /// Encrypt an optional token
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, CryptoError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }

    /// Decrypt an optional token
    ///
    /// # Errors
    ///
    /// Returns an error if decryption fails
    pub fn decrypt_opt(&self, encoded: Option<&str>) -> Result<Option<String>, CryptoError> {
        encoded.map(|e| self.decrypt(e)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ciphertext_hides_plaintext_and_uses_fresh_nonce() {
        let cipher = TokenCipher::new(&[7u8; 32]).unwrap();
        let first = cipher.encrypt("gho_secret_token").unwrap();
        let second = cipher.encrypt("gho_secret_token").unwrap();

        assert!(!first.contains("gho_secret_token"));
        assert_ne!(first, second);
        assert_eq!(cipher.decrypt(&first).unwrap(), "gho_secret_token");
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = TokenCipher::new(&[1u8; 32]).unwrap().encrypt("token").unwrap();
        let other = TokenCipher::new(&[2u8; 32]).unwrap();
        assert!(matches!(other.decrypt(&sealed), Err(CryptoError::Open)));
    }

    #[test]
    fn test_rejects_bad_key_and_input() {
        assert!(matches!(
            TokenCipher::new(&[0u8; 16]),
            Err(CryptoError::InvalidKey(16))
        ));
        let cipher = TokenCipher::new(&[0u8; 32]).unwrap();
        assert!(matches!(cipher.decrypt("AAAA"), Err(CryptoError::Malformed(_))));
        assert!(matches!(cipher.decrypt("not base64!"), Err(CryptoError::Malformed(_))));
    }
}
