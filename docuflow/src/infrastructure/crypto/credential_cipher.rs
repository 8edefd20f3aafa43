// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Credential Cipher
//!
//! AES-256-GCM implementation of the `CredentialCipher` port. The wire form
//! is `base64(nonce || ciphertext)` with a random 96-bit nonce per value.
//! The symmetric key is supplied by configuration; key management is
//! outside the engine.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use docuflow_domain::services::CredentialCipher;
use docuflow_domain::EngineError;

const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher over a configured 32-byte key.
pub struct AesGcmCredentialCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCredentialCipher {
    /// Builds a cipher from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, EngineError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| EngineError::invalid_config(format!("Credential key is not base64: {}", e)))?;
        if bytes.len() != 32 {
            return Err(EngineError::invalid_config(format!(
                "Credential key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Generates a fresh random key in the configured encoding. Operator
    /// tooling; never called on a request path.
    pub fn generate_key() -> String {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        BASE64.encode(key)
    }
}

impl CredentialCipher for AesGcmCredentialCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, EngineError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| EngineError::internal_error(format!("Credential encryption failed: {}", e)))?;
        let mut wire = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        wire.extend_from_slice(&nonce);
        wire.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(wire))
    }

    fn decrypt(&self, encoded: &str) -> Result<String, EngineError> {
        let wire = BASE64
            .decode(encoded)
            .map_err(|e| EngineError::invalid_config(format!("Ciphertext is not base64: {}", e)))?;
        if wire.len() <= NONCE_LEN {
            return Err(EngineError::invalid_config("Ciphertext is truncated"));
        }
        let (nonce, ciphertext) = wire.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| EngineError::internal_error(format!("Credential decryption failed: {}", e)))?;
        String::from_utf8(plaintext)
            .map_err(|e| EngineError::invalid_config(format!("Decrypted value is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_randomizes_nonces() {
        let cipher = AesGcmCredentialCipher::from_base64_key(&AesGcmCredentialCipher::generate_key())
            .unwrap();
        let first = cipher.encrypt("sk-secret").unwrap();
        let second = cipher.encrypt("sk-secret").unwrap();
        assert_ne!(first, second);
        assert_eq!(cipher.decrypt(&first).unwrap(), "sk-secret");
        assert_eq!(cipher.decrypt(&second).unwrap(), "sk-secret");
    }

    #[test]
    fn rejects_wrong_key_material() {
        assert!(AesGcmCredentialCipher::from_base64_key("short").is_err());
        assert!(AesGcmCredentialCipher::from_base64_key(&BASE64.encode([0u8; 16])).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let cipher = AesGcmCredentialCipher::from_base64_key(&AesGcmCredentialCipher::generate_key())
            .unwrap();
        let encoded = cipher.encrypt("value").unwrap();
        let mut wire = BASE64.decode(&encoded).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        assert!(cipher.decrypt(&BASE64.encode(wire)).is_err());
    }
}
