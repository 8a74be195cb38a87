//! Account number protection
//!
//! Depository account numbers are stored encrypted, next to a one-way hash of
//! the plaintext so return files can be matched without decrypting. The
//! cipher sits behind [`StringKeeper`] and is passed explicitly to whatever
//! needs plaintext (the batch compilers), so entities never carry it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretsError {
    #[error("encrypt failed: {0}")]
    Encrypt(String),

    #[error("decrypt failed: {0}")]
    Decrypt(String),
}

impl SecretsError {
    pub fn code(&self) -> &'static str {
        match self {
            SecretsError::Encrypt(_) => "ENCRYPT_FAILED",
            SecretsError::Decrypt(_) => "DECRYPT_FAILED",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Reversible string cipher.
pub trait StringKeeper: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, SecretsError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, SecretsError>;
}

/// Development keeper: base64 with a fixed prefix, no confidentiality.
///
/// Production deployments plug a KMS-backed keeper into the same trait.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Keeper;

const BASE64_PREFIX: &str = "b64:";

impl StringKeeper for Base64Keeper {
    fn encrypt(&self, plaintext: &str) -> Result<String, SecretsError> {
        Ok(format!("{}{}", BASE64_PREFIX, STANDARD.encode(plaintext)))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, SecretsError> {
        let encoded = ciphertext
            .strip_prefix(BASE64_PREFIX)
            .ok_or_else(|| SecretsError::Decrypt("missing keeper prefix".to_string()))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| SecretsError::Decrypt(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| SecretsError::Decrypt(e.to_string()))
    }
}

/// Hex SHA-256 of a plaintext account number.
pub fn hash_account_number(account_number: &str) -> String {
    let digest = Sha256::digest(account_number.trim().as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_keeper_roundtrip() {
        let keeper = Base64Keeper;
        let cipher = keeper.encrypt("123456789").unwrap();
        assert_ne!(cipher, "123456789");
        assert_eq!(keeper.decrypt(&cipher).unwrap(), "123456789");
    }

    #[test]
    fn test_base64_keeper_rejects_foreign_ciphertext() {
        let err = Base64Keeper.decrypt("123456789").unwrap_err();
        assert_eq!(err.code(), "DECRYPT_FAILED");
        assert!(Base64Keeper.decrypt("b64:!!!").is_err());
    }

    #[test]
    fn test_hash_is_stable_and_trimmed() {
        let a = hash_account_number("123456789");
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_account_number(" 123456789 "));
        assert_ne!(a, hash_account_number("123456780"));
    }
}
