//! Content-addressed storage of raw document bytes.
//!
//! The address is derived from the bytes alone, so storing the same payload
//! twice yields the same address and is a no-op for the second write.

pub mod memory;
pub mod directory;

pub use memory::*;
pub use directory::*;

use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Address scheme prefix: the digest algorithm.
pub const ADDRESS_PREFIX: &str = "sha256-";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content store unavailable: {0}")]
    Unavailable(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Invalid content address: {0}")]
    InvalidAddress(String),

    #[error("Content store lock poisoned")]
    LockPoisoned,
}

/// Content store abstraction (allows mocking for tests).
pub trait ContentStore: Send + Sync {
    /// Persist `bytes` and return their address.
    fn store(&self, bytes: &[u8]) -> Result<String, StoreError>;

    /// Bytes previously stored under `address`.
    fn retrieve(&self, address: &str) -> Result<Vec<u8>, StoreError>;
}

/// `sha256-` + URL-safe unpadded base64 of the SHA-256 digest.
pub fn content_address(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!(
        "{ADDRESS_PREFIX}{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
    )
}

/// Reject anything that is not a well-formed address. Addresses double as
/// file names in the directory store, so only the URL-safe alphabet passes.
pub fn check_address(address: &str) -> Result<&str, StoreError> {
    let encoded = address
        .strip_prefix(ADDRESS_PREFIX)
        .ok_or_else(|| StoreError::InvalidAddress(address.to_string()))?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| StoreError::InvalidAddress(address.to_string()))?;
    if decoded.len() != 32 {
        return Err(StoreError::InvalidAddress(address.to_string()));
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_is_object_safe() {
        fn _assert(_: &dyn ContentStore) {}
    }

    #[test]
    fn address_is_deterministic() {
        let a = content_address(b"GOVERNMENT OF INDIA 1234 5678 9012");
        let b = content_address(b"GOVERNMENT OF INDIA 1234 5678 9012");
        assert_eq!(a, b);
        assert!(a.starts_with(ADDRESS_PREFIX));
        // 32-byte digest → 43 unpadded base64 chars
        assert_eq!(a.len(), ADDRESS_PREFIX.len() + 43);
    }

    #[test]
    fn different_bytes_different_address() {
        assert_ne!(content_address(b"a"), content_address(b"b"));
    }

    #[test]
    fn address_is_path_safe() {
        let address = content_address(&[0xFB; 64]);
        assert!(!address.contains('/'));
        assert!(!address.contains('+'));
        assert!(!address.contains('='));
    }

    #[test]
    fn check_address_rejects_garbage() {
        assert!(check_address(&content_address(b"x")).is_ok());
        assert!(check_address("md5-abc").is_err());
        assert!(check_address("sha256-../../etc/passwd").is_err());
        assert!(check_address("sha256-AAAA").is_err());
    }
}
