use std::collections::HashMap;
use std::sync::RwLock;

use super::{check_address, content_address, ContentStore, StoreError};

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStore for MemoryContentStore {
    fn store(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let address = content_address(bytes);
        let mut blobs = self.blobs.write().map_err(|_| StoreError::LockPoisoned)?;
        blobs
            .entry(address.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(address)
    }

    fn retrieve(&self, address: &str) -> Result<Vec<u8>, StoreError> {
        check_address(address)?;
        let blobs = self.blobs.read().map_err(|_| StoreError::LockPoisoned)?;
        blobs
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(address.to_string()))
    }
}
