use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{check_address, content_address, ContentStore, StoreError};

/// One file per address under `root`. Writes go to a temporary file first
/// and are renamed into place, so a reader never sees a partial blob.
pub struct DirectoryContentStore {
    root: PathBuf,
}

impl DirectoryContentStore {
    /// Open the store, creating `root` if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::info!(path = %root.display(), "Content store directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, encoded: &str) -> PathBuf {
        self.root.join(format!("{encoded}.blob"))
    }
}

impl ContentStore for DirectoryContentStore {
    fn store(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let address = content_address(bytes);
        let encoded = check_address(&address)?;
        let target = self.blob_path(encoded);

        if target.exists() {
            return Ok(address);
        }

        let tmp = self
            .root
            .join(format!(".{encoded}.{}.tmp", uuid::Uuid::new_v4().simple()));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::debug!(address = %address, size = bytes.len(), "Blob written");
        Ok(address)
    }

    fn retrieve(&self, address: &str) -> Result<Vec<u8>, StoreError> {
        let encoded = check_address(address)?;
        match fs::read(self.blob_path(encoded)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(address.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
