//! Remote store abstraction and its two adapters.
mod local;
mod sas;

use std::path::Path;
use std::sync::Arc;

pub use local::LocalDirStore;
pub use sas::{SasBlobStore, SasLocation, TransferSettings};

/// One entry of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub id: String,
    /// Best effort; stores that do not report sizes leave this empty.
    pub size_bytes: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid location: {0}")]
    InvalidLocation(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("http status {status} for `{id}`")]
    HttpStatus { id: String, status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed listing: {0}")]
    Listing(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
pub trait StorageLister: Send + Sync {
    /// Ids under `prefix`, in a stable order for the duration of the call.
    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>, StorageError>;
}

#[async_trait::async_trait]
pub trait StorageTransfer: Send + Sync {
    /// Writes object `id` to `local_path`, returning the number of bytes written.
    async fn download(&self, id: &str, local_path: &Path) -> Result<u64, StorageError>;

    /// Stores the file at `local_path` as `dest_id`, replacing any existing object.
    async fn upload(&self, local_path: &Path, dest_id: &str) -> Result<(), StorageError>;

    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}

/// A store that can both list and transfer.
pub trait RemoteStore: StorageLister + StorageTransfer {
    /// Human readable location for logs. Must not leak credentials.
    fn describe(&self) -> String;
}

/// Opens a store from a location string: `http(s)://` SAS URLs map to
/// [`SasBlobStore`], anything else is treated as a local directory.
pub fn open_store(
    location: &str,
    settings: &TransferSettings,
) -> Result<Arc<dyn RemoteStore>, StorageError> {
    let trimmed = location.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        let parsed = SasLocation::parse(trimmed)?;
        Ok(Arc::new(SasBlobStore::new(parsed, settings.clone())?))
    } else if trimmed.is_empty() {
        Err(StorageError::InvalidLocation("empty location".into()))
    } else {
        Ok(Arc::new(LocalDirStore::new(trimmed)))
    }
}
