//! Object storage abstraction
//!
//! The workflow only needs one operation: put a local file at the location the
//! tiling service handed out. Keeping it behind a trait lets tests count and
//! fail uploads without touching the network.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tilepush_core::models::UploadLocation;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What was written where.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub size_bytes: u64,
    pub duration: Duration,
}

/// Uploads a local file to the object-storage location of one asset.
///
/// Implementations must not retry internally; a failed upload fails the task.
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    async fn upload(
        &self,
        file_path: &Path,
        location: &UploadLocation,
    ) -> StorageResult<UploadReceipt>;
}
