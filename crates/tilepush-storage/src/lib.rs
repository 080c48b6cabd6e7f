//! Tilepush Storage Library
//!
//! This crate provides the object-storage upload step: the `ObjectUploader`
//! trait and an S3 implementation that authenticates with the temporary
//! credentials issued per asset.
//!
//! # Object key format
//!
//! Keys are `{prefix}{filename}` where the prefix comes from the service's
//! upload location. Key generation lives in the `keys` module.

pub mod keys;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use keys::object_key;
pub use s3::S3Uploader;
pub use traits::{ObjectUploader, StorageError, StorageResult, UploadReceipt};
