//! Data models for the uploader
//!
//! Wire types for the tiling service (assets, archives), the per-file task
//! record, and the outcome records kept by the result aggregator.

mod archive;
mod asset;
mod outcome;
mod task;

/// Identifier the tiling service assigns to an asset.
pub type AssetId = u64;
/// Identifier the tiling service assigns to an archive.
pub type ArchiveId = u64;

pub use archive::*;
pub use asset::*;
pub use outcome::*;
pub use task::*;
