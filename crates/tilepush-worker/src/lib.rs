//! Tilepush Worker Library
//!
//! Runs the per-file upload workflow (create asset, transfer, notify, optional
//! processing poll, archive and download) over many files with bounded
//! concurrency, and aggregates the outcomes.

pub mod batch;
pub mod context;
pub mod download;
pub mod observer;
pub mod poll;
pub mod results;
pub mod workflow;

pub use batch::BatchRunner;
pub use context::AssetService;
pub use download::{sanitize_file_name, save_download, DownloadError, SavedFile};
pub use observer::TracingObserver;
pub use poll::PollSettings;
pub use results::{BatchResult, ResultAggregator};
pub use workflow::{AssetWorkflow, WorkflowOptions, WorkflowReport};
