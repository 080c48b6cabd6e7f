//! Tilepush Core Library
//!
//! This crate provides the domain models, error taxonomy, workflow events and
//! configuration shared by the uploader crates.

pub mod config;
pub mod error;
pub mod events;
pub mod models;

// Re-export commonly used types
pub use config::UploaderConfig;
pub use error::{ConfigError, TransitionError, WorkflowError};
pub use events::{NoOpObserver, TaskEvent, TaskEventKind, TaskObserver, TaskRef};
