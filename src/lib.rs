//! In-memory static resource cache served over HTTP/1.1.
//!
//! Files under a root directory are indexed by URL at startup. Text-like
//! files are kept gzip-compressed in memory and validated by `ETag`; images
//! are streamed from disk through pooled buffers with a long-lived
//! `Cache-Control`. A file watcher reloads changed resources.

pub mod center;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod resource;
pub mod server;

pub use center::{CenterOptions, Resolution, ResourceCenter};
pub use error::ResourceError;
pub use resource::{FileResource, ResourceKind};
