//! Request handler module
//!
//! Responsible for request routing dispatch and serving cached resources.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::{handle_request, RequestContext};
pub use static_files::{serve, ResourceStream, ServedResource};
