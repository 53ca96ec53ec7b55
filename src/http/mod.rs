//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from the
//! resource cache itself.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use mime::ContentTypeRegistry;
pub use response::{
    build_304_response, build_404_response, build_405_response, build_415_response,
    build_health_response, build_options_response, ResponseBody,
};
