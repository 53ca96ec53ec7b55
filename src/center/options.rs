//! Construction options for [`ResourceCenter`](super::ResourceCenter)

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::mime::{split_list, ContentTypeRegistry};

pub const DEFAULT_RESOURCE_TYPES: &str =
    "html;htm;js;css;json;txt;xml;svg;ico;png;jpg;jpeg;gif;webp;woff;woff2;ttf";
pub const DEFAULT_PAGES: &str = "index.html;index.htm";
/// Already-compressed image formats: not worth gzip or holding in memory
pub const DEFAULT_STREAMED_TYPES: &str = "jpg;jpeg;png;gif";
/// Text-like formats edited in place during development
pub const DEFAULT_WATCH_TYPES: &str = "js;html;htm;css";
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;
pub const DEFAULT_BUFFER_POOL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct CenterOptions {
    pub root: PathBuf,
    pub registry: ContentTypeRegistry,
    pub default_pages: Vec<String>,
    pub streamed_extensions: HashSet<String>,
    pub watched_extensions: HashSet<String>,
    pub reload_interval: Duration,
    pub chunk_size: usize,
    pub buffer_pool_capacity: usize,
}

impl CenterOptions {
    /// Options with the built-in defaults for everything but the root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registry: ContentTypeRegistry::from_list(DEFAULT_RESOURCE_TYPES),
            default_pages: split_list(DEFAULT_PAGES),
            streamed_extensions: extension_set(DEFAULT_STREAMED_TYPES),
            watched_extensions: extension_set(DEFAULT_WATCH_TYPES),
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_pool_capacity: DEFAULT_BUFFER_POOL_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_resource_types(mut self, list: &str) -> Self {
        self.registry = ContentTypeRegistry::from_list(list);
        self
    }

    #[must_use]
    pub fn with_default_pages(mut self, list: &str) -> Self {
        self.default_pages = split_list(list);
        self
    }

    #[must_use]
    pub const fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }
}

/// Parse a semicolon-separated extension list into a lower-cased set
pub fn extension_set(list: &str) -> HashSet<String> {
    split_list(list)
        .into_iter()
        .map(|ext| {
            ext.trim_start_matches('*')
                .trim_start_matches('.')
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty())
        .collect()
}
