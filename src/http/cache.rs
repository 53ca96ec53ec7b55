//! HTTP cache control module
//!
//! Provides `ETag` formatting, conditional request matching and
//! `Cache-Control` policies.

/// Wrap a content hash as a strong `ETag` value
///
/// # Returns
/// Quoted `ETag` string, e.g., `"abc123def"`
pub fn format_etag(content_hash: &str) -> String {
    format!("\"{content_hash}\"")
}

/// Strip quotes and a weak prefix from a presented validator
fn bare_validator(value: &str) -> &str {
    let value = value.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    value.trim_matches('"')
}

/// Check if client's `If-None-Match` header matches the resource's content hash
///
/// Supports:
/// - Single `ETag`: `"abc123"` (quoted or bare, strong or weak)
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
///
/// # Arguments
/// * `if_none_match` - Client-sent If-None-Match header
/// * `content_hash` - Server-computed content hash, unquoted
///
/// # Returns
/// Returns true if matched (should return 304), false otherwise
pub fn check_etag_match(if_none_match: Option<&str>, content_hash: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').any(|e| {
            let e = e.trim();
            e == "*" || bare_validator(e) == content_hash
        })
    })
}

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// Private cache (browser cache only)
    Private(u32),
    /// No cache
    NoCache,
    /// No store
    NoStore,
}

impl CachePolicy {
    /// One year, private; used for resources whose URL never changes content in place
    pub const LONG_LIVED: Self = Self::Private(31_536_000);

    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::Private(max_age) => format!("private, max-age={max_age}"),
            Self::NoCache => "no-cache".to_string(),
            Self::NoStore => "no-store".to_string(),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::Public(3600) // 1 hour
    }
}
