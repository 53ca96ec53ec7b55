//! MIME type detection module
//!
//! Maps file extensions to Content-Type values and keeps the registry of
//! extensions the resource cache is allowed to serve.

use std::collections::HashMap;

/// Get MIME Content-Type based on file extension
///
/// # Examples
/// ```
/// use static_cache::http::mime::get_content_type;
/// assert_eq!(get_content_type(Some("html")), "text/html; charset=utf-8");
/// assert_eq!(get_content_type(Some("mp4")), "video/mp4");
/// assert_eq!(get_content_type(None), "application/octet-stream");
/// ```
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    match extension {
        // Text
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        Some("csv") => "text/csv",

        // JavaScript/WASM
        Some("js" | "mjs") => "application/javascript",
        Some("json" | "map") => "application/json",
        Some("wasm") => "application/wasm",

        // Images
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",

        // Video
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogg" | "ogv") => "video/ogg",

        // Audio
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",

        // Documents
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz" | "gzip") => "application/gzip",

        // Default
        _ => "application/octet-stream",
    }
}

/// Extract the lower-cased extension of the last segment of a URL or path.
///
/// ```
/// use static_cache::http::mime::extension_of;
/// assert_eq!(extension_of("/js/App.JS").as_deref(), Some("js"));
/// assert_eq!(extension_of("/v1.2/readme"), None);
/// assert_eq!(extension_of("/"), None);
/// ```
pub fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Registry of servable extensions
///
/// Built once from the semicolon-separated `resource_types` setting. Lookups are
/// case-insensitive; anything not registered is not servable.
#[derive(Debug, Clone, Default)]
pub struct ContentTypeRegistry {
    types: HashMap<String, &'static str>,
}

impl ContentTypeRegistry {
    /// Build from a list such as `"html;htm;js;css;png"`.
    ///
    /// Entries may be written as `ext`, `.ext` or `*.ext`.
    pub fn from_list(list: &str) -> Self {
        let types = split_list(list)
            .into_iter()
            .map(|item| {
                let ext = item
                    .trim_start_matches('*')
                    .trim_start_matches('.')
                    .to_ascii_lowercase();
                let content_type = get_content_type(Some(&ext));
                (ext, content_type)
            })
            .filter(|(ext, _)| !ext.is_empty())
            .collect();
        Self { types }
    }

    /// Content type for a registered extension, `None` if not servable
    pub fn content_type(&self, ext: &str) -> Option<&'static str> {
        self.types
            .get(ext)
            .or_else(|| self.types.get(&ext.to_ascii_lowercase()))
            .copied()
    }

    pub fn contains(&self, ext: &str) -> bool {
        self.content_type(ext).is_some()
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Split a semicolon-separated setting, dropping blanks
pub fn split_list(list: &str) -> Vec<String> {
    list.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
