//! Resource index
//!
//! [`ResourceCenter`] owns the URL → resource map for one root directory. It is
//! filled by a recursive scan at startup, consulted on every request with a
//! cold-load fallback to disk, and refreshed entry by entry when the file
//! watcher reports a change.
//!
//! Published resources are never mutated: a reload builds a new
//! [`FileResource`] and swaps the map entry, so a reader holding the old `Arc`
//! keeps a consistent value. Loads for one URL are serialized by a per-URL
//! gate, and a resource younger than the reload interval is reused instead of
//! being loaded again.

pub mod options;
pub mod watch;

use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use walkdir::WalkDir;

use crate::error::ResourceError;
use crate::http::mime::extension_of;
use crate::logger;
use crate::resource::{FileResource, ResourceKind};

pub use options::CenterOptions;
pub use watch::{ChangeEvent, ChangeSource, ChangeStream, ChannelSource, NotifySource, ReloadTask};

/// Where a found resource came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Already in the index
    Cached,
    /// Loaded from disk while answering this request
    Loaded,
}

impl Origin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cached => "HIT",
            Self::Loaded => "LOAD",
        }
    }
}

/// Outcome of [`ResourceCenter::resolve`]
#[derive(Debug, Clone)]
pub enum Resolution {
    Found {
        resource: Arc<FileResource>,
        content_type: &'static str,
        origin: Origin,
    },
    /// No indexed resource and no file on disk
    NotFound,
    /// Extension is not registered
    NotSupported,
}

pub struct ResourceCenter {
    root: PathBuf,
    options: CenterOptions,
    resources: DashMap<String, Arc<FileResource>>,
    /// Per-URL load gate: at most one load in flight for a URL
    loading: DashMap<String, Arc<Mutex<()>>>,
}

impl ResourceCenter {
    pub fn new(options: CenterOptions) -> Self {
        // notify reports absolute paths; keep the root comparable with them
        let root = options
            .root
            .canonicalize()
            .unwrap_or_else(|_| options.root.clone());
        Self {
            root,
            options,
            resources: DashMap::new(),
            loading: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn options(&self) -> &CenterOptions {
        &self.options
    }

    pub const fn chunk_size(&self) -> usize {
        self.options.chunk_size
    }

    /// Scan the root recursively and load every registered file.
    ///
    /// Returns the number of resources now published for scanned files. A
    /// missing root or unreadable entries are logged, never fatal.
    pub fn initialize(&self) -> usize {
        if !self.root.is_dir() {
            logger::log_warning(&format!(
                "Resource root '{}' is not a directory; index stays empty",
                self.root.display()
            ));
            return 0;
        }

        let started = Instant::now();
        let mut count = 0;
        for entry in WalkDir::new(&self.root).follow_links(true) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if self.create_resource(entry.path()).is_some() {
                        count += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => logger::log_warning(&ResourceError::from(e).to_string()),
            }
        }
        logger::log_scan_complete(&self.root, count, started.elapsed());
        count
    }

    /// Watched extensions that are also servable, sorted
    pub fn watched_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self
            .options
            .registry
            .extensions()
            .filter(|ext| self.options.watched_extensions.contains(*ext))
            .map(ToString::to_string)
            .collect();
        exts.sort();
        exts
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        file_extension(path).is_some_and(|ext| {
            self.options.watched_extensions.contains(&ext) && self.options.registry.contains(&ext)
        })
    }

    fn kind_for(&self, ext: &str) -> ResourceKind {
        if self.options.streamed_extensions.contains(ext) {
            ResourceKind::Streamed
        } else {
            ResourceKind::Buffered
        }
    }

    /// Load `path` and publish it under its URL.
    ///
    /// This is the only place resources are created. Returns `None` for
    /// unregistered extensions, paths outside the root and failed loads; the
    /// index is left untouched in those cases. If the current entry is
    /// younger than the reload interval it is returned as is.
    pub fn create_resource(&self, path: &Path) -> Option<Arc<FileResource>> {
        let ext = file_extension(path)?;
        if !self.options.registry.contains(&ext) {
            return None;
        }
        let Some(url) = self.path_to_url(path) else {
            logger::log_resource_failed(path, &ResourceError::OutsideRoot(path.to_path_buf()));
            return None;
        };

        let gate = Arc::clone(&self.loading.entry(url.clone()).or_default());
        let created = {
            let _loading = gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.load_exclusive(path, &url, &ext)
        };
        drop(gate);
        // last holder out removes the gate
        self.loading
            .remove_if(&url, |_, gate| Arc::strong_count(gate) == 1);
        created
    }

    /// Body of [`Self::create_resource`]; the caller holds the URL's gate
    fn load_exclusive(&self, path: &Path, url: &str, ext: &str) -> Option<Arc<FileResource>> {
        if let Some(existing) = self.get(url) {
            if existing.age() < self.options.reload_interval {
                return Some(existing);
            }
        }

        match FileResource::load(
            path,
            url,
            self.kind_for(ext),
            self.options.buffer_pool_capacity,
        ) {
            Ok(resource) => {
                let kind = match resource.kind() {
                    ResourceKind::Buffered => "buffered",
                    ResourceKind::Streamed => "streamed",
                };
                logger::log_resource_loaded(url, kind, resource.length());
                let resource = Arc::new(resource);
                self.resources.insert(url.to_string(), Arc::clone(&resource));
                Some(resource)
            }
            Err(e) => {
                logger::log_resource_failed(path, &e);
                None
            }
        }
    }

    /// Re-create the resource for a changed file
    pub fn reload(&self, path: &Path) -> Option<Arc<FileResource>> {
        let previous = self.path_to_url(path).and_then(|url| self.get(&url));
        let current = self.create_resource(path)?;
        if previous.map_or(true, |p| !Arc::ptr_eq(&p, &current)) {
            logger::log_resource_reloaded(current.url());
        }
        Some(current)
    }

    /// Indexed resource for a normalized URL
    pub fn get(&self, url: &str) -> Option<Arc<FileResource>> {
        self.resources.get(url).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// All indexed URLs, sorted
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.resources.iter().map(|e| e.key().clone()).collect();
        urls.sort();
        urls
    }

    /// Resolve a request path to a servable resource.
    ///
    /// `/` tries the default pages in order. Any other path must carry a
    /// registered extension; it is looked up in the index and, on a miss,
    /// loaded from disk if the file exists.
    pub fn resolve(&self, request_path: &str) -> Resolution {
        let Some(normalized) = normalize_request(request_path) else {
            return Resolution::NotFound;
        };

        if normalized == "/" {
            for page in &self.options.default_pages {
                let candidate = format!("/{}", page.trim_start_matches('/'));
                let Some(content_type) = self.content_type_of(&candidate) else {
                    continue;
                };
                if let Some((resource, origin)) = self.lookup_or_load(&candidate) {
                    return Resolution::Found {
                        resource,
                        content_type,
                        origin,
                    };
                }
            }
            return Resolution::NotFound;
        }

        let Some(content_type) = self.content_type_of(&normalized) else {
            return Resolution::NotSupported;
        };
        match self.lookup_or_load(&normalized) {
            Some((resource, origin)) => Resolution::Found {
                resource,
                content_type,
                origin,
            },
            None => Resolution::NotFound,
        }
    }

    /// Answer without loading anything.
    ///
    /// Index hits are returned directly and a path with no file behind it is
    /// not found; both cost at most a `stat`. `None` means a file has to be
    /// loaded; call [`Self::resolve`] (ideally off the async workers) then.
    pub fn resolve_cached(&self, request_path: &str) -> Option<Resolution> {
        let Some(normalized) = normalize_request(request_path) else {
            return Some(Resolution::NotFound);
        };

        if normalized == "/" {
            for page in &self.options.default_pages {
                let candidate = format!("/{}", page.trim_start_matches('/'));
                let Some(content_type) = self.content_type_of(&candidate) else {
                    continue;
                };
                if let Some(resource) = self.get(&candidate.to_lowercase()) {
                    return Some(Resolution::Found {
                        resource,
                        content_type,
                        origin: Origin::Cached,
                    });
                }
                if self.disk_file(&candidate).is_some() {
                    return None;
                }
            }
            return Some(Resolution::NotFound);
        }

        let Some(content_type) = self.content_type_of(&normalized) else {
            return Some(Resolution::NotSupported);
        };
        if let Some(resource) = self.get(&normalized.to_lowercase()) {
            return Some(Resolution::Found {
                resource,
                content_type,
                origin: Origin::Cached,
            });
        }
        match self.disk_file(&normalized) {
            Some(_) => None,
            None => Some(Resolution::NotFound),
        }
    }

    fn content_type_of(&self, url: &str) -> Option<&'static str> {
        extension_of(url).and_then(|ext| self.options.registry.content_type(&ext))
    }

    /// Index hit, else cold load. `path` keeps the request's case so that
    /// files with upper-case names are found on case-sensitive filesystems.
    fn lookup_or_load(&self, path: &str) -> Option<(Arc<FileResource>, Origin)> {
        let url = path.to_lowercase();
        if let Some(resource) = self.get(&url) {
            return Some((resource, Origin::Cached));
        }

        let file = self.disk_file(path)?;
        self.create_resource(&file)
            .map(|resource| (resource, Origin::Loaded))
    }

    /// File on disk for a request path: original case first, then lower-cased
    fn disk_file(&self, path: &str) -> Option<PathBuf> {
        let original = self.url_to_path(path);
        if original.is_file() {
            return Some(original);
        }
        let lowered = self.url_to_path(&path.to_lowercase());
        lowered.is_file().then_some(lowered)
    }

    /// `/` + path relative to the root, `/`-separated and lower-cased.
    ///
    /// `None` if the path is not under the root or is not valid UTF-8.
    pub fn path_to_url(&self, path: &Path) -> Option<String> {
        let relative = match path.strip_prefix(&self.root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => path
                .canonicalize()
                .ok()?
                .strip_prefix(&self.root)
                .ok()?
                .to_path_buf(),
        };

        let mut url = String::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    url.push('/');
                    url.push_str(&part.to_str()?.to_lowercase());
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        if url.is_empty() {
            None
        } else {
            Some(url)
        }
    }

    /// Root joined with the URL's segments, using the host separator
    pub fn url_to_path(&self, url: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in url.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

/// Collapse repeated slashes and reject anything that could leave the root.
/// Case is preserved.
fn normalize_request(path: &str) -> Option<String> {
    if path.contains(['\\', '\0']) {
        return None;
    }
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
        if segment == ".." || segment.contains(':') {
            return None;
        }
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    Some(normalized)
}

fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}
