//! Cached file resources
//!
//! A [`FileResource`] is one loaded file, in one of two representations picked
//! when it is created:
//!
//! - **Buffered**: the whole file is gzip-compressed into memory at load time
//!   and ranges are served as zero-copy slices of that buffer.
//! - **Streamed**: only metadata is computed at load time; each range is read
//!   from disk into a pooled buffer that the caller hands back with
//!   [`FileResource::release`].
//!
//! The content hash is always taken over the raw file bytes, so it identifies
//! the logical content whichever representation is stored.

pub mod pool;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use md5::{Digest, Md5};
use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{ResourceError, Result};
use crate::logger;
use pool::BufferPool;

/// Chunk size used while hashing and compressing a file
const LOAD_CHUNK_SIZE: usize = 8 * 1024;

/// Representation chosen for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Pre-compressed, fully in memory
    Buffered,
    /// Read from disk per range into pooled buffers
    Streamed,
}

enum Payload {
    Buffered(Bytes),
    Streamed(BufferPool),
}

/// Bytes produced by [`FileResource::read_range`]
#[derive(Debug)]
pub enum BlockData {
    /// View into an immutable payload; nothing to give back
    Shared(Bytes),
    /// Pooled buffer whose first `len` bytes are valid; must be released
    Pooled { buffer: Vec<u8>, len: usize },
}

/// One range read from a resource
#[derive(Debug)]
pub struct Block {
    pub data: BlockData,
    /// Offset of the first byte after this block
    pub next_offset: u64,
}

impl Block {
    fn empty(offset: u64) -> Self {
        Self {
            data: BlockData::Shared(Bytes::new()),
            next_offset: offset,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.data {
            BlockData::Shared(bytes) => &bytes[..],
            BlockData::Pooled { buffer, len } => &buffer[..*len],
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A loaded file. Immutable once constructed.
pub struct FileResource {
    url: String,
    url_hash: String,
    content_hash: String,
    name: String,
    source_path: PathBuf,
    length: u64,
    source_length: u64,
    created_at: Instant,
    payload: Payload,
}

impl FileResource {
    /// Load `path` as the resource served under `url`.
    ///
    /// Buffered resources are read once: each chunk feeds both the hasher and
    /// the gzip encoder. Streamed resources are only hashed.
    pub fn load(
        path: &Path,
        url: impl Into<String>,
        kind: ResourceKind,
        pool_capacity: usize,
    ) -> Result<Self> {
        let created_at = Instant::now();
        let url = url.into();
        let file = File::open(path).map_err(|e| ResourceError::io(path, e))?;

        let mut hasher = Md5::new();
        let (payload, source_length, length) = match kind {
            ResourceKind::Buffered => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                let source_length = read_chunks(file, path, |chunk| {
                    hasher.update(chunk);
                    encoder.write_all(chunk)
                })?;
                let compressed = encoder.finish().map_err(|e| ResourceError::io(path, e))?;
                let length = compressed.len() as u64;
                (Payload::Buffered(Bytes::from(compressed)), source_length, length)
            }
            ResourceKind::Streamed => {
                let source_length = read_chunks(file, path, |chunk| {
                    hasher.update(chunk);
                    Ok(())
                })?;
                let pool = BufferPool::new(pool_capacity);
                (Payload::Streamed(pool), source_length, source_length)
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            url_hash: to_hex(&Md5::digest(url.as_bytes())),
            content_hash: to_hex(&hasher.finalize()),
            url,
            name,
            source_path: path.to_path_buf(),
            length,
            source_length,
            created_at,
            payload,
        })
    }

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns exactly `min(size, length - offset)` bytes unless a streamed
    /// disk read comes up short, in which case the partial bytes are returned.
    /// A pooled block must be handed back through [`Self::release`] once its
    /// bytes have been sent.
    pub fn read_range(&self, offset: u64, size: usize) -> Block {
        let remaining = self.length.saturating_sub(offset);
        let want = size.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if want == 0 {
            return Block::empty(offset);
        }

        match &self.payload {
            Payload::Buffered(data) => {
                // want > 0 implies offset < length <= usize::MAX
                let start = usize::try_from(offset).unwrap_or(data.len());
                let end = start.saturating_add(want).min(data.len());
                let slice = data.slice(start.min(end)..end);
                let next_offset = offset + slice.len() as u64;
                Block {
                    data: BlockData::Shared(slice),
                    next_offset,
                }
            }
            Payload::Streamed(pool) => {
                let mut buffer = pool.acquire(want);
                let len = read_at(&self.source_path, offset, &mut buffer[..want]);
                Block {
                    data: BlockData::Pooled { buffer, len },
                    next_offset: offset + len as u64,
                }
            }
        }
    }

    /// Hand back a buffer obtained from [`Self::read_range`]
    pub fn release(&self, buffer: Vec<u8>) {
        if let Payload::Streamed(pool) = &self.payload {
            pool.release(buffer);
        }
    }

    /// Whether the transmitted bytes are gzip-encoded
    pub fn precompressed(&self) -> bool {
        matches!(self.payload, Payload::Buffered(_))
    }

    /// Whether the resource is served with a long-lived cache directive
    /// instead of a validator
    pub fn long_lived(&self) -> bool {
        matches!(self.payload, Payload::Streamed(_))
    }

    pub fn kind(&self) -> ResourceKind {
        match self.payload {
            Payload::Buffered(_) => ResourceKind::Buffered,
            Payload::Streamed(_) => ResourceKind::Streamed,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn url_hash(&self) -> &str {
        &self.url_hash
    }

    /// MD5 of the raw file bytes, lower-case hex
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Number of bytes transmitted (compressed size for buffered resources)
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Size of the file on disk when it was loaded
    pub const fn source_length(&self) -> u64 {
        self.source_length
    }

    pub const fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Buffers parked in the streamed pool (always 0 for buffered resources)
    pub fn pooled_buffers(&self) -> usize {
        match &self.payload {
            Payload::Buffered(_) => 0,
            Payload::Streamed(pool) => pool.available(),
        }
    }
}

impl fmt::Debug for FileResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileResource")
            .field("url", &self.url)
            .field("kind", &self.kind())
            .field("content_hash", &self.content_hash)
            .field("source_path", &self.source_path)
            .field("length", &self.length)
            .field("source_length", &self.source_length)
            .finish_non_exhaustive()
    }
}

/// Feed the file to `sink` in fixed-size chunks, returning the byte count
fn read_chunks<F>(mut file: File, path: &Path, mut sink: F) -> Result<u64>
where
    F: FnMut(&[u8]) -> io::Result<()>,
{
    let mut chunk = vec![0; LOAD_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = match file.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ResourceError::io(path, e)),
        };
        sink(&chunk[..read]).map_err(|e| ResourceError::io(path, e))?;
        total += read as u64;
    }
    Ok(total)
}

/// Fill `buf` from `offset`, stopping early at EOF or on error.
/// Errors are logged; whatever was read is kept.
fn read_at(path: &Path, offset: u64, buf: &mut [u8]) -> usize {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            logger::log_error(&format!("Failed to open '{}': {e}", path.display()));
            return 0;
        }
    };
    if let Err(e) = file.seek(SeekFrom::Start(offset)) {
        logger::log_error(&format!(
            "Failed to seek '{}' to {offset}: {e}",
            path.display()
        ));
        return 0;
    }

    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                logger::log_error(&format!(
                    "Short read on '{}' at {}: {e}",
                    path.display(),
                    offset + filled as u64
                ));
                break;
            }
        }
    }
    filled
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn md5_hex(data: &[u8]) -> String {
        to_hex(&Md5::digest(data))
    }

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    fn collect(resource: &FileResource, size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offset = 0;
        loop {
            let block = resource.read_range(offset, size);
            if block.is_empty() {
                break;
            }
            out.extend_from_slice(block.as_slice());
            offset = block.next_offset;
            if let BlockData::Pooled { buffer, .. } = block.data {
                resource.release(buffer);
            }
        }
        out
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x00, 0xab, 0x0f]), "00ab0f");
    }

    #[test]
    fn test_buffered_load() {
        let dir = TempDir::new().unwrap();
        let content = b"body { color: red; }\n".repeat(200);
        let path = write_file(&dir, "site.css", &content);

        let resource = FileResource::load(&path, "/site.css", ResourceKind::Buffered, 4).unwrap();
        assert!(resource.precompressed());
        assert!(!resource.long_lived());
        assert_eq!(resource.content_hash(), md5_hex(&content));
        assert_eq!(resource.url_hash(), md5_hex(b"/site.css"));
        assert_eq!(resource.name(), "site.css");
        assert_eq!(resource.source_length(), content.len() as u64);
        assert!(resource.length() < resource.source_length());

        let payload = collect(&resource, 64);
        assert_eq!(payload.len() as u64, resource.length());
        assert_eq!(gunzip(&payload), content);
    }

    #[test]
    fn test_empty_file_buffered() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.js", b"");
        let resource = FileResource::load(&path, "/empty.js", ResourceKind::Buffered, 4).unwrap();
        assert_eq!(resource.content_hash(), md5_hex(b""));
        assert!(gunzip(&collect(&resource, 16)).is_empty());
    }

    #[test]
    fn test_streamed_load() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let path = write_file(&dir, "photo.jpg", &content);

        let resource = FileResource::load(&path, "/photo.jpg", ResourceKind::Streamed, 4).unwrap();
        assert!(!resource.precompressed());
        assert!(resource.long_lived());
        assert_eq!(resource.length(), content.len() as u64);
        assert_eq!(resource.content_hash(), md5_hex(&content));
        assert_eq!(collect(&resource, 1000), content);
    }

    #[test]
    fn test_read_range_lengths() {
        let dir = TempDir::new().unwrap();
        let content = b"0123456789".repeat(10);
        let path = write_file(&dir, "data.png", &content);

        for kind in [ResourceKind::Buffered, ResourceKind::Streamed] {
            let resource = FileResource::load(&path, "/data.png", kind, 4).unwrap();
            let length = resource.length();
            for (offset, size) in [(0u64, 7usize), (length - 3, 10), (length - 1, 1), (5, 0)] {
                let block = resource.read_range(offset, size);
                let expected = size.min((length - offset) as usize);
                assert_eq!(block.len(), expected, "{kind:?} offset={offset} size={size}");
                assert_eq!(block.next_offset, offset + block.len() as u64);
            }
            for offset in [length, length + 10] {
                let block = resource.read_range(offset, 8);
                assert!(block.is_empty());
                assert_eq!(block.next_offset, offset);
            }
        }
    }

    #[test]
    fn test_streamed_pool_reuse_with_smaller_request() {
        let dir = TempDir::new().unwrap();
        let content = vec![7u8; 100];
        let path = write_file(&dir, "big.gif", &content);
        let resource = FileResource::load(&path, "/big.gif", ResourceKind::Streamed, 4).unwrap();

        let first = resource.read_range(0, 64);
        let BlockData::Pooled { buffer, len } = first.data else {
            panic!("expected pooled block");
        };
        assert_eq!(len, 64);
        let ptr = buffer.as_ptr();
        resource.release(buffer);
        assert_eq!(resource.pooled_buffers(), 1);

        // recycled buffer is larger than the request; only 10 bytes come back
        let second = resource.read_range(64, 10);
        assert_eq!(second.len(), 10);
        assert_eq!(resource.pooled_buffers(), 0);
        let BlockData::Pooled { buffer, .. } = second.data else {
            panic!("expected pooled block");
        };
        assert_eq!(buffer.as_ptr(), ptr);
        resource.release(buffer);
    }

    #[test]
    fn test_streamed_short_read_after_truncation() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "shrink.jpg", &[1u8; 50]);
        let resource = FileResource::load(&path, "/shrink.jpg", ResourceKind::Streamed, 4).unwrap();
        std::fs::write(&path, [1u8; 20]).unwrap();

        let block = resource.read_range(10, 30);
        assert_eq!(block.len(), 10);
        assert_eq!(block.next_offset, 20);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = FileResource::load(
            &dir.path().join("gone.css"),
            "/gone.css",
            ResourceKind::Buffered,
            4,
        )
        .unwrap_err();
        assert!(matches!(err, ResourceError::Io { .. }));
        assert!(err.to_string().contains("gone.css"));
    }
}
