//! Static resource serving module
//!
//! Resolves a request against the resource index and turns the resource into
//! a response: conditional 304, compression and cache headers, and a chunked
//! body pulled from the resource range by range.

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use hyper::Response;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::center::{Origin, Resolution, ResourceCenter};
use crate::handler::router::RequestContext;
use crate::http::cache::{check_etag_match, format_etag, CachePolicy};
use crate::http::response::{empty, log_build_error};
use crate::http::{self, ResponseBody};
use crate::logger;
use crate::resource::{BlockData, FileResource};

/// Attached to responses for the access log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServedResource {
    pub cache_status: &'static str,
    /// Bytes the body will carry (0 for 304 and HEAD)
    pub body_bytes: u64,
}

/// Resolve `ctx.path` and respond.
///
/// Index hits are answered inline; anything that may touch the disk runs on
/// the blocking pool.
pub async fn serve(center: &Arc<ResourceCenter>, ctx: &RequestContext<'_>) -> Response<ResponseBody> {
    let resolution = match center.resolve_cached(ctx.path) {
        Some(resolution) => resolution,
        None => {
            let center = Arc::clone(center);
            let path = ctx.path.to_owned();
            match tokio::task::spawn_blocking(move || center.resolve(&path)).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    logger::log_error(&format!("Resolve task for '{}' failed: {e}", ctx.path));
                    Resolution::NotFound
                }
            }
        }
    };

    match resolution {
        Resolution::Found {
            resource,
            content_type,
            origin,
        } => respond(resource, content_type, origin, ctx, center.chunk_size()),
        Resolution::NotFound => http::build_404_response(),
        Resolution::NotSupported => http::build_415_response(),
    }
}

/// Build the response for a resolved resource
pub fn respond(
    resource: Arc<FileResource>,
    content_type: &'static str,
    origin: Origin,
    ctx: &RequestContext<'_>,
    chunk_size: usize,
) -> Response<ResponseBody> {
    if check_etag_match(ctx.if_none_match.as_deref(), resource.content_hash()) {
        let mut response = http::build_304_response(resource.content_hash());
        response.extensions_mut().insert(ServedResource {
            cache_status: origin.as_str(),
            body_bytes: 0,
        });
        return response;
    }

    let mut builder = Response::builder()
        .status(200)
        .header("Content-Type", content_type)
        .header("Transfer-Encoding", "chunked");
    if resource.precompressed() {
        builder = builder.header("Content-Encoding", "gzip");
    }
    builder = if resource.long_lived() {
        builder.header("Cache-Control", CachePolicy::LONG_LIVED.to_header_value())
    } else {
        builder.header("ETag", format_etag(resource.content_hash()))
    };

    let served = ServedResource {
        cache_status: origin.as_str(),
        body_bytes: if ctx.is_head { 0 } else { resource.length() },
    };
    let body = if ctx.is_head {
        empty()
    } else {
        ResourceStream::new(resource, chunk_size).boxed()
    };

    let mut response = builder.body(body).unwrap_or_else(|e| {
        log_build_error("200", &e);
        Response::new(empty())
    });
    response.extensions_mut().insert(served);
    response
}

/// Response body reading a resource one range at a time
pub struct ResourceStream {
    resource: Arc<FileResource>,
    offset: u64,
    chunk_size: usize,
    done: bool,
}

impl ResourceStream {
    pub fn new(resource: Arc<FileResource>, chunk_size: usize) -> Self {
        Self {
            resource,
            offset: 0,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }

    fn expected_len(&self) -> usize {
        let remaining = self.resource.length().saturating_sub(self.offset);
        self.chunk_size
            .min(usize::try_from(remaining).unwrap_or(usize::MAX))
    }
}

impl Body for ResourceStream {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let expected = this.expected_len();
        let block = this.resource.read_range(this.offset, this.chunk_size);
        let len = block.len();
        if len == 0 {
            this.done = true;
            if let BlockData::Pooled { buffer, .. } = block.data {
                this.resource.release(buffer);
            }
            return Poll::Ready(None);
        }
        // a short disk read ends the body; the client sees a truncated transfer
        if len < expected {
            this.done = true;
        }
        this.offset = block.next_offset;

        let bytes = match block.data {
            BlockData::Shared(bytes) => bytes,
            BlockData::Pooled { buffer, len } => Bytes::from_owner(PooledChunk {
                resource: Arc::clone(&this.resource),
                buffer,
                len,
            }),
        };
        Poll::Ready(Some(Ok(Frame::data(bytes))))
    }

    fn is_end_stream(&self) -> bool {
        self.done || self.offset >= self.resource.length()
    }

    fn size_hint(&self) -> SizeHint {
        // no exact hint: the transfer stays chunked
        let mut hint = SizeHint::new();
        if self.is_end_stream() {
            hint.set_upper(0);
        }
        hint
    }
}

/// Pooled buffer travelling inside a `Bytes`; goes back to the pool on drop
struct PooledChunk {
    resource: Arc<FileResource>,
    buffer: Vec<u8>,
    len: usize,
}

impl AsRef<[u8]> for PooledChunk {
    fn as_ref(&self) -> &[u8] {
        &self.buffer[..self.len]
    }
}

impl Drop for PooledChunk {
    fn drop(&mut self) {
        self.resource.release(std::mem::take(&mut self.buffer));
    }
}
