//! Network Fetch Source
//!
//! The core only ever needs one thing from the network: given a URL, a byte
//! stream and, when the server reports it, the total length. Request building,
//! authentication and REST calls belong to the host application.

use crate::error::Result;
use async_trait::async_trait;
use core_async::io::AsyncRead;
use std::fmt;

/// Boxed reader handed out by [`HttpClient::download_stream`].
pub type DynAsyncRead = dyn AsyncRead + Send + Unpin;

/// An open response body.
pub struct DownloadStream {
    /// Body bytes in arrival order.
    pub reader: Box<DynAsyncRead>,
    /// Total body length if the server advertised one.
    pub content_length: Option<u64>,
}

impl DownloadStream {
    pub fn new(reader: Box<DynAsyncRead>, content_length: Option<u64>) -> Self {
        Self {
            reader,
            content_length,
        }
    }

    /// Stream whose size is unknown up front (chunked transfer, no header).
    pub fn without_length(reader: Box<DynAsyncRead>) -> Self {
        Self::new(reader, None)
    }
}

impl fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Streaming HTTP source.
///
/// Implementations must:
/// - Resolve redirects before returning
/// - Fail with [`BridgeError::HttpStatus`](crate::error::BridgeError::HttpStatus)
///   for non-success responses instead of streaming an error page
/// - Avoid buffering the body; the returned reader must yield bytes as they arrive
///
/// No retry is expected. Callers decide whether to re-issue a failed download.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Open a streaming GET for `url`.
    async fn download_stream(&self, url: String) -> Result<DownloadStream>;
}
