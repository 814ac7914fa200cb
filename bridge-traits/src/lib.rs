//! # Host Bridge Traits
//!
//! Capability contracts the offline content core needs from its host.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Streams remote content as an `AsyncRead` with an optional length
//! - [`FileSystemAccess`](storage::FileSystemAccess) - App-private directories and streaming file I/O
//!
//! ### Security
//! - [`SecureStore`](storage::SecureStore) - Keychain/Keystore style secret persistence
//!
//! ### Presentation
//! - [`MediaPlayer`](media::MediaPlayer) - Plays a decrypted media file and reports its state
//! - [`DocumentViewer`](media::DocumentViewer) - Shows a decrypted document until the user closes it
//!
//! ### Platform Integration
//! - [`LifecycleObserver`](background::LifecycleObserver) - App foreground/background/suspend transitions
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails with a descriptive error when a required capability is
//! missing instead of degrading silently. Desktop builds get defaults from
//! `bridge-desktop`; mobile hosts inject their own adapters.
//!
//! ## Error Handling
//!
//! All traits return [`BridgeError`](error::BridgeError). Implementations convert
//! platform errors into it and keep the failing path or URL in the message.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so adapters can be shared across download
//! tasks behind an `Arc`.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::http::{DownloadStream, HttpClient};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn download_stream(&self, url: String) -> Result<DownloadStream> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod background;
pub mod error;
pub mod http;
pub mod media;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use background::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use http::{DownloadStream, HttpClient};
pub use media::{
    DocumentViewer, MediaKind, MediaPlayer, PlaybackSessionId, PlaybackState, PlaybackStateStream,
    ViewerSessionId,
};
pub use storage::{FileMetadata, FileSystemAccess, SecureStore};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
