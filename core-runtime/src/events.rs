//! # Event Bus System
//!
//! Broadcast channel that carries download progress and content lifecycle
//! notifications from the offline core to the UI layer.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps [`DownloadEvent`] and [`ContentEvent`]
//! - **EventBus**: central `broadcast` channel, cheap to clone
//! - **EventStream**: receiver wrapper with an optional predicate
//!
//! ```text
//! ┌──────────────┐   emit   ┌───────────┐  subscribe  ┌─────────────┐
//! │ DownloadJob  ├─────────>│           ├────────────>│ Course list │
//! └──────────────┘          │ EventBus  │             └─────────────┘
//! ┌──────────────┐   emit   │           │  subscribe  ┌─────────────┐
//! │ SecureReader ├─────────>│           ├────────────>│ Player UI   │
//! └──────────────┘          └───────────┘             └─────────────┘
//! ```
//!
//! ## Ordering
//!
//! A download job is the only emitter for its content id, so events for one id
//! arrive in emission order: zero or more `Progress` events with non-decreasing
//! percentages, then exactly one `Completed` or `Failed`. A cancelled job emits
//! no terminal event.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DownloadEvent, DownloadProgress, EventBus};
//!
//! # core_async::runtime::block_on(async {
//! let bus = EventBus::new(64);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Download(DownloadEvent::Progress {
//!     content_id: "42".into(),
//!     progress: DownloadProgress::Percent { percent: 40 },
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Download(_))));
//! # });
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell `n` events behind. Progress
//!   is lossy by nature, so subscribers should keep reading.
//! - **`RecvError::Closed`**: every sender is gone; treat it as shutdown.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Progress is deduplicated per percent, so one download produces at most
/// about a hundred events.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Download job progress and completion
    Download(DownloadEvent),
    /// Stored content and temp file lifecycle
    Content(ContentEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Download(e) => e.description(),
            CoreEvent::Content(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Content(ContentEvent::Deleted { .. }) => EventSeverity::Info,
            CoreEvent::Content(ContentEvent::OrphansCleaned { count })
            | CoreEvent::Content(ContentEvent::TempFilesCleared { count })
                if *count > 0 =>
            {
                EventSeverity::Warning
            }
            _ => EventSeverity::Debug,
        }
    }

    /// Content id the event refers to, if it is about a single item.
    pub fn content_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Download(e) => Some(e.content_id()),
            CoreEvent::Content(ContentEvent::Deleted { content_id })
            | CoreEvent::Content(ContentEvent::TempFileReleased { content_id }) => {
                Some(content_id)
            }
            CoreEvent::Content(_) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Download Events
// ============================================================================

/// Progress of a single download.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadProgress {
    /// Total size is known; `percent` is in `0..=100`.
    Percent { percent: u8 },
    /// Source did not report a size.
    Indeterminate { bytes_downloaded: u64 },
}

impl DownloadProgress {
    /// Percentage if the total size is known.
    pub fn percent(&self) -> Option<u8> {
        match self {
            DownloadProgress::Percent { percent } => Some(*percent),
            DownloadProgress::Indeterminate { .. } => None,
        }
    }
}

/// Why a download failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownloadFailureKind {
    Network,
    Crypto,
    Storage,
    Persistence,
    InvalidRequest,
}

/// Events emitted by download jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// A job was registered for `content_id`.
    Queued { content_id: String },
    /// Bytes were written for `content_id`.
    Progress {
        content_id: String,
        progress: DownloadProgress,
    },
    /// The encrypted artifact is complete and recorded.
    Completed {
        content_id: String,
        /// Plaintext bytes received.
        bytes: u64,
    },
    /// The job stopped on an error and cleaned up after itself.
    Failed {
        content_id: String,
        kind: DownloadFailureKind,
        reason: String,
    },
}

impl DownloadEvent {
    pub fn content_id(&self) -> &str {
        match self {
            DownloadEvent::Queued { content_id }
            | DownloadEvent::Progress { content_id, .. }
            | DownloadEvent::Completed { content_id, .. }
            | DownloadEvent::Failed { content_id, .. } => content_id,
        }
    }

    /// `Some(success)` for completion events, `None` otherwise.
    pub fn completion(&self) -> Option<bool> {
        match self {
            DownloadEvent::Completed { .. } => Some(true),
            DownloadEvent::Failed { .. } => Some(false),
            _ => None,
        }
    }

    fn description(&self) -> &str {
        match self {
            DownloadEvent::Queued { .. } => "Download queued",
            DownloadEvent::Progress { .. } => "Download progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
        }
    }
}

// ============================================================================
// Content Events
// ============================================================================

/// Events about stored artifacts and plaintext temp files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ContentEvent {
    /// The user removed a downloaded item.
    Deleted { content_id: String },
    /// Orphan records or unreferenced artifacts were removed.
    OrphansCleaned { count: usize },
    /// A lifecycle-bound temp file was deleted after use.
    TempFileReleased { content_id: String },
    /// The safety-net sweep removed leftover temp files.
    TempFilesCleared { count: usize },
}

impl ContentEvent {
    fn description(&self) -> &str {
        match self {
            ContentEvent::Deleted { .. } => "Content deleted",
            ContentEvent::OrphansCleaned { .. } => "Orphaned downloads cleaned",
            ContentEvent::TempFileReleased { .. } => "Temporary file released",
            ContentEvent::TempFilesCleared { .. } => "Temporary files cleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning shares the underlying channel. Sending never blocks; subscribers
/// that fall behind get `RecvError::Lagged` instead of slowing the sender.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening. Emitters usually discard that error with `.ok()`.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let stream = EventStream::new(bus.subscribe()).for_content("42");
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only yield events about `content_id`.
    pub fn for_content(self, content_id: impl Into<String>) -> Self {
        let content_id = content_id.into();
        self.filter(move |event| event.content_id() == Some(content_id.as_str()))
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
