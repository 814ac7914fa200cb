//! Presentation bridges for decrypted content.
//!
//! The core hands a plaintext temp file to the host's player or viewer and
//! needs to learn when the host is done with it, so the file can be deleted
//! as soon as it is no longer in use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::Result;

/// Kind of media handed to a [`MediaPlayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Unique identifier for playback sessions managed by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for document viewer sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerSessionId(Uuid);

impl ViewerSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewerSessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Playback lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Preparing,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error { message: String },
}

impl PlaybackState {
    /// Terminal states release the session's file.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackState::Stopped | PlaybackState::Ended | PlaybackState::Error { .. }
        )
    }
}

/// Stream of state changes for one playback session.
#[async_trait]
pub trait PlaybackStateStream: Send {
    /// Next state, `None` once the host tears the session down.
    async fn next(&mut self) -> Option<PlaybackState>;
}

/// Host media player (ExoPlayer, AVPlayer, a desktop widget, ...).
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Start playing the file at `path`.
    async fn open(&self, path: &Path, kind: MediaKind) -> Result<PlaybackSessionId>;

    /// Subscribe to the state changes of a session opened with [`MediaPlayer::open`].
    async fn subscribe_state(
        &self,
        session: PlaybackSessionId,
    ) -> Result<Box<dyn PlaybackStateStream>>;
}

/// Host document viewer.
#[async_trait]
pub trait DocumentViewer: Send + Sync {
    /// Present the document at `path`.
    async fn open(&self, path: &Path) -> Result<ViewerSessionId>;

    /// Resolves when the user closes the viewer for `session`.
    async fn closed(&self, session: ViewerSessionId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PlaybackState::Ended.is_terminal());
        assert!(PlaybackState::Stopped.is_terminal());
        assert!(PlaybackState::Error {
            message: "decoder".into()
        }
        .is_terminal());
        assert!(!PlaybackState::Paused.is_terminal());
        assert!(!PlaybackState::Playing.is_terminal());
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(PlaybackSessionId::new(), PlaybackSessionId::new());
        assert_ne!(ViewerSessionId::new(), ViewerSessionId::new());
    }
}
