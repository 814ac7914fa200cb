//! # Player Bridge
//!
//! Hands decrypted content to the host player or document viewer and ties the
//! temp file's lifetime to the host session.

use crate::error::{OfflineError, Result};
use crate::reader::{DecryptedFile, SecureReader};
use bridge_traits::media::{
    DocumentViewer, MediaKind, MediaPlayer, PlaybackSessionId, ViewerSessionId,
};
use core_async::task::JoinHandle;
use core_library::models::{ContentDownloadRecord, ContentType};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A playback session backed by a leased temp file.
#[derive(Debug)]
pub struct PlaybackSession {
    pub session_id: PlaybackSessionId,
    /// Completes after the temp file was released.
    pub released: JoinHandle<()>,
}

/// A viewer session backed by a leased temp file.
#[derive(Debug)]
pub struct ViewerSession {
    pub session_id: ViewerSessionId,
    /// Completes after the temp file was released.
    pub released: JoinHandle<()>,
}

/// Connects the secure reader to host media surfaces.
pub struct PlayerBridge {
    reader: Arc<SecureReader>,
    player: Arc<dyn MediaPlayer>,
    viewer: Arc<dyn DocumentViewer>,
}

impl PlayerBridge {
    pub fn new(
        reader: Arc<SecureReader>,
        player: Arc<dyn MediaPlayer>,
        viewer: Arc<dyn DocumentViewer>,
    ) -> Self {
        Self {
            reader,
            player,
            viewer,
        }
    }

    /// Decrypts and starts playback of audio or video content.
    ///
    /// The temp file is released when playback reaches a terminal state or the
    /// host closes the state stream.
    #[instrument(skip(self, record), fields(content_id = %record.id))]
    pub async fn play(&self, record: &ContentDownloadRecord) -> Result<PlaybackSession> {
        let kind = match record.content_type {
            ContentType::Video => MediaKind::Video,
            ContentType::Audio => MediaKind::Audio,
            other => {
                return Err(OfflineError::InvalidRequest(format!(
                    "{} content cannot be played",
                    other
                )))
            }
        };

        let file = self.reader.get_decrypted_file(record).await?;

        let opened = async {
            let session_id = self.player.open(file.path(), kind).await?;
            let states = self.player.subscribe_state(session_id).await?;
            Ok::<_, bridge_traits::error::BridgeError>((session_id, states))
        }
        .await;

        let (session_id, mut states) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                release_quietly(file).await;
                return Err(OfflineError::InvalidRequest(format!(
                    "Player rejected content: {}",
                    e
                )));
            }
        };

        let released = core_async::task::spawn(async move {
            while let Some(state) = states.next().await {
                if state.is_terminal() {
                    debug!(state = ?state, "Playback finished");
                    break;
                }
            }
            release_quietly(file).await;
        });

        Ok(PlaybackSession {
            session_id,
            released,
        })
    }

    /// Decrypts and opens a document. The temp file is released when the
    /// viewer reports it closed.
    #[instrument(skip(self, record), fields(content_id = %record.id))]
    pub async fn view_document(&self, record: &ContentDownloadRecord) -> Result<ViewerSession> {
        let file = self.reader.get_decrypted_file(record).await?;

        let session_id = match self.viewer.open(file.path()).await {
            Ok(session_id) => session_id,
            Err(e) => {
                release_quietly(file).await;
                return Err(OfflineError::InvalidRequest(format!(
                    "Viewer rejected document: {}",
                    e
                )));
            }
        };

        let viewer = Arc::clone(&self.viewer);
        let released = core_async::task::spawn(async move {
            if let Err(e) = viewer.closed(session_id).await {
                warn!(error = %e, "Viewer session ended with an error");
            }
            release_quietly(file).await;
        });

        Ok(ViewerSession {
            session_id,
            released,
        })
    }
}

async fn release_quietly(file: DecryptedFile) {
    let content_id = file.content_id().clone();
    if let Err(e) = file.release().await {
        warn!(content_id = %content_id, error = %e, "Failed to release temp file");
    }
}
