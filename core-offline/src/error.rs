//! # Offline Content Error Types

use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use core_runtime::events::DownloadFailureKind;
use thiserror::Error;

/// Errors raised by downloads, decryption and artifact management.
#[derive(Error, Debug)]
pub enum OfflineError {
    // ========================================================================
    // Transfer Errors
    // ========================================================================
    /// The source could not be opened, dropped mid-stream or came up short.
    #[error("Network error: {0}")]
    Network(String),

    /// The download was cancelled or superseded.
    #[error("Download cancelled")]
    Cancelled,

    // ========================================================================
    // Artifact Errors
    // ========================================================================
    /// Key handling or keystream setup failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The encrypted file is truncated or does not match its recorded hash.
    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// No encrypted file exists for the requested content.
    #[error("Content not found: {0}")]
    NotFound(String),

    /// Reading, writing or deleting a local file failed.
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Request/Config Errors
    // ========================================================================
    /// Record persistence failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] LibraryError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OfflineError {
    /// Wraps a file system failure with `context`.
    pub(crate) fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        OfflineError::Storage(format!("{}: {}", context, err))
    }

    /// Wraps a failure to open the network source.
    pub(crate) fn from_http(err: BridgeError) -> Self {
        OfflineError::Network(err.to_string())
    }

    /// Wraps an I/O error hit while reading the network body.
    pub(crate) fn network_io(err: std::io::Error) -> Self {
        OfflineError::Network(format!("Stream interrupted: {}", err))
    }

    /// Discriminant published with `DownloadEvent::Failed`.
    pub fn kind(&self) -> DownloadFailureKind {
        match self {
            OfflineError::Network(_) => DownloadFailureKind::Network,
            OfflineError::Crypto(_) | OfflineError::CorruptArtifact(_) => {
                DownloadFailureKind::Crypto
            }
            OfflineError::Storage(_) | OfflineError::NotFound(_) => DownloadFailureKind::Storage,
            OfflineError::Persistence(_) => DownloadFailureKind::Persistence,
            OfflineError::Cancelled
            | OfflineError::InvalidRequest(_)
            | OfflineError::InvalidConfig(_) => DownloadFailureKind::InvalidRequest,
        }
    }

    /// Cancellation is expected control flow and never shown to the user.
    pub fn is_user_visible(&self) -> bool {
        !self.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OfflineError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OfflineError::NotFound(_))
    }
}

/// Result type for offline content operations.
pub type Result<T> = std::result::Result<T, OfflineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            OfflineError::Network("reset".into()).kind(),
            DownloadFailureKind::Network
        );
        assert_eq!(
            OfflineError::CorruptArtifact("short".into()).kind(),
            DownloadFailureKind::Crypto
        );
        assert_eq!(
            OfflineError::Storage("disk full".into()).kind(),
            DownloadFailureKind::Storage
        );
        assert_eq!(
            OfflineError::Persistence(LibraryError::Migration("x".into())).kind(),
            DownloadFailureKind::Persistence
        );
    }

    #[test]
    fn test_cancelled_is_not_user_visible() {
        assert!(!OfflineError::Cancelled.is_user_visible());
        assert!(OfflineError::NotFound("a".into()).is_user_visible());
    }

    #[test]
    fn test_http_errors_are_network_faults() {
        let err = OfflineError::from_http(BridgeError::HttpStatus {
            url: "https://cdn.example.com/a".into(),
            status: 404,
        });
        assert_eq!(err.kind(), DownloadFailureKind::Network);
        assert!(err.to_string().contains("404"));
    }
}
