//! # Offline Content Module
//!
//! Downloads course content, stores it encrypted and hands out short-lived
//! decrypted copies for playback.
//!
//! ## Overview
//!
//! This module handles:
//! - Download jobs with supersession, cancellation and progress reporting
//! - AES-256-CTR stream encryption with a per-install key
//! - Decryption into lifecycle-bound temp files and host player integration
//! - Orphan cleanup and temp file sweeps

pub mod cipher;
pub mod config;
pub mod download;
pub mod error;
pub mod keys;
pub mod layout;
pub mod lifecycle;
pub mod player;
pub mod reader;
pub mod service;

pub use cipher::{CipherSink, CipherSource, ContentCipher, EncryptionKey};
pub use config::OfflineConfig;
pub use download::{DownloadHandle, DownloadManager, DownloadOutcome, DownloadState};
pub use error::{OfflineError, Result};
pub use keys::{ContentKeyProvider, ProvisionedKey};
pub use layout::StorageLayout;
pub use lifecycle::spawn_lifecycle_sweeper;
pub use player::{PlaybackSession, PlayerBridge, ViewerSession};
pub use reader::{DecryptedFile, SecureReader};
pub use service::OfflineContent;
