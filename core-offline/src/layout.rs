//! On-disk layout of encrypted artifacts and decrypted temp files.

use crate::config::OfflineConfig;
use crate::error::{OfflineError, Result};
use bridge_traits::storage::FileSystemAccess;
use core_library::models::ContentId;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved artifact directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    secure_dir: PathBuf,
    temp_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(secure_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            secure_dir: secure_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    /// Places encrypted artifacts under the app data dir and temp files
    /// under the app cache dir.
    pub async fn resolve(fs: &dyn FileSystemAccess, config: &OfflineConfig) -> Result<Self> {
        let data_dir = fs
            .get_data_directory()
            .await
            .map_err(|e| OfflineError::storage("Failed to resolve data directory", e))?;
        let cache_dir = fs
            .get_cache_directory()
            .await
            .map_err(|e| OfflineError::storage("Failed to resolve cache directory", e))?;

        Ok(Self::new(
            data_dir.join(&config.secure_dir_name),
            cache_dir.join(&config.temp_dir_name),
        ))
    }

    /// Creates both directories if missing.
    pub async fn ensure_directories(&self, fs: &dyn FileSystemAccess) -> Result<()> {
        for dir in [&self.secure_dir, &self.temp_dir] {
            fs.create_dir_all(dir)
                .await
                .map_err(|e| OfflineError::storage("Failed to create directory", e))?;
            debug!(path = ?dir, "Directory ready");
        }
        Ok(())
    }

    pub fn secure_dir(&self) -> &Path {
        &self.secure_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// `secure_content/content_<id>_encrypted.<ext>`
    pub fn encrypted_path(&self, id: &ContentId, extension: &str) -> PathBuf {
        self.secure_dir
            .join(format!("content_{}_encrypted.{}", encode_id(id), extension))
    }

    /// `temp_content/temp_<id>.<ext>`
    pub fn temp_path(&self, id: &ContentId, extension: &str) -> PathBuf {
        self.temp_dir
            .join(format!("temp_{}.{}", encode_id(id), extension))
    }
}

/// File-name form of a content id.
///
/// `[A-Za-z0-9-]` pass through; every other byte of the UTF-8 id, `_`
/// included, becomes `_XX` (uppercase hex). `_` only ever starts an escape,
/// so distinct ids always get distinct names. The empty id maps to `_`.
pub fn encode_id(id: &ContentId) -> String {
    let raw = id.as_str();
    if raw.is_empty() {
        return "_".to_string();
    }

    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("_{:02X}", byte));
        }
    }
    encoded
}
