//! # Secure Reader
//!
//! Decrypts stored artifacts into short-lived plaintext temp files.
//!
//! Temp files are handed out as [`DecryptedFile`] leases. A lease deletes its
//! file when released (or dropped), and leases for the same content share one
//! file that is deleted with the last of them. [`SecureReader::clear_temp_files`]
//! is only a safety net for files left behind by a crash.

use crate::cipher::{CipherSource, ContentCipher};
use crate::config::OfflineConfig;
use crate::error::{OfflineError, Result};
use crate::layout::StorageLayout;
use bridge_traits::error::BridgeError;
use bridge_traits::storage::FileSystemAccess;
use core_async::io::AsyncWriteExt;
use core_async::sync::Mutex as AsyncMutex;
use core_library::models::{ContentDownloadRecord, ContentId};
use core_runtime::events::{ContentEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Lease count for one temp file. Its lock is held while the file is
/// decrypted, shared, deleted or swept.
type Slot = Arc<AsyncMutex<usize>>;

/// Shared lease bookkeeping, one slot per temp file path.
///
/// The table lock is only taken to look slots up. Work on a file happens
/// under that file's own slot, so a decrypt of one item never waits on
/// another item's decrypt, release or sweep.
struct TempLeases {
    file_system: Arc<dyn FileSystemAccess>,
    event_bus: Arc<EventBus>,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl TempLeases {
    fn new(file_system: Arc<dyn FileSystemAccess>, event_bus: Arc<EventBus>) -> Self {
        Self {
            file_system,
            event_bus,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Slot for `path`, created on first use.
    fn slot(&self, path: &Path) -> Slot {
        let mut slots = self.slots.lock();
        let slot = slots
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(AsyncMutex::new(0)));
        Arc::clone(slot)
    }

    fn existing_slot(&self, path: &Path) -> Option<Slot> {
        self.slots.lock().get(path).cloned()
    }

    /// Drops the slot for `path` if it has no leases and no other holder.
    ///
    /// Slots are only cloned under the table lock, so a strong count of two
    /// (table plus `slot`) means nobody else can be waiting on it.
    fn forget_if_idle(&self, path: &Path, slot: Slot) {
        let mut slots = self.slots.lock();
        let idle = slots
            .get(path)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
            && Arc::strong_count(&slot) == 2
            && slot.try_lock().is_ok_and(|count| *count == 0);
        if idle {
            slots.remove(path);
        }
    }

    async fn release(&self, path: &Path, content_id: &ContentId) -> Result<()> {
        let Some(slot) = self.existing_slot(path) else {
            return Ok(());
        };

        let mut count = slot.lock().await;
        if !decrement(&mut count) {
            return Ok(());
        }
        let deleted = self.file_system.delete_file(path).await;
        drop(count);
        self.forget_if_idle(path, slot);

        deleted.map_err(|e| OfflineError::storage("Failed to delete temp file", e))?;

        debug!(content_id = %content_id, "Temp file released");
        self.event_bus
            .emit(CoreEvent::Content(ContentEvent::TempFileReleased {
                content_id: content_id.to_string(),
            }))
            .ok();
        Ok(())
    }

    /// Paths with at least one live lease.
    async fn leased(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
        let mut leased = 0;
        for slot in slots {
            if *slot.lock().await > 0 {
                leased += 1;
            }
        }
        leased
    }
}

/// Decrements the lease count; returns `true` when the last lease went away.
fn decrement(count: &mut usize) -> bool {
    if *count == 0 {
        return false;
    }
    *count -= 1;
    *count == 0
}

/// Lease on a decrypted temp file.
///
/// Call [`DecryptedFile::release`] when the consumer is done. Dropping an
/// unreleased lease schedules the deletion on the current runtime.
pub struct DecryptedFile {
    path: PathBuf,
    content_id: ContentId,
    leases: Arc<TempLeases>,
    released: bool,
}

impl DecryptedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    /// Deletes the temp file once no other lease refers to it.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.leases.release(&self.path, &self.content_id).await
    }
}

impl std::fmt::Debug for DecryptedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedFile")
            .field("path", &self.path)
            .field("content_id", &self.content_id)
            .finish()
    }
}

impl Drop for DecryptedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let leases = Arc::clone(&self.leases);
        let path = std::mem::take(&mut self.path);
        let content_id = self.content_id.clone();

        match core_async::runtime::try_current() {
            Some(handle) => {
                handle.spawn(async move {
                    if let Err(e) = leases.release(&path, &content_id).await {
                        warn!(error = %e, "Failed to release dropped temp file");
                    }
                });
            }
            None => {
                // Outside a runtime: only proceed if nothing holds the slot.
                let Some(slot) = leases.existing_slot(&path) else {
                    return;
                };
                let last = match slot.try_lock() {
                    Ok(mut count) => decrement(&mut count),
                    Err(_) => false,
                };
                if last {
                    std::fs::remove_file(&path).ok();
                    leases.forget_if_idle(&path, slot);
                }
            }
        }
    }
}

/// Decrypts downloaded artifacts for playback or viewing.
pub struct SecureReader {
    config: OfflineConfig,
    file_system: Arc<dyn FileSystemAccess>,
    cipher: Arc<ContentCipher>,
    layout: Arc<StorageLayout>,
    event_bus: Arc<EventBus>,
    leases: Arc<TempLeases>,
}

impl SecureReader {
    pub fn new(
        config: OfflineConfig,
        file_system: Arc<dyn FileSystemAccess>,
        cipher: ContentCipher,
        layout: StorageLayout,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let leases = Arc::new(TempLeases::new(
            Arc::clone(&file_system),
            Arc::clone(&event_bus),
        ));

        Self {
            config,
            file_system,
            cipher: Arc::new(cipher),
            layout: Arc::new(layout),
            event_bus,
            leases,
        }
    }

    /// Decrypts `record` into `temp_content/temp_<id>.<ext>`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no encrypted file exists for the record
    /// - `CorruptArtifact` if the file is truncated or fails the integrity check
    /// - `Storage` if reading or writing fails
    ///
    /// No partially written temp file is left behind on error.
    #[instrument(skip(self, record), fields(content_id = %record.id))]
    pub async fn get_decrypted_file(&self, record: &ContentDownloadRecord) -> Result<DecryptedFile> {
        let source = record
            .encrypted_path()
            .ok_or_else(|| {
                OfflineError::NotFound(format!("No encrypted file recorded for {}", record.id))
            })?
            .to_path_buf();

        let exists = self
            .file_system
            .exists(&source)
            .await
            .map_err(|e| OfflineError::storage("Failed to check encrypted file", e))?;
        if !exists {
            return Err(OfflineError::NotFound(format!(
                "Encrypted file missing for {}",
                record.id
            )));
        }

        let target = self.layout.temp_path(&record.id, record.file_extension());
        let slot = self.leases.slot(&target);
        let mut count = slot.lock().await;

        if *count > 0 {
            *count += 1;
            debug!(leases = *count, "Sharing existing temp file");
            return Ok(self.lease(target, record));
        }

        if let Err(e) = self.decrypt_into(&source, &target, record).await {
            if let Err(cleanup) = self.file_system.delete_file(&target).await {
                warn!(error = %cleanup, "Failed to remove partial temp file");
            }
            drop(count);
            self.leases.forget_if_idle(&target, slot);
            warn!(error = %e, "Decryption failed");
            return Err(e);
        }

        *count = 1;
        info!("Content decrypted to temp file");
        Ok(self.lease(target, record))
    }

    /// Deletes every file in `temp_content/` that no live lease refers to.
    #[instrument(skip(self))]
    pub async fn clear_temp_files(&self) -> Result<usize> {
        let temp_dir = self.layout.temp_dir();
        let exists = self
            .file_system
            .exists(temp_dir)
            .await
            .map_err(|e| OfflineError::storage("Failed to check temp directory", e))?;
        if !exists {
            return Ok(0);
        }

        let entries = self
            .file_system
            .list_directory(temp_dir)
            .await
            .map_err(|e| OfflineError::storage("Failed to list temp directory", e))?;

        let mut cleared = 0;
        for entry in entries {
            // Waits out a decrypt of this same file, then sees its lease.
            let slot = self.leases.slot(&entry);
            let count = slot.lock().await;
            if *count > 0 {
                continue;
            }

            let deleted = self.file_system.delete_file(&entry).await;
            drop(count);
            self.leases.forget_if_idle(&entry, slot);

            match deleted {
                Ok(()) => cleared += 1,
                Err(e) => warn!(path = ?entry, error = %e, "Failed to delete temp file"),
            }
        }

        if cleared > 0 {
            info!(cleared, "Cleared leftover temp files");
            self.event_bus
                .emit(CoreEvent::Content(ContentEvent::TempFilesCleared { count: cleared }))
                .ok();
        }

        Ok(cleared)
    }

    /// Number of temp files currently leased.
    pub async fn active_leases(&self) -> usize {
        self.leases.leased().await
    }

    fn lease(&self, path: PathBuf, record: &ContentDownloadRecord) -> DecryptedFile {
        DecryptedFile {
            path,
            content_id: record.id.clone(),
            leases: Arc::clone(&self.leases),
            released: false,
        }
    }

    async fn decrypt_into(
        &self,
        source: &Path,
        target: &Path,
        record: &ContentDownloadRecord,
    ) -> Result<()> {
        let reader = self
            .file_system
            .open_read_stream(source)
            .await
            .map_err(|e| match e {
                BridgeError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    OfflineError::NotFound(format!("Encrypted file missing for {}", record.id))
                }
                other => OfflineError::storage("Failed to open encrypted file", other),
            })?;
        let mut plaintext = CipherSource::open(reader, &self.cipher).await?;

        self.file_system
            .create_dir_all(self.layout.temp_dir())
            .await
            .map_err(|e| OfflineError::storage("Failed to create temp directory", e))?;
        let mut writer = self
            .file_system
            .open_write_stream(target)
            .await
            .map_err(|e| OfflineError::storage("Failed to create temp file", e))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.config.chunk_size];
        let mut written: u64 = 0;

        loop {
            let n = plaintext.read_chunk(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            writer
                .write_all(&buffer[..n])
                .await
                .map_err(|e| OfflineError::storage("Failed to write temp file", e))?;
            written += n as u64;
        }

        writer
            .shutdown()
            .await
            .map_err(|e| OfflineError::storage("Failed to close temp file", e))?;

        if let Some(expected) = record.total_bytes {
            if written != expected.max(0) as u64 {
                return Err(OfflineError::CorruptArtifact(format!(
                    "Expected {} bytes, decrypted {}",
                    expected, written
                )));
            }
        }

        if self.config.verify_integrity {
            if let Some(expected) = &record.content_hash {
                let actual = hex::encode(hasher.finalize());
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(OfflineError::CorruptArtifact(
                        "Integrity check failed".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;

    fn leases() -> TempLeases {
        TempLeases::new(
            Arc::new(TokioFileSystem::with_directories(
                std::env::temp_dir(),
                std::env::temp_dir(),
            )),
            Arc::new(EventBus::new(16)),
        )
    }

    #[test]
    fn test_decrement_counts_down_to_zero() {
        let mut count = 2;
        assert!(!decrement(&mut count));
        assert_eq!(count, 1);
        assert!(decrement(&mut count));
        assert!(!decrement(&mut count));
        assert_eq!(count, 0);
    }

    #[test]
    fn test_slot_is_forgotten_only_when_idle() {
        let leases = leases();
        let path = PathBuf::from("/tmp/temp_a.mp4");

        let slot = leases.slot(&path);
        let waiter = leases.slot(&path);
        leases.forget_if_idle(&path, slot);
        assert!(leases.existing_slot(&path).is_some());

        *waiter.try_lock().unwrap() = 1;
        leases.forget_if_idle(&path, waiter);
        assert!(leases.existing_slot(&path).is_some());

        let slot = leases.slot(&path);
        *slot.try_lock().unwrap() = 0;
        leases.forget_if_idle(&path, slot);
        assert!(leases.existing_slot(&path).is_none());
    }
}
