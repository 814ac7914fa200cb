//! # Download Manager
//!
//! Streams remote content through the cipher into `secure_content/` and keeps
//! the download records in step with what is on disk.
//!
//! - One active job per content id; a new request supersedes the old job
//! - Optional semaphore cap on concurrent transfers
//! - Cooperative cancellation checked every chunk
//! - Progress on a per-job `watch` channel and on the `EventBus`

use crate::cipher::{CipherSink, ContentCipher};
use crate::config::OfflineConfig;
use crate::download::job::{
    self, DownloadHandle, DownloadState, JobControl, JobRegistry, TerminalGuard,
};
use crate::download::progress::ProgressTracker;
use crate::error::{OfflineError, Result};
use crate::layout::{encode_id, StorageLayout};
use bridge_traits::http::{DownloadStream, HttpClient};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::{Clock, SystemClock};
use core_async::io::AsyncReadExt;
use core_async::sync::Semaphore;
use core_library::models::{ContentDownloadRecord, ContentId, ContentItem, CourseInfo};
use core_library::repositories::DownloadRepository;
use core_runtime::events::{ContentEvent, CoreEvent, DownloadEvent, DownloadProgress, EventBus};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Offline download manager.
pub struct DownloadManager {
    config: OfflineConfig,
    repository: Arc<dyn DownloadRepository>,
    http_client: Arc<dyn HttpClient>,
    file_system: Arc<dyn FileSystemAccess>,
    cipher: Arc<ContentCipher>,
    layout: Arc<StorageLayout>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
    download_permits: Option<Arc<Semaphore>>,
    active_jobs: JobRegistry,
}

impl DownloadManager {
    /// Create a new download manager.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let manager = DownloadManager::new(config, repository, http, fs, cipher, layout)
    ///     .with_event_bus(event_bus)
    ///     .with_clock(clock);
    /// manager.initialize().await?;
    /// ```
    pub fn new(
        config: OfflineConfig,
        repository: Arc<dyn DownloadRepository>,
        http_client: Arc<dyn HttpClient>,
        file_system: Arc<dyn FileSystemAccess>,
        cipher: ContentCipher,
        layout: StorageLayout,
    ) -> Self {
        let download_permits = config
            .max_concurrent_downloads
            .map(|limit| Arc::new(Semaphore::new(limit)));

        Self {
            config,
            repository,
            http_client,
            file_system,
            cipher: Arc::new(cipher),
            layout: Arc::new(layout),
            clock: Arc::new(SystemClock),
            event_bus: Arc::new(EventBus::default()),
            download_permits,
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Set event bus for progress and completion events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Creates the artifact directories.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| OfflineError::InvalidConfig(format!("Invalid offline config: {}", e)))?;

        self.layout.ensure_directories(self.file_system.as_ref()).await?;

        info!(secure_dir = ?self.layout.secure_dir(), "Download manager initialized");
        Ok(())
    }

    /// Starts downloading `item`, superseding any active job for the same id.
    ///
    /// The pending record exists by the time this returns. The transfer itself
    /// runs in a background task; use the returned handle to follow it.
    #[instrument(skip(self, item, course), fields(content_id = %item.id))]
    pub async fn download_content(
        &self,
        item: ContentItem,
        course: CourseInfo,
    ) -> Result<DownloadHandle> {
        item.validate().map_err(OfflineError::InvalidRequest)?;
        course.validate().map_err(OfflineError::InvalidRequest)?;

        let record = ContentDownloadRecord::pending(&item, &course, self.clock.unix_timestamp());
        let control = JobControl::new(item.id.clone());

        let previous = self
            .active_jobs
            .lock()
            .insert(item.id.clone(), Arc::clone(&control));

        if let Some(previous) = &previous {
            info!(previous_job = %previous.job_id(), "Superseding active download");
            previous.supersede();
        }

        if let Err(e) = self.repository.upsert(&record).await {
            error!(error = %e, "Failed to persist pending download record");
            self.unregister(&control);
            let err = OfflineError::from(e);
            control.finish(DownloadState::Failed {
                kind: err.kind(),
                reason: err.to_string(),
            });
            return Err(err);
        }

        self.event_bus
            .emit(CoreEvent::Download(DownloadEvent::Queued {
                content_id: item.id.to_string(),
            }))
            .ok();

        let manager = self.clone_for_task();
        let task_control = Arc::clone(&control);
        core_async::task::spawn(async move {
            let _guard =
                TerminalGuard::new(Arc::clone(&task_control), Arc::clone(&manager.active_jobs));
            let work = manager.run_job(Arc::clone(&task_control), previous, record.clone());
            if AssertUnwindSafe(work).catch_unwind().await.is_err() {
                manager.abandon(&task_control, &record).await;
            }
        });

        debug!(job_id = %control.job_id(), "Download job registered");
        Ok(DownloadHandle::new(control))
    }

    /// Cancels the active job for `id` and waits for its cleanup.
    ///
    /// Returns `false` if no job was active.
    #[instrument(skip(self))]
    pub async fn cancel_download(&self, id: &ContentId) -> Result<bool> {
        let control = self.active_jobs.lock().get(id).cloned();

        match control {
            Some(control) => {
                control.cancel();
                let state = control.wait_terminal().await;
                info!(state = ?state, "Download cancelled");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// True only if the record is flagged downloaded and its file exists now.
    #[instrument(skip(self))]
    pub async fn is_content_downloaded(&self, id: &ContentId) -> Result<bool> {
        let Some(record) = self.repository.find_by_id(id).await? else {
            return Ok(false);
        };

        self.artifact_exists(&record).await
    }

    pub fn is_downloading(&self, id: &ContentId) -> bool {
        self.active_jobs.lock().contains_key(id)
    }

    /// Ids with a registered job.
    pub fn active_downloads(&self) -> Vec<ContentId> {
        let mut ids: Vec<_> = self.active_jobs.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Handle for the active job of `id`, if any.
    pub fn handle(&self, id: &ContentId) -> Option<DownloadHandle> {
        self.active_jobs
            .lock()
            .get(id)
            .cloned()
            .map(DownloadHandle::new)
    }

    /// Streams every record that has an active job or a downloaded artifact
    /// that still exists on disk.
    ///
    /// Rows are read lazily; calling again restarts from the first record.
    pub fn get_all_downloads(&self) -> BoxStream<'_, Result<ContentDownloadRecord>> {
        let active_jobs = Arc::clone(&self.active_jobs);
        let file_system = Arc::clone(&self.file_system);

        self.repository
            .stream_all()
            .map_err(OfflineError::from)
            .try_filter_map(move |record| {
                let active = active_jobs.lock().contains_key(&record.id);
                let file_system = Arc::clone(&file_system);
                async move {
                    if active {
                        return Ok(Some(record));
                    }
                    let path = match record.encrypted_path() {
                        Some(path) if record.is_downloaded => path.to_path_buf(),
                        _ => return Ok(None),
                    };
                    let exists = file_system
                        .exists(&path)
                        .await
                        .map_err(|e| OfflineError::storage("Failed to check artifact", e))?;
                    Ok(exists.then_some(record))
                }
            })
            .boxed()
    }

    /// Removes a download: cancels its job, deletes the artifact and the record.
    #[instrument(skip(self, record), fields(content_id = %record.id))]
    pub async fn delete_download(&self, record: &ContentDownloadRecord) -> Result<()> {
        self.cancel_download(&record.id).await?;

        if let Some(path) = record.encrypted_path() {
            self.delete_file(path).await?;
        }
        let default_path = self
            .layout
            .encrypted_path(&record.id, record.file_extension());
        self.delete_file(&default_path).await?;

        let removed = self.repository.delete(&record.id).await?;
        debug!(removed, "Download record deleted");

        self.event_bus
            .emit(CoreEvent::Content(ContentEvent::Deleted {
                content_id: record.id.to_string(),
            }))
            .ok();

        Ok(())
    }

    /// Removes orphan records, stale-flag records and unreferenced artifacts.
    ///
    /// Returns how many records and files were removed.
    #[instrument(skip(self))]
    pub async fn cleanup_orphans(&self) -> Result<usize> {
        let mut removed = 0;
        let mut referenced: HashSet<OsString> = HashSet::new();

        for record in self.repository.find_all().await? {
            let default_path = self
                .layout
                .encrypted_path(&record.id, record.file_extension());

            if self.is_downloading(&record.id) {
                if let Some(name) = default_path.file_name() {
                    referenced.insert(name.to_os_string());
                }
                continue;
            }

            if self.artifact_exists(&record).await? {
                if let Some(name) = record.encrypted_path().and_then(Path::file_name) {
                    referenced.insert(name.to_os_string());
                }
                continue;
            }

            warn!(
                content_id = %record.id,
                is_downloaded = record.is_downloaded,
                "Removing orphaned download record"
            );
            if let Some(path) = record.encrypted_path() {
                self.delete_file(path).await?;
            }
            self.delete_file(&default_path).await?;
            if self.repository.delete(&record.id).await? {
                removed += 1;
            }
        }

        for entry in self.list_secure_dir().await? {
            let Some(name) = entry.file_name() else {
                continue;
            };
            if referenced.contains(name) || self.belongs_to_active_job(name) {
                continue;
            }

            warn!(path = ?entry, "Removing unreferenced artifact");
            self.delete_file(&entry).await?;
            removed += 1;
        }

        if removed > 0 {
            info!(removed, "Orphan cleanup finished");
            self.event_bus
                .emit(CoreEvent::Content(ContentEvent::OrphansCleaned { count: removed }))
                .ok();
        }

        Ok(removed)
    }

    /// Cancels every job and removes all records and artifacts.
    ///
    /// Used when the content key is replaced and existing artifacts can no
    /// longer be decrypted.
    #[instrument(skip(self))]
    pub async fn purge_all(&self) -> Result<usize> {
        for id in self.active_downloads() {
            self.cancel_download(&id).await?;
        }

        let mut removed = 0;
        for record in self.repository.find_all().await? {
            if let Some(path) = record.encrypted_path() {
                self.delete_file(path).await?;
            }
            if self.repository.delete(&record.id).await? {
                removed += 1;
            }
        }

        for entry in self.list_secure_dir().await? {
            self.delete_file(&entry).await?;
        }

        info!(removed, "Purged all downloads");
        Ok(removed)
    }

    // ========================================================================
    // Job execution
    // ========================================================================

    fn clone_for_task(&self) -> Self {
        Self {
            config: self.config.clone(),
            repository: Arc::clone(&self.repository),
            http_client: Arc::clone(&self.http_client),
            file_system: Arc::clone(&self.file_system),
            cipher: Arc::clone(&self.cipher),
            layout: Arc::clone(&self.layout),
            clock: Arc::clone(&self.clock),
            event_bus: Arc::clone(&self.event_bus),
            download_permits: self.download_permits.clone(),
            active_jobs: Arc::clone(&self.active_jobs),
        }
    }

    #[instrument(skip_all, fields(content_id = %record.id, job_id = %control.job_id()))]
    async fn run_job(
        &self,
        control: Arc<JobControl>,
        previous: Option<Arc<JobControl>>,
        record: ContentDownloadRecord,
    ) {
        if let Some(previous) = previous {
            debug!("Waiting for superseded job to finish");
            previous.wait_terminal().await;
        }

        let terminal = match self.execute(&control, record.clone()).await {
            Ok(completed) => {
                let bytes = completed.total_bytes.unwrap_or_default().max(0) as u64;
                info!(bytes, "Download completed");
                self.event_bus
                    .emit(CoreEvent::Download(DownloadEvent::Completed {
                        content_id: completed.id.to_string(),
                        bytes,
                    }))
                    .ok();
                DownloadState::Completed { record: completed }
            }
            Err(err) => {
                self.discard(&control, &record).await;

                if err.is_cancelled() {
                    info!(superseded = control.is_superseded(), "Download cancelled");
                    DownloadState::Cancelled
                } else {
                    error!(error = %err, "Download failed");
                    self.event_bus
                        .emit(CoreEvent::Download(DownloadEvent::Failed {
                            content_id: record.id.to_string(),
                            kind: err.kind(),
                            reason: err.to_string(),
                        }))
                        .ok();
                    DownloadState::Failed {
                        kind: err.kind(),
                        reason: err.to_string(),
                    }
                }
            }
        };

        self.unregister(&control);
        control.finish(terminal);
    }

    async fn execute(
        &self,
        control: &JobControl,
        record: ContentDownloadRecord,
    ) -> Result<ContentDownloadRecord> {
        let token = control.token();
        if token.is_cancelled() {
            return Err(OfflineError::Cancelled);
        }

        let _permit = match &self.download_permits {
            Some(permits) => {
                let permits = Arc::clone(permits);
                core_async::select! {
                    _ = token.cancelled() => return Err(OfflineError::Cancelled),
                    permit = permits.acquire_owned() => Some(permit.map_err(|_| {
                        OfflineError::InvalidConfig("Download limiter closed".to_string())
                    })?),
                }
            }
            None => None,
        };

        if token.is_cancelled() {
            return Err(OfflineError::Cancelled);
        }

        // A superseded predecessor may have touched the row while we waited.
        let mut record = record;
        record.updated_at = self.clock.unix_timestamp();
        self.repository.upsert(&record).await?;

        control.mark_running();

        let path = self
            .layout
            .encrypted_path(&record.id, record.file_extension());
        let (bytes, hash) = self.transfer(control, &record, &path).await?;

        if token.is_cancelled() {
            return Err(OfflineError::Cancelled);
        }

        let downloaded_at = self.clock.unix_timestamp();
        let path_str = path.to_string_lossy().into_owned();
        let total_bytes = i64::try_from(bytes)
            .map_err(|_| OfflineError::Storage(format!("Artifact too large: {} bytes", bytes)))?;

        self.repository
            .mark_downloaded(&record.id, &path_str, Some(&hash), total_bytes, downloaded_at)
            .await?;

        record.encrypted_file_path = Some(path_str);
        record.content_hash = Some(hash);
        record.total_bytes = Some(total_bytes);
        record.is_downloaded = true;
        record.downloaded_at = Some(downloaded_at);
        record.updated_at = downloaded_at;
        Ok(record)
    }

    /// Streams the source into an encrypted file at `path`.
    ///
    /// Returns the plaintext byte count and its hex SHA-256.
    async fn transfer(
        &self,
        control: &JobControl,
        record: &ContentDownloadRecord,
        path: &Path,
    ) -> Result<(u64, String)> {
        let token = control.token();

        let DownloadStream {
            mut reader,
            content_length,
        } = core_async::select! {
            _ = token.cancelled() => return Err(OfflineError::Cancelled),
            stream = self.http_client.download_stream(record.source_url.clone()) => {
                stream.map_err(OfflineError::from_http)?
            }
        };
        debug!(content_length = ?content_length, "Source opened");

        let writer = self
            .file_system
            .open_write_stream(path)
            .await
            .map_err(|e| OfflineError::storage("Failed to create artifact", e))?;
        let mut sink = CipherSink::begin(writer, &self.cipher, self.config.chunk_size).await?;

        let mut tracker = ProgressTracker::new(content_length);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.config.chunk_size];

        if let Some(progress) = tracker.start() {
            self.publish_progress(control, progress);
        }

        loop {
            if token.is_cancelled() {
                return Err(OfflineError::Cancelled);
            }

            let n = core_async::select! {
                biased;
                _ = token.cancelled() => return Err(OfflineError::Cancelled),
                read = reader.read(&mut buffer) => read.map_err(OfflineError::network_io)?,
            };
            if n == 0 {
                break;
            }

            let chunk = &buffer[..n];
            hasher.update(chunk);
            sink.write_chunk(chunk).await?;

            if let Some(progress) = tracker.advance(n as u64) {
                self.publish_progress(control, progress);
            }
        }

        let bytes = sink.finish().await?;

        if let Some(expected) = content_length {
            if bytes != expected {
                return Err(OfflineError::Network(format!(
                    "Stream ended after {} of {} bytes",
                    bytes, expected
                )));
            }
        }

        if let Some(progress) = tracker.finish() {
            self.publish_progress(control, progress);
        }

        Ok((bytes, hex::encode(hasher.finalize())))
    }

    fn publish_progress(&self, control: &JobControl, progress: DownloadProgress) {
        control.report_progress(progress);
        self.event_bus
            .emit(CoreEvent::Download(DownloadEvent::Progress {
                content_id: control.content_id().to_string(),
                progress,
            }))
            .ok();
    }

    /// Removes the partial artifact and, unless a newer job owns it, the record.
    async fn discard(&self, control: &JobControl, record: &ContentDownloadRecord) {
        let path = self
            .layout
            .encrypted_path(&record.id, record.file_extension());
        if let Err(e) = self.delete_file(&path).await {
            warn!(error = %e, "Failed to delete partial artifact");
        }

        if control.is_superseded() {
            return;
        }

        if let Err(e) = self.repository.delete(&record.id).await {
            warn!(error = %e, "Failed to delete pending record");
        }
    }

    fn unregister(&self, control: &JobControl) {
        job::unregister(&self.active_jobs, control);
    }

    /// Cleans up after a job task that panicked: the partial artifact and the
    /// pending record go, and the job ends failed.
    async fn abandon(&self, control: &JobControl, record: &ContentDownloadRecord) {
        error!(content_id = %record.id, job_id = %control.job_id(), "Download task panicked");
        self.discard(control, record).await;

        let err = OfflineError::Storage("Download task panicked".to_string());
        self.event_bus
            .emit(CoreEvent::Download(DownloadEvent::Failed {
                content_id: record.id.to_string(),
                kind: err.kind(),
                reason: err.to_string(),
            }))
            .ok();

        self.unregister(control);
        control.finish(DownloadState::Failed {
            kind: err.kind(),
            reason: err.to_string(),
        });
    }

    async fn artifact_exists(&self, record: &ContentDownloadRecord) -> Result<bool> {
        if !record.is_downloaded {
            return Ok(false);
        }

        match record.encrypted_path() {
            Some(path) => self
                .file_system
                .exists(path)
                .await
                .map_err(|e| OfflineError::storage("Failed to check artifact", e)),
            None => Ok(false),
        }
    }

    fn belongs_to_active_job(&self, file_name: &std::ffi::OsStr) -> bool {
        let name = file_name.to_string_lossy();
        self.active_jobs
            .lock()
            .keys()
            .any(|id| name.starts_with(&format!("content_{}_encrypted.", encode_id(id))))
    }

    /// Entries of `secure_content/`, empty if the directory does not exist yet.
    async fn list_secure_dir(&self) -> Result<Vec<PathBuf>> {
        let dir = self.layout.secure_dir();
        let exists = self
            .file_system
            .exists(dir)
            .await
            .map_err(|e| OfflineError::storage("Failed to check secure directory", e))?;
        if !exists {
            return Ok(Vec::new());
        }

        self.file_system
            .list_directory(dir)
            .await
            .map_err(|e| OfflineError::storage("Failed to list secure directory", e))
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.file_system
            .delete_file(path)
            .await
            .map_err(|e| OfflineError::storage("Failed to delete file", e))
    }
}
