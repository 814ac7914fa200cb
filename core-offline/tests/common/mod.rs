//! Shared fakes and fixtures for offline content integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{DownloadStream, DynAsyncRead, HttpClient};
use bridge_traits::storage::SecureStore;
use bridge_traits::time::FixedClock;
use bytes::Bytes;
use core_library::db::create_test_pool;
use core_library::models::{ContentId, ContentItem, ContentType, CourseInfo};
use core_library::repositories::SqliteDownloadRepository;
use core_offline::{
    ContentCipher, DownloadManager, EncryptionKey, OfflineConfig, SecureReader, StorageLayout,
};
use core_runtime::events::{CoreEvent, EventBus};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::broadcast;
use tokio_util::io::StreamReader;
use uuid::Uuid;

pub const NOW: i64 = 1_700_000_000;

// ============================================================================
// HTTP
// ============================================================================

enum Scripted {
    Stream {
        reader: Box<DynAsyncRead>,
        content_length: Option<u64>,
    },
    Status(u16),
}

/// HTTP client answering from per-URL queues of canned responses.
#[derive(Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedHttpClient {
    fn push(&self, url: &str, response: Scripted) {
        self.responses
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Full body with a `Content-Length`.
    pub fn body(&self, url: &str, data: Vec<u8>) {
        let len = data.len() as u64;
        self.push(
            url,
            Scripted::Stream {
                reader: Box::new(Cursor::new(data)),
                content_length: Some(len),
            },
        );
    }

    /// Full body without a length header.
    pub fn body_without_length(&self, url: &str, data: Vec<u8>) {
        self.push(
            url,
            Scripted::Stream {
                reader: Box::new(Cursor::new(data)),
                content_length: None,
            },
        );
    }

    /// Body fed by the test through the returned writer. Dropping the writer
    /// ends the body.
    pub fn controlled(&self, url: &str, content_length: Option<u64>) -> DuplexStream {
        let (client_end, test_end) = tokio::io::duplex(16 * 1024);
        self.push(
            url,
            Scripted::Stream {
                reader: Box::new(client_end),
                content_length,
            },
        );
        test_end
    }

    /// Yields `prefix`, then fails with a connection reset.
    pub fn failing(&self, url: &str, prefix: Vec<u8>, content_length: Option<u64>) {
        let chunks = vec![
            Ok(Bytes::from(prefix)),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )),
        ];
        self.push(
            url,
            Scripted::Stream {
                reader: Box::new(StreamReader::new(futures::stream::iter(chunks))),
                content_length,
            },
        );
    }

    pub fn status(&self, url: &str, status: u16) {
        self.push(url, Scripted::Status(status));
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn download_stream(&self, url: String) -> BridgeResult<DownloadStream> {
        *self.calls.lock().entry(url.clone()).or_default() += 1;

        let next = self
            .responses
            .lock()
            .get_mut(&url)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Scripted::Stream {
                reader,
                content_length,
            }) => Ok(DownloadStream::new(reader, content_length)),
            Some(Scripted::Status(status)) => Err(BridgeError::HttpStatus { url, status }),
            None => Err(BridgeError::HttpStatus { url, status: 404 }),
        }
    }
}

// ============================================================================
// Secure store
// ============================================================================

#[derive(Default)]
pub struct MemorySecureStore {
    secrets: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.secrets.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.secrets.lock().get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.secrets.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub fn scratch_root() -> PathBuf {
    std::env::temp_dir().join(format!("coursevault-offline-{}", Uuid::new_v4()))
}

pub fn scratch_fs(root: &PathBuf) -> Arc<TokioFileSystem> {
    Arc::new(TokioFileSystem::with_directories(
        root.join("cache"),
        root.join("data"),
    ))
}

/// Manager and reader over a scratch directory and an in-memory database.
pub struct Harness {
    pub root: PathBuf,
    pub fs: Arc<TokioFileSystem>,
    pub http: Arc<ScriptedHttpClient>,
    pub repository: Arc<SqliteDownloadRepository>,
    pub event_bus: Arc<EventBus>,
    pub layout: StorageLayout,
    pub manager: Arc<DownloadManager>,
    pub reader: Arc<SecureReader>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(OfflineConfig::default()).await
    }

    pub async fn with_config(config: OfflineConfig) -> Self {
        let root = scratch_root();
        let fs = scratch_fs(&root);
        let http = Arc::new(ScriptedHttpClient::default());
        let repository = Arc::new(SqliteDownloadRepository::new(
            create_test_pool().await.unwrap(),
        ));
        let event_bus = Arc::new(EventBus::new(4096));
        let layout = StorageLayout::resolve(fs.as_ref(), &config).await.unwrap();
        let cipher = ContentCipher::new(EncryptionKey::from_bytes(&[42u8; 32]).unwrap());

        let manager = Arc::new(
            DownloadManager::new(
                config.clone(),
                repository.clone(),
                http.clone(),
                fs.clone(),
                cipher.clone(),
                layout.clone(),
            )
            .with_event_bus(event_bus.clone())
            .with_clock(Arc::new(FixedClock::at_unix(NOW))),
        );
        manager.initialize().await.unwrap();

        let reader = Arc::new(SecureReader::new(
            config,
            fs.clone(),
            cipher,
            layout.clone(),
            event_bus.clone(),
        ));

        Self {
            root,
            fs,
            http,
            repository,
            event_bus,
            layout,
            manager,
            reader,
        }
    }

    pub fn temp_files(&self) -> Vec<PathBuf> {
        list(self.layout.temp_dir())
    }

    pub fn secure_files(&self) -> Vec<PathBuf> {
        list(self.layout.secure_dir())
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

fn list(dir: &std::path::Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn url(id: &str) -> String {
    format!("https://cdn.example.com/content/{}", id)
}

pub fn item(id: &str, content_type: ContentType) -> ContentItem {
    ContentItem {
        id: ContentId::new(id),
        content_type,
        content_url: url(id),
        course_id: "course-1".to_string(),
        is_free: false,
        is_offline_available: true,
    }
}

pub fn course() -> CourseInfo {
    CourseInfo {
        id: "course-1".to_string(),
        name: "Organic Chemistry".to_string(),
        description: Some("Reactions and mechanisms".to_string()),
        category_name: Some("Science".to_string()),
        sub_category_name: Some("Chemistry".to_string()),
        subject_name: Some("Organic".to_string()),
        tags: vec!["chemistry".to_string(), "exam-prep".to_string()],
    }
}

/// Deterministic, non-repeating-looking test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 31 + i / 251) % 256) as u8)
        .collect()
}

/// Everything currently buffered on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
