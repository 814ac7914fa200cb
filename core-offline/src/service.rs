//! # Offline Content Service
//!
//! Single entry point wiring storage, keys, downloads and decryption together.
//!
//! ```rust,ignore
//! use core_offline::{OfflineConfig, OfflineContent};
//! use core_runtime::config::CoreConfig;
//!
//! let core = CoreConfig::builder().database_path("offline.db").build()?;
//! let offline = OfflineContent::bootstrap(&core, OfflineConfig::default()).await?;
//!
//! let handle = offline.manager().download_content(item, course).await?;
//! handle.wait().await;
//! ```

use crate::cipher::ContentCipher;
use crate::config::OfflineConfig;
use crate::download::DownloadManager;
use crate::error::{OfflineError, Result};
use crate::keys::ContentKeyProvider;
use crate::layout::StorageLayout;
use crate::lifecycle::spawn_lifecycle_sweeper;
use crate::player::PlayerBridge;
use crate::reader::SecureReader;
use bridge_traits::media::{DocumentViewer, MediaPlayer};
use core_async::task::JoinHandle;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::repositories::SqliteDownloadRepository;
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Offline content facade.
pub struct OfflineContent {
    manager: Arc<DownloadManager>,
    reader: Arc<SecureReader>,
    event_bus: Arc<EventBus>,
    sweeper: Option<JoinHandle<()>>,
}

impl OfflineContent {
    /// Opens the store, loads the content key and brings the artifact
    /// directories into a consistent state.
    ///
    /// Start-up order:
    /// 1. validate both configs
    /// 2. open the database (migrations run here)
    /// 3. load or create the content key; a new key purges old artifacts
    /// 4. create directories, sweep temp files, clean orphans
    /// 5. start the lifecycle sweeper if an observer is configured
    #[instrument(skip_all)]
    pub async fn bootstrap(core: &CoreConfig, config: OfflineConfig) -> Result<Self> {
        core.validate()
            .map_err(|e| OfflineError::InvalidConfig(e.to_string()))?;
        config
            .validate()
            .map_err(|e| OfflineError::InvalidConfig(format!("Invalid offline config: {}", e)))?;

        let pool = create_pool(database_config(&core.database_path)).await?;
        let repository = Arc::new(SqliteDownloadRepository::new(pool));

        let provisioned =
            ContentKeyProvider::load_or_create(core.secure_store.as_ref(), &config.key_alias)
                .await?;
        let cipher = ContentCipher::new(provisioned.key);

        let layout = StorageLayout::resolve(core.file_system.as_ref(), &config).await?;
        let event_bus = Arc::new(EventBus::new(core.event_buffer_size));

        let manager = Arc::new(
            DownloadManager::new(
                config.clone(),
                repository,
                Arc::clone(&core.http_client),
                Arc::clone(&core.file_system),
                cipher.clone(),
                layout.clone(),
            )
            .with_event_bus(Arc::clone(&event_bus))
            .with_clock(Arc::clone(&core.clock)),
        );
        manager.initialize().await?;

        let reader = Arc::new(SecureReader::new(
            config,
            Arc::clone(&core.file_system),
            cipher,
            layout,
            Arc::clone(&event_bus),
        ));

        if provisioned.newly_created {
            let purged = manager.purge_all().await?;
            if purged > 0 {
                warn!(purged, "Content key was regenerated; removed unreadable downloads");
            }
        }

        reader.clear_temp_files().await?;
        manager.cleanup_orphans().await?;

        let sweeper = match &core.lifecycle_observer {
            Some(observer) => {
                Some(spawn_lifecycle_sweeper(Arc::clone(observer), Arc::clone(&reader)).await?)
            }
            None => None,
        };

        info!("Offline content ready");
        Ok(Self {
            manager,
            reader,
            event_bus,
            sweeper,
        })
    }

    pub fn manager(&self) -> &Arc<DownloadManager> {
        &self.manager
    }

    pub fn reader(&self) -> &Arc<SecureReader> {
        &self.reader
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Player bridge bound to the host's media surfaces.
    pub fn players(
        &self,
        player: Arc<dyn MediaPlayer>,
        viewer: Arc<dyn DocumentViewer>,
    ) -> PlayerBridge {
        PlayerBridge::new(Arc::clone(&self.reader), player, viewer)
    }

    /// Stops the lifecycle sweeper. Active downloads keep running.
    pub fn shutdown(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

impl Drop for OfflineContent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn database_config(path: &Path) -> DatabaseConfig {
    if path.as_os_str() == ":memory:" {
        DatabaseConfig::in_memory()
    } else {
        DatabaseConfig::new(path)
    }
}
