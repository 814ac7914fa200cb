//! Temp file sweep on app suspension.

use crate::error::{OfflineError, Result};
use crate::reader::SecureReader;
use bridge_traits::background::LifecycleObserver;
use core_async::task::JoinHandle;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs [`SecureReader::clear_temp_files`] each time the host reports
/// `Suspended`. The task ends when the observer closes its stream.
pub async fn spawn_lifecycle_sweeper(
    observer: Arc<dyn LifecycleObserver>,
    reader: Arc<SecureReader>,
) -> Result<JoinHandle<()>> {
    let mut changes = observer.subscribe_changes().await.map_err(|e| {
        OfflineError::InvalidConfig(format!("Failed to observe app lifecycle: {}", e))
    })?;

    Ok(core_async::task::spawn(async move {
        while let Some(state) = changes.next().await {
            debug!(state = ?state, "Lifecycle change");
            if !state.is_stopping() {
                continue;
            }

            match reader.clear_temp_files().await {
                Ok(cleared) => info!(cleared, "Swept temp files on suspend"),
                Err(e) => warn!(error = %e, "Temp file sweep failed"),
            }
        }
        debug!("Lifecycle stream closed");
    }))
}
