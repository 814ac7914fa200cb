//! App lifecycle notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Application lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Application is in the foreground and active
    Foreground,
    /// Application is in the background (audio may still be playing)
    Background,
    /// Application is being suspended or terminated
    Suspended,
}

impl LifecycleState {
    /// Whether the host is about to stop running code for this app.
    pub fn is_stopping(self) -> bool {
        matches!(self, LifecycleState::Suspended)
    }
}

/// Lifecycle observer trait
///
/// Lets the core run safety-net cleanup (for example sweeping decrypted
/// temporaries) when the app stops.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::{LifecycleObserver, LifecycleState};
///
/// async fn watch(observer: &dyn LifecycleObserver) -> Result<()> {
///     let mut stream = observer.subscribe_changes().await?;
///     while let Some(state) = stream.next().await {
///         if state.is_stopping() {
///             sweep_temp_files().await;
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Get current lifecycle state
    async fn get_state(&self) -> Result<LifecycleState>;

    /// Subscribe to lifecycle state changes
    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

/// Stream of lifecycle state changes
#[async_trait]
pub trait LifecycleChangeStream: Send {
    /// Get the next lifecycle state update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<LifecycleState>;
}
