//! Per-install content key provisioning.

use crate::cipher::{EncryptionKey, KEY_LEN};
use crate::error::{OfflineError, Result};
use bridge_traits::storage::SecureStore;
use tracing::{info, instrument, warn};

/// Key loaded from, or freshly written to, the secure store.
#[derive(Debug)]
pub struct ProvisionedKey {
    pub key: EncryptionKey,
    /// `true` if no key existed and a new one was generated. Artifacts
    /// written under an earlier key are unreadable in that case.
    pub newly_created: bool,
}

/// Loads the content key from the platform secure store.
pub struct ContentKeyProvider;

impl ContentKeyProvider {
    /// Reads the 32-byte key stored under `alias`, generating and storing a
    /// random one on first use.
    ///
    /// A stored value of the wrong length fails with `Crypto` and is left in
    /// place; existing artifacts may still depend on it.
    #[instrument(skip(store))]
    pub async fn load_or_create(store: &dyn SecureStore, alias: &str) -> Result<ProvisionedKey> {
        let stored = store
            .get_secret(alias)
            .await
            .map_err(|e| OfflineError::Crypto(format!("Failed to read content key: {}", e)))?;

        if let Some(bytes) = stored {
            if bytes.len() != KEY_LEN {
                warn!(len = bytes.len(), "Stored content key has an unexpected length");
            }
            let key = EncryptionKey::from_bytes(&bytes)?;
            return Ok(ProvisionedKey {
                key,
                newly_created: false,
            });
        }

        let key = EncryptionKey::generate()?;
        store
            .set_secret(alias, key.as_bytes())
            .await
            .map_err(|e| OfflineError::Crypto(format!("Failed to store content key: {}", e)))?;

        info!("Generated new content encryption key");
        Ok(ProvisionedKey {
            key,
            newly_created: true,
        })
    }
}
