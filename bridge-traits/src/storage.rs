//! Storage Abstractions
//!
//! File system access for the encrypted content store and the plaintext
//! temp directory, plus secret storage for the content encryption key.

use async_trait::async_trait;
use core_async::io::{AsyncRead, AsyncWrite};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O so the core works against sandboxed app directories
/// on mobile and plain directories on desktop.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn secure_dir(fs: &dyn FileSystemAccess) -> Result<PathBuf> {
///     let dir = fs.get_data_directory().await?.join("secure_content");
///     fs.create_dir_all(&dir).await?;
///     Ok(dir)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// The system may purge it under storage pressure, so only
    /// reproducible files (decrypted temporaries) live here.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Get the application's private data directory
    async fn get_data_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file
    ///
    /// Deleting a file that does not exist is not an error.
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Open a file for streaming reads
    async fn open_read_stream(&self, path: &Path) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    /// Create or truncate a file for streaming writes
    async fn open_write_stream(&self, path: &Path)
        -> Result<Box<dyn AsyncWrite + Send + Unpin>>;
}

/// Secure credential storage trait
///
/// Backed by the platform keychain (Keychain, Keystore, Credential Manager,
/// Secret Service). The per-install content key is the only secret the
/// offline core stores.
///
/// # Example
///
/// ```ignore
/// async fn load_key(store: &dyn SecureStore) -> Result<Option<Vec<u8>>> {
///     store.get_secret("content-encryption-key").await
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value, `None` if it was never stored
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}
