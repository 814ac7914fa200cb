//! Offline content configuration

/// Size of each network read and encryption pass.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Configuration for downloads, artifact storage and decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineConfig {
    /// Directory under the app data dir holding encrypted artifacts (default: `secure_content`)
    pub secure_dir_name: String,

    /// Directory under the app cache dir holding decrypted temp files (default: `temp_content`)
    pub temp_dir_name: String,

    /// Bytes read, encrypted and written per iteration (default: 4096).
    /// Also bounds how quickly a cancellation takes effect.
    pub chunk_size: usize,

    /// Cap on transfers running at once; `None` means unbounded (default: 3)
    pub max_concurrent_downloads: Option<usize>,

    /// Secure store entry holding the content key
    pub key_alias: String,

    /// Compare the plaintext SHA-256 on decrypt (default: true)
    pub verify_integrity: bool,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            secure_dir_name: "secure_content".to_string(),
            temp_dir_name: "temp_content".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_downloads: Some(3),
            key_alias: "content-encryption-key".to_string(),
            verify_integrity: true,
        }
    }
}

impl OfflineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secure_dir_name(mut self, name: impl Into<String>) -> Self {
        self.secure_dir_name = name.into();
        self
    }

    pub fn with_temp_dir_name(mut self, name: impl Into<String>) -> Self {
        self.temp_dir_name = name.into();
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_max_concurrent_downloads(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_downloads = limit;
        self
    }

    pub fn with_key_alias(mut self, alias: impl Into<String>) -> Self {
        self.key_alias = alias.into();
        self
    }

    pub fn with_verify_integrity(mut self, enabled: bool) -> Self {
        self.verify_integrity = enabled;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("secure_dir_name", &self.secure_dir_name),
            ("temp_dir_name", &self.temp_dir_name),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} cannot be empty", field));
            }
            if value.contains(['/', '\\']) || value == ".." {
                return Err(format!("{} must be a single path component", field));
            }
        }

        if self.secure_dir_name == self.temp_dir_name {
            return Err("secure_dir_name and temp_dir_name must differ".to_string());
        }

        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }

        if self.max_concurrent_downloads == Some(0) {
            return Err("max_concurrent_downloads must be at least 1".to_string());
        }

        if self.key_alias.trim().is_empty() {
            return Err("key_alias cannot be empty".to_string());
        }

        Ok(())
    }
}
