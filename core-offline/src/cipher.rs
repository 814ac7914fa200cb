//! # Cipher Stream Codec
//!
//! Streaming AES-256-CTR for encrypted artifacts.
//!
//! File format: a random 16-byte IV followed by the ciphertext. CTR keeps the
//! ciphertext the same length as the plaintext and lets both directions run
//! chunk by chunk in constant memory.

use crate::error::{OfflineError, Result};
use aes::cipher::{KeyIvInit, StreamCipher};
use core_async::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::fmt;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Length of the IV prefix.
pub const IV_LEN: usize = 16;

/// Length of an AES-256 key.
pub const KEY_LEN: usize = 32;

/// Content encryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    key_bytes: [u8; KEY_LEN],
}

impl EncryptionKey {
    /// Generate a new random key from the OS RNG.
    pub fn generate() -> Result<Self> {
        let mut key_bytes = [0u8; KEY_LEN];
        getrandom::getrandom(&mut key_bytes)
            .map_err(|e| OfflineError::Crypto(format!("Failed to generate key: {}", e)))?;
        Ok(Self { key_bytes })
    }

    /// Create from existing key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key_bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            OfflineError::Crypto(format!(
                "Invalid key length {}. Expected {} bytes for AES-256.",
                bytes.len(),
                KEY_LEN
            ))
        })?;

        Ok(Self { key_bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key_bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.key_bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| OfflineError::Crypto(format!("Invalid hex key: {}", e)))?;

        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key_bytes", &"[REDACTED]")
            .finish()
    }
}

/// Keyed codec producing per-file keystreams.
#[derive(Clone)]
pub struct ContentCipher {
    key: EncryptionKey,
}

impl ContentCipher {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Fresh random IV. Never reuse an IV with the same key.
    pub fn generate_iv() -> Result<[u8; IV_LEN]> {
        let mut iv = [0u8; IV_LEN];
        getrandom::getrandom(&mut iv)
            .map_err(|e| OfflineError::Crypto(format!("Failed to generate IV: {}", e)))?;
        Ok(iv)
    }

    fn keystream(&self, iv: &[u8; IV_LEN]) -> Result<Aes256Ctr> {
        Aes256Ctr::new_from_slices(self.key.as_bytes(), iv)
            .map_err(|e| OfflineError::Crypto(format!("Keystream setup failed: {}", e)))
    }
}

impl fmt::Debug for ContentCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCipher").field("key", &self.key).finish()
    }
}

/// Encrypting writer.
///
/// Plaintext passes through a scratch buffer no larger than the chunk size,
/// so memory use does not depend on artifact size.
pub struct CipherSink<W> {
    writer: W,
    keystream: Aes256Ctr,
    iv: [u8; IV_LEN],
    scratch: Vec<u8>,
    chunk_size: usize,
    plaintext_bytes: u64,
}

impl<W> CipherSink<W>
where
    W: AsyncWrite + Unpin,
{
    /// Generates an IV and writes it as the file prefix.
    pub async fn begin(mut writer: W, cipher: &ContentCipher, chunk_size: usize) -> Result<Self> {
        let chunk_size = chunk_size.max(1);
        let iv = ContentCipher::generate_iv()?;
        let keystream = cipher.keystream(&iv)?;

        writer
            .write_all(&iv)
            .await
            .map_err(|e| OfflineError::storage("Failed to write IV prefix", e))?;

        Ok(Self {
            writer,
            keystream,
            iv,
            scratch: Vec::with_capacity(chunk_size),
            chunk_size,
            plaintext_bytes: 0,
        })
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    /// Plaintext bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.plaintext_bytes
    }

    pub async fn write_chunk(&mut self, plaintext: &[u8]) -> Result<()> {
        for piece in plaintext.chunks(self.chunk_size) {
            self.scratch.clear();
            self.scratch.extend_from_slice(piece);
            self.keystream.apply_keystream(&mut self.scratch);

            self.writer
                .write_all(&self.scratch)
                .await
                .map_err(|e| OfflineError::storage("Failed to write ciphertext", e))?;
        }

        self.plaintext_bytes += plaintext.len() as u64;
        Ok(())
    }

    /// Flushes and closes the writer. Returns the plaintext byte count.
    pub async fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .await
            .map_err(|e| OfflineError::storage("Failed to flush artifact", e))?;
        self.writer
            .shutdown()
            .await
            .map_err(|e| OfflineError::storage("Failed to close artifact", e))?;

        Ok(self.plaintext_bytes)
    }
}

/// Decrypting reader.
pub struct CipherSource<R> {
    reader: R,
    keystream: Aes256Ctr,
}

impl<R> CipherSource<R>
where
    R: AsyncRead + Unpin,
{
    /// Reads the IV prefix.
    ///
    /// # Errors
    ///
    /// `CorruptArtifact` if the stream ends before all 16 prefix bytes arrive.
    pub async fn open(mut reader: R, cipher: &ContentCipher) -> Result<Self> {
        let mut iv = [0u8; IV_LEN];

        reader.read_exact(&mut iv).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                OfflineError::CorruptArtifact(format!(
                    "Encrypted file is shorter than its {}-byte IV prefix",
                    IV_LEN
                ))
            } else {
                OfflineError::storage("Failed to read IV prefix", e)
            }
        })?;

        let keystream = cipher.keystream(&iv)?;
        Ok(Self { reader, keystream })
    }

    /// Reads and decrypts into `buf`. Returns 0 at end of stream.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self
            .reader
            .read(buf)
            .await
            .map_err(|e| OfflineError::storage("Failed to read ciphertext", e))?;

        self.keystream.apply_keystream(&mut buf[..n]);
        Ok(n)
    }
}
