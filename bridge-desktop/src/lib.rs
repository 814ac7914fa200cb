//! # Desktop Bridge Implementations
//!
//! Default bridge implementations for macOS, Windows and Linux:
//! - `HttpClient` using `reqwest` streaming bodies
//! - `FileSystemAccess` using `tokio::fs` rooted in the OS cache/data dirs
//! - `SecureStore` using the `keyring` crate
//! - `LifecycleObserver` driven by the desktop shell
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let fs = TokioFileSystem::new();
//! ```

mod background;
mod filesystem;
mod http;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use background::DesktopLifecycleObserver;
pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
