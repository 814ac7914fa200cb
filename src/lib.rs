//! Workspace placeholder crate.
//!
//! Host applications depend on `coursevault-workspace` and enable the
//! documented features instead of wiring `core-offline` and `core-runtime`
//! individually.
//!
//! # Features
//!
//! - `desktop-shims` (default): desktop bridge implementations (reqwest,
//!   tokio filesystem, OS keyring) are used when a host does not inject its own.

#[cfg(feature = "desktop-shims")]
pub use core_offline::{OfflineConfig, OfflineContent};

#[cfg(feature = "desktop-shims")]
pub use core_runtime::config::CoreConfig;
