//! # Core Runtime Module
//!
//! Runtime services shared by the offline content crates:
//! - Logging and tracing infrastructure
//! - Configuration and bridge wiring
//! - Event bus for download progress and content lifecycle events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
