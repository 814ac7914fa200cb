//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! - Traits define the data access interface so callers can substitute fakes
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>`

pub mod download;

pub use download::{DownloadRepository, SqliteDownloadRepository};
