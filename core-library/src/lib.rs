//! # Offline Content Store
//!
//! Owns the SQLite database that tracks offline content downloads and provides
//! the repository used to read and write download records.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite connection pooling and schema migrations
//! - Domain models for content descriptors and download records
//! - The `DownloadRepository` with point queries and a lazy record stream

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{ContentDownloadRecord, ContentId, ContentItem, ContentType, CourseInfo};
pub use repositories::{DownloadRepository, SqliteDownloadRepository};
