//! Offline downloads: manager, per-job handles and progress tracking.

pub mod job;
pub mod manager;
pub mod progress;

pub use job::{DownloadHandle, DownloadOutcome, DownloadState};
pub use manager::DownloadManager;
pub use progress::ProgressTracker;
