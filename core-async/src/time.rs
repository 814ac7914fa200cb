//! Time-related re-exports.

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
pub use tokio::time::{interval, sleep, timeout, Interval, Sleep, Timeout};
