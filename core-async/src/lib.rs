//! Async runtime shim for the CourseVault offline content core.
//!
//! Every core crate spawns tasks, sleeps, locks and cancels through this crate
//! instead of naming Tokio directly. That keeps the executor choice in one
//! place and gives the workspace a single `#[core_async::test]` attribute.
//!
//! # Modules
//!
//! - `task`: task spawning and join handles
//! - `time`: sleep, timeout and instants
//! - `sync`: locks, channels, semaphores and [`sync::CancellationToken`]
//! - `io` / `fs`: async byte streams and filesystem access
//! - `runtime`: `block_on` for synchronous entry points
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::task;
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let child = token.clone();
//!     let handle = task::spawn(async move {
//!         child.cancelled().await;
//!         "stopped"
//!     });
//!     token.cancel();
//!     assert_eq!(handle.await.unwrap(), "stopped");
//! }
//! ```

pub use core_async_macros::{main, test};

pub mod fs;
pub mod io;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};

/// Waits on several branches and runs the first one that completes.
///
/// Re-exported so cancellable loops can race a read against
/// [`sync::CancellationToken::cancelled`] without depending on Tokio.
pub use tokio::select;
