//! Synchronization primitives.
//!
//! All primitives are Tokio's async-aware versions and are `Send + Sync`.
//! [`CancellationToken`] is the cooperative cancellation handle passed into
//! every chunked transfer loop.
//!
//! ```rust
//! use core_async::sync::{watch, CancellationToken};
//!
//! # async fn example() {
//! let token = CancellationToken::new();
//! let (tx, mut rx) = watch::channel(0u8);
//! tx.send_replace(40);
//! assert_eq!(*rx.borrow_and_update(), 40);
//! token.cancel();
//! assert!(token.is_cancelled());
//! # }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OwnedSemaphorePermit, RwLock,
    Semaphore, SemaphorePermit, TryAcquireError,
};

pub use tokio_util::sync::CancellationToken;
