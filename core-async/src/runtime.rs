//! Runtime utilities wrapping Tokio's executor.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a fresh current-thread runtime.
///
/// Used by the `#[core_async::test]` and `#[core_async::main]` attributes.
/// Panics if the runtime cannot be built, which only happens when the process
/// is out of file descriptors or threads.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Returns a handle to the ambient runtime, if the caller runs inside one.
///
/// Destructors use this to schedule async cleanup without assuming a runtime.
pub fn try_current() -> Option<Handle> {
    Handle::try_current().ok()
}
