//! Async I/O traits and adapters.
//!
//! Content streams move through the core as `AsyncRead` / `AsyncWrite`
//! trait objects, so these are the only I/O types the core needs.

pub use tokio::io::{
    duplex, AsyncBufRead, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    BufWriter, DuplexStream, ReadBuf,
};

pub use tokio_util::io::StreamReader;
