//! Async filesystem helpers re-exported from Tokio.

pub use tokio::fs::{
    create_dir_all, metadata, read, read_dir, remove_dir_all, remove_file, rename, write,
    DirEntry, File, OpenOptions,
};
