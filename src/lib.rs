//! Prefix-addressed storage roots over pluggable backends.
//!
//! A [`StorageRegistry`] mounts roots (local disk, memory, object storage,
//! ...) under path prefixes and routes read/write/list/delete requests to
//! them. Each backend carries a [`RootStorageMeta`](storage::RootStorageMeta)
//! describing its configuration and whether it can serve requests.

pub mod config;
pub mod error;
pub mod registry;
pub mod storage;

pub use error::{Result, StorageError};
pub use registry::StorageRegistry;
