pub mod context;
pub mod disk;
pub mod git;
pub mod locks;
pub mod memory;
pub mod meta;
pub mod notice;
pub mod path;
pub mod request;
pub mod root;
pub mod runtime;
pub mod s3;
pub mod sql;
pub mod status;

use std::sync::Arc;

pub use context::*;
pub use meta::*;
pub use notice::*;
pub use request::*;
pub use root::*;
pub use runtime::*;

use disk::DiskStorage;
use git::GitStorage;
use memory::MemoryStorage;
use s3::S3Storage;
use sql::SqlStorage;

/// Builds the backend for a configured root.
///
/// Never fails: configuration problems are recorded as notices on the
/// returned root's descriptor.
pub fn open(config: &RootStorageConfig) -> Arc<dyn StorageRuntime> {
    let config = config.clone();
    match config.kind {
        StorageKind::Disk => Arc::new(DiskStorage::from_config(config)),
        StorageKind::Memory => Arc::new(MemoryStorage::from_config(config)),
        StorageKind::S3 => Arc::new(S3Storage::from_config(config)),
        StorageKind::Git => Arc::new(GitStorage::from_config(config)),
        StorageKind::Sql => Arc::new(SqlStorage::from_config(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_picks_backend_by_kind() {
        for kind in [
            StorageKind::Disk,
            StorageKind::Memory,
            StorageKind::S3,
            StorageKind::Git,
            StorageKind::Sql,
        ] {
            let mut config = RootStorageConfig::new(kind, "p", "n");
            config.read_only = true;
            let root = open(&config);
            assert_eq!(root.meta().kind(), kind);
            assert!(root.meta().read_only);
            assert_eq!(root.meta().implemented, kind.is_implemented());
        }
    }

    #[test]
    fn open_keeps_config_findings() {
        let config = RootStorageConfig::new(StorageKind::Git, "", "repo");
        let root = open(&config);
        let texts: Vec<_> = root.meta().notices().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, vec![MISSING_PREFIX, MISSING_REMOTE]);
    }
}
