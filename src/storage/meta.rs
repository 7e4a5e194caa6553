//! Root storage descriptors.
//!
//! Every backend builds a [`RootStorageMeta`] when it is constructed. The
//! descriptor records what was configured, what is wrong with that
//! configuration, and whether the backend can actually serve requests.
//! Construction never fails: a broken root is still built and mounted so
//! operators can see why it is not working.

use serde::{Serialize, Serializer};

use crate::storage::notice::Notice;
use crate::storage::path::normalize;
use crate::storage::root::{BackendSettings, RootStorageConfig, StorageKind};

pub const MISSING_PREFIX: &str = "Missing prefix";
pub const INVALID_PREFIX: &str = "Invalid prefix";
pub const MISSING_BUCKET: &str = "Missing bucket configuration";
pub const MISSING_DISK_PATH: &str = "Missing disk path";
pub const MISSING_REMOTE: &str = "Missing remote configuration";
pub const NOT_IMPLEMENTED: &str = "not implemented yet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootStorageMeta {
    pub config: RootStorageConfig,
    /// Configuration findings, first failure first.
    pub validation_errors: Vec<Notice>,
    pub implemented: bool,
    pub read_only: bool,
}

impl RootStorageMeta {
    /// Builds and validates a descriptor.
    ///
    /// Every check runs; findings are collected in order rather than stopping
    /// at the first one.
    pub fn build(
        kind: StorageKind,
        prefix: impl Into<String>,
        name: impl Into<String>,
        settings: BackendSettings,
    ) -> Self {
        let config = RootStorageConfig::new(kind, prefix, name).with_settings(settings);
        Self::from_config(config)
    }

    pub fn from_config(config: RootStorageConfig) -> Self {
        let mut validation_errors = Vec::new();

        if config.prefix.is_empty() {
            validation_errors.push(Notice::error(MISSING_PREFIX));
        } else if mount_key(&config.prefix).is_none() {
            validation_errors.push(Notice::error(INVALID_PREFIX));
        }

        match config.settings() {
            BackendSettings::S3(s3) if !s3.bucket.is_empty() => {}
            BackendSettings::Disk(disk) if !disk.path.as_os_str().is_empty() => {}
            BackendSettings::Git(git) if !git.remote.is_empty() => {}
            _ => match config.kind {
                StorageKind::S3 => validation_errors.push(Notice::error(MISSING_BUCKET)),
                StorageKind::Disk => validation_errors.push(Notice::error(MISSING_DISK_PATH)),
                StorageKind::Git => validation_errors.push(Notice::error(MISSING_REMOTE)),
                StorageKind::Memory | StorageKind::Sql => {}
            },
        }

        Self {
            implemented: config.kind.is_implemented(),
            read_only: config.read_only,
            config,
            validation_errors,
        }
    }

    pub fn kind(&self) -> StorageKind {
        self.config.kind
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// Path segment the root is addressed by, if the prefix is usable.
    pub fn mount_key(&self) -> Option<String> {
        mount_key(&self.config.prefix)
    }

    pub fn is_misconfigured(&self) -> bool {
        !self.validation_errors.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        !self.is_misconfigured() && self.implemented
    }

    /// Notices shown to operators.
    ///
    /// A correctly configured root whose backend has no read/write logic
    /// reports a single "not implemented" notice, so "misconfigured" and
    /// "unimplemented" stay distinguishable.
    pub fn notices(&self) -> Vec<Notice> {
        if self.is_misconfigured() {
            return self.validation_errors.clone();
        }
        if !self.implemented {
            return vec![Notice::error(NOT_IMPLEMENTED)];
        }
        Vec::new()
    }
}

/// A prefix must normalise to exactly one path segment.
fn mount_key(prefix: &str) -> Option<String> {
    normalize(prefix)
        .ok()
        .filter(|key| !key.is_empty() && !key.contains('/'))
}

#[derive(Serialize)]
struct MetaView<'a> {
    config: &'a RootStorageConfig,
    notice: Vec<Notice>,
    ready: bool,
    read_only: bool,
}

impl Serialize for RootStorageMeta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MetaView {
            config: &self.config,
            notice: self.notices(),
            ready: self.is_ready(),
            read_only: self.read_only,
        }
        .serialize(serializer)
    }
}
