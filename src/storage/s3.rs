use async_trait::async_trait;

use crate::error::Result;
use crate::storage::runtime::unsupported;
use crate::storage::{
    BackendSettings, DeleteResponse, ListResponse, ReadValueResponse, RequestContext,
    RootStorageConfig, RootStorageMeta, StorageKind, StorageRuntime, StorageS3Config,
    WriteValueRequest, WriteValueResponse,
};

/// Object storage root.
///
/// Only the descriptor is real: every operation answers
/// `500 unsupported operation (S3)`, whatever the request or context.
pub struct S3Storage {
    meta: RootStorageMeta,
    settings: StorageS3Config,
}

impl S3Storage {
    pub fn new(prefix: &str, name: &str, settings: Option<StorageS3Config>) -> Self {
        let settings = settings.unwrap_or_default();
        let meta = RootStorageMeta::build(
            StorageKind::S3,
            prefix,
            name,
            BackendSettings::S3(settings.clone()),
        );
        Self { meta, settings }
    }

    pub fn from_config(config: RootStorageConfig) -> Self {
        debug_assert_eq!(config.kind, StorageKind::S3);
        let settings = config.s3.clone().unwrap_or_default();
        Self {
            meta: RootStorageMeta::from_config(config),
            settings,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.settings.bucket
    }
}

#[async_trait]
impl StorageRuntime for S3Storage {
    fn meta(&self) -> &RootStorageMeta {
        &self.meta
    }

    async fn write(
        &self,
        _ctx: &RequestContext,
        _req: &WriteValueRequest,
    ) -> Result<WriteValueResponse> {
        Ok(unsupported::write(StorageKind::S3))
    }

    async fn read(&self, _ctx: &RequestContext, _path: &str) -> Result<ReadValueResponse> {
        Ok(unsupported::read(StorageKind::S3))
    }

    async fn list(&self, _ctx: &RequestContext, _path: &str) -> Result<ListResponse> {
        Ok(unsupported::list(StorageKind::S3))
    }

    async fn delete(&self, _ctx: &RequestContext, _path: &str) -> Result<DeleteResponse> {
        Ok(unsupported::delete(StorageKind::S3))
    }
}
