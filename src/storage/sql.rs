use async_trait::async_trait;

use crate::error::Result;
use crate::storage::runtime::unsupported;
use crate::storage::{
    BackendSettings, DeleteResponse, ListResponse, ReadValueResponse, RequestContext,
    RootStorageConfig, RootStorageMeta, StorageKind, StorageRuntime, StorageSqlConfig,
    WriteValueRequest, WriteValueResponse,
};

/// Root stored in a relational table. Descriptor only; operations are unsupported.
pub struct SqlStorage {
    meta: RootStorageMeta,
}

impl SqlStorage {
    pub fn new(prefix: &str, name: &str, settings: Option<StorageSqlConfig>) -> Self {
        let settings = settings.map(BackendSettings::Sql).unwrap_or_default();
        Self {
            meta: RootStorageMeta::build(StorageKind::Sql, prefix, name, settings),
        }
    }

    pub fn from_config(config: RootStorageConfig) -> Self {
        debug_assert_eq!(config.kind, StorageKind::Sql);
        Self {
            meta: RootStorageMeta::from_config(config),
        }
    }
}

#[async_trait]
impl StorageRuntime for SqlStorage {
    fn meta(&self) -> &RootStorageMeta {
        &self.meta
    }

    async fn write(
        &self,
        _ctx: &RequestContext,
        _req: &WriteValueRequest,
    ) -> Result<WriteValueResponse> {
        Ok(unsupported::write(StorageKind::Sql))
    }

    async fn read(&self, _ctx: &RequestContext, _path: &str) -> Result<ReadValueResponse> {
        Ok(unsupported::read(StorageKind::Sql))
    }

    async fn list(&self, _ctx: &RequestContext, _path: &str) -> Result<ListResponse> {
        Ok(unsupported::list(StorageKind::Sql))
    }

    async fn delete(&self, _ctx: &RequestContext, _path: &str) -> Result<DeleteResponse> {
        Ok(unsupported::delete(StorageKind::Sql))
    }
}
