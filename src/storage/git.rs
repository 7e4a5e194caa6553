use async_trait::async_trait;

use crate::error::Result;
use crate::storage::runtime::unsupported;
use crate::storage::{
    BackendSettings, DeleteResponse, ListResponse, ReadValueResponse, RequestContext,
    RootStorageConfig, RootStorageMeta, StorageGitConfig, StorageKind, StorageRuntime,
    WriteValueRequest, WriteValueResponse,
};

/// Git-backed root. Descriptor only; operations are unsupported.
pub struct GitStorage {
    meta: RootStorageMeta,
}

impl GitStorage {
    pub fn new(prefix: &str, name: &str, settings: Option<StorageGitConfig>) -> Self {
        let settings = settings.map(BackendSettings::Git).unwrap_or_default();
        Self {
            meta: RootStorageMeta::build(StorageKind::Git, prefix, name, settings),
        }
    }

    pub fn from_config(config: RootStorageConfig) -> Self {
        debug_assert_eq!(config.kind, StorageKind::Git);
        Self {
            meta: RootStorageMeta::from_config(config),
        }
    }
}

#[async_trait]
impl StorageRuntime for GitStorage {
    fn meta(&self) -> &RootStorageMeta {
        &self.meta
    }

    async fn write(
        &self,
        _ctx: &RequestContext,
        _req: &WriteValueRequest,
    ) -> Result<WriteValueResponse> {
        Ok(unsupported::write(StorageKind::Git))
    }

    async fn read(&self, _ctx: &RequestContext, _path: &str) -> Result<ReadValueResponse> {
        Ok(unsupported::read(StorageKind::Git))
    }

    async fn list(&self, _ctx: &RequestContext, _path: &str) -> Result<ListResponse> {
        Ok(unsupported::list(StorageKind::Git))
    }

    async fn delete(&self, _ctx: &RequestContext, _path: &str) -> Result<DeleteResponse> {
        Ok(unsupported::delete(StorageKind::Git))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::meta::NOT_IMPLEMENTED;
    use crate::storage::status;

    #[tokio::test]
    async fn configured_remote_is_still_unsupported() {
        let storage = GitStorage::new(
            "dashboards",
            "Dashboards",
            Some(StorageGitConfig {
                remote: "https://example.com/dashboards.git".to_string(),
                branch: "main".to_string(),
                root: String::new(),
            }),
        );
        let notices = storage.meta().notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].text, NOT_IMPLEMENTED);

        let ctx = RequestContext::background();
        let res = storage.list(&ctx, "").await.unwrap();
        assert_eq!(res.code, status::INTERNAL);
        assert_eq!(res.message, "unsupported operation (Git)");
        assert!(res.entries.is_empty());
    }
}
