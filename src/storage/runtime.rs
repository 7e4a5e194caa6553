use async_trait::async_trait;

use crate::error::Result;
use crate::storage::{
    status, DeleteResponse, ListResponse, ReadValueResponse, RequestContext, RootStorageMeta,
    StorageKind, WriteValueRequest, WriteValueResponse,
};

/// Operation surface every mounted root exposes.
///
/// Paths are normalised and relative to the root. Outcomes a caller can act
/// on (not found, unsupported, ...) are reported through response codes; the
/// error channel is reserved for cancellation and infrastructure failures.
#[async_trait]
pub trait StorageRuntime: Send + Sync {
    fn meta(&self) -> &RootStorageMeta;

    async fn write(
        &self,
        ctx: &RequestContext,
        req: &WriteValueRequest,
    ) -> Result<WriteValueResponse>;

    async fn read(&self, ctx: &RequestContext, path: &str) -> Result<ReadValueResponse>;

    async fn list(&self, ctx: &RequestContext, path: &str) -> Result<ListResponse>;

    async fn delete(&self, ctx: &RequestContext, path: &str) -> Result<DeleteResponse>;
}

pub fn unsupported_message(kind: StorageKind) -> String {
    format!("unsupported operation ({})", kind.display_name())
}

/// Canned responses for backends without read/write logic.
pub(crate) mod unsupported {
    use super::*;

    pub fn write(kind: StorageKind) -> WriteValueResponse {
        WriteValueResponse::failed(status::INTERNAL, unsupported_message(kind))
    }

    pub fn read(kind: StorageKind) -> ReadValueResponse {
        ReadValueResponse::failed(status::INTERNAL, unsupported_message(kind))
    }

    pub fn list(kind: StorageKind) -> ListResponse {
        ListResponse::failed(status::INTERNAL, unsupported_message(kind))
    }

    pub fn delete(kind: StorageKind) -> DeleteResponse {
        DeleteResponse::failed(status::INTERNAL, unsupported_message(kind))
    }
}
