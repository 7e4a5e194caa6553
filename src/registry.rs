//! Mounted storage roots and request dispatch.
//!
//! Every request path starts with the prefix of the root it addresses
//! (`data/reports/q1.csv` goes to the root mounted at `data`). The registry
//! normalises the path, picks the root, applies root-level policy (read-only,
//! size limit) and forwards the remainder of the path to the backend.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, StorageError};
use crate::storage::path::{normalize, split_root};
use crate::storage::{
    self, status, DeleteResponse, ListEntry, ListResponse, ReadValueResponse, RequestContext,
    RootStorageMeta, StorageRuntime, WriteValueRequest, WriteValueResponse,
};

pub struct StorageRegistry {
    roots: Vec<Arc<dyn StorageRuntime>>,
    by_prefix: HashMap<String, usize>,
    max_file_size: usize,
}

enum Route<'a> {
    /// The path names the top level, above every root.
    Top,
    Root {
        key: String,
        runtime: &'a Arc<dyn StorageRuntime>,
        path: String,
    },
    Rejected(u16, String),
}

impl StorageRegistry {
    pub fn new(max_file_size: usize) -> Self {
        Self {
            roots: Vec::new(),
            by_prefix: HashMap::new(),
            max_file_size,
        }
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let mut registry = Self::new(config.max_file_size);
        for root in &config.roots {
            registry
                .register(storage::open(root))
                .with_context(|| format!("failed to mount storage root '{}'", root.name))?;
        }
        Ok(registry)
    }

    /// Mounts a root under its prefix.
    ///
    /// Roots without a usable prefix are kept so they show up in
    /// [`roots`](Self::roots), but no path reaches them.
    pub fn register(&mut self, runtime: Arc<dyn StorageRuntime>) -> Result<()> {
        let meta = runtime.meta();
        let key = meta.mount_key();
        if let Some(key) = &key {
            if self.by_prefix.contains_key(key) {
                return Err(StorageError::DuplicatePrefix(key.clone()));
            }
        }

        for notice in meta.notices() {
            warn!(
                prefix = %meta.prefix(),
                name = %meta.config.name,
                severity = ?notice.severity,
                "storage root notice: {}",
                notice.text
            );
        }
        info!(
            prefix = %meta.prefix(),
            kind = %meta.kind(),
            ready = meta.is_ready(),
            read_only = meta.read_only,
            "mounted storage root"
        );

        if let Some(key) = key {
            self.by_prefix.insert(key, self.roots.len());
        }
        self.roots.push(runtime);
        Ok(())
    }

    /// Descriptors of every registered root, in registration order.
    pub fn roots(&self) -> Vec<RootStorageMeta> {
        self.roots.iter().map(|root| root.meta().clone()).collect()
    }

    pub fn root(&self, prefix: &str) -> Option<&Arc<dyn StorageRuntime>> {
        self.by_prefix.get(prefix).map(|&i| &self.roots[i])
    }

    fn route(&self, path: &str) -> Route<'_> {
        let path = match normalize(path) {
            Ok(p) => p,
            Err(e) => return Route::Rejected(status::BAD_REQUEST, e.to_string()),
        };
        if path.is_empty() {
            return Route::Top;
        }

        let (key, rest) = split_root(&path);
        let Some(runtime) = self.root(key) else {
            return Route::Rejected(
                status::NOT_FOUND,
                format!("storage root not found ({})", key),
            );
        };
        if runtime.meta().is_misconfigured() {
            return Route::Rejected(
                status::INTERNAL,
                format!("storage root is misconfigured ({})", key),
            );
        }
        Route::Root {
            key: key.to_string(),
            runtime,
            path: rest.to_string(),
        }
    }

    pub async fn write(
        &self,
        ctx: &RequestContext,
        mut req: WriteValueRequest,
    ) -> Result<WriteValueResponse> {
        let requested = req.path.clone();
        let res = match self.route(&requested) {
            Route::Rejected(code, message) => WriteValueResponse::failed(code, message),
            Route::Top => {
                WriteValueResponse::failed(status::BAD_REQUEST, "cannot write to the root folder")
            }
            Route::Root { key, runtime, path } => {
                if runtime.meta().read_only {
                    WriteValueResponse::failed(
                        status::FORBIDDEN,
                        format!("storage root is read-only ({})", key),
                    )
                } else if req.body.len() > self.max_file_size {
                    WriteValueResponse::failed(
                        status::PAYLOAD_TOO_LARGE,
                        format!(
                            "file too large: {} bytes (limit {})",
                            req.body.len(),
                            self.max_file_size
                        ),
                    )
                } else if path.is_empty() {
                    WriteValueResponse::failed(
                        status::BAD_REQUEST,
                        "cannot write to the root folder",
                    )
                } else {
                    req.path = path;
                    runtime.write(ctx, &req).await?
                }
            }
        };
        log_outcome("write", &requested, res.code, &res.message);
        Ok(res)
    }

    pub async fn read(&self, ctx: &RequestContext, path: &str) -> Result<ReadValueResponse> {
        let res = match self.route(path) {
            Route::Rejected(code, message) => ReadValueResponse::failed(code, message),
            Route::Top => ReadValueResponse::failed(status::BAD_REQUEST, "path is a folder"),
            Route::Root { key, runtime, path } => {
                let mut res = runtime.read(ctx, &path).await?;
                if let Some(file) = res.file.as_mut() {
                    file.path = storage::path::join(&key, &file.path);
                }
                res
            }
        };
        log_outcome("read", path, res.code, &res.message);
        Ok(res)
    }

    pub async fn list(&self, ctx: &RequestContext, path: &str) -> Result<ListResponse> {
        let res = match self.route(path) {
            Route::Rejected(code, message) => ListResponse::failed(code, message),
            Route::Top => {
                ctx.check()?;
                ListResponse::listed(
                    self.by_prefix
                        .keys()
                        .map(|key| ListEntry {
                            name: key.clone(),
                            path: key.clone(),
                            is_folder: true,
                            size: 0,
                        })
                        .collect(),
                )
            }
            Route::Root { key, runtime, path } => {
                let mut res = runtime.list(ctx, &path).await?;
                for entry in &mut res.entries {
                    entry.path = storage::path::join(&key, &entry.path);
                }
                res
            }
        };
        log_outcome("list", path, res.code, &res.message);
        Ok(res)
    }

    pub async fn delete(&self, ctx: &RequestContext, path: &str) -> Result<DeleteResponse> {
        let res = match self.route(path) {
            Route::Rejected(code, message) => DeleteResponse::failed(code, message),
            Route::Top => {
                DeleteResponse::failed(status::BAD_REQUEST, "cannot delete the root folder")
            }
            Route::Root { key, runtime, path } => {
                if runtime.meta().read_only {
                    DeleteResponse::failed(
                        status::FORBIDDEN,
                        format!("storage root is read-only ({})", key),
                    )
                } else {
                    runtime.delete(ctx, &path).await?
                }
            }
        };
        log_outcome("delete", path, res.code, &res.message);
        Ok(res)
    }
}

fn log_outcome(op: &str, path: &str, code: u16, message: &str) {
    if !status::is_success(code) {
        debug!(op, path, code, detail = message, "storage request not fulfilled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::s3::S3Storage;
    use crate::storage::{RootStorageConfig, StorageKind, StorageS3Config};

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn registry() -> StorageRegistry {
        let mut registry = StorageRegistry::new(16);
        registry
            .register(Arc::new(MemoryStorage::new("scratch", "Scratch")))
            .unwrap();
        let mut public = RootStorageConfig::new(StorageKind::Memory, "public", "Public");
        public.read_only = true;
        registry.register(storage::open(&public)).unwrap();
        registry
            .register(Arc::new(S3Storage::new(
                "bucket",
                "Bucket",
                Some(StorageS3Config {
                    bucket: "b1".to_string(),
                    ..Default::default()
                }),
            )))
            .unwrap();
        registry
            .register(Arc::new(S3Storage::new("broken", "Broken", None)))
            .unwrap();
        registry
            .register(Arc::new(MemoryStorage::new("", "Unmounted")))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn round_trips_through_prefix() {
        let registry = registry();
        let res = registry
            .write(&ctx(), WriteValueRequest::new("/scratch//a/b.txt", "hi"))
            .await
            .unwrap();
        assert_eq!(res.code, status::OK);

        let res = registry.read(&ctx(), "scratch/a/b.txt").await.unwrap();
        assert_eq!(res.code, status::OK);
        assert_eq!(res.file.unwrap().path, "scratch/a/b.txt");

        let res = registry.list(&ctx(), "scratch/a").await.unwrap();
        assert_eq!(res.entries[0].path, "scratch/a/b.txt");

        assert_eq!(registry.delete(&ctx(), "scratch/a").await.unwrap().code, status::OK);
        assert_eq!(
            registry.read(&ctx(), "scratch/a/b.txt").await.unwrap().code,
            status::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn rejects_bad_paths_and_unknown_roots() {
        let registry = registry();
        let res = registry.read(&ctx(), "scratch/../etc/passwd").await.unwrap();
        assert_eq!(res.code, status::BAD_REQUEST);

        let res = registry.read(&ctx(), "nowhere/file").await.unwrap();
        assert_eq!(res.code, status::NOT_FOUND);
        assert_eq!(res.message, "storage root not found (nowhere)");
    }

    #[tokio::test]
    async fn enforces_root_policy() {
        let registry = registry();
        let res = registry
            .write(&ctx(), WriteValueRequest::new("public/x.txt", "x"))
            .await
            .unwrap();
        assert_eq!(res.code, status::FORBIDDEN);
        assert_eq!(
            registry.delete(&ctx(), "public/x.txt").await.unwrap().code,
            status::FORBIDDEN
        );

        let res = registry
            .write(&ctx(), WriteValueRequest::new("scratch/big", vec![0u8; 17]))
            .await
            .unwrap();
        assert_eq!(res.code, status::PAYLOAD_TOO_LARGE);

        let res = registry
            .write(&ctx(), WriteValueRequest::new("scratch", "x"))
            .await
            .unwrap();
        assert_eq!(res.code, status::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stub_and_misconfigured_roots() {
        let registry = registry();
        let res = registry
            .write(&ctx(), WriteValueRequest::new("bucket/a.txt", "x"))
            .await
            .unwrap();
        assert_eq!(res.code, status::INTERNAL);
        assert_eq!(res.message, "unsupported operation (S3)");

        let res = registry
            .write(&ctx(), WriteValueRequest::new("broken/a.txt", "x"))
            .await
            .unwrap();
        assert_eq!(res.code, status::INTERNAL);
        assert_eq!(res.message, "storage root is misconfigured (broken)");
    }

    #[tokio::test]
    async fn top_level_lists_addressable_roots() {
        let registry = registry();
        let res = registry.list(&ctx(), "/").await.unwrap();
        let names: Vec<_> = res.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["broken", "bucket", "public", "scratch"]);
        assert_eq!(registry.roots().len(), 5);
    }

    #[test]
    fn duplicate_prefix_is_rejected() {
        let mut registry = registry();
        let err = registry
            .register(Arc::new(MemoryStorage::new("/scratch", "Again")))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicatePrefix(ref p) if p == "scratch"));

        // Unaddressable roots never collide.
        registry
            .register(Arc::new(MemoryStorage::new("", "Another")))
            .unwrap();
    }
}
