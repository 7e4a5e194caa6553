use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::Result;
use crate::storage::locks::PathLocks;
use crate::storage::path::{file_name, join};
use crate::storage::{
    content_hash, status, BackendSettings, DeleteResponse, ListEntry, ListResponse,
    ReadValueResponse, RequestContext, RootStorageConfig, RootStorageMeta, StorageDiskConfig,
    StorageKind, StorageRuntime, StoredFile, WriteValueRequest, WriteValueResponse,
};

const OUTSIDE_ROOT: &str = "path leaves the storage root";

/// Root backed by a directory on the local filesystem.
///
/// Paths that pass through a symbolic link below the root are refused.
/// Mutations are serialised with [`PathLocks`], so deleting a folder waits for
/// writes below it and the other way round.
pub struct DiskStorage {
    meta: RootStorageMeta,
    root: PathBuf,
    locks: PathLocks,
}

impl DiskStorage {
    pub fn new(prefix: &str, name: &str, root: impl Into<PathBuf>) -> Self {
        let settings = BackendSettings::Disk(StorageDiskConfig { path: root.into() });
        let meta = RootStorageMeta::build(StorageKind::Disk, prefix, name, settings);
        Self::with_meta(meta)
    }

    pub fn from_config(config: RootStorageConfig) -> Self {
        debug_assert_eq!(config.kind, StorageKind::Disk);
        Self::with_meta(RootStorageMeta::from_config(config))
    }

    fn with_meta(meta: RootStorageMeta) -> Self {
        let root = meta
            .config
            .disk
            .as_ref()
            .map(|disk| disk.path.clone())
            .unwrap_or_default();
        Self {
            meta,
            root,
            locks: PathLocks::new(),
        }
    }

    fn data_path(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }

    /// True when any existing segment of `path` is a symbolic link.
    ///
    /// The root directory itself may be a link; nothing below it may.
    async fn crosses_link(&self, path: &str) -> Result<bool> {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = join(&current, segment);
            match fs::symlink_metadata(self.data_path(&current)).await {
                Ok(m) if m.file_type().is_symlink() => return Ok(true),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(false)
    }

    /// True when some parent of `path` exists as a regular file.
    async fn blocked_by_file(&self, path: &str) -> Result<bool> {
        let mut folder = String::new();
        let mut segments: Vec<&str> = path.split('/').collect();
        segments.pop();
        for segment in segments {
            folder = join(&folder, segment);
            match fs::metadata(self.data_path(&folder)).await {
                Ok(m) if m.is_file() => return Ok(true),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(false)
    }
}

fn modified_secs(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl StorageRuntime for DiskStorage {
    fn meta(&self) -> &RootStorageMeta {
        &self.meta
    }

    async fn write(
        &self,
        ctx: &RequestContext,
        req: &WriteValueRequest,
    ) -> Result<WriteValueResponse> {
        ctx.check()?;
        if req.path.is_empty() {
            return Ok(WriteValueResponse::failed(
                status::BAD_REQUEST,
                "cannot write to the root folder",
            ));
        }

        let _guard = self.locks.acquire(&req.path).await;
        ctx.check()?;

        if self.crosses_link(&req.path).await? {
            return Ok(WriteValueResponse::failed(status::BAD_REQUEST, OUTSIDE_ROOT));
        }
        let target = self.data_path(&req.path);
        match fs::metadata(&target).await {
            Ok(m) if m.is_dir() => {
                return Ok(WriteValueResponse::failed(status::BAD_REQUEST, "path is a folder"));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if self.blocked_by_file(&req.path).await? {
            return Ok(WriteValueResponse::failed(status::BAD_REQUEST, "parent path is a file"));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &req.body).await?;
        debug!(path = %target.display(), bytes = req.body.len(), "wrote file");

        Ok(WriteValueResponse::stored(content_hash(&req.body)))
    }

    async fn read(&self, ctx: &RequestContext, path: &str) -> Result<ReadValueResponse> {
        ctx.check()?;
        if self.crosses_link(path).await? {
            return Ok(ReadValueResponse::failed(status::BAD_REQUEST, OUTSIDE_ROOT));
        }
        let target = self.data_path(path);
        let meta = match fs::metadata(&target).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ReadValueResponse::failed(status::NOT_FOUND, "file not found"));
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            return Ok(ReadValueResponse::failed(status::BAD_REQUEST, "path is a folder"));
        }

        let body = match fs::read(&target).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ReadValueResponse::failed(status::NOT_FOUND, "file not found"));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ReadValueResponse::found(StoredFile {
            path: path.to_string(),
            size: body.len() as u64,
            hash: content_hash(&body),
            modified: modified_secs(&meta),
            body,
        }))
    }

    async fn list(&self, ctx: &RequestContext, path: &str) -> Result<ListResponse> {
        ctx.check()?;
        if self.crosses_link(path).await? {
            return Ok(ListResponse::failed(status::BAD_REQUEST, OUTSIDE_ROOT));
        }
        let target = self.data_path(path);
        let meta = match fs::metadata(&target).await {
            Ok(m) => m,
            // A root directory that was never created is an empty folder.
            Err(e) if e.kind() == ErrorKind::NotFound && path.is_empty() => {
                return Ok(ListResponse::listed(Vec::new()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ListResponse::failed(status::NOT_FOUND, "folder not found"));
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_file() {
            return Ok(ListResponse::listed(vec![ListEntry {
                name: file_name(path).to_string(),
                path: path.to_string(),
                is_folder: false,
                size: meta.len(),
            }]));
        }

        let mut entries = Vec::new();
        let mut dir = match fs::read_dir(&target).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ListResponse::failed(status::NOT_FOUND, "folder not found"));
            }
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            // Removed by a concurrent delete.
            let meta = match entry.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            entries.push(ListEntry {
                path: join(path, &name),
                name,
                is_folder: meta.is_dir(),
                size: if meta.is_dir() { 0 } else { meta.len() },
            });
        }
        Ok(ListResponse::listed(entries))
    }

    async fn delete(&self, ctx: &RequestContext, path: &str) -> Result<DeleteResponse> {
        ctx.check()?;
        if path.is_empty() {
            return Ok(DeleteResponse::failed(
                status::BAD_REQUEST,
                "cannot delete the root folder",
            ));
        }

        let _guard = self.locks.acquire(path).await;
        ctx.check()?;

        if self.crosses_link(path).await? {
            return Ok(DeleteResponse::failed(status::BAD_REQUEST, OUTSIDE_ROOT));
        }
        let target = self.data_path(path);
        let meta = match fs::metadata(&target).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(DeleteResponse::failed(status::NOT_FOUND, "file not found"));
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&target).await?;
        } else {
            fs::remove_file(&target).await?;
        }
        debug!(path = %target.display(), "deleted");
        Ok(DeleteResponse::deleted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::error::StorageError;
    use crate::storage::CancelHandle;
    use tempfile::tempdir;

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new("data", "Data", dir.path());
        assert!(storage.meta().is_ready());

        let res = storage
            .write(&ctx(), &WriteValueRequest::new("a/b/hello.txt", "hello"))
            .await
            .unwrap();
        assert_eq!(res.code, status::OK);
        assert_eq!(res.hash.as_deref(), Some(content_hash(b"hello").as_str()));
        assert!(dir.path().join("a/b/hello.txt").exists());

        let read = storage.read(&ctx(), "a/b/hello.txt").await.unwrap();
        assert_eq!(read.code, status::OK);
        let file = read.file.unwrap();
        assert_eq!(file.body, b"hello");
        assert_eq!(file.size, 5);
        assert_eq!(file.path, "a/b/hello.txt");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new("data", "Data", dir.path());
        assert_eq!(storage.read(&ctx(), "nope.txt").await.unwrap().code, status::NOT_FOUND);
        assert_eq!(storage.delete(&ctx(), "nope.txt").await.unwrap().code, status::NOT_FOUND);
        assert_eq!(storage.list(&ctx(), "nope").await.unwrap().code, status::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_shows_direct_children() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new("data", "Data", dir.path());
        for path in ["b.txt", "a.txt", "sub/c.txt"] {
            storage.write(&ctx(), &WriteValueRequest::new(path, "x")).await.unwrap();
        }

        let res = storage.list(&ctx(), "").await.unwrap();
        assert_eq!(res.code, status::OK);
        let names: Vec<_> = res.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["sub", "a.txt", "b.txt"]);
        assert!(res.entries[0].is_folder);

        let res = storage.list(&ctx(), "sub").await.unwrap();
        assert_eq!(res.entries.len(), 1);
        assert_eq!(res.entries[0].path, "sub/c.txt");
        assert_eq!(res.entries[0].size, 1);
    }

    #[tokio::test]
    async fn folders_and_files_do_not_overlap() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new("data", "Data", dir.path());
        storage.write(&ctx(), &WriteValueRequest::new("sub/c.txt", "x")).await.unwrap();

        let res = storage.write(&ctx(), &WriteValueRequest::new("sub", "x")).await.unwrap();
        assert_eq!(res.code, status::BAD_REQUEST);

        let res = storage
            .write(&ctx(), &WriteValueRequest::new("sub/c.txt/d.txt", "x"))
            .await
            .unwrap();
        assert_eq!(res.code, status::BAD_REQUEST);

        assert_eq!(storage.read(&ctx(), "sub").await.unwrap().code, status::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_removes_folders_recursively() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new("data", "Data", dir.path());
        storage.write(&ctx(), &WriteValueRequest::new("sub/deep/c.txt", "x")).await.unwrap();

        assert_eq!(storage.delete(&ctx(), "sub").await.unwrap().code, status::OK);
        assert!(!dir.path().join("sub").exists());
        assert_eq!(storage.delete(&ctx(), "").await.unwrap().code, status::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancelled_context_fails_before_io() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new("data", "Data", dir.path());
        let handle = CancelHandle::new();
        let ctx = handle.context();
        handle.cancel();

        let res = storage.write(&ctx, &WriteValueRequest::new("a.txt", "x")).await;
        assert!(matches!(res, Err(StorageError::Cancelled)));
        assert!(!dir.path().join("a.txt").exists());
        assert!(matches!(storage.read(&ctx, "a.txt").await, Err(StorageError::Cancelled)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_below_the_root_are_refused() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "TOP SECRET").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let storage = DiskStorage::new("data", "Data", dir.path());

        let res = storage.read(&ctx(), "link/secret.txt").await.unwrap();
        assert_eq!(res.code, status::BAD_REQUEST);
        assert!(res.file.is_none());

        let res = storage
            .write(&ctx(), &WriteValueRequest::new("link/planted.txt", "x"))
            .await
            .unwrap();
        assert_eq!(res.code, status::BAD_REQUEST);
        assert!(!outside.path().join("planted.txt").exists());

        assert_eq!(storage.list(&ctx(), "link").await.unwrap().code, status::BAD_REQUEST);
        let res = storage.delete(&ctx(), "link/secret.txt").await.unwrap();
        assert_eq!(res.code, status::BAD_REQUEST);
        assert!(outside.path().join("secret.txt").exists());
    }

    #[tokio::test]
    async fn missing_root_lists_empty() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::new("data", "Data", dir.path().join("never-created"));

        let res = storage.list(&ctx(), "").await.unwrap();
        assert_eq!(res.code, status::OK);
        assert!(res.entries.is_empty());
        assert_eq!(storage.list(&ctx(), "sub").await.unwrap().code, status::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn folder_delete_and_writes_below_it_do_not_collide() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(DiskStorage::new("data", "Data", dir.path()));

        for round in 0..50 {
            let mut tasks = Vec::new();
            for n in 0..8 {
                let storage = Arc::clone(&storage);
                tasks.push(tokio::spawn(async move {
                    let path = format!("sub/deep{}/f{}.txt", n, round);
                    let res = storage.write(&ctx(), &WriteValueRequest::new(path, "x")).await;
                    res.map(|r| r.code)
                }));
            }
            let deleter = Arc::clone(&storage);
            tasks.push(tokio::spawn(async move {
                deleter.delete(&ctx(), "sub").await.map(|r| r.code)
            }));

            for task in tasks {
                let code = task.await.unwrap().unwrap();
                assert!(code == status::OK || code == status::NOT_FOUND, "round {round}: {code}");
            }
        }
    }

    #[test]
    fn empty_path_is_misconfigured() {
        let storage = DiskStorage::new("data", "Data", "");
        assert!(storage.meta().is_misconfigured());
    }
}
