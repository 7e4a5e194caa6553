use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::storage::path::{file_name, join};
use crate::storage::{
    content_hash, status, BackendSettings, DeleteResponse, ListEntry, ListResponse,
    ReadValueResponse, RequestContext, RootStorageConfig, RootStorageMeta, StorageKind,
    StorageRuntime, StoredFile, WriteValueRequest, WriteValueResponse,
};

#[derive(Debug, Clone)]
struct MemoryFile {
    body: Vec<u8>,
    hash: String,
    modified: u64,
}

/// Process-local root. Folders exist only as prefixes of stored paths.
pub struct MemoryStorage {
    meta: RootStorageMeta,
    files: RwLock<BTreeMap<String, MemoryFile>>,
}

fn folder_prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{}/", path)
    }
}

fn is_folder(files: &BTreeMap<String, MemoryFile>, path: &str) -> bool {
    let prefix = folder_prefix(path);
    files
        .range(prefix.clone()..)
        .next()
        .map(|(key, _)| key.starts_with(&prefix))
        .unwrap_or(false)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl MemoryStorage {
    pub fn new(prefix: &str, name: &str) -> Self {
        let meta = RootStorageMeta::build(StorageKind::Memory, prefix, name, BackendSettings::None);
        Self::with_meta(meta)
    }

    pub fn from_config(config: RootStorageConfig) -> Self {
        debug_assert_eq!(config.kind, StorageKind::Memory);
        Self::with_meta(RootStorageMeta::from_config(config))
    }

    fn with_meta(meta: RootStorageMeta) -> Self {
        Self {
            meta,
            files: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl StorageRuntime for MemoryStorage {
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

        let mut files = self.files.write().await;
        if is_folder(&files, &req.path) {
            return Ok(WriteValueResponse::failed(status::BAD_REQUEST, "path is a folder"));
        }
        let mut parent = String::new();
        let mut segments: Vec<&str> = req.path.split('/').collect();
        segments.pop();
        for segment in segments {
            parent = join(&parent, segment);
            if files.contains_key(&parent) {
                return Ok(WriteValueResponse::failed(
                    status::BAD_REQUEST,
                    "parent path is a file",
                ));
            }
        }

        let hash = content_hash(&req.body);
        files.insert(
            req.path.clone(),
            MemoryFile {
                body: req.body.clone(),
                hash: hash.clone(),
                modified: now_secs(),
            },
        );
        Ok(WriteValueResponse::stored(hash))
    }

    async fn read(&self, ctx: &RequestContext, path: &str) -> Result<ReadValueResponse> {
        ctx.check()?;
        let files = self.files.read().await;
        match files.get(path) {
            Some(file) => Ok(ReadValueResponse::found(StoredFile {
                path: path.to_string(),
                body: file.body.clone(),
                size: file.body.len() as u64,
                hash: file.hash.clone(),
                modified: file.modified,
            })),
            None if path.is_empty() || is_folder(&files, path) => {
                Ok(ReadValueResponse::failed(status::BAD_REQUEST, "path is a folder"))
            }
            None => Ok(ReadValueResponse::failed(status::NOT_FOUND, "file not found")),
        }
    }

    async fn list(&self, ctx: &RequestContext, path: &str) -> Result<ListResponse> {
        ctx.check()?;
        let files = self.files.read().await;
        if let Some(file) = files.get(path) {
            return Ok(ListResponse::listed(vec![ListEntry {
                name: file_name(path).to_string(),
                path: path.to_string(),
                is_folder: false,
                size: file.body.len() as u64,
            }]));
        }

        let prefix = folder_prefix(path);
        let mut children: BTreeMap<String, ListEntry> = BTreeMap::new();
        for (key, file) in files.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            let (name, is_folder) = match rest.split_once('/') {
                Some((folder, _)) => (folder, true),
                None => (rest, false),
            };
            children.entry(name.to_string()).or_insert_with(|| ListEntry {
                name: name.to_string(),
                path: join(path, name),
                is_folder,
                size: if is_folder { 0 } else { file.body.len() as u64 },
            });
        }

        if children.is_empty() && !path.is_empty() {
            return Ok(ListResponse::failed(status::NOT_FOUND, "folder not found"));
        }
        Ok(ListResponse::listed(children.into_values().collect()))
    }

    async fn delete(&self, ctx: &RequestContext, path: &str) -> Result<DeleteResponse> {
        ctx.check()?;
        if path.is_empty() {
            return Ok(DeleteResponse::failed(
                status::BAD_REQUEST,
                "cannot delete the root folder",
            ));
        }

        let mut files = self.files.write().await;
        if files.remove(path).is_some() {
            return Ok(DeleteResponse::deleted());
        }
        let prefix = folder_prefix(path);
        let before = files.len();
        files.retain(|key, _| !key.starts_with(&prefix));
        if files.len() == before {
            return Ok(DeleteResponse::failed(status::NOT_FOUND, "file not found"));
        }
        Ok(DeleteResponse::deleted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::CancelHandle;
    use std::sync::Arc;

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    async fn seeded() -> MemoryStorage {
        let storage = MemoryStorage::new("scratch", "Scratch");
        for path in ["notes.txt", "img/a.png", "img/icons/b.svg"] {
            let res = storage
                .write(&ctx(), &WriteValueRequest::new(path, path.as_bytes().to_vec()))
                .await
                .unwrap();
            assert_eq!(res.code, status::OK);
        }
        storage
    }

    #[tokio::test]
    async fn reads_back_written_body() {
        let storage = seeded().await;
        let res = storage.read(&ctx(), "img/a.png").await.unwrap();
        let file = res.file.unwrap();
        assert_eq!(file.body, b"img/a.png");
        assert_eq!(file.hash, content_hash(b"img/a.png"));
        assert_eq!(storage.read(&ctx(), "img").await.unwrap().code, status::BAD_REQUEST);
        assert_eq!(storage.read(&ctx(), "missing").await.unwrap().code, status::NOT_FOUND);
    }

    #[tokio::test]
    async fn lists_implicit_folders() {
        let storage = seeded().await;

        let root = storage.list(&ctx(), "").await.unwrap();
        let names: Vec<_> = root.entries.iter().map(|e| (e.name.as_str(), e.is_folder)).collect();
        assert_eq!(names, vec![("img", true), ("notes.txt", false)]);

        let img = storage.list(&ctx(), "img").await.unwrap();
        let paths: Vec<_> = img.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["img/icons", "img/a.png"]);

        // "im" is a prefix of "img" but not a folder.
        assert_eq!(storage.list(&ctx(), "im").await.unwrap().code, status::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_root_lists_nothing() {
        let storage = MemoryStorage::new("scratch", "Scratch");
        let res = storage.list(&ctx(), "").await.unwrap();
        assert_eq!(res.code, status::OK);
        assert!(res.entries.is_empty());
    }

    #[tokio::test]
    async fn rejects_file_folder_collisions() {
        let storage = seeded().await;
        let res = storage.write(&ctx(), &WriteValueRequest::new("img", "x")).await.unwrap();
        assert_eq!(res.code, status::BAD_REQUEST);
        let res = storage
            .write(&ctx(), &WriteValueRequest::new("notes.txt/x", "x"))
            .await
            .unwrap();
        assert_eq!(res.code, status::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deletes_files_and_folders() {
        let storage = seeded().await;
        assert_eq!(storage.delete(&ctx(), "img").await.unwrap().code, status::OK);
        assert_eq!(storage.list(&ctx(), "img").await.unwrap().code, status::NOT_FOUND);
        assert_eq!(storage.delete(&ctx(), "notes.txt").await.unwrap().code, status::OK);
        assert_eq!(storage.delete(&ctx(), "notes.txt").await.unwrap().code, status::NOT_FOUND);
    }

    #[tokio::test]
    async fn cancelled_context_is_an_error() {
        let storage = MemoryStorage::new("scratch", "Scratch");
        let handle = CancelHandle::new();
        let ctx = handle.context();
        handle.cancel();
        let res = storage.write(&ctx, &WriteValueRequest::new("a", "b")).await;
        assert!(matches!(res, Err(StorageError::Cancelled)));
    }

    #[tokio::test]
    async fn concurrent_writers_to_distinct_paths() {
        let storage = Arc::new(MemoryStorage::new("scratch", "Scratch"));
        let mut tasks = Vec::new();
        for i in 0..16 {
            let storage = Arc::clone(&storage);
            tasks.push(tokio::spawn(async move {
                let req = WriteValueRequest::new(format!("f/{}.txt", i), vec![i as u8]);
                storage.write(&RequestContext::background(), &req).await.unwrap()
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().code, status::OK);
        }
        assert_eq!(storage.list(&ctx(), "f").await.unwrap().entries.len(), 16);
    }
}
