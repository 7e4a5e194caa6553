use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::storage::status;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteValueRequest {
    pub path: String,
    #[serde(default)]
    pub body: Vec<u8>,
    /// Free-form change description, kept by backends that version content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WriteValueRequest {
    pub fn new(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            body: body.into(),
            message: None,
        }
    }
}

/// Outcome of a write. Callers must branch on `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteValueResponse {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl WriteValueResponse {
    pub fn stored(hash: String) -> Self {
        Self {
            code: status::OK,
            message: "ok".to_string(),
            hash: Some(hash),
        }
    }

    pub fn failed(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hash: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub path: String,
    pub body: Vec<u8>,
    pub size: u64,
    pub hash: String,
    /// Seconds since the unix epoch.
    pub modified: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadValueResponse {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<StoredFile>,
}

impl ReadValueResponse {
    pub fn found(file: StoredFile) -> Self {
        Self {
            code: status::OK,
            message: "ok".to_string(),
            file: Some(file),
        }
    }

    pub fn failed(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub name: String,
    pub path: String,
    pub is_folder: bool,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub code: u16,
    pub message: String,
    pub entries: Vec<ListEntry>,
}

impl ListResponse {
    /// Folders first, then by name.
    pub fn listed(mut entries: Vec<ListEntry>) -> Self {
        entries.sort_by(|a, b| b.is_folder.cmp(&a.is_folder).then_with(|| a.name.cmp(&b.name)));
        Self {
            code: status::OK,
            message: "ok".to_string(),
            entries,
        }
    }

    pub fn failed(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub code: u16,
    pub message: String,
}

impl DeleteResponse {
    pub fn deleted() -> Self {
        Self {
            code: status::OK,
            message: "ok".to_string(),
        }
    }

    pub fn failed(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Lowercase hex SHA-256 of a stored body.
pub fn content_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
