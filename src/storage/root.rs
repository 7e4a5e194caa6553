use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Storage technology a root is mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Disk,
    Memory,
    S3,
    Git,
    Sql,
}

impl StorageKind {
    /// Whether read/write logic exists for this kind.
    pub fn is_implemented(self) -> bool {
        matches!(self, StorageKind::Disk | StorageKind::Memory)
    }

    /// Backend identifier used in operator-facing messages.
    pub fn display_name(self) -> &'static str {
        match self {
            StorageKind::Disk => "Disk",
            StorageKind::Memory => "Memory",
            StorageKind::S3 => "S3",
            StorageKind::Git => "Git",
            StorageKind::Sql => "SQL",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            StorageKind::Disk => "disk",
            StorageKind::Memory => "memory",
            StorageKind::S3 => "s3",
            StorageKind::Git => "git",
            StorageKind::Sql => "sql",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDiskConfig {
    #[serde(default)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageS3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    /// Name of the credential entry to use; secrets never live in this file.
    pub credentials_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageGitConfig {
    pub remote: String,
    pub branch: String,
    pub root: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSqlConfig {
    pub connection_ref: String,
    pub table: String,
}

/// Backend-specific settings handed to the descriptor builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackendSettings {
    #[default]
    None,
    Disk(StorageDiskConfig),
    S3(StorageS3Config),
    Git(StorageGitConfig),
    Sql(StorageSqlConfig),
}

/// How a storage root is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootStorageConfig {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<StorageDiskConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<StorageS3Config>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<StorageGitConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<StorageSqlConfig>,
}

impl RootStorageConfig {
    pub fn new(kind: StorageKind, prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            prefix: prefix.into(),
            name: name.into(),
            description: String::new(),
            read_only: false,
            disk: None,
            s3: None,
            git: None,
            sql: None,
        }
    }

    /// Settings table matching `kind`; tables for other kinds are ignored.
    pub fn settings(&self) -> BackendSettings {
        let settings = match self.kind {
            StorageKind::Disk => self.disk.clone().map(BackendSettings::Disk),
            StorageKind::S3 => self.s3.clone().map(BackendSettings::S3),
            StorageKind::Git => self.git.clone().map(BackendSettings::Git),
            StorageKind::Sql => self.sql.clone().map(BackendSettings::Sql),
            StorageKind::Memory => None,
        };
        settings.unwrap_or_default()
    }

    /// Stores `settings` in the table matching `kind`.
    ///
    /// Mismatched settings are dropped and the kind's table is left at its
    /// defaults, so validation sees them as absent.
    pub(crate) fn with_settings(mut self, settings: BackendSettings) -> Self {
        self.disk = None;
        self.s3 = None;
        self.git = None;
        self.sql = None;
        match (self.kind, settings) {
            (StorageKind::Disk, BackendSettings::Disk(cfg)) => self.disk = Some(cfg),
            (StorageKind::S3, BackendSettings::S3(cfg)) => self.s3 = Some(cfg),
            (StorageKind::Git, BackendSettings::Git(cfg)) => self.git = Some(cfg),
            (StorageKind::Sql, BackendSettings::Sql(cfg)) => self.sql = Some(cfg),
            (StorageKind::Disk, _) => self.disk = Some(StorageDiskConfig::default()),
            (StorageKind::S3, _) => self.s3 = Some(StorageS3Config::default()),
            (StorageKind::Git, _) => self.git = Some(StorageGitConfig::default()),
            (StorageKind::Sql, _) => self.sql = Some(StorageSqlConfig::default()),
            (StorageKind::Memory, _) => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_root_with_settings_table() {
        let cfg: RootStorageConfig = toml::from_str(
            r#"
            type = "s3"
            prefix = "assets"
            name = "Assets"

            [s3]
            bucket = "grafana-assets"
            region = "eu-west-1"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.kind, StorageKind::S3);
        assert!(!cfg.read_only);
        match cfg.settings() {
            BackendSettings::S3(s3) => {
                assert_eq!(s3.bucket, "grafana-assets");
                assert_eq!(s3.endpoint, "");
            }
            other => panic!("unexpected settings: {other:?}"),
        }
    }

    #[test]
    fn settings_for_other_kind_are_ignored() {
        let mut cfg = RootStorageConfig::new(StorageKind::S3, "p", "n");
        cfg.disk = Some(StorageDiskConfig {
            path: PathBuf::from("/tmp"),
        });
        assert_eq!(cfg.settings(), BackendSettings::None);

        let cfg = cfg.with_settings(BackendSettings::Disk(StorageDiskConfig::default()));
        assert!(cfg.disk.is_none());
        assert_eq!(cfg.s3, Some(StorageS3Config::default()));
    }

    #[test]
    fn kind_names() {
        assert_eq!(StorageKind::Sql.to_string(), "sql");
        assert_eq!(StorageKind::Sql.display_name(), "SQL");
        assert!(StorageKind::Memory.is_implemented());
        assert!(!StorageKind::S3.is_implemented());
    }
}
