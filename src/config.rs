use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};

use crate::storage::{RootStorageConfig, StorageDiskConfig, StorageKind};

pub const DEFAULT_CONFIG_FILE: &str = "rootstore.toml";
pub const MAX_FILE_SIZE: usize = 1024 * 1024 * 1024; // 1GB

fn default_max_file_size() -> usize {
    MAX_FILE_SIZE
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    #[serde(default = "default_true")]
    pub auto_create_directories: bool,
    #[serde(default)]
    pub roots: Vec<RootStorageConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let mut data = RootStorageConfig::new(StorageKind::Disk, "data", "Local data");
        data.disk = Some(StorageDiskConfig {
            path: PathBuf::from("./data"),
        });
        let scratch = RootStorageConfig::new(StorageKind::Memory, "scratch", "Scratch space");

        Self {
            max_file_size: MAX_FILE_SIZE,
            auto_create_directories: true,
            roots: vec![data, scratch],
        }
    }
}

impl ServerConfig {
    pub fn load_or_create(config_path: Option<&str>) -> Result<Self> {
        let config_file = config_path.unwrap_or(DEFAULT_CONFIG_FILE);

        if Path::new(config_file).exists() {
            Self::load(config_file)
        } else {
            let config = Self::default();
            config.save(config_file)?;
            tracing::info!("Wrote default configuration to {}", config_file);
            Ok(config)
        }
    }

    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save(&self, config_path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Creates the directory of every writable disk root.
    pub fn ensure_directories(&self) -> Result<()> {
        if !self.auto_create_directories {
            return Ok(());
        }

        for root in &self.roots {
            if root.kind != StorageKind::Disk || root.read_only {
                continue;
            }
            let Some(disk) = &root.disk else { continue };
            if disk.path.as_os_str().is_empty() || disk.path.exists() {
                continue;
            }
            std::fs::create_dir_all(&disk.path)?;
            tracing::info!("Created directory for root '{}': {:?}", root.prefix, disk.path);
        }
        Ok(())
    }
}
