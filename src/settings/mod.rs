// mongotool/src/settings/mod.rs
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::storage::StorageSpec;

const SETTINGS_FILE_NAME: &str = ".mongotool_settings.json";

/// A saved copy operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyTask {
    pub source_uri: String,
    pub target_uri: String,
    pub source_db: String,
    pub target_db: String,
    /// Specific collections to copy; `None` copies the whole database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
    /// Rename for a single-collection copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_collection: Option<String>,
    #[serde(default)]
    pub drop_target: bool,
    #[serde(default)]
    pub verify: bool,
    #[serde(default)]
    pub force_driver: bool,
}

/// A saved backup operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupTask {
    pub uri: String,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
    pub storage: StorageSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
}

/// A saved restore operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreTask {
    pub uri: String,
    pub backup_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_database: Option<String>,
    pub storage: StorageSpec,
    #[serde(default)]
    pub drop_target: bool,
}

/// Named, replayable task definition, tagged by operation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskConfig {
    Copy(CopyTask),
    Backup(BackupTask),
    Restore(RestoreTask),
}

impl TaskConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskConfig::Copy(_) => "copy",
            TaskConfig::Backup(_) => "backup",
            TaskConfig::Restore(_) => "restore",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Settings {
    #[serde(default)]
    hosts: BTreeMap<String, String>,
    #[serde(default)]
    tasks: BTreeMap<String, TaskConfig>,
    #[serde(default)]
    storages: BTreeMap<String, StorageSpec>,
}

/// Persistent store for named hosts, tasks and storage configurations.
///
/// The whole file is read at open and rewritten on every mutation; there is
/// no partial update and no locking against concurrent writers (last writer
/// wins). Engines never touch the store, they only receive task values.
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    pub fn default_path() -> PathBuf {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(SETTINGS_FILE_NAME)
    }

    pub fn open(path: PathBuf) -> Self {
        let settings = if path.exists() {
            match fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
            {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("⚠ Error loading settings from {}: {}", path.display(), e);
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };
        Self { path, settings }
    }

    fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.settings)
            .context("Failed to serialize settings")?;
        fs::write(&self.path, text)
            .with_context(|| format!("Failed to write settings file {}", self.path.display()))
    }

    pub fn add_host(&mut self, name: &str, uri: &str) -> Result<()> {
        self.settings.hosts.insert(name.to_string(), uri.to_string());
        self.save()
    }

    pub fn get_host(&self, name: &str) -> Option<&String> {
        self.settings.hosts.get(name)
    }

    pub fn list_hosts(&self) -> &BTreeMap<String, String> {
        &self.settings.hosts
    }

    pub fn delete_host(&mut self, name: &str) -> Result<bool> {
        let removed = self.settings.hosts.remove(name).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn add_task(&mut self, name: &str, task: TaskConfig) -> Result<()> {
        self.settings.tasks.insert(name.to_string(), task);
        self.save()
    }

    pub fn get_task(&self, name: &str) -> Option<&TaskConfig> {
        self.settings.tasks.get(name)
    }

    pub fn list_tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.settings.tasks
    }

    pub fn delete_task(&mut self, name: &str) -> Result<bool> {
        let removed = self.settings.tasks.remove(name).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn add_storage(&mut self, name: &str, spec: StorageSpec) -> Result<()> {
        self.settings.storages.insert(name.to_string(), spec);
        self.save()
    }

    pub fn get_storage(&self, name: &str) -> Option<&StorageSpec> {
        self.settings.storages.get(name)
    }

    pub fn list_storages(&self) -> &BTreeMap<String, StorageSpec> {
        &self.settings.storages
    }

    pub fn delete_storage(&mut self, name: &str) -> Result<bool> {
        let removed = self.settings.storages.remove(name).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_copy_task() -> TaskConfig {
        TaskConfig::Copy(CopyTask {
            source_uri: "mongodb://localhost:27017".to_string(),
            target_uri: "mongodb://staging:27017".to_string(),
            source_db: "shop".to_string(),
            target_db: "shop_staging".to_string(),
            collections: Some(vec!["orders".to_string()]),
            target_collection: None,
            drop_target: true,
            verify: true,
            force_driver: false,
        })
    }

    #[test]
    fn test_store_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::open(path.clone());
        store.add_host("prod", "mongodb://prod:27017")?;
        store.add_task("nightly", sample_copy_task())?;
        store.add_storage(
            "offsite",
            StorageSpec::parse("ssh://backup.example.com/srv/backups")?,
        )?;

        let reloaded = SettingsStore::open(path);
        assert_eq!(
            reloaded.get_host("prod"),
            Some(&"mongodb://prod:27017".to_string())
        );
        assert_eq!(reloaded.get_task("nightly"), Some(&sample_copy_task()));
        assert!(reloaded.get_storage("offsite").is_some());
        Ok(())
    }

    #[test]
    fn test_delete_missing_returns_false() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = SettingsStore::open(dir.path().join("settings.json"));
        assert!(!store.delete_task("nope")?);
        assert!(!store.delete_host("nope")?);
        assert!(!store.delete_storage("nope")?);
        Ok(())
    }

    #[test]
    fn test_task_config_tagged_parse() -> Result<()> {
        let value = json!({
            "type": "backup",
            "uri": "mongodb://localhost:27017",
            "database": "shop",
            "storage": {"type": "local", "path": "/var/backups"}
        });
        let task: TaskConfig = serde_json::from_value(value)?;
        match task {
            TaskConfig::Backup(backup) => {
                assert_eq!(backup.database, "shop");
                assert_eq!(backup.collections, None);
            }
            other => panic!("expected backup task, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_task_config_restore_parse() -> Result<()> {
        let value = json!({
            "type": "restore",
            "uri": "mongodb://localhost:27017",
            "backup_file": "/var/backups/2024_01_02-shop.tar.gz",
            "target_database": "shop_restored",
            "storage": {"type": "local", "path": "/var/backups"},
            "drop_target": true
        });
        let task: TaskConfig = serde_json::from_value(value)?;
        assert_eq!(task.kind(), "restore");
        Ok(())
    }

    #[test]
    fn test_task_config_unknown_type_fails() {
        let value = json!({"type": "replicate", "uri": "mongodb://x"});
        assert!(serde_json::from_value::<TaskConfig>(value).is_err());
    }

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("absent.json"));
        assert!(store.list_hosts().is_empty());
        assert!(store.list_tasks().is_empty());
        assert!(store.list_storages().is_empty());
    }
}
