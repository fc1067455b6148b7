// mongotool/src/storage/local.rs
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::errors::{AppError, Result};
use crate::utils::format::format_size;

use super::{matches_pattern, FileInfo, RemoteFile, StorageBackend};

/// Local filesystem storage.
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn list_files(&self, path: &str, pattern: &str) -> Result<Vec<RemoteFile>> {
        let dir = Path::new(path);
        if !dir.exists() {
            // Absent directory is not an error; create it for next time
            fs::create_dir_all(dir)?;
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !matches_pattern(&name, pattern) {
                continue;
            }
            let modified = meta.modified().ok().map(DateTime::<Local>::from);
            files.push(RemoteFile {
                path: entry.path().to_string_lossy().to_string(),
                name,
                size: meta.len(),
                size_human: format_size(meta.len()),
                modified,
            });
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(files)
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let dest = Path::new(remote_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let source_size = fs::metadata(local_path)?.len();
        fs::copy(local_path, dest)?;

        let copied_size = fs::metadata(dest)?.len();
        if copied_size != source_size {
            return Err(AppError::Transfer(format!(
                "Size mismatch after copy to {}: local {} bytes, stored {} bytes",
                remote_path, source_size, copied_size
            )));
        }
        Ok(())
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(remote_path, local_path)?;
        Ok(())
    }

    async fn file_info(&self, path: &str) -> Result<Option<FileInfo>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(FileInfo::new(meta.len()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            // Already gone counts as deleted
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(path: &Path, contents: &str) {
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_list_files_filters_by_pattern() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for i in 0..3 {
            write_file(&dir.path().join(format!("backup_{i}.tar.gz")), "data");
        }
        write_file(&dir.path().join("notes.txt"), "not a backup");

        let storage = LocalStorage::new();
        let files = storage
            .list_files(dir.path().to_str().unwrap(), "*.tar.gz")
            .await?;

        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.name.ends_with(".tar.gz")));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_files_creates_missing_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("not_yet_there");

        let storage = LocalStorage::new();
        let files = storage
            .list_files(missing.to_str().unwrap(), "*.tar.gz")
            .await?;

        assert!(files.is_empty());
        assert!(missing.is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_creates_parent_dirs_and_verifies() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("source.tar.gz");
        write_file(&source, "payload");
        let dest = dir.path().join("nested/deeper/target.tar.gz");

        let storage = LocalStorage::new();
        storage
            .upload(&source, dest.to_str().unwrap())
            .await?;

        assert_eq!(fs::read_to_string(&dest)?, "payload");
        Ok(())
    }

    #[tokio::test]
    async fn test_download() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let stored = dir.path().join("stored.tar.gz");
        write_file(&stored, "payload");
        let fetched = dir.path().join("fetched.tar.gz");

        let storage = LocalStorage::new();
        storage
            .download(stored.to_str().unwrap(), &fetched)
            .await?;

        assert_eq!(fs::read_to_string(&fetched)?, "payload");
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("victim.tar.gz");
        write_file(&target, "bytes");

        let storage = LocalStorage::new();
        let path = target.to_str().unwrap();
        storage.delete(path).await?;
        assert!(!target.exists());
        // Second delete of the same path must also succeed
        storage.delete(path).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_file_info_absent_is_none() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = LocalStorage::new();
        let info = storage
            .file_info(dir.path().join("ghost").to_str().unwrap())
            .await?;
        assert!(info.is_none());
        Ok(())
    }
}
