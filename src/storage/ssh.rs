// mongotool/src/storage/ssh.rs
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::errors::{AppError, Result};

use super::{parse_listing, FileInfo, RemoteFile, StorageBackend, TRANSFER_TIMEOUT};

const SSH_CONNECT_TIMEOUT_SECS: u32 = 10;
const SSH_KEEPALIVE_INTERVAL_SECS: u32 = 5;
const SSH_KEEPALIVE_MAX_COUNT: u32 = 3;

/// SSH/SCP storage backend, shelling out to the system `ssh` and `scp`.
pub struct SshStorage {
    host: String,
    user: String,
    port: u16,
    key_path: Option<String>,
}

impl SshStorage {
    pub fn new(host: String, user: String, port: u16, key_path: Option<String>) -> Self {
        Self {
            host,
            user,
            port,
            key_path,
        }
    }

    // scp takes -P for the port where ssh takes -p
    fn base_args(&self, use_scp: bool) -> Vec<String> {
        let mut args = vec![
            if use_scp { "-P" } else { "-p" }.to_string(),
            self.port.to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", SSH_CONNECT_TIMEOUT_SECS),
            "-o".to_string(),
            format!("ServerAliveInterval={}", SSH_KEEPALIVE_INTERVAL_SECS),
            "-o".to_string(),
            format!("ServerAliveCountMax={}", SSH_KEEPALIVE_MAX_COUNT),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if let Some(key) = &self.key_path {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args
    }

    fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    async fn run_ssh(&self, remote_args: &[&str]) -> Result<std::process::Output> {
        let mut args = self.base_args(false);
        args.push(self.target());
        args.extend(remote_args.iter().map(|s| s.to_string()));

        Command::new("ssh")
            .args(&args)
            .output()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to run ssh: {}", e)))
    }

    async fn remote_size(&self, path: &str) -> Result<Option<u64>> {
        let output = self.run_ssh(&["stat", "-c", "%s", path]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.trim().parse::<u64>().ok())
    }
}

#[async_trait]
impl StorageBackend for SshStorage {
    async fn list_files(&self, path: &str, pattern: &str) -> Result<Vec<RemoteFile>> {
        let listing_path = format!("{}/{}", path.trim_end_matches('/'), pattern);
        let output = self.run_ssh(&["ls", "-la", &listing_path]).await?;
        if !output.status.success() {
            // Directory absent or nothing matched
            return Ok(Vec::new());
        }
        Ok(parse_listing(
            &String::from_utf8_lossy(&output.stdout),
            path,
            pattern,
        ))
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        if let Some((remote_dir, _)) = remote_path.rsplit_once('/') {
            if !remote_dir.is_empty() {
                let output = self.run_ssh(&["mkdir", "-p", remote_dir]).await?;
                if !output.status.success() {
                    return Err(AppError::Transfer(format!(
                        "Failed to create remote directory {}: {}",
                        remote_dir,
                        String::from_utf8_lossy(&output.stderr).trim()
                    )));
                }
            }
        }

        let local_size = std::fs::metadata(local_path)?.len();

        let mut args = self.base_args(true);
        args.push(local_path.to_string_lossy().to_string());
        args.push(format!("{}:{}", self.target(), remote_path));

        let result = timeout(TRANSFER_TIMEOUT, Command::new("scp").args(&args).output())
            .await
            .map_err(|_| AppError::TransferTimeout(TRANSFER_TIMEOUT))?;
        let output =
            result.map_err(|e| AppError::Storage(format!("Failed to run scp: {}", e)))?;
        if !output.status.success() {
            return Err(AppError::Transfer(format!(
                "scp upload to {} failed: {}",
                remote_path,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // A completed scp is not trusted until the remote size matches
        match self.remote_size(remote_path).await? {
            Some(remote) if remote == local_size => Ok(()),
            Some(remote) => Err(AppError::Transfer(format!(
                "Size mismatch after upload to {}: local {} bytes, remote {} bytes",
                remote_path, local_size, remote
            ))),
            None => Err(AppError::Transfer(format!(
                "Upload verification failed: {} not found on remote",
                remote_path
            ))),
        }
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let mut args = self.base_args(true);
        args.push(format!("{}:{}", self.target(), remote_path));
        args.push(local_path.to_string_lossy().to_string());

        let result = timeout(TRANSFER_TIMEOUT, Command::new("scp").args(&args).output())
            .await
            .map_err(|_| AppError::TransferTimeout(TRANSFER_TIMEOUT))?;
        let output =
            result.map_err(|e| AppError::Storage(format!("Failed to run scp: {}", e)))?;
        if !output.status.success() {
            return Err(AppError::Transfer(format!(
                "scp download of {} failed: {}",
                remote_path,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn file_info(&self, path: &str) -> Result<Option<FileInfo>> {
        Ok(self.remote_size(path).await?.map(FileInfo::new))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        // rm -f succeeds on an absent file, which keeps delete idempotent
        let output = self.run_ssh(&["rm", "-f", path]).await?;
        if !output.status.success() {
            return Err(AppError::Storage(format!(
                "ssh delete of {} failed: {}",
                path,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
