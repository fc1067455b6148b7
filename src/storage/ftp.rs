// mongotool/src/storage/ftp.rs
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::errors::{AppError, Result};

use super::{parse_listing, FileInfo, RemoteFile, StorageBackend, TRANSFER_TIMEOUT};

const FTP_CONNECT_TIMEOUT_SECS: u32 = 10;

/// FTP storage backend, shelling out to `curl`.
pub struct FtpStorage {
    host: String,
    user: String,
    password: String,
    port: u16,
}

impl FtpStorage {
    pub fn new(host: String, user: String, password: String, port: u16) -> Self {
        Self {
            host,
            user,
            password,
            port,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "ftp://{}:{}{}",
            self.host,
            self.port,
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            }
        )
    }

    fn curl(&self) -> Command {
        let mut cmd = Command::new("curl");
        cmd.arg("-sS")
            .arg("--connect-timeout")
            .arg(FTP_CONNECT_TIMEOUT_SECS.to_string())
            .arg("--user")
            .arg(format!("{}:{}", self.user, self.password));
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<std::process::Output> {
        let result = timeout(TRANSFER_TIMEOUT, cmd.output())
            .await
            .map_err(|_| AppError::TransferTimeout(TRANSFER_TIMEOUT))?;
        result.map_err(|e| AppError::Storage(format!("Failed to run curl: {}", e)))
    }
}

#[async_trait]
impl StorageBackend for FtpStorage {
    async fn list_files(&self, path: &str, pattern: &str) -> Result<Vec<RemoteFile>> {
        let mut cmd = self.curl();
        cmd.arg(format!("{}/", self.url(path).trim_end_matches('/')));

        let output = self.run(cmd).await?;
        if !output.status.success() {
            // Directory absent behaves like an empty listing
            return Ok(Vec::new());
        }
        Ok(parse_listing(
            &String::from_utf8_lossy(&output.stdout),
            path,
            pattern,
        ))
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let local_size = std::fs::metadata(local_path)?.len();

        let mut cmd = self.curl();
        cmd.arg("-T")
            .arg(local_path)
            .arg("--ftp-create-dirs")
            .arg(self.url(remote_path));

        let output = self.run(cmd).await?;
        if !output.status.success() {
            return Err(AppError::Transfer(format!(
                "FTP upload to {} failed: {}",
                remote_path,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // The server's size is the only proof the transfer was complete
        match self.file_info(remote_path).await? {
            Some(info) if info.size == local_size => Ok(()),
            Some(info) => Err(AppError::Transfer(format!(
                "Size mismatch after upload to {}: local {} bytes, remote {} bytes",
                remote_path, local_size, info.size
            ))),
            None => Err(AppError::Transfer(format!(
                "Upload verification failed: {} not found on server",
                remote_path
            ))),
        }
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let mut cmd = self.curl();
        cmd.arg("-o").arg(local_path).arg(self.url(remote_path));

        let output = self.run(cmd).await?;
        if !output.status.success() {
            return Err(AppError::Transfer(format!(
                "FTP download of {} failed: {}",
                remote_path,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn file_info(&self, path: &str) -> Result<Option<FileInfo>> {
        let mut cmd = self.curl();
        cmd.arg("-I").arg(self.url(path));

        let output = self.run(cmd).await?;
        if !output.status.success() {
            return Ok(None);
        }

        let headers = String::from_utf8_lossy(&output.stdout);
        let size = headers.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<u64>().ok()
            } else {
                None
            }
        });
        Ok(size.map(FileInfo::new))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut cmd = self.curl();
        cmd.arg(self.url("/"))
            .arg("-Q")
            .arg(format!("DELE {}", path))
            .arg("--list-only")
            .arg("-o")
            .arg(if cfg!(windows) { "NUL" } else { "/dev/null" });

        let output = self.run(cmd).await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // 550 means the file is already gone; delete stays idempotent
        if stderr.contains("550") {
            return Ok(());
        }
        Err(AppError::Storage(format!(
            "FTP delete of {} failed: {}",
            path,
            stderr.trim()
        )))
    }
}
