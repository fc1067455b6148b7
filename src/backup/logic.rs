// mongotool/src/backup/logic.rs
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use chrono::Local;
use mongodb::bson::Document;

use crate::errors::AppError;
use crate::storage::{open_storage, StorageSpec};
use crate::utils::connection::{connect, require_mongodump, DEFAULT_CONNECT_TIMEOUT};
use crate::utils::format::{format_docs, format_size};

use super::archive::create_tar_gz_archive;

/// Parameters for one backup run.
#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub uri: String,
    pub database: String,
    /// Specific collections; `None` backs up everything except `system.*`.
    pub collections: Option<Vec<String>>,
    pub storage: StorageSpec,
    pub custom_name: Option<String>,
}

/// What a completed backup produced.
#[derive(Debug, Clone)]
pub struct BackupReceipt {
    pub filename: String,
    pub location: String,
    pub size: u64,
    pub documents: u64,
    pub collections: u64,
}

/// Dump the requested collections, package them as `dump/` inside a tar.gz
/// and ship the archive to the configured storage.
///
/// The scratch directory is a `TempDir`, removed on every exit path. A
/// missing `mongodump` is fatal: the archive format is the tool's own, so
/// there is no driver fallback for backups.
pub async fn perform_backup(request: &BackupRequest) -> Result<BackupReceipt> {
    let client = connect(&request.uri, DEFAULT_CONNECT_TIMEOUT).await?;
    let mongodump = require_mongodump()?;

    let db = client.database(&request.database);
    let existing = db.list_collection_names().await?;
    let targets: Vec<String> = match &request.collections {
        Some(list) => list
            .iter()
            .filter(|name| existing.contains(name))
            .cloned()
            .collect(),
        None => existing
            .into_iter()
            .filter(|name| !name.starts_with("system."))
            .collect(),
    };

    println!("\n📦 Preparing backup of {}...", request.database);
    let mut total_docs = 0u64;
    for name in &targets {
        let count = db
            .collection::<Document>(name)
            .estimated_document_count()
            .await?;
        println!("  • {}: {} documents", name, format_docs(count));
        total_docs += count;
    }
    println!(
        "\nTotal: {} collections, {} documents\n",
        targets.len(),
        format_docs(total_docs)
    );

    let scratch = tempfile::Builder::new()
        .prefix("mongotool_backup_")
        .tempdir()
        .context("Failed to create scratch directory for backup")?;
    let dump_dir = scratch.path().join("dump");

    match &request.collections {
        Some(list) => {
            for name in list {
                run_mongodump(&mongodump, request, Some(name), &dump_dir)?;
            }
        }
        None => run_mongodump(&mongodump, request, None, &dump_dir)?,
    }

    let timestamp = Local::now().format("%Y_%m_%d_%H_%M").to_string();
    let filename = request
        .custom_name
        .clone()
        .unwrap_or_else(|| format!("{}-{}.tar.gz", timestamp, request.database));
    let archive_path = scratch.path().join(&filename);

    println!("🗜 Creating archive {}...", filename);
    create_tar_gz_archive(&dump_dir, &archive_path, "dump")?;
    let size = fs::metadata(&archive_path)?.len();

    let storage = open_storage(&request.storage);
    let remote_path = request.storage.join_remote(&filename);
    println!("📤 Uploading {} ({}) to {}...", filename, format_size(size), request.storage);
    if let Err(e) = storage.upload(&archive_path, &remote_path).await {
        // Distinct from a dump failure: the archive was produced, only the
        // transfer step failed
        return Err(AppError::Transfer(format!(
            "backup archive {} ({}) was created but upload to {} failed: {}",
            filename,
            format_size(size),
            request.storage,
            e
        ))
        .into());
    }

    Ok(BackupReceipt {
        filename,
        location: remote_path,
        size,
        documents: total_docs,
        collections: targets.len() as u64,
    })
}

fn run_mongodump(
    mongodump: &Path,
    request: &BackupRequest,
    collection: Option<&str>,
    dump_dir: &Path,
) -> Result<()> {
    let label = collection.unwrap_or(&request.database);
    println!("🔍 Backing up {}...", label);

    let mut cmd = Command::new(mongodump);
    cmd.arg("--uri")
        .arg(&request.uri)
        .arg("--db")
        .arg(&request.database)
        .arg("--out")
        .arg(dump_dir)
        .arg("--quiet");
    if let Some(name) = collection {
        cmd.arg("--collection").arg(name);
    }

    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute mongodump for {}", label))?;
    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "mongodump for {} failed with status: {}\nStdout: {}\nStderr: {}",
            label,
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    println!("✓ {} dumped successfully.", label);
    Ok(())
}
