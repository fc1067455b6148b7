// mongotool/src/restore/logic.rs
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use mongodb::bson::Document;

use crate::backup::archive::extract_tar_gz_archive;
use crate::errors::AppError;
use crate::storage::{open_storage, StorageSpec};
use crate::utils::connection::{connect, require_mongorestore, DEFAULT_CONNECT_TIMEOUT};
use crate::utils::format::{format_docs, format_size};

/// Parameters for one restore run.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub uri: String,
    /// Archive path or bare file name on the storage backend.
    pub backup_file: String,
    /// Target database name; defaults to the name embedded in the archive.
    pub target_database: Option<String>,
    pub storage: StorageSpec,
    pub drop_target: bool,
}

/// What a completed restore produced.
#[derive(Debug, Clone)]
pub struct RestoreReceipt {
    pub database: String,
    /// Document total on the target after the restore.
    pub documents: u64,
    /// Number of collections contained in the archive.
    pub collections: u64,
}

/// Download an archive, extract it, and replay it into the target
/// deployment with a namespace remap from the archived database name.
///
/// A missing `mongorestore` is fatal; there is no fallback that reads the
/// native archive format. An archive without a recognizable `dump/<db>`
/// layout is rejected as invalid before anything touches the target.
pub async fn perform_restore(request: &RestoreRequest) -> Result<RestoreReceipt> {
    let client = connect(&request.uri, DEFAULT_CONNECT_TIMEOUT).await?;
    let mongorestore = require_mongorestore()?;

    let scratch = tempfile::Builder::new()
        .prefix("mongotool_restore_")
        .tempdir()
        .context("Failed to create scratch directory for restore")?;

    let file_name = Path::new(&request.backup_file)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            AppError::InvalidArchive(format!("no file name in '{}'", request.backup_file))
        })?;
    let local_archive = scratch.path().join(&file_name);

    println!("\n📥 Retrieving backup {}...", request.backup_file);
    let storage = open_storage(&request.storage);
    let remote_path = if request.backup_file.contains('/') {
        request.backup_file.clone()
    } else {
        request.storage.join_remote(&request.backup_file)
    };
    storage
        .download(&remote_path, &local_archive)
        .await
        .map_err(|e| AppError::Transfer(format!("failed to retrieve backup {}: {}", remote_path, e)))?;

    let archive_size = fs::metadata(&local_archive)?.len();
    println!("Backup size: {}", format_size(archive_size));

    let extract_dir = scratch.path().join("restore");
    extract_tar_gz_archive(&local_archive, &extract_dir)?;

    let dump_dir = extract_dir.join("dump");
    if !dump_dir.is_dir() {
        return Err(AppError::InvalidArchive(format!(
            "{} has no top-level dump directory",
            file_name
        ))
        .into());
    }

    // First database subdirectory names the archived database
    let source_db = fs::read_dir(&dump_dir)?
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .ok_or_else(|| {
            AppError::InvalidArchive(format!("{} contains no database directory", file_name))
        })?;
    let target_db = request
        .target_database
        .clone()
        .unwrap_or_else(|| source_db.clone());

    let archived_collections = fs::read_dir(dump_dir.join(&source_db))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext == "bson")
                .unwrap_or(false)
        })
        .count() as u64;

    println!("Source database: {}", source_db);
    println!("Target database: {}", target_db);
    println!("Collections: {}", archived_collections);

    if request.drop_target {
        println!("⚠ Dropping target database {}...", target_db);
        client.database(&target_db).drop().await?;
    }

    println!("🔄 Restoring to {}...", target_db);
    let mut cmd = Command::new(&mongorestore);
    cmd.arg("--uri")
        .arg(&request.uri)
        .arg("--nsFrom")
        .arg(format!("{}.*", source_db))
        .arg("--nsTo")
        .arg(format!("{}.*", target_db))
        .arg("--quiet");
    if request.drop_target {
        cmd.arg("--drop");
    }
    cmd.arg(&dump_dir);

    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute mongorestore for {}", target_db))?;
    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "mongorestore for {} failed with status: {}\nStdout: {}\nStderr: {}",
            target_db,
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let db = client.database(&target_db);
    let mut total_docs = 0u64;
    let names = db.list_collection_names().await?;
    for name in &names {
        let count = db
            .collection::<Document>(name)
            .estimated_document_count()
            .await?;
        println!("  • {}: {} documents", name, format_docs(count));
        total_docs += count;
    }

    Ok(RestoreReceipt {
        database: target_db,
        documents: total_docs,
        collections: archived_collections,
    })
}
