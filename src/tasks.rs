// mongotool/src/tasks.rs
//! Dispatches saved task configurations to the copy/backup/restore flows.

use anyhow::Result;

use crate::backup::{perform_backup, BackupRequest};
use crate::copy::{
    CollectionRef, CopyEngine, CopyOptions, VerificationReport, DEFAULT_BATCH_SIZE,
    DEFAULT_SAMPLE_SIZE,
};
use crate::restore::{perform_restore, RestoreRequest};
use crate::settings::{BackupTask, CopyTask, RestoreTask, TaskConfig};
use crate::utils::connection::mask_uri;
use crate::utils::format::{format_number, format_size};

/// Execute a task based on its type.
pub async fn run_task(task: &TaskConfig, assume_yes: bool, force_driver: bool) -> Result<()> {
    match task {
        TaskConfig::Copy(copy) => run_copy_task(copy, assume_yes, force_driver).await,
        TaskConfig::Backup(backup) => run_backup_task(backup).await,
        TaskConfig::Restore(restore) => run_restore_task(restore).await,
    }
}

pub async fn run_copy_task(task: &CopyTask, assume_yes: bool, force_driver: bool) -> Result<()> {
    let engine = CopyEngine::connect(&task.source_uri, &task.target_uri).await?;
    let opts = CopyOptions {
        drop_target: task.drop_target,
        batch_size: DEFAULT_BATCH_SIZE,
        force: assume_yes,
        force_driver: task.force_driver || force_driver,
    };

    match &task.collections {
        Some(collections) if collections.len() == 1 => {
            let name = &collections[0];
            let src = CollectionRef::new(&task.source_db, name);
            let tgt = CollectionRef::new(
                &task.target_db,
                task.target_collection.as_deref().unwrap_or(name),
            );
            let outcome = engine.copy_collection(&src, &tgt, &opts).await?;
            println!(
                "✅ Copied {} documents (~{} on source), {} indexes (method: {})",
                format_number(outcome.documents_copied),
                format_number(outcome.source_count),
                outcome.indexes_created,
                outcome.method
            );
            if task.verify {
                let report = engine.verify(&src, &tgt, DEFAULT_SAMPLE_SIZE).await?;
                print_verification(&report);
            }
        }
        Some(collections) => {
            let results = engine
                .copy_collections(&task.source_db, &task.target_db, collections, &opts)
                .await?;
            let total: u64 = results.values().map(|r| r.documents_copied).sum();
            println!(
                "✅ Copied {} collections, {} documents",
                results.len(),
                format_number(total)
            );
            if task.verify {
                for name in collections {
                    println!("\n🔍 {}", name);
                    let report = engine
                        .verify(
                            &CollectionRef::new(&task.source_db, name),
                            &CollectionRef::new(&task.target_db, name),
                            DEFAULT_SAMPLE_SIZE,
                        )
                        .await?;
                    print_verification(&report);
                }
            }
        }
        None => {
            let results = engine
                .copy_database(&task.source_db, &task.target_db, &opts)
                .await?;
            let total: u64 = results.values().map(|r| r.documents_copied).sum();
            println!(
                "✅ Copied {} collections, {} documents",
                results.len(),
                format_number(total)
            );
        }
    }
    Ok(())
}

pub async fn run_backup_task(task: &BackupTask) -> Result<()> {
    let request = BackupRequest {
        uri: task.uri.clone(),
        database: task.database.clone(),
        collections: task.collections.clone(),
        storage: task.storage.clone(),
        custom_name: task.custom_name.clone(),
    };
    let receipt = perform_backup(&request).await?;

    println!("\n✅ Backup completed!");
    println!("  File: {}", receipt.filename);
    println!("  Location: {}", receipt.location);
    println!("  Size: {}", format_size(receipt.size));
    println!("  Documents: {}", format_number(receipt.documents));
    println!("  Collections: {}", receipt.collections);
    Ok(())
}

pub async fn run_restore_task(task: &RestoreTask) -> Result<()> {
    let request = RestoreRequest {
        uri: task.uri.clone(),
        backup_file: task.backup_file.clone(),
        target_database: task.target_database.clone(),
        storage: task.storage.clone(),
        drop_target: task.drop_target,
    };
    let receipt = perform_restore(&request).await?;

    println!("\n✅ Restore completed!");
    println!("  Database: {}", receipt.database);
    println!("  Documents: {}", format_number(receipt.documents));
    println!("  Collections: {}", receipt.collections);
    Ok(())
}

/// One-line description for task listings.
pub fn describe_task(task: &TaskConfig) -> String {
    match task {
        TaskConfig::Copy(copy) => {
            let what = match &copy.collections {
                Some(c) if c.len() == 1 => c[0].clone(),
                Some(c) => format!("{} collections", c.len()),
                None => "ALL".to_string(),
            };
            format!(
                "{} → {} ({})",
                copy.source_db, copy.target_db, what
            )
        }
        TaskConfig::Backup(backup) => {
            format!("{} → {}", backup.database, backup.storage)
        }
        TaskConfig::Restore(restore) => {
            format!(
                "{} → {}",
                restore.backup_file,
                restore.target_database.as_deref().unwrap_or("from backup")
            )
        }
    }
}

/// Full task summary printed before execution.
pub fn display_task_summary(task: &TaskConfig) {
    match task {
        TaskConfig::Copy(copy) => {
            println!("Type: COPY");
            println!("Source: {}", mask_uri(&copy.source_uri));
            println!("Target: {}", mask_uri(&copy.target_uri));
            println!("Database: {} → {}", copy.source_db, copy.target_db);
            if let Some(collections) = &copy.collections {
                println!("Collections: {}", collections.join(", "));
            }
            println!("Drop Target: {}", if copy.drop_target { "Yes" } else { "No" });
        }
        TaskConfig::Backup(backup) => {
            println!("Type: BACKUP");
            println!("Source: {}", mask_uri(&backup.uri));
            println!("Database: {}", backup.database);
            match &backup.collections {
                Some(collections) => println!("Collections: {}", collections.join(", ")),
                None => println!("Collections: ALL"),
            }
            println!("Destination: {}", backup.storage);
        }
        TaskConfig::Restore(restore) => {
            println!("Type: RESTORE");
            println!("Backup: {}", restore.backup_file);
            println!("Target: {}", mask_uri(&restore.uri));
            println!(
                "Database: {}",
                restore.target_database.as_deref().unwrap_or("from backup")
            );
            println!("Drop Target: {}", if restore.drop_target { "Yes" } else { "No" });
            println!("Storage: {}", restore.storage);
        }
    }
}

/// Print a verification report, one line per signal.
pub fn print_verification(report: &VerificationReport) {
    let mark = |ok: bool| if ok { "✓" } else { "✗" };
    println!(
        "  {} Counts: source {} / target {}",
        mark(report.count_match),
        format_number(report.source_count),
        format_number(report.target_count)
    );
    println!(
        "  {} Indexes: source {} / target {}",
        mark(report.index_match),
        report.source_indexes,
        report.target_indexes
    );
    println!(
        "  {} Sample: {} mismatches",
        mark(report.sample_match),
        report.sample_mismatches.len()
    );
    for mismatch in &report.sample_mismatches {
        println!("      {}", mismatch);
    }
    match report.checksum_match {
        Some(ok) => println!("  {} Checksum", mark(ok)),
        None => println!("  - Checksum skipped (collection above threshold)"),
    }
    if report.passed() {
        println!("✅ Verification passed!");
    } else {
        println!("⚠ Verification issues found");
    }
}
