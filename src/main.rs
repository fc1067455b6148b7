//! MongoDB Copy/Backup/Restore Tool
//!
//! Copies collections between deployments, ships backup archives to
//! local/SSH/FTP storage, and replays saved task configurations.

// mongotool/src/main.rs
mod backup;
mod copy;
mod errors;
mod restore;
mod settings;
mod storage;
mod tasks;
mod utils;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::copy::{CollectionRef, CopyEngine, CopyOptions, DEFAULT_BATCH_SIZE, DEFAULT_SAMPLE_SIZE};
use crate::errors::AppError;
use crate::settings::{BackupTask, CopyTask, RestoreTask, SettingsStore, TaskConfig};
use crate::storage::{open_storage, StorageSpec};
use crate::tasks::{
    describe_task, display_task_summary, print_verification, run_backup_task, run_restore_task,
    run_task,
};
use crate::utils::connection::{
    mask_uri, native_tools, split_database_uri, test_connection, GENERAL_CHECK_TIMEOUT,
    QUICK_CHECK_TIMEOUT,
};
use crate::utils::format::{format_number, format_size};
use crate::utils::{confirm, is_interactive};

#[derive(Parser)]
#[command(name = "mongotool", version, about = "MongoDB copy, backup and restore tool")]
struct Cli {
    /// Assume yes to all prompts (required for non-interactive runs)
    #[arg(short = 'y', long = "yes", global = true)]
    assume_yes: bool,

    /// Force the driver copy loop instead of mongodump/mongorestore
    #[arg(long, global = true)]
    force_driver: bool,

    /// Settings file path (defaults to ~/.mongotool_settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CopyArgs {
    /// Source MongoDB URI or saved host name
    #[arg(short, long)]
    source: String,
    /// Target MongoDB URI or saved host name
    #[arg(short, long)]
    target: String,
    #[arg(long)]
    source_db: String,
    /// Target database name (defaults to the source database)
    #[arg(long)]
    target_db: Option<String>,
    /// Source collection (omit to copy all collections)
    #[arg(long)]
    source_collection: Option<String>,
    /// Target collection name (defaults to the source collection)
    #[arg(long)]
    target_collection: Option<String>,
    /// Drop the target before copying
    #[arg(long)]
    drop_target: bool,
    /// Verify the copy after completion
    #[arg(long)]
    verify: bool,
}

#[derive(Args, Clone)]
struct BackupArgs {
    /// Source as mongodb://host[:port]/database
    source: String,
    /// Destination: local path, ssh://, ftp://, or a saved storage name
    #[arg(long = "to")]
    destination: String,
    /// Back up only these collections
    #[arg(long)]
    collection: Vec<String>,
    /// Custom archive name (defaults to <timestamp>-<database>.tar.gz)
    #[arg(long)]
    archive_name: Option<String>,
}

#[derive(Args, Clone)]
struct RestoreArgs {
    /// Archive path or file name on the storage backend
    archive: String,
    /// Target MongoDB URI or saved host name
    #[arg(long = "to")]
    target: String,
    /// Target database name (defaults to the one inside the archive)
    #[arg(long)]
    target_db: Option<String>,
    /// Storage holding the archive (defaults to the archive's directory)
    #[arg(long)]
    storage: Option<String>,
    /// Drop the target database before restoring
    #[arg(long)]
    drop_target: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a collection or a whole database between deployments
    Copy(CopyArgs),
    /// Manage and run saved tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage saved hosts
    #[command(subcommand)]
    Host(HostCommand),
    /// Manage saved storage destinations
    #[command(subcommand)]
    Storage(StorageCommand),
    /// Test a connection to a MongoDB URI
    Verify { uri: String },
    /// List backup archives on a storage destination
    Backups {
        /// Storage destination or saved storage name
        storage: String,
        /// Only show backups of this database
        #[arg(long)]
        database: Option<String>,
    },
    /// Back up a database to a storage destination
    Backup(BackupArgs),
    /// Restore a database from a backup archive
    Restore(RestoreArgs),
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Run a saved task
    Run { name: String },
    /// List saved tasks
    List,
    /// Delete a saved task
    Rm { name: String },
    /// Save a copy task
    SaveCopy {
        name: String,
        #[command(flatten)]
        args: CopyArgs,
    },
    /// Save a backup task
    SaveBackup {
        name: String,
        #[command(flatten)]
        args: BackupArgs,
    },
    /// Save a restore task
    SaveRestore {
        name: String,
        #[command(flatten)]
        args: RestoreArgs,
    },
}

#[derive(Subcommand)]
enum HostCommand {
    /// Save a host URI under a name
    Add { name: String, uri: String },
    /// List saved hosts with connection status
    List,
    /// Delete a saved host
    Rm { name: String },
}

#[derive(Subcommand)]
enum StorageCommand {
    /// Save a storage destination under a name
    Add { name: String, destination: String },
    /// List saved storage destinations
    List,
    /// Delete a saved storage destination
    Rm { name: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_app(cli).await {
        Ok(true) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            // User declined a confirmation; nothing was done
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(cli: Cli) -> Result<bool> {
    warn_if_tools_missing();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(SettingsStore::default_path);
    let mut store = SettingsStore::open(settings_path);

    match &cli.command {
        Commands::Verify { uri } => {
            let uri = resolve_uri(&store, uri)?;
            let (ok, message) = test_connection(&uri, GENERAL_CHECK_TIMEOUT).await;
            if ok {
                println!("✅ {}", message);
                Ok(true)
            } else {
                Err(AppError::Connection(format!("{}: {}", mask_uri(&uri), message)).into())
            }
        }

        Commands::Backups { storage, database } => {
            let spec = resolve_storage(&store, storage)?;
            let backend = open_storage(&spec);
            let pattern = match database {
                Some(db) => format!("*-{}.tar.gz", db),
                None => "*.tar.gz".to_string(),
            };
            let files = backend.list_files(spec.base_path(), &pattern).await?;
            if files.is_empty() {
                println!("No backups found on {}", spec);
                return Ok(true);
            }
            println!("🗄  Available backups on {}:", spec);
            for file in &files {
                let modified = file
                    .modified
                    .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {:>10}  {:16}  {}", file.size_human, modified, file.name);
            }
            let total: u64 = files.iter().map(|f| f.size).sum();
            println!("\nTotal: {} backups, {}", files.len(), format_size(total));
            Ok(true)
        }

        Commands::Copy(args) => run_copy_command(&store, &cli, args).await,

        Commands::Task(command) => run_task_command(&mut store, &cli, command).await,

        Commands::Host(command) => run_host_command(&mut store, command).await,

        Commands::Storage(command) => run_storage_command(&mut store, command),

        Commands::Backup(args) => {
            let task = backup_task_from_args(&store, args)?;
            println!("📦 Backup mode");
            println!("Source: {}", mask_uri(&task.uri));
            println!("Database: {}", task.database);
            println!("Destination: {}", task.storage);
            if !confirm_or_require_yes(cli.assume_yes, "\nProceed with backup?")? {
                println!("Cancelled");
                return Ok(false);
            }
            run_backup_task(&task).await?;
            Ok(true)
        }

        Commands::Restore(args) => {
            let task = restore_task_from_args(&store, args)?;
            println!("📥 Restore mode");
            println!("Backup: {}", task.backup_file);
            println!("Target: {}", mask_uri(&task.uri));
            println!("Storage: {}", task.storage);
            if !confirm_or_require_yes(cli.assume_yes, "\nProceed with restore?")? {
                println!("Cancelled");
                return Ok(false);
            }
            run_restore_task(&task).await?;
            Ok(true)
        }
    }
}

async fn run_copy_command(store: &SettingsStore, cli: &Cli, args: &CopyArgs) -> Result<bool> {
    let source = resolve_uri(store, &args.source)?;
    let target = resolve_uri(store, &args.target)?;
    let target_db = args
        .target_db
        .clone()
        .unwrap_or_else(|| args.source_db.clone());

    println!("📋 Direct copy mode");
    println!(
        "Source: {}/{}/{}",
        mask_uri(&source),
        args.source_db,
        args.source_collection.as_deref().unwrap_or("ALL")
    );
    println!(
        "Target: {}/{}/{}",
        mask_uri(&target),
        target_db,
        args.target_collection
            .as_deref()
            .or(args.source_collection.as_deref())
            .unwrap_or("ALL")
    );
    if args.drop_target {
        println!("⚠ Will drop target before copying");
    }
    if !confirm_or_require_yes(cli.assume_yes, "\nProceed with copy?")? {
        println!("Cancelled");
        return Ok(false);
    }

    let engine = CopyEngine::connect(&source, &target).await?;
    let opts = CopyOptions {
        drop_target: args.drop_target,
        batch_size: DEFAULT_BATCH_SIZE,
        force: cli.assume_yes,
        force_driver: cli.force_driver,
    };

    match &args.source_collection {
        Some(collection) => {
            let src = CollectionRef::new(&args.source_db, collection);
            let tgt = CollectionRef::new(
                &target_db,
                args.target_collection.as_deref().unwrap_or(collection),
            );
            let outcome = engine.copy_collection(&src, &tgt, &opts).await?;
            println!(
                "✅ Copied {} documents (~{} on source), {} indexes (method: {})",
                format_number(outcome.documents_copied),
                format_number(outcome.source_count),
                outcome.indexes_created,
                outcome.method
            );
            if args.verify {
                let report = engine.verify(&src, &tgt, DEFAULT_SAMPLE_SIZE).await?;
                print_verification(&report);
            }
        }
        None => {
            let results = engine.copy_database(&args.source_db, &target_db, &opts).await?;
            let total: u64 = results.values().map(|r| r.documents_copied).sum();
            println!(
                "✅ Copied {} collections, {} documents",
                results.len(),
                format_number(total)
            );
        }
    }
    Ok(true)
}

async fn run_task_command(
    store: &mut SettingsStore,
    cli: &Cli,
    command: &TaskCommand,
) -> Result<bool> {
    match command {
        TaskCommand::Run { name } => {
            let task = store
                .get_task(name)
                .ok_or_else(|| AppError::Config(format!("Task '{}' not found", name)))?
                .clone();
            println!("🚀 Running task: {}\n", name);
            display_task_summary(&task);
            if !confirm_or_require_yes(cli.assume_yes, "\nExecute this task?")? {
                println!("Cancelled");
                return Ok(false);
            }
            run_task(&task, cli.assume_yes, cli.force_driver).await?;
            Ok(true)
        }
        TaskCommand::List => {
            let saved = store.list_tasks();
            if saved.is_empty() {
                println!("No saved tasks found");
                return Ok(true);
            }
            println!("⚙️  Saved tasks:");
            for (name, task) in saved {
                println!("  {} [{}] {}", name, task.kind(), describe_task(task));
            }
            println!("\nRun a task with: mongotool task run <name>");
            Ok(true)
        }
        TaskCommand::Rm { name } => {
            if store.delete_task(name)? {
                println!("Deleted task '{}'", name);
            } else {
                println!("Task '{}' not found", name);
            }
            Ok(true)
        }
        TaskCommand::SaveCopy { name, args } => {
            let task = TaskConfig::Copy(CopyTask {
                source_uri: resolve_uri(store, &args.source)?,
                target_uri: resolve_uri(store, &args.target)?,
                source_db: args.source_db.clone(),
                target_db: args
                    .target_db
                    .clone()
                    .unwrap_or_else(|| args.source_db.clone()),
                collections: args.source_collection.clone().map(|c| vec![c]),
                target_collection: args.target_collection.clone(),
                drop_target: args.drop_target,
                verify: args.verify,
                force_driver: cli.force_driver,
            });
            store.add_task(name, task)?;
            println!("Saved copy task '{}'", name);
            Ok(true)
        }
        TaskCommand::SaveBackup { name, args } => {
            let task = TaskConfig::Backup(backup_task_from_args(store, args)?);
            store.add_task(name, task)?;
            println!("Saved backup task '{}'", name);
            Ok(true)
        }
        TaskCommand::SaveRestore { name, args } => {
            let task = TaskConfig::Restore(restore_task_from_args(store, args)?);
            store.add_task(name, task)?;
            println!("Saved restore task '{}'", name);
            Ok(true)
        }
    }
}

async fn run_host_command(store: &mut SettingsStore, command: &HostCommand) -> Result<bool> {
    match command {
        HostCommand::Add { name, uri } => {
            store.add_host(name, uri)?;
            println!("Saved host '{}'", name);
            Ok(true)
        }
        HostCommand::List => {
            let hosts = store.list_hosts();
            if hosts.is_empty() {
                println!("No saved hosts found");
                return Ok(true);
            }
            println!("💾 Saved hosts:");
            for (name, uri) in hosts {
                let (online, _) = test_connection(uri, QUICK_CHECK_TIMEOUT).await;
                let status = if online { "🟢 Online" } else { "🔴 Offline" };
                println!("  {} {} {}", status, name, mask_uri(uri));
            }
            println!("\nTotal: {} hosts", hosts.len());
            Ok(true)
        }
        HostCommand::Rm { name } => {
            if store.delete_host(name)? {
                println!("Deleted host '{}'", name);
            } else {
                println!("Host '{}' not found", name);
            }
            Ok(true)
        }
    }
}

fn run_storage_command(store: &mut SettingsStore, command: &StorageCommand) -> Result<bool> {
    match command {
        StorageCommand::Add { name, destination } => {
            let spec = StorageSpec::parse(destination)?;
            store.add_storage(name, spec)?;
            println!("Saved storage '{}'", name);
            Ok(true)
        }
        StorageCommand::List => {
            let storages = store.list_storages();
            if storages.is_empty() {
                println!("No saved storage destinations found");
                return Ok(true);
            }
            println!("🗄  Saved storage destinations:");
            for (name, spec) in storages {
                println!("  {} {}", name, spec);
            }
            Ok(true)
        }
        StorageCommand::Rm { name } => {
            if store.delete_storage(name)? {
                println!("Deleted storage '{}'", name);
            } else {
                println!("Storage '{}' not found", name);
            }
            Ok(true)
        }
    }
}

fn backup_task_from_args(store: &SettingsStore, args: &BackupArgs) -> Result<BackupTask> {
    let (uri, database) = split_database_uri(&args.source).context("Invalid backup source")?;
    Ok(BackupTask {
        uri,
        database,
        collections: if args.collection.is_empty() {
            None
        } else {
            Some(args.collection.clone())
        },
        storage: resolve_storage(store, &args.destination)?,
        custom_name: args.archive_name.clone(),
    })
}

fn restore_task_from_args(store: &SettingsStore, args: &RestoreArgs) -> Result<RestoreTask> {
    let storage = match &args.storage {
        Some(value) => resolve_storage(store, value)?,
        // Default to the archive's own directory on local disk
        None => {
            let parent = Path::new(&args.archive)
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| ".".to_string());
            StorageSpec::Local { path: parent }
        }
    };
    Ok(RestoreTask {
        uri: resolve_uri(store, &args.target)?,
        backup_file: args.archive.clone(),
        target_database: args.target_db.clone(),
        storage,
        drop_target: args.drop_target,
    })
}

/// Gate an operation behind a confirmation: `--yes` proceeds, an
/// interactive session prompts, and a non-interactive run without `--yes`
/// is a caller contract violation rather than a hang.
fn confirm_or_require_yes(assume_yes: bool, prompt: &str) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if is_interactive() {
        return confirm(prompt);
    }
    Err(AppError::ContractViolation(
        "confirmation required; pass --yes when running non-interactively".to_string(),
    )
    .into())
}

/// An endpoint argument is either a URI or the name of a saved host.
fn resolve_uri(store: &SettingsStore, value: &str) -> Result<String> {
    if value.contains("://") {
        return Ok(value.to_string());
    }
    store
        .get_host(value)
        .cloned()
        .ok_or_else(|| AppError::Config(format!("'{}' is not a URI or a saved host", value)).into())
}

/// A storage argument is either the name of a saved storage config or a
/// destination string (path / ssh:// / ftp://).
fn resolve_storage(store: &SettingsStore, value: &str) -> Result<StorageSpec> {
    if let Some(spec) = store.get_storage(value) {
        return Ok(spec.clone());
    }
    Ok(StorageSpec::parse(value)?)
}

/// Warn once when the native tools are not installed.
fn warn_if_tools_missing() {
    let tools = native_tools();
    if !tools.available() {
        println!("⚠ MongoDB tools not found. Some features may be limited.");
        println!("Install with: brew install mongodb-database-tools\n");
    }
}
