// mongotool/src/copy/engine.rs
use std::collections::BTreeMap;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::{Client, Collection};

use crate::errors::AppError;
use crate::utils::connection::{connect, native_tools, DEFAULT_CONNECT_TIMEOUT};
use crate::utils::format::format_number;
use crate::utils::{confirm, is_interactive};

use super::indexes::{count_secondary_indexes, replicate_indexes};
use super::verify::{verify_copy, VerificationReport};
use super::{CollectionRef, CopyMethod, CopyOutcome, DEFAULT_BATCH_SIZE};

/// Caller-controlled knobs for a copy operation.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub drop_target: bool,
    pub batch_size: usize,
    /// Skip confirmation prompts (required when not interactive).
    pub force: bool,
    /// Never use the native tools even when present.
    pub force_driver: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            drop_target: false,
            batch_size: DEFAULT_BATCH_SIZE,
            force: false,
            force_driver: false,
        }
    }
}

/// Outcome of a native dump/restore attempt. Fallback to the driver loop
/// is a deliberate branch on this, not an error handler.
enum NativeCopyOutcome {
    Completed,
    ToolsUnavailable,
    Failed(String),
}

/// Copies collections between two deployments, preferring the native
/// dump/restore pipeline and falling back to a driver batch loop.
pub struct CopyEngine {
    source: Client,
    target: Client,
    source_uri: String,
    target_uri: String,
}

impl CopyEngine {
    /// Connect to both endpoints; either ping failing is fatal.
    pub async fn connect(source_uri: &str, target_uri: &str) -> Result<Self> {
        let source = connect(source_uri, DEFAULT_CONNECT_TIMEOUT).await?;
        let target = connect(target_uri, DEFAULT_CONNECT_TIMEOUT).await?;
        Ok(Self {
            source,
            target,
            source_uri: source_uri.to_string(),
            target_uri: target_uri.to_string(),
        })
    }

    fn source_collection(&self, r: &CollectionRef) -> Collection<Document> {
        self.source.database(&r.database).collection(&r.collection)
    }

    fn target_collection(&self, r: &CollectionRef) -> Collection<Document> {
        self.target.database(&r.database).collection(&r.collection)
    }

    /// Copy one collection, indexes included.
    pub async fn copy_collection(
        &self,
        src: &CollectionRef,
        tgt: &CollectionRef,
        opts: &CopyOptions,
    ) -> Result<CopyOutcome> {
        let source_coll = self.source_collection(src);
        let target_coll = self.target_collection(tgt);

        let source_count = source_coll.estimated_document_count().await?;
        println!(
            "📊 Collection {} has ~{} documents",
            src,
            format_number(source_count)
        );

        self.resolve_drop(&target_coll, tgt, opts).await?;

        if !opts.force_driver {
            match self.native_pipe_copy(src, tgt) {
                NativeCopyOutcome::Completed => {
                    let documents_copied = target_coll.estimated_document_count().await?;
                    let indexes_created = count_secondary_indexes(&target_coll).await?;
                    println!(
                        "✅ Copied {} documents using mongodump",
                        format_number(documents_copied)
                    );
                    return Ok(CopyOutcome {
                        documents_copied,
                        indexes_created,
                        source_count,
                        method: CopyMethod::NativeDump,
                    });
                }
                NativeCopyOutcome::ToolsUnavailable => {
                    println!("⚠ MongoDB tools not available, using driver copy (slower)...");
                }
                NativeCopyOutcome::Failed(reason) => {
                    println!("⚠ Native copy failed ({}), falling back to driver copy...", reason);
                }
            }
        }

        let (documents_copied, indexes_created) =
            self.driver_copy(&source_coll, &target_coll, tgt, opts.batch_size).await?;

        Ok(CopyOutcome {
            documents_copied,
            indexes_created,
            source_count,
            method: CopyMethod::DriverCopy,
        })
    }

    /// Copy an explicit list of collections, keeping their names.
    pub async fn copy_collections(
        &self,
        source_db: &str,
        target_db: &str,
        collections: &[String],
        opts: &CopyOptions,
    ) -> Result<BTreeMap<String, CopyOutcome>> {
        let mut results = BTreeMap::new();
        for name in collections {
            println!("\n📁 Copying: {}", name);
            let outcome = self
                .copy_collection(
                    &CollectionRef::new(source_db, name),
                    &CollectionRef::new(target_db, name),
                    opts,
                )
                .await?;
            results.insert(name.clone(), outcome);
        }
        Ok(results)
    }

    /// Copy a whole database, excluding `system.*` collections. A requested
    /// drop applies once at the database level, not per collection.
    pub async fn copy_database(
        &self,
        source_db: &str,
        target_db: &str,
        opts: &CopyOptions,
    ) -> Result<BTreeMap<String, CopyOutcome>> {
        let collections: Vec<String> = self
            .source
            .database(source_db)
            .list_collection_names()
            .await?
            .into_iter()
            .filter(|name| !name.starts_with("system."))
            .collect();

        println!("📚 Found {} collections to copy", collections.len());

        if opts.drop_target {
            if opts.force {
                self.target.database(target_db).drop().await?;
                println!("🗑  Dropped target database {}", target_db);
            } else if is_interactive() {
                if confirm(&format!("⚠ Drop entire target database {}?", target_db))? {
                    self.target.database(target_db).drop().await?;
                    println!("🗑  Dropped target database {}", target_db);
                }
            } else {
                return Err(AppError::ContractViolation(format!(
                    "dropping database {} requires --yes when not running interactively",
                    target_db
                ))
                .into());
            }
        }

        let per_collection = CopyOptions {
            drop_target: false,
            ..opts.clone()
        };
        self.copy_collections(source_db, target_db, &collections, &per_collection)
            .await
    }

    /// Verify a copied collection pair.
    pub async fn verify(
        &self,
        src: &CollectionRef,
        tgt: &CollectionRef,
        sample_size: u32,
    ) -> Result<VerificationReport> {
        verify_copy(
            &self.source_collection(src),
            &self.target_collection(tgt),
            sample_size,
        )
        .await
    }

    /// Apply the drop-target policy: force drops unconditionally, an
    /// interactive session gets a prompt (declining merges instead), and a
    /// non-interactive run without force is a caller contract violation.
    async fn resolve_drop(
        &self,
        target_coll: &Collection<Document>,
        tgt: &CollectionRef,
        opts: &CopyOptions,
    ) -> Result<()> {
        if !opts.drop_target {
            return Ok(());
        }
        if target_coll.estimated_document_count().await? == 0 {
            return Ok(());
        }

        if opts.force {
            target_coll.drop().await?;
            println!("🗑  Dropped target collection {}", tgt);
        } else if is_interactive() {
            if confirm(&format!("Drop target collection {}?", tgt))? {
                target_coll.drop().await?;
                println!("🗑  Dropped target collection {}", tgt);
            } else {
                println!("Keeping existing documents in {}", tgt);
            }
        } else {
            return Err(AppError::ContractViolation(format!(
                "dropping {} requires --yes when not running interactively",
                tgt
            ))
            .into());
        }
        Ok(())
    }

    /// Pipe `mongodump --archive` straight into `mongorestore --archive`
    /// with a namespace remap. The dump child's stdout goes directly to the
    /// restore child's stdin, so the pipe closes as soon as the producer
    /// exits and the consumer cannot block on a half-open stream.
    fn native_pipe_copy(&self, src: &CollectionRef, tgt: &CollectionRef) -> NativeCopyOutcome {
        let tools = native_tools();
        let (Some(dump_bin), Some(restore_bin)) = (tools.mongodump, tools.mongorestore) else {
            return NativeCopyOutcome::ToolsUnavailable;
        };

        println!("🚀 Using mongodump/mongorestore (fast native mode)...");

        let mut dump_child = match Command::new(&dump_bin)
            .args([
                "--uri",
                &self.source_uri,
                "--db",
                &src.database,
                "--collection",
                &src.collection,
                "--archive",
                "--quiet",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return NativeCopyOutcome::Failed(format!("failed to spawn mongodump: {}", e)),
        };

        let Some(dump_stdout) = dump_child.stdout.take() else {
            let _ = dump_child.kill();
            let _ = dump_child.wait();
            return NativeCopyOutcome::Failed("mongodump produced no stdout pipe".to_string());
        };

        let restore_result = Command::new(&restore_bin)
            .args([
                "--uri",
                &self.target_uri,
                "--archive",
                "--nsFrom",
                &src.namespace(),
                "--nsTo",
                &tgt.namespace(),
                "--quiet",
            ])
            .stdin(Stdio::from(dump_stdout))
            .stderr(Stdio::piped())
            .output();

        let restore_output = match restore_result {
            Ok(output) => output,
            Err(e) => {
                let _ = dump_child.kill();
                let _ = dump_child.wait();
                return NativeCopyOutcome::Failed(format!("failed to run mongorestore: {}", e));
            }
        };

        let dump_output = match dump_child.wait_with_output() {
            Ok(output) => output,
            Err(e) => {
                return NativeCopyOutcome::Failed(format!("failed to wait for mongodump: {}", e))
            }
        };

        if !dump_output.status.success() {
            return NativeCopyOutcome::Failed(format!(
                "mongodump exited with {}: {}",
                dump_output.status,
                String::from_utf8_lossy(&dump_output.stderr).trim()
            ));
        }
        if !restore_output.status.success() {
            return NativeCopyOutcome::Failed(format!(
                "mongorestore exited with {}: {}",
                restore_output.status,
                String::from_utf8_lossy(&restore_output.stderr).trim()
            ));
        }

        NativeCopyOutcome::Completed
    }

    /// Driver copy: make sure the target collection exists, replicate
    /// indexes, then stream documents in unordered bulk-insert batches.
    /// Driver errors during the transfer propagate to the caller.
    async fn driver_copy(
        &self,
        source_coll: &Collection<Document>,
        target_coll: &Collection<Document>,
        tgt: &CollectionRef,
        batch_size: usize,
    ) -> Result<(u64, u64)> {
        self.ensure_collection_exists(tgt).await?;

        println!("📐 Copying indexes...");
        let indexes_created = replicate_indexes(source_coll, target_coll).await?;

        println!("📄 Copying documents...");
        let mut cursor = source_coll.find(doc! {}).await?;
        let mut batch: Vec<Document> = Vec::with_capacity(batch_size);
        let mut copied = 0u64;

        while let Some(document) = cursor.try_next().await? {
            batch.push(document);
            if batch.len() >= batch_size {
                // Unordered on purpose: one bad document must not abort the
                // batch, and the copy imposes no ordering between documents
                target_coll.insert_many(&batch).ordered(false).await?;
                copied += batch.len() as u64;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            target_coll.insert_many(&batch).ordered(false).await?;
            copied += batch.len() as u64;
        }

        Ok((copied, indexes_created))
    }

    /// The target collection must exist even when the source is empty.
    async fn ensure_collection_exists(&self, tgt: &CollectionRef) -> Result<()> {
        let db = self.target.database(&tgt.database);
        if let Err(e) = db.create_collection(&tgt.collection).await {
            let already_exists = matches!(
                e.kind.as_ref(),
                ErrorKind::Command(command) if command.code == 48
            );
            if !already_exists {
                return Err(e).context(format!("Failed to create collection {}", tgt));
            }
        }
        Ok(())
    }
}
