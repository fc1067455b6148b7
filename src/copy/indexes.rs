// mongotool/src/copy/indexes.rs
use anyhow::Result;
use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::{Collection, IndexModel};

/// Copy every non-default index from source to target.
///
/// The implicit `_id_` index always exists and is skipped. Server
/// bookkeeping (index version) is stripped so the target builds its own.
/// Each creation is independent: one incompatible index is logged and
/// skipped, the rest still land. Returns the number created.
pub async fn replicate_indexes(
    source: &Collection<Document>,
    target: &Collection<Document>,
) -> Result<u64> {
    let mut cursor = source.list_indexes().await?;
    let mut created = 0u64;

    while let Some(index) = cursor.try_next().await? {
        let name = index
            .options
            .as_ref()
            .and_then(|o| o.name.clone())
            .unwrap_or_default();
        if name == "_id_" {
            continue;
        }

        let mut options = index.options.clone().unwrap_or_default();
        options.version = None;
        let model = IndexModel::builder()
            .keys(index.keys.clone())
            .options(options)
            .build();

        match target.create_index(model).await {
            Ok(_) => {
                created += 1;
                println!("  ✓ Created index: {}", name);
            }
            Err(e) => {
                println!("  ⚠ Failed to create index {}: {}", name, e);
            }
        }
    }

    Ok(created)
}

/// Count the indexes on a collection, excluding the implicit `_id_` one.
pub async fn count_secondary_indexes(collection: &Collection<Document>) -> Result<u64> {
    let mut cursor = collection.list_indexes().await?;
    let mut count = 0u64;
    while let Some(index) = cursor.try_next().await? {
        let is_id = index
            .options
            .as_ref()
            .and_then(|o| o.name.as_deref())
            .map(|n| n == "_id_")
            .unwrap_or(false);
        if !is_id {
            count += 1;
        }
    }
    Ok(count)
}

/// Total index count, `_id_` included.
pub async fn count_all_indexes(collection: &Collection<Document>) -> Result<u64> {
    let mut cursor = collection.list_indexes().await?;
    let mut count = 0u64;
    while cursor.try_next().await?.is_some() {
        count += 1;
    }
    Ok(count)
}
