// mongotool/src/copy/verify.rs
use anyhow::Result;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Collection;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::indexes::count_all_indexes;

/// Default number of randomly sampled documents compared per verification.
pub const DEFAULT_SAMPLE_SIZE: u32 = 100;

/// Collections at or below this count get a full checksum comparison;
/// larger ones skip it and report `checksum_match: None`.
pub const CHECKSUM_THRESHOLD: u64 = 10_000;

/// Post-copy integrity comparison between a source and target collection.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub source_count: u64,
    pub target_count: u64,
    pub count_match: bool,
    pub source_indexes: u64,
    pub target_indexes: u64,
    pub index_match: bool,
    pub sample_mismatches: Vec<String>,
    pub sample_match: bool,
    /// `None` when the collection is above the checksum threshold.
    pub checksum_match: Option<bool>,
}

impl VerificationReport {
    /// An unset checksum is "not computed", never a failure.
    pub fn passed(&self) -> bool {
        self.count_match
            && self.index_match
            && self.sample_match
            && self.checksum_match != Some(false)
    }
}

/// Compare source and target after a copy: counts, index counts, a random
/// document sample, and (for small collections) a full checksum.
pub async fn verify_copy(
    source: &Collection<Document>,
    target: &Collection<Document>,
    sample_size: u32,
) -> Result<VerificationReport> {
    println!("🔍 Verifying copy...");

    let source_count = source.estimated_document_count().await?;
    let target_count = target.estimated_document_count().await?;

    let source_indexes = count_all_indexes(source).await?;
    let target_indexes = count_all_indexes(target).await?;

    let mut sample_mismatches = Vec::new();
    let pipeline = vec![doc! { "$sample": { "size": sample_size as i64 } }];
    let mut cursor = source.aggregate(pipeline).await?;
    while let Some(doc) = cursor.try_next().await? {
        let Some(id) = doc.get("_id") else {
            continue;
        };
        match target.find_one(doc! { "_id": id.clone() }).await? {
            None => sample_mismatches.push(format!("missing document: {}", id)),
            Some(target_doc) => {
                // Structural comparison; field order is allowed to differ
                if document_fingerprint(&doc) != document_fingerprint(&target_doc) {
                    sample_mismatches.push(format!("document mismatch: {}", id));
                }
            }
        }
    }

    let checksum_match = if source_count <= CHECKSUM_THRESHOLD {
        let source_digest = collection_checksum(source).await?;
        let target_digest = collection_checksum(target).await?;
        Some(source_digest == target_digest)
    } else {
        None
    };

    Ok(VerificationReport {
        count_match: source_count == target_count,
        source_count,
        target_count,
        index_match: source_indexes == target_indexes,
        source_indexes,
        target_indexes,
        sample_match: sample_mismatches.is_empty(),
        sample_mismatches,
        checksum_match,
    })
}

/// SHA-256 over every document's canonical form, scanned in ascending
/// `_id` order so the digest is deterministic.
async fn collection_checksum(collection: &Collection<Document>) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut cursor = collection.find(doc! {}).sort(doc! { "_id": 1 }).await?;
    while let Some(doc) = cursor.try_next().await? {
        hasher.update(document_fingerprint(&doc).as_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Canonical rendering of a document: relaxed extended JSON with keys
/// sorted recursively. Reproducible and sensitive to any field change;
/// not promised to match any other tool's serialization.
pub(crate) fn document_fingerprint(doc: &Document) -> String {
    let value = Bson::Document(doc.clone()).into_relaxed_extjson();
    let mut out = String::new();
    write_canonical(&value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_field_order() {
        let a = doc! { "name": "widget", "qty": 3, "tags": ["a", "b"] };
        let b = doc! { "qty": 3, "tags": ["a", "b"], "name": "widget" };
        assert_eq!(document_fingerprint(&a), document_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_detects_value_change() {
        let a = doc! { "name": "widget", "qty": 3 };
        let b = doc! { "name": "widget", "qty": 4 };
        assert_ne!(document_fingerprint(&a), document_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_detects_nested_change() {
        let a = doc! { "item": { "name": "widget", "dims": { "w": 2, "h": 5 } } };
        let b = doc! { "item": { "name": "widget", "dims": { "w": 2, "h": 6 } } };
        assert_ne!(document_fingerprint(&a), document_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_nested_key_order() {
        let a = doc! { "item": { "name": "widget", "qty": 1 } };
        let b = doc! { "item": { "qty": 1, "name": "widget" } };
        assert_eq!(document_fingerprint(&a), document_fingerprint(&b));
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = doc! { "tags": ["a", "b"] };
        let b = doc! { "tags": ["b", "a"] };
        assert_ne!(document_fingerprint(&a), document_fingerprint(&b));
    }

    #[test]
    fn test_report_passed_treats_unset_checksum_as_ok() {
        let mut report = VerificationReport {
            source_count: 5,
            target_count: 5,
            count_match: true,
            source_indexes: 2,
            target_indexes: 2,
            index_match: true,
            sample_mismatches: Vec::new(),
            sample_match: true,
            checksum_match: None,
        };
        assert!(report.passed());
        report.checksum_match = Some(false);
        assert!(!report.passed());
    }
}
