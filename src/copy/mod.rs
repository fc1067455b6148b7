// mongotool/src/copy/mod.rs
pub(crate) mod engine;
pub(crate) mod indexes;
pub(crate) mod verify;

use std::fmt;

pub use engine::{CopyEngine, CopyOptions};
pub use verify::{VerificationReport, DEFAULT_SAMPLE_SIZE};

/// Default number of documents per bulk insert batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// A (database, collection) pair. Immutable once a copy begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    pub database: String,
    pub collection: String,
}

impl CollectionRef {
    pub fn new(database: &str, collection: &str) -> Self {
        Self {
            database: database.to_string(),
            collection: collection.to_string(),
        }
    }

    /// `db.coll` form used by the native tools' namespace flags.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.namespace())
    }
}

/// How a collection copy was actually performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    NativeDump,
    DriverCopy,
}

impl CopyMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyMethod::NativeDump => "native-dump",
            CopyMethod::DriverCopy => "driver-copy",
        }
    }
}

impl fmt::Display for CopyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single collection copy. Returned to the caller, never
/// persisted.
#[derive(Debug, Clone)]
pub struct CopyOutcome {
    pub documents_copied: u64,
    pub indexes_created: u64,
    pub source_count: u64,
    pub method: CopyMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace() {
        let r = CollectionRef::new("shop", "orders");
        assert_eq!(r.namespace(), "shop.orders");
        assert_eq!(r.to_string(), "shop.orders");
    }

    #[test]
    fn test_method_labels() {
        assert_eq!(CopyMethod::NativeDump.as_str(), "native-dump");
        assert_eq!(CopyMethod::DriverCopy.as_str(), "driver-copy");
    }
}
