// mongotool/src/restore/mod.rs
mod logic;

pub use logic::{perform_restore, RestoreReceipt, RestoreRequest};
