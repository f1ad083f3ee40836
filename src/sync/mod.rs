pub mod batch;
pub mod config;
pub mod cursor;
pub mod report;

mod manager;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{append_in_batches, BatchError, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
pub use config::{ConfigError, ProjectFilter, SyncConfig};
pub use cursor::{format_cursor, SyncCursor};
pub use manager::{SyncError, SyncManager};
pub use report::{ItemReport, Outcome, PassReport, SkipReason, SyncReport};
