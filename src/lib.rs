pub mod markdown;
pub mod notion;
pub mod storage;
pub mod sync;

pub use notion::{NotionClient, NotionError, RemoteStore};
pub use storage::{LocalFs, VaultFs};
pub use sync::{SyncConfig, SyncError, SyncManager, SyncReport};
