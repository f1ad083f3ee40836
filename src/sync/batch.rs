use thiserror::Error;

use crate::notion::{Block, NotionError, RemoteStore};

/// Blocks per append request unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Most children the store accepts in one append request
pub const MAX_BATCH_SIZE: usize = 100;

/// An append request failed. Batches before `batch` are already applied.
#[derive(Error, Debug)]
#[error("Batch {batch} failed after {appended} blocks were appended: {source}")]
pub struct BatchError {
    /// 1-based number of the failed batch
    pub batch: usize,
    pub appended: usize,
    #[source]
    pub source: NotionError,
}

/// Append `blocks` under `target_id` in order, at most `batch_size` per
/// request. Stops at the first failed request; nothing is retried.
pub async fn append_in_batches(
    store: &dyn RemoteStore,
    target_id: &str,
    blocks: &[Block],
    batch_size: usize,
) -> Result<usize, BatchError> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let mut appended = 0;

    for (index, chunk) in blocks.chunks(batch_size).enumerate() {
        let batch = index + 1;
        if let Err(source) = store.append_children(target_id, chunk).await {
            log::error!(
                "Failed to append batch {} ({} blocks) to {}: {}",
                batch,
                chunk.len(),
                target_id,
                source
            );
            return Err(BatchError {
                batch,
                appended,
                source,
            });
        }
        appended += chunk.len();
        log::debug!("Appended batch {} ({} blocks) to {}", batch, chunk.len(), target_id);
    }

    Ok(appended)
}
