use crate::record::InventoryRecord;
use crate::store::{Filter, TableStore, PRIMARY_KEY};
use crate::{IngestError, IngestResult};
use futures::stream::{self, StreamExt};

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// One insert request that the store rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    /// 0-based position of the batch in the run.
    pub batch_index: usize,
    pub ids: Vec<u64>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    pub written: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
}

/// Delete the rows a reload replaces: the whole table, or one category when
/// `category` is set. Needs explicit operator confirmation.
pub async fn clear_table<S>(
    store: &S,
    table: &str,
    category: Option<&str>,
    confirmed: bool,
) -> IngestResult<usize>
where
    S: TableStore + ?Sized,
{
    if !confirmed {
        return Err(IngestError::ClearNotConfirmed(table.to_string()));
    }

    let filter = match category {
        Some(category) => Filter::eq("category", category),
        // ids start at 1, so this matches every row
        None => Filter::neq(PRIMARY_KEY, 0),
    };
    let removed = store
        .delete(table, &[filter])
        .await
        .map_err(|source| IngestError::Clear {
            table: table.to_string(),
            source,
        })?;
    tracing::info!(table, removed, ?category, "cleared destination");
    Ok(removed)
}

/// Insert `records` in chunks of `batch_size`. A failed chunk is recorded and
/// skipped; later chunks are still sent.
pub async fn write_batches<S>(
    store: &S,
    table: &str,
    records: &[InventoryRecord],
    batch_size: usize,
) -> WriteOutcome
where
    S: TableStore + ?Sized,
{
    let batch_size = batch_size.max(1);
    stream::iter(records.chunks(batch_size).enumerate())
        .fold(WriteOutcome::default(), |mut outcome, (batch_index, batch)| async move {
            let rows = batch.iter().map(InventoryRecord::to_row).collect();
            match store.insert(table, rows).await {
                Ok(inserted) => {
                    tracing::debug!(batch_index, inserted, "batch written");
                    outcome.written += inserted;
                }
                Err(err) => {
                    tracing::warn!(batch_index, size = batch.len(), error = %err, "batch failed");
                    outcome.failed += batch.len();
                    outcome.failures.push(BatchFailure {
                        batch_index,
                        ids: batch.iter().map(|r| r.id).collect(),
                        message: err.to_string(),
                    });
                }
            }
            outcome
        })
        .await
}
