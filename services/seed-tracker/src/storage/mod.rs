pub mod memory;
pub mod postgres;

use crate::errors::Result;
use crate::models::{
    Batch, BatchPhoto, BatchUpdate, NewBatch, NewPhoto, OutgoingTransaction, TransactionListing,
    TransactionType,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Validated outgoing transaction, ready to be applied under the batch row lock.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub batch_id: i64,
    pub kind: TransactionType,
    pub quantity_grams: Decimal,
    pub notes: String,
    pub date: NaiveDate,
}

/// Both rows written by a successful decrement.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOutgoing {
    pub transaction: OutgoingTransaction,
    pub batch: Batch,
}

/// Persistence for batches, the outgoing ledger and photos.
///
/// Implementations must apply [`InventoryStore::apply_outgoing`] and
/// [`InventoryStore::delete_batch`] under an exclusive lock on the batch row:
/// the weight check and both writes happen in one unit of work, and a
/// rejected or failed call leaves nothing behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert a batch. Fails with `DuplicateBatchNumber` on a taken batch number.
    async fn insert_batch(&self, batch: &NewBatch) -> Result<Batch>;

    /// Overwrite the editable fields of a batch. Weight is left untouched.
    async fn update_batch(&self, id: i64, update: &BatchUpdate) -> Result<Batch>;

    async fn get_batch(&self, id: i64) -> Result<Option<Batch>>;

    /// Batches ordered by sell-by date then batch number, optionally narrowed to
    /// a case-insensitive substring match on seed name or batch number.
    async fn list_batches(&self, search: Option<String>) -> Result<Vec<Batch>>;

    /// Delete a batch and its photos. Fails with `ProtectedDelete` while any
    /// outgoing transaction references it.
    async fn delete_batch(&self, id: i64) -> Result<Batch>;

    /// Lock the batch row, check `quantity <= weight`, record the transaction
    /// and decrement the weight atomically.
    async fn apply_outgoing(&self, entry: &LedgerEntry) -> Result<AppliedOutgoing>;

    /// Transactions ordered by date then id, both descending.
    async fn list_transactions(&self, batch_id: Option<i64>) -> Result<Vec<TransactionListing>>;

    async fn insert_photo(&self, photo: &NewPhoto) -> Result<BatchPhoto>;

    async fn list_photos(&self, batch_id: i64) -> Result<Vec<BatchPhoto>>;
}

/// Case-insensitive substring match used by every backend for batch search.
pub(crate) fn matches_search(batch: &Batch, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    batch.seed_name.to_lowercase().contains(&needle)
        || batch.batch_number.to_lowercase().contains(&needle)
}
