use super::{matches_search, AppliedOutgoing, InventoryStore, LedgerEntry};
use crate::errors::{Result, SeedTrackerError};
use crate::models::{
    Batch, BatchPhoto, BatchUpdate, NewBatch, NewPhoto, OutgoingTransaction, TransactionListing,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct BatchRow {
    batch: Batch,
    /// Set under the row lock when the batch is removed, so a writer that
    /// fetched the row before removal sees it as gone.
    deleted: bool,
}

/// Process-local store for development and tests.
///
/// Lock order is table then row. `apply_outgoing` releases the table lock
/// before taking the row lock, so decrements on distinct batches run in
/// parallel while writers on the same batch are serialized by its mutex.
#[derive(Default)]
pub struct MemoryStore {
    batches: RwLock<BTreeMap<i64, Arc<Mutex<BatchRow>>>>,
    transactions: RwLock<Vec<OutgoingTransaction>>,
    photos: RwLock<Vec<BatchPhoto>>,
    batch_seq: AtomicI64,
    transaction_seq: AtomicI64,
    photo_seq: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, id: i64) -> Option<Arc<Mutex<BatchRow>>> {
        self.batches.read().get(&id).cloned()
    }

    fn next_id(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn number_taken(
        rows: &BTreeMap<i64, Arc<Mutex<BatchRow>>>,
        batch_number: &str,
        except: Option<i64>,
    ) -> bool {
        rows.iter()
            .filter(|(id, _)| Some(**id) != except)
            .any(|(_, row)| row.lock().batch.batch_number == batch_number)
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn insert_batch(&self, batch: &NewBatch) -> Result<Batch> {
        let mut rows = self.batches.write();
        if Self::number_taken(&rows, &batch.batch_number, None) {
            return Err(SeedTrackerError::DuplicateBatchNumber(batch.batch_number.clone()));
        }

        let created = Batch {
            id: Self::next_id(&self.batch_seq),
            seed_name: batch.seed_name.clone(),
            batch_number: batch.batch_number.clone(),
            weight_grams: batch.weight_grams,
            sell_by_date: batch.sell_by_date,
            created_at: Utc::now(),
        };
        rows.insert(
            created.id,
            Arc::new(Mutex::new(BatchRow {
                batch: created.clone(),
                deleted: false,
            })),
        );

        Ok(created)
    }

    async fn update_batch(&self, id: i64, update: &BatchUpdate) -> Result<Batch> {
        let rows = self.batches.write();
        let row = rows.get(&id).ok_or(SeedTrackerError::BatchNotFound(id))?;
        if Self::number_taken(&rows, &update.batch_number, Some(id)) {
            return Err(SeedTrackerError::DuplicateBatchNumber(update.batch_number.clone()));
        }

        let mut row = row.lock();
        row.batch.seed_name = update.seed_name.clone();
        row.batch.batch_number = update.batch_number.clone();
        row.batch.sell_by_date = update.sell_by_date;

        Ok(row.batch.clone())
    }

    async fn get_batch(&self, id: i64) -> Result<Option<Batch>> {
        Ok(self.row(id).map(|row| row.lock().batch.clone()))
    }

    async fn list_batches(&self, search: Option<String>) -> Result<Vec<Batch>> {
        let mut batches: Vec<Batch> = self
            .batches
            .read()
            .values()
            .map(|row| row.lock().batch.clone())
            .filter(|batch| search.as_deref().map_or(true, |q| matches_search(batch, q)))
            .collect();
        batches.sort_by(|a, b| {
            (a.sell_by_date, &a.batch_number).cmp(&(b.sell_by_date, &b.batch_number))
        });

        Ok(batches)
    }

    async fn delete_batch(&self, id: i64) -> Result<Batch> {
        let mut rows = self.batches.write();
        let row = rows.get(&id).cloned().ok_or(SeedTrackerError::BatchNotFound(id))?;
        let mut row = row.lock();

        let transactions = self
            .transactions
            .read()
            .iter()
            .filter(|t| t.batch_id == id)
            .count() as i64;
        if transactions > 0 {
            return Err(SeedTrackerError::ProtectedDelete { batch_id: id, transactions });
        }

        row.deleted = true;
        rows.remove(&id);
        self.photos.write().retain(|p| p.batch_id != id);

        Ok(row.batch.clone())
    }

    async fn apply_outgoing(&self, entry: &LedgerEntry) -> Result<AppliedOutgoing> {
        let row = self
            .row(entry.batch_id)
            .ok_or(SeedTrackerError::BatchNotFound(entry.batch_id))?;
        let mut row = row.lock();
        if row.deleted {
            return Err(SeedTrackerError::BatchNotFound(entry.batch_id));
        }

        let available = row.batch.weight_grams;
        if entry.quantity_grams > available {
            return Err(SeedTrackerError::InsufficientInventory {
                requested: entry.quantity_grams,
                available,
            });
        }

        let transaction = OutgoingTransaction {
            id: Self::next_id(&self.transaction_seq),
            batch_id: entry.batch_id,
            kind: entry.kind,
            quantity_grams: entry.quantity_grams,
            notes: entry.notes.clone(),
            date: entry.date,
        };
        self.transactions.write().push(transaction.clone());
        row.batch.weight_grams -= entry.quantity_grams;

        Ok(AppliedOutgoing {
            transaction,
            batch: row.batch.clone(),
        })
    }

    async fn list_transactions(&self, batch_id: Option<i64>) -> Result<Vec<TransactionListing>> {
        let mut selected: Vec<OutgoingTransaction> = self
            .transactions
            .read()
            .iter()
            .filter(|t| batch_id.map_or(true, |id| t.batch_id == id))
            .cloned()
            .collect();
        selected.sort_by_key(|t| Reverse((t.date, t.id)));

        let mut listings = Vec::with_capacity(selected.len());
        for transaction in selected {
            let row = self.row(transaction.batch_id).ok_or_else(|| {
                SeedTrackerError::Internal(format!(
                    "transaction {} references missing batch {}",
                    transaction.id, transaction.batch_id
                ))
            })?;
            let (batch_number, seed_name) = {
                let row = row.lock();
                (row.batch.batch_number.clone(), row.batch.seed_name.clone())
            };
            listings.push(TransactionListing {
                transaction,
                batch_number,
                seed_name,
            });
        }

        Ok(listings)
    }

    async fn insert_photo(&self, photo: &NewPhoto) -> Result<BatchPhoto> {
        let row = self
            .row(photo.batch_id)
            .ok_or(SeedTrackerError::BatchNotFound(photo.batch_id))?;
        let row = row.lock();
        if row.deleted {
            return Err(SeedTrackerError::BatchNotFound(photo.batch_id));
        }

        let created = BatchPhoto {
            id: Self::next_id(&self.photo_seq),
            batch_id: photo.batch_id,
            image_path: photo.image_path.clone(),
            uploaded_at: Utc::now(),
        };
        self.photos.write().push(created.clone());

        Ok(created)
    }

    async fn list_photos(&self, batch_id: i64) -> Result<Vec<BatchPhoto>> {
        Ok(self
            .photos
            .read()
            .iter()
            .filter(|p| p.batch_id == batch_id)
            .cloned()
            .collect())
    }
}
