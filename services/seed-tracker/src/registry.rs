use crate::errors::{Result, SeedTrackerError};
use crate::metrics;
use crate::models::{
    Batch, BatchDetail, BatchListResponse, BatchSort, BatchUpdate, BatchView, ListQuery, NewBatch,
    RecommendedFilter,
};
use crate::recommendation::is_recommended;
use crate::storage::InventoryStore;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// Total digits and decimal places of a stored gram amount.
const MAX_DIGITS: u32 = 12;
const DECIMAL_PLACES: u32 = 2;

/// Batch records: creation, edits, lookups and protected deletion.
pub struct BatchRegistry {
    store: Arc<dyn InventoryStore>,
    window_days: u32,
}

impl BatchRegistry {
    pub fn new(store: Arc<dyn InventoryStore>, window_days: u32) -> Self {
        BatchRegistry { store, window_days }
    }

    pub fn view(&self, batch: Batch, today: NaiveDate) -> BatchView {
        let recommended_to_process = is_recommended(batch.sell_by_date, today, self.window_days);
        BatchView {
            batch,
            recommended_to_process,
        }
    }

    pub async fn create_batch(&self, mut request: NewBatch) -> Result<Batch> {
        request.seed_name = request.seed_name.trim().to_string();
        request.batch_number = request.batch_number.trim().to_string();
        request.validate()?;

        if request.weight_grams < Decimal::ZERO {
            return Err(SeedTrackerError::Validation(
                "weight_grams must not be negative".to_string(),
            ));
        }
        validate_grams("weight_grams", request.weight_grams)?;

        let batch = self.store.insert_batch(&request).await?;
        metrics::BATCHES_CREATED.inc();

        info!(
            "Registered batch {} ({}) with {} g, sell by {}",
            batch.batch_number, batch.seed_name, batch.weight_grams, batch.sell_by_date
        );

        Ok(batch)
    }

    pub async fn update_batch(&self, id: i64, mut request: BatchUpdate) -> Result<Batch> {
        request.seed_name = request.seed_name.trim().to_string();
        request.batch_number = request.batch_number.trim().to_string();
        request.validate()?;

        let batch = self.store.update_batch(id, &request).await?;
        info!("Updated batch {} ({})", batch.id, batch.batch_number);

        Ok(batch)
    }

    pub async fn get_batch(&self, id: i64) -> Result<Batch> {
        self.store
            .get_batch(id)
            .await?
            .ok_or(SeedTrackerError::BatchNotFound(id))
    }

    /// Listing with search, recommended filter and optional recommended-first sort.
    pub async fn list_batches(&self, query: &ListQuery, today: NaiveDate) -> Result<BatchListResponse> {
        let search = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        let mut batches: Vec<BatchView> = self
            .store
            .list_batches(search)
            .await?
            .into_iter()
            .map(|batch| self.view(batch, today))
            .filter(|view| match query.recommended {
                Some(RecommendedFilter::Yes) => view.recommended_to_process,
                Some(RecommendedFilter::No) => !view.recommended_to_process,
                None => true,
            })
            .collect();

        if query.sort == Some(BatchSort::Recommended) {
            // stable, so equal keys keep the batch-number order from the store
            batches.sort_by(|a, b| {
                b.recommended_to_process
                    .cmp(&a.recommended_to_process)
                    .then(a.batch.sell_by_date.cmp(&b.batch.sell_by_date))
            });
        }

        Ok(BatchListResponse {
            total: batches.len(),
            batches,
            recommend_window_days: self.window_days,
        })
    }

    pub async fn batch_detail(&self, id: i64, today: NaiveDate, can_edit: bool) -> Result<BatchDetail> {
        let batch = self.get_batch(id).await?;
        let photos = self.store.list_photos(id).await?;
        let outgoing_transactions = self
            .store
            .list_transactions(Some(id))
            .await?
            .into_iter()
            .map(|listing| listing.transaction)
            .collect();

        Ok(BatchDetail {
            view: self.view(batch, today),
            photos,
            outgoing_transactions,
            can_edit,
        })
    }

    /// Refused while outgoing transactions reference the batch.
    pub async fn delete_batch(&self, id: i64) -> Result<Batch> {
        match self.store.delete_batch(id).await {
            Ok(batch) => {
                metrics::BATCHES_DELETED.inc();
                info!("Deleted batch {} ({})", batch.id, batch.batch_number);
                Ok(batch)
            }
            Err(e @ SeedTrackerError::ProtectedDelete { .. }) => {
                warn!("{}", e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Reject gram amounts that would not fit NUMERIC(12, 2).
pub fn validate_grams(field: &str, value: Decimal) -> Result<()> {
    let normalized = value.normalize();
    if normalized.scale() > DECIMAL_PLACES {
        return Err(SeedTrackerError::Validation(format!(
            "{} allows at most {} decimal places",
            field, DECIMAL_PLACES
        )));
    }

    let max = Decimal::from(10u64.pow(MAX_DIGITS - DECIMAL_PLACES));
    if value.abs() >= max {
        return Err(SeedTrackerError::Validation(format!(
            "{} allows at most {} digits",
            field, MAX_DIGITS
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerEngine;
    use crate::models::{OutgoingRequest, TransactionType};
    use crate::storage::MemoryStore;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn new_batch(number: &str, name: &str, days_ahead: u64) -> NewBatch {
        NewBatch {
            seed_name: name.to_string(),
            batch_number: number.to_string(),
            weight_grams: dec!(50.00),
            sell_by_date: today() + chrono::Days::new(days_ahead),
        }
    }

    fn registry() -> (Arc<MemoryStore>, BatchRegistry) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), BatchRegistry::new(store, 30))
    }

    #[tokio::test]
    async fn test_create_rejects_negative_weight_and_duplicates() {
        let (_store, registry) = registry();

        let mut negative = new_batch("B1", "Pea", 10);
        negative.weight_grams = dec!(-0.01);
        assert!(matches!(
            registry.create_batch(negative).await,
            Err(SeedTrackerError::Validation(_))
        ));

        registry.create_batch(new_batch("B1", "Pea", 10)).await.unwrap();
        assert!(matches!(
            registry.create_batch(new_batch(" B1 ", "Bean", 10)).await,
            Err(SeedTrackerError::DuplicateBatchNumber(n)) if n == "B1"
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_batch_number() {
        let (_store, registry) = registry();
        assert!(matches!(
            registry.create_batch(new_batch("   ", "Pea", 10)).await,
            Err(SeedTrackerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_weight() {
        let (_store, registry) = registry();
        let batch = registry.create_batch(new_batch("B1", "Pea", 10)).await.unwrap();

        let updated = registry
            .update_batch(
                batch.id,
                BatchUpdate {
                    seed_name: "Sweet Pea".to_string(),
                    batch_number: "B1-A".to_string(),
                    sell_by_date: today(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.batch_number, "B1-A");
        assert_eq!(updated.weight_grams, dec!(50.00));

        let missing = registry
            .update_batch(
                404,
                BatchUpdate {
                    seed_name: "x".to_string(),
                    batch_number: "x".to_string(),
                    sell_by_date: today(),
                },
            )
            .await;
        assert!(matches!(missing, Err(SeedTrackerError::BatchNotFound(404))));
    }

    #[tokio::test]
    async fn test_delete_protected_by_transactions() {
        let (store, registry) = registry();
        let ledger = LedgerEngine::new(store.clone());

        let free = registry.create_batch(new_batch("B1", "Pea", 10)).await.unwrap();
        let used = registry.create_batch(new_batch("B2", "Bean", 10)).await.unwrap();
        ledger
            .apply_outgoing(
                OutgoingRequest {
                    batch_id: used.id,
                    kind: TransactionType::Charity,
                    quantity_grams: dec!(1.00),
                    notes: "food bank".to_string(),
                },
                today(),
            )
            .await
            .unwrap();

        registry.delete_batch(free.id).await.unwrap();
        assert!(matches!(
            registry.get_batch(free.id).await,
            Err(SeedTrackerError::BatchNotFound(_))
        ));

        let err = registry.delete_batch(used.id).await.unwrap_err();
        assert!(matches!(
            err,
            SeedTrackerError::ProtectedDelete { batch_id, transactions: 1 } if batch_id == used.id
        ));
        assert!(registry.get_batch(used.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_listing_filter_search_and_sort() {
        let (_store, registry) = registry();
        registry.create_batch(new_batch("A-1", "Carrot", 60)).await.unwrap();
        registry.create_batch(new_batch("B-1", "Tomato", 5)).await.unwrap();
        registry.create_batch(new_batch("C-1", "Cherry Tomato", 40)).await.unwrap();
        registry.create_batch(new_batch("D-1", "Radish", 30)).await.unwrap();

        let all = registry.list_batches(&ListQuery::default(), today()).await.unwrap();
        let numbers: Vec<&str> = all.batches.iter().map(|v| v.batch.batch_number.as_str()).collect();
        assert_eq!(numbers, vec!["B-1", "D-1", "C-1", "A-1"]);
        assert_eq!(all.recommend_window_days, 30);

        let recommended = registry
            .list_batches(
                &ListQuery {
                    recommended: Some(RecommendedFilter::Yes),
                    ..Default::default()
                },
                today(),
            )
            .await
            .unwrap();
        assert_eq!(recommended.total, 2);
        assert!(recommended.batches.iter().all(|v| v.recommended_to_process));

        let tomatoes = registry
            .list_batches(
                &ListQuery {
                    q: Some("tomato".to_string()),
                    recommended: Some(RecommendedFilter::No),
                    ..Default::default()
                },
                today(),
            )
            .await
            .unwrap();
        assert_eq!(tomatoes.total, 1);
        assert_eq!(tomatoes.batches[0].batch.batch_number, "C-1");

        let sorted = registry
            .list_batches(
                &ListQuery {
                    sort: Some(BatchSort::Recommended),
                    ..Default::default()
                },
                today(),
            )
            .await
            .unwrap();
        let flags: Vec<bool> = sorted.batches.iter().map(|v| v.recommended_to_process).collect();
        assert_eq!(flags, vec![true, true, false, false]);
    }

    #[test]
    fn test_validate_grams_precision() {
        assert!(validate_grams("w", dec!(1.10)).is_ok());
        assert!(validate_grams("w", dec!(1.100)).is_ok());
        assert!(validate_grams("w", dec!(1.101)).is_err());
        assert!(validate_grams("w", dec!(9999999999.99)).is_ok());
        assert!(validate_grams("w", dec!(10000000000)).is_err());
    }
}
