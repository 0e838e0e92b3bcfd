// Property tests for the outgoing ledger against the in-memory store

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use seed_tracker::ledger::LedgerEngine;
    use seed_tracker::models::{NewBatch, OutgoingRequest, TransactionType};
    use seed_tracker::registry::BatchRegistry;
    use seed_tracker::storage::{InventoryStore, MemoryStore};
    use seed_tracker::SeedTrackerError;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn kind_strategy() -> impl Strategy<Value = TransactionType> {
        prop::sample::select(TransactionType::ALL.to_vec())
    }

    /// Quantities in hundredths of a gram, including zero and values above the stock.
    fn request_strategy() -> impl Strategy<Value = (TransactionType, i64)> {
        (kind_strategy(), 0i64..=6_000)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Remaining weight always equals the initial weight minus every applied quantity,
        /// and never drops below zero.
        #[test]
        fn weight_is_conserved(
            initial_cents in 0i64..=20_000,
            requests in prop::collection::vec(request_strategy(), 1..25),
        ) {
            tokio_test::block_on(async move {
                let store: Arc<dyn InventoryStore> = Arc::new(MemoryStore::new());
                let registry = BatchRegistry::new(store.clone(), 30);
                let ledger = LedgerEngine::new(store.clone());

                let initial = Decimal::new(initial_cents, 2);
                let batch = registry
                    .create_batch(NewBatch {
                        seed_name: "Basil".to_string(),
                        batch_number: "PROP-1".to_string(),
                        weight_grams: initial,
                        sell_by_date: today(),
                    })
                    .await
                    .unwrap();

                let mut applied = Decimal::ZERO;
                for (kind, cents) in requests {
                    let quantity = Decimal::new(cents, 2);
                    let result = ledger
                        .apply_outgoing(
                            OutgoingRequest {
                                batch_id: batch.id,
                                kind,
                                quantity_grams: quantity,
                                notes: String::new(),
                            },
                            today(),
                        )
                        .await;

                    match result {
                        Ok(response) => {
                            applied += quantity;
                            assert!(quantity > Decimal::ZERO);
                            assert_eq!(response.remaining_weight_grams, initial - applied);
                        }
                        Err(SeedTrackerError::InvalidQuantity(_)) => {
                            assert_eq!(quantity, Decimal::ZERO);
                        }
                        Err(SeedTrackerError::InsufficientInventory { requested, available }) => {
                            assert_eq!(requested, quantity);
                            assert_eq!(available, initial - applied);
                            assert!(quantity > available);
                        }
                        Err(other) => panic!("unexpected error: {:?}", other),
                    }
                }

                let remaining = registry.get_batch(batch.id).await.unwrap().weight_grams;
                assert_eq!(remaining, initial - applied);
                assert!(remaining >= Decimal::ZERO);

                let history = ledger.transactions_for_batch(batch.id).await.unwrap();
                let recorded: Decimal = history.iter().map(|t| t.quantity_grams).sum();
                assert_eq!(recorded, applied);
            });
        }
    }
}
