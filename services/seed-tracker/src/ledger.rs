//! Outgoing transaction ledger.
//!
//! Every reduction of a batch's weight goes through [`LedgerEngine::apply_outgoing`].
//! Quantity is validated here; the weight check and both writes happen inside the
//! store under the batch row lock, so the weight can never go below zero.

use crate::errors::{Result, SeedTrackerError};
use crate::metrics;
use crate::models::{OutgoingRequest, OutgoingResponse, OutgoingTransaction, TransactionListing};
use crate::registry::validate_grams;
use crate::storage::{InventoryStore, LedgerEntry};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct LedgerEngine {
    store: Arc<dyn InventoryStore>,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        LedgerEngine { store }
    }

    /// Record an outgoing transaction dated `today` and decrement the batch weight.
    pub async fn apply_outgoing(
        &self,
        request: OutgoingRequest,
        today: NaiveDate,
    ) -> Result<OutgoingResponse> {
        let quantity = validate_quantity(request.quantity_grams)?;

        let entry = LedgerEntry {
            batch_id: request.batch_id,
            kind: request.kind,
            quantity_grams: quantity,
            notes: request.notes,
            date: today,
        };

        let applied = match self.store.apply_outgoing(&entry).await {
            Ok(applied) => applied,
            Err(e) => {
                if e.is_rejection() {
                    warn!("Outgoing {} g rejected for batch {}: {}", quantity, entry.batch_id, e);
                    metrics::OUTGOING_REJECTIONS
                        .with_label_values(&[e.error_type()])
                        .inc();
                } else {
                    error!("Outgoing transaction failed for batch {}: {}", entry.batch_id, e);
                }
                return Err(e);
            }
        };

        metrics::OUTGOING_TRANSACTIONS
            .with_label_values(&[entry.kind.as_str()])
            .inc();
        if let Some(grams) = quantity.to_f64() {
            metrics::GRAMS_DISPENSED.inc_by(grams);
        }

        info!(
            "Recorded {} of {} g from batch {} (transaction {}), {} g remaining",
            entry.kind,
            quantity,
            applied.batch.batch_number,
            applied.transaction.id,
            applied.batch.weight_grams
        );

        Ok(OutgoingResponse {
            transaction: applied.transaction,
            batch_number: applied.batch.batch_number,
            remaining_weight_grams: applied.batch.weight_grams,
        })
    }

    /// All transactions with batch identity, newest first.
    pub async fn list_transactions(&self) -> Result<Vec<TransactionListing>> {
        self.store.list_transactions(None).await
    }

    pub async fn transactions_for_batch(&self, batch_id: i64) -> Result<Vec<OutgoingTransaction>> {
        Ok(self
            .store
            .list_transactions(Some(batch_id))
            .await?
            .into_iter()
            .map(|listing| listing.transaction)
            .collect())
    }
}

/// Quantity must be strictly positive and fit the stored precision.
pub fn validate_quantity(quantity: Decimal) -> Result<Decimal> {
    if quantity <= Decimal::ZERO {
        return Err(SeedTrackerError::InvalidQuantity(quantity));
    }
    validate_grams("quantity_grams", quantity)?;
    Ok(quantity)
}
