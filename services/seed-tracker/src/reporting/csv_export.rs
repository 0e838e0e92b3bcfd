use super::yes_no;
use crate::errors::{Result, SeedTrackerError};
use crate::models::{BatchView, TransactionListing};

const BATCH_HEADER: [&str; 7] = [
    "id",
    "batch_number",
    "seed_name",
    "weight_grams",
    "sell_by_date",
    "recommended_to_process",
    "created_at",
];

const OUTGOING_HEADER: [&str; 8] = [
    "id",
    "batch_id",
    "batch_number",
    "seed_name",
    "type",
    "quantity_grams",
    "notes",
    "date",
];

/// One row per batch, in the order given.
pub fn batches_csv(batches: &[BatchView]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(BATCH_HEADER)?;

    for view in batches {
        let batch = &view.batch;
        writer.write_record([
            batch.id.to_string(),
            batch.batch_number.clone(),
            batch.seed_name.clone(),
            format!("{:.2}", batch.weight_grams),
            batch.sell_by_date.to_string(),
            yes_no(view.recommended_to_process).to_string(),
            batch.created_at.to_rfc3339(),
        ])?;
    }

    finish(writer)
}

/// One row per transaction, in the order given.
pub fn outgoing_csv(transactions: &[TransactionListing]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(OUTGOING_HEADER)?;

    for listing in transactions {
        let t = &listing.transaction;
        writer.write_record([
            t.id.to_string(),
            t.batch_id.to_string(),
            listing.batch_number.clone(),
            listing.seed_name.clone(),
            t.kind.as_str().to_string(),
            format!("{:.2}", t.quantity_grams),
            t.notes.clone(),
            t.date.to_string(),
        ])?;
    }

    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| SeedTrackerError::Report(format!("CSV flush failed: {}", e.error())))
}
