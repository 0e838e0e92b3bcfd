//! Read-only renderings of registry and ledger state for auditors and printing.

pub mod csv_export;
pub mod seed_tag;

pub use csv_export::{batches_csv, outgoing_csv};
pub use seed_tag::seed_tag_pdf;

pub const BATCHES_CSV_FILENAME: &str = "seed_batches.csv";
pub const OUTGOING_CSV_FILENAME: &str = "outgoing_transactions.csv";

pub fn seed_tag_filename(batch_number: &str) -> String {
    format!("seed_tag_{}.pdf", batch_number)
}

pub(crate) fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}
