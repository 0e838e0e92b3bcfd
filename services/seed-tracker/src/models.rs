use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Reason an amount of seed left a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Charity,
    PrinterError,
    MachineError,
    Disposal,
}

impl TransactionType {
    pub const ALL: [TransactionType; 4] = [
        TransactionType::Charity,
        TransactionType::PrinterError,
        TransactionType::MachineError,
        TransactionType::Disposal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Charity => "charity",
            TransactionType::PrinterError => "printer_error",
            TransactionType::MachineError => "machine_error",
            TransactionType::Disposal => "disposal",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown transaction type: {}", s))
    }
}

/// A tracked quantity of a named seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Batch {
    pub id: i64,
    pub seed_name: String,
    pub batch_number: String,
    pub weight_grams: Decimal,
    pub sell_by_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger entry. `kind` is stored as text in the `type` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingTransaction {
    pub id: i64,
    pub batch_id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity_grams: Decimal,
    pub notes: String,
    pub date: NaiveDate,
}

/// Transaction joined with the identifying fields of its batch, as exported to auditors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionListing {
    #[serde(flatten)]
    pub transaction: OutgoingTransaction,
    pub batch_number: String,
    pub seed_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BatchPhoto {
    pub id: i64,
    pub batch_id: i64,
    pub image_path: String,
    pub uploaded_at: DateTime<Utc>,
}

fn default_seed_name() -> String {
    "Unknown".to_string()
}

/// Batch creation request
#[derive(Debug, Clone, Deserialize, Serialize, validator::Validate)]
pub struct NewBatch {
    #[serde(default = "default_seed_name")]
    #[validate(length(min = 1, max = 200))]
    pub seed_name: String,
    #[validate(length(min = 1, max = 100))]
    pub batch_number: String,
    pub weight_grams: Decimal,
    pub sell_by_date: NaiveDate,
}

/// Batch edit request. Weight only changes through the ledger.
#[derive(Debug, Clone, Deserialize, Serialize, validator::Validate)]
pub struct BatchUpdate {
    #[validate(length(min = 1, max = 200))]
    pub seed_name: String,
    #[validate(length(min = 1, max = 100))]
    pub batch_number: String,
    pub sell_by_date: NaiveDate,
}

/// Outgoing transaction request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutgoingRequest {
    pub batch_id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity_grams: Decimal,
    #[serde(default)]
    pub notes: String,
}

/// Outgoing transaction request scoped to a batch in the path
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchOutgoingRequest {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity_grams: Decimal,
    #[serde(default)]
    pub notes: String,
}

impl BatchOutgoingRequest {
    pub fn for_batch(self, batch_id: i64) -> OutgoingRequest {
        OutgoingRequest {
            batch_id,
            kind: self.kind,
            quantity_grams: self.quantity_grams,
            notes: self.notes,
        }
    }
}

/// Photo ready to be recorded against a batch.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub batch_id: i64,
    pub image_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedFilter {
    Yes,
    No,
}

impl FromStr for RecommendedFilter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(RecommendedFilter::Yes),
            "no" => Ok(RecommendedFilter::No),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchSort {
    Recommended,
}

impl FromStr for BatchSort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recommended" => Ok(BatchSort::Recommended),
            _ => Err(()),
        }
    }
}

/// Query string of the batch listing. Empty or unknown `recommended` and
/// `sort` values are ignored rather than rejected.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListQuery {
    pub q: Option<String>,
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub recommended: Option<RecommendedFilter>,
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub sort: Option<BatchSort>,
}

fn ignore_unknown<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.trim().parse().ok()))
}

/// Batch annotated with the recommendation flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    pub recommended_to_process: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchListResponse {
    pub batches: Vec<BatchView>,
    pub recommend_window_days: u32,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchDetail {
    #[serde(flatten)]
    pub view: BatchView,
    pub photos: Vec<BatchPhoto>,
    pub outgoing_transactions: Vec<OutgoingTransaction>,
    pub can_edit: bool,
}

/// Result of a successful outgoing transaction
#[derive(Debug, Serialize, Deserialize)]
pub struct OutgoingResponse {
    pub transaction: OutgoingTransaction,
    pub batch_number: String,
    pub remaining_weight_grams: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhotoUploadResponse {
    pub batch_id: i64,
    pub batch_number: String,
    pub uploaded: Vec<BatchPhoto>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_round_trips_through_text() {
        for kind in TransactionType::ALL {
            assert_eq!(kind.as_str().parse::<TransactionType>().unwrap(), kind);
        }
        assert!("refund".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_outgoing_request_uses_type_field() {
        let request: OutgoingRequest = serde_json::from_str(
            r#"{"batch_id": 7, "type": "printer_error", "quantity_grams": "12.50"}"#,
        )
        .unwrap();
        assert_eq!(request.kind, TransactionType::PrinterError);
        assert_eq!(request.notes, "");
        assert_eq!(request.quantity_grams.to_string(), "12.50");
    }

    #[test]
    fn test_new_batch_defaults_seed_name() {
        let batch: NewBatch = serde_json::from_str(
            r#"{"batch_number": "B1", "weight_grams": "100.00", "sell_by_date": "2026-11-01"}"#,
        )
        .unwrap();
        assert_eq!(batch.seed_name, "Unknown");
    }

    #[test]
    fn test_list_query_ignores_empty_and_unknown_options() {
        let query: ListQuery =
            serde_json::from_str(r#"{"q": "", "recommended": "", "sort": ""}"#).unwrap();
        assert_eq!(query.recommended, None);
        assert_eq!(query.sort, None);

        let query: ListQuery =
            serde_json::from_str(r#"{"recommended": "all", "sort": "name"}"#).unwrap();
        assert_eq!(query.recommended, None);
        assert_eq!(query.sort, None);

        let query: ListQuery =
            serde_json::from_str(r#"{"recommended": "no", "sort": "recommended"}"#).unwrap();
        assert_eq!(query.recommended, Some(RecommendedFilter::No));
        assert_eq!(query.sort, Some(BatchSort::Recommended));

        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert!(query.q.is_none() && query.recommended.is_none() && query.sort.is_none());
    }
}
