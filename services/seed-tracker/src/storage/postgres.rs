use super::{AppliedOutgoing, InventoryStore, LedgerEntry};
use crate::errors::{Result, SeedTrackerError};
use crate::models::{
    Batch, BatchPhoto, BatchUpdate, NewBatch, NewPhoto, OutgoingTransaction, TransactionListing,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::info;

const BATCH_COLUMNS: &str = "id, seed_name, batch_number, weight_grams, sell_by_date, created_at";
const TRANSACTION_COLUMNS: &str = "id, batch_id, type, quantity_grams, notes, date";

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: i64,
    batch_id: i64,
    #[sqlx(rename = "type")]
    kind: String,
    quantity_grams: Decimal,
    notes: String,
    date: NaiveDate,
}

impl TryFrom<TransactionRow> for OutgoingTransaction {
    type Error = SeedTrackerError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        let kind = row.kind.parse().map_err(SeedTrackerError::Internal)?;
        Ok(OutgoingTransaction {
            id: row.id,
            batch_id: row.batch_id,
            kind,
            quantity_grams: row.quantity_grams,
            notes: row.notes,
            date: row.date,
        })
    }
}

#[derive(Debug, FromRow)]
struct ListingRow {
    #[sqlx(flatten)]
    transaction: TransactionRow,
    batch_number: String,
    seed_name: String,
}

/// PostgreSQL-backed store. Row locks come from `SELECT ... FOR UPDATE` inside a transaction.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32, min_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(PgStore { pool })
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

fn unique_violation(err: sqlx::Error, batch_number: &str) -> SeedTrackerError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            SeedTrackerError::DuplicateBatchNumber(batch_number.to_string())
        }
        _ => SeedTrackerError::Database(err),
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn insert_batch(&self, batch: &NewBatch) -> Result<Batch> {
        let created = sqlx::query_as::<_, Batch>(&format!(
            r#"
            INSERT INTO seed_batches (seed_name, batch_number, weight_grams, sell_by_date, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(&batch.seed_name)
        .bind(&batch.batch_number)
        .bind(batch.weight_grams)
        .bind(batch.sell_by_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, &batch.batch_number))?;

        Ok(created)
    }

    async fn update_batch(&self, id: i64, update: &BatchUpdate) -> Result<Batch> {
        let updated = sqlx::query_as::<_, Batch>(&format!(
            r#"
            UPDATE seed_batches
            SET seed_name = $1, batch_number = $2, sell_by_date = $3
            WHERE id = $4
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(&update.seed_name)
        .bind(&update.batch_number)
        .bind(update.sell_by_date)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, &update.batch_number))?;

        updated.ok_or(SeedTrackerError::BatchNotFound(id))
    }

    async fn get_batch(&self, id: i64) -> Result<Option<Batch>> {
        let batch = sqlx::query_as::<_, Batch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM seed_batches WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }

    async fn list_batches(&self, search: Option<String>) -> Result<Vec<Batch>> {
        let batches = sqlx::query_as::<_, Batch>(&format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM seed_batches
            WHERE $1::text IS NULL
               OR strpos(lower(seed_name), lower($1)) > 0
               OR strpos(lower(batch_number), lower($1)) > 0
            ORDER BY sell_by_date, batch_number
            "#
        ))
        .bind(search)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    async fn delete_batch(&self, id: i64) -> Result<Batch> {
        let mut tx = self.pool.begin().await?;

        let batch = sqlx::query_as::<_, Batch>(&format!(
            "SELECT {BATCH_COLUMNS} FROM seed_batches WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(SeedTrackerError::BatchNotFound(id))?;

        let transactions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outgoing_transactions WHERE batch_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if transactions > 0 {
            tx.rollback().await?;
            return Err(SeedTrackerError::ProtectedDelete { batch_id: id, transactions });
        }

        sqlx::query("DELETE FROM seed_batches WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(batch)
    }

    async fn apply_outgoing(&self, entry: &LedgerEntry) -> Result<AppliedOutgoing> {
        let mut tx = self.pool.begin().await?;

        // Held until commit or rollback; concurrent writers on this batch queue here.
        let available: Decimal =
            sqlx::query_scalar("SELECT weight_grams FROM seed_batches WHERE id = $1 FOR UPDATE")
                .bind(entry.batch_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(SeedTrackerError::BatchNotFound(entry.batch_id))?;

        if entry.quantity_grams > available {
            tx.rollback().await?;
            return Err(SeedTrackerError::InsufficientInventory {
                requested: entry.quantity_grams,
                available,
            });
        }

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO outgoing_transactions (batch_id, type, quantity_grams, notes, date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(entry.batch_id)
        .bind(entry.kind.as_str())
        .bind(entry.quantity_grams)
        .bind(&entry.notes)
        .bind(entry.date)
        .fetch_one(&mut *tx)
        .await?;

        let batch = sqlx::query_as::<_, Batch>(&format!(
            r#"
            UPDATE seed_batches
            SET weight_grams = weight_grams - $1
            WHERE id = $2
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(entry.quantity_grams)
        .bind(entry.batch_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AppliedOutgoing {
            transaction: row.try_into()?,
            batch,
        })
    }

    async fn list_transactions(&self, batch_id: Option<i64>) -> Result<Vec<TransactionListing>> {
        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT t.id, t.batch_id, t.type, t.quantity_grams, t.notes, t.date,
                   b.batch_number, b.seed_name
            FROM outgoing_transactions t
            JOIN seed_batches b ON b.id = t.batch_id
            WHERE $1::bigint IS NULL OR t.batch_id = $1
            ORDER BY t.date DESC, t.id DESC
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(TransactionListing {
                    transaction: row.transaction.try_into()?,
                    batch_number: row.batch_number,
                    seed_name: row.seed_name,
                })
            })
            .collect()
    }

    async fn insert_photo(&self, photo: &NewPhoto) -> Result<BatchPhoto> {
        let created = sqlx::query_as::<_, BatchPhoto>(
            r#"
            INSERT INTO batch_photos (batch_id, image_path, uploaded_at)
            VALUES ($1, $2, NOW())
            RETURNING id, batch_id, image_path, uploaded_at
            "#,
        )
        .bind(photo.batch_id)
        .bind(&photo.image_path)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                SeedTrackerError::BatchNotFound(photo.batch_id)
            }
            _ => SeedTrackerError::Database(e),
        })?;

        Ok(created)
    }

    async fn list_photos(&self, batch_id: i64) -> Result<Vec<BatchPhoto>> {
        let photos = sqlx::query_as::<_, BatchPhoto>(
            r#"
            SELECT id, batch_id, image_path, uploaded_at
            FROM batch_photos
            WHERE batch_id = $1
            ORDER BY uploaded_at, id
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }
}
