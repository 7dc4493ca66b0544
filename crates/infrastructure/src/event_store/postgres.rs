//! PostgreSQL event store.

use async_trait::async_trait;
use customer_analytics_application::ports::EventStore;
use customer_analytics_application::ApplicationError;
use customer_analytics_domain::EventRecord;
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, instrument};

use crate::database::DatabasePool;
use crate::Result;

const SELECT_COLUMNS: &str = "SELECT sequence, customer_id, event_timestamp, event_type, \
     session_id, page_url, cart_value, converted FROM customer_events";

/// Event store over the `customer_events` table.
///
/// Sequence numbers come from the table's `BIGSERIAL` key, so arrival order
/// is a property of the stored data.
#[derive(Clone)]
pub struct PgEventStore {
    database: DatabasePool,
    pool: PgPool,
}

impl PgEventStore {
    pub fn from_database(database: &DatabasePool) -> Self {
        Self {
            database: database.clone(),
            pool: database.pool().clone(),
        }
    }

    fn row_to_record(row: &PgRow) -> Result<EventRecord> {
        let sequence: i64 = row.try_get("sequence")?;
        let cart_value: Decimal = row.try_get("cart_value")?;

        Ok(EventRecord {
            customer_id: row.try_get("customer_id")?,
            timestamp: row.try_get("event_timestamp")?,
            event_type: row.try_get("event_type")?,
            session_id: row.try_get("session_id")?,
            page_url: row.try_get("page_url")?,
            cart_value,
            converted: row.try_get("converted")?,
            sequence: u64::try_from(sequence).unwrap_or_default(),
        })
    }

    async fn fetch_customer(&self, customer_id: &str) -> Result<Vec<EventRecord>> {
        let query = format!(
            "{} WHERE customer_id = $1 ORDER BY event_timestamp, sequence",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_record).collect()
    }

    async fn fetch_all(&self) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(SELECT_COLUMNS).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_record).collect()
    }

    async fn insert_all(&self, records: Vec<EventRecord>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO customer_events
                    (customer_id, event_timestamp, event_type, session_id, page_url, cart_value, converted)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&record.customer_id)
            .bind(record.timestamp)
            .bind(&record.event_type)
            .bind(&record.session_id)
            .bind(&record.page_url)
            .bind(record.cart_value)
            .bind(record.converted)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self))]
    async fn query_events(&self, customer_id: &str) -> std::result::Result<Vec<EventRecord>, ApplicationError> {
        let records = self.fetch_customer(customer_id).await?;
        debug!(count = records.len(), "Fetched customer events");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn scan_all_events(&self) -> std::result::Result<Vec<EventRecord>, ApplicationError> {
        let records = self.fetch_all().await?;
        debug!(count = records.len(), "Scanned event table");
        Ok(records)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn append(&self, records: Vec<EventRecord>) -> std::result::Result<u64, ApplicationError> {
        Ok(self.insert_all(records).await?)
    }

    async fn health_check(&self) -> std::result::Result<(), ApplicationError> {
        let status = self.database.health_check().await;
        match status.error {
            None if status.healthy => Ok(()),
            error => Err(ApplicationError::StoreUnavailable(format!(
                "event database: {}",
                error.unwrap_or_else(|| "unhealthy".to_string())
            ))),
        }
    }
}
