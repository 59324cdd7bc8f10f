// # PostgreSQL Order Source
//
// This crate reads the shop's `orders` table for the storewatch order
// poller.
//
// ## Expected Schema
//
// | column | type | notes |
// |---|---|---|
// | `order_id` | integer / bigint | monotonically increasing key |
// | `customer_name` | text | |
// | `total_price` | numeric / float | |
// | `status` | text, nullable | |
// | `created_at` | timestamp(tz), nullable | informational only |
//
// Columns are cast in SQL so that integer widths and numeric types other
// than the ones above still decode.
//
// ## Queries
//
// - Latest row: `ORDER BY order_id DESC LIMIT 1`
// - New rows: `WHERE order_id > $1 ORDER BY order_id ASC`
//
// Both order by the cursor key. `created_at` may be NULL, and NULLs sort
// first under `DESC`, so it cannot pick the latest row.
//
// The poller owns timeouts and retries; this source makes exactly one
// query per call and never caches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use storewatch_core::error::SourceError;
use storewatch_core::traits::{OrderId, OrderRow, OrderSource};
use storewatch_core::{Error, Result};

/// Pool size; the poller issues one query at a time
const MAX_CONNECTIONS: u32 = 2;

/// How long to wait for a pooled connection
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const COLUMNS: &str = "order_id::bigint AS order_id, \
     COALESCE(customer_name::text, '') AS customer_name, \
     COALESCE(total_price, 0)::float8 AS total_price, \
     status::text AS status, \
     created_at::timestamptz AS created_at";

/// One row of the `orders` table
#[derive(Debug, sqlx::FromRow)]
struct OrderRecord {
    order_id: i64,
    customer_name: String,
    total_price: f64,
    status: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl From<OrderRecord> for OrderRow {
    fn from(record: OrderRecord) -> Self {
        OrderRow {
            id: OrderId(record.order_id),
            customer_name: record.customer_name,
            total_price: record.total_price,
            status: record.status,
            created_at: record.created_at,
        }
    }
}

/// PostgreSQL-backed order source
#[derive(Debug, Clone)]
pub struct PgOrderSource {
    pool: PgPool,
}

impl PgOrderSource {
    /// Create a source over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a source for `database_url`
    ///
    /// Connections are opened on first use, so an unreachable database at
    /// startup shows up as a failed poll rather than a startup error.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL cannot be parsed.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(database_url)
            .map_err(|e| Error::config(format!("Invalid DATABASE_URL: {}", e)))?;

        Ok(Self::new(pool))
    }

    fn latest_query() -> String {
        format!("SELECT {COLUMNS} FROM orders ORDER BY order_id DESC LIMIT 1")
    }

    fn newer_than_query() -> String {
        format!("SELECT {COLUMNS} FROM orders WHERE order_id > $1 ORDER BY order_id ASC")
    }
}

#[async_trait]
impl OrderSource for PgOrderSource {
    async fn latest(&self) -> std::result::Result<Option<OrderRow>, SourceError> {
        let record = sqlx::query_as::<_, OrderRecord>(&Self::latest_query())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(record.map(OrderRow::from))
    }

    async fn newer_than(&self, after: OrderId) -> std::result::Result<Vec<OrderRow>, SourceError> {
        let records = sqlx::query_as::<_, OrderRecord>(&Self::newer_than_query())
            .bind(after.0)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        tracing::debug!("{} order row(s) newer than #{}", records.len(), after);
        Ok(records.into_iter().map(OrderRow::from).collect())
    }

    fn source_name(&self) -> &'static str {
        "postgres"
    }
}

/// Map a driver error onto the source failure taxonomy
fn map_sqlx_error(e: sqlx::Error) -> SourceError {
    match e {
        sqlx::Error::PoolTimedOut => SourceError::Timeout,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            SourceError::unavailable(e.to_string())
        }
        other => SourceError::query(other.to_string()),
    }
}
