//! Postgres-backed document store.
//!
//! Invoices are kept as JSONB documents next to the columns the queries need
//! (number, save time). Counters, items and companies are plain tables.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | ColumnDecode / Decode | N/A | `Corrupt` |
//! | anything else | any other | `Unavailable` |

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;

use invoicer_catalog::{CatalogItem, Company, ItemPatch};
use invoicer_core::ItemId;
use invoicer_invoicing::{Invoice, InvoiceNumber};

use super::{CompanyDirectory, CounterStore, InvoiceRepository, ItemRepository, StoreError};

/// Idempotent DDL applied by [`PostgresStore::migrate`].
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS invoices (
    invoice_number TEXT PRIMARY KEY,
    saved_at       TIMESTAMPTZ,
    document       JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS invoices_saved_at_idx ON invoices (saved_at DESC);

CREATE TABLE IF NOT EXISTS sequence_counters (
    id          TEXT PRIMARY KEY,
    last_number BIGINT NOT NULL CHECK (last_number >= 0)
);

CREATE TABLE IF NOT EXISTS items (
    id   BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    rate DOUBLE PRECISION NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS companies (
    position   BIGSERIAL,
    name       TEXT PRIMARY KEY,
    name_hindi TEXT NOT NULL DEFAULT '',
    address    TEXT NOT NULL DEFAULT '',
    vehicle    TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

/// Postgres implementation of every store trait.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create missing tables and indexes.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT document
            FROM invoices
            ORDER BY saved_at DESC NULLS LAST, invoice_number ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_invoices", e))?;

        rows.iter().map(decode_invoice).collect()
    }

    #[instrument(skip(self), fields(invoice_number = %number), err)]
    async fn find_invoice(&self, number: &InvoiceNumber) -> Result<Option<Invoice>, StoreError> {
        let row = sqlx::query("SELECT document FROM invoices WHERE invoice_number = $1")
            .bind(number.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_invoice", e))?;

        row.as_ref().map(decode_invoice).transpose()
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number), err)]
    async fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, StoreError> {
        let document = encode_invoice(&invoice)?;
        sqlx::query(
            r#"
            INSERT INTO invoices (invoice_number, saved_at, document)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(invoice.invoice_number.as_str())
        .bind(invoice.saved_at)
        .bind(document)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;

        Ok(invoice)
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number), err)]
    async fn replace_invoice(&self, invoice: Invoice) -> Result<Option<Invoice>, StoreError> {
        let document = encode_invoice(&invoice)?;
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET saved_at = $2, document = $3
            WHERE invoice_number = $1
            "#,
        )
        .bind(invoice.invoice_number.as_str())
        .bind(invoice.saved_at)
        .bind(document)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("replace_invoice", e))?;

        Ok((result.rows_affected() > 0).then_some(invoice))
    }

    #[instrument(skip(self), fields(invoice_number = %number), err)]
    async fn delete_invoice(&self, number: &InvoiceNumber) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM invoices WHERE invoice_number = $1")
            .bind(number.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_invoice", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn scan_invoice_numbers(&self) -> Result<Vec<InvoiceNumber>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT invoice_number
            FROM invoices
            ORDER BY saved_at DESC NULLS LAST, invoice_number ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("scan_invoice_numbers", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("invoice_number")
                    .map(InvoiceNumber::from)
                    .map_err(|e| map_sqlx_error("scan_invoice_numbers", e))
            })
            .collect()
    }
}

#[async_trait]
impl CounterStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn read_counter(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_number FROM sequence_counters WHERE id = $1")
                .bind(key)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("read_counter", e))?;

        value.map(counter_from_db).transpose()
    }

    /// Single-statement max-upsert; concurrent calls serialize on the row lock.
    #[instrument(skip(self), err)]
    async fn advance_counter(&self, key: &str, candidate: u64) -> Result<u64, StoreError> {
        let candidate = i64::try_from(candidate).map_err(|_| {
            StoreError::OutOfRange(format!("counter value {candidate} exceeds BIGINT range"))
        })?;

        let stored: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequence_counters (id, last_number)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
            SET last_number = GREATEST(sequence_counters.last_number, EXCLUDED.last_number)
            RETURNING last_number
            "#,
        )
        .bind(key)
        .bind(candidate)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("advance_counter", e))?;

        counter_from_db(stored)
    }
}

#[async_trait]
impl ItemRepository for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        let rows = sqlx::query("SELECT id, name, rate FROM items ORDER BY id ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter()
            .map(|row| decode_item(row).map_err(|e| map_sqlx_error("list_items", e)))
            .collect()
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn insert_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError> {
        sqlx::query("INSERT INTO items (id, name, rate) VALUES ($1, $2, $3)")
            .bind(item.id.value())
            .bind(&item.name)
            .bind(item.rate)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(item)
    }

    #[instrument(skip(self, patch), fields(item_id = %id), err)]
    async fn update_item(
        &self,
        id: ItemId,
        patch: &ItemPatch,
    ) -> Result<Option<CatalogItem>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE items
            SET name = COALESCE($2, name), rate = COALESCE($3, rate)
            WHERE id = $1
            RETURNING id, name, rate
            "#,
        )
        .bind(id.value())
        .bind(patch.name.as_deref().map(str::trim))
        .bind(patch.rate)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        row.as_ref()
            .map(decode_item)
            .transpose()
            .map_err(|e| map_sqlx_error("update_item", e))
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.value())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CompanyDirectory for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let rows = sqlx::query(
            "SELECT name, name_hindi, address, vehicle FROM companies ORDER BY position ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_companies", e))?;

        rows.iter()
            .map(|row| decode_company(row).map_err(|e| map_sqlx_error("list_companies", e)))
            .collect()
    }

    #[instrument(skip(self, company), fields(company = %company.name), err)]
    async fn add_company(&self, company: Company) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO companies (name, name_hindi, address, vehicle)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&company.name)
        .bind(&company.name_hindi)
        .bind(&company.address)
        .bind(&company.vehicle)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_company", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), err)]
    async fn suggest_companies(&self, term: &str, limit: usize) -> Result<Vec<Company>, StoreError> {
        let pattern = format!("%{}%", escape_like(term));
        let rows = sqlx::query(
            r#"
            SELECT name, name_hindi, address, vehicle
            FROM companies
            WHERE name ILIKE $1 ESCAPE '\' OR name_hindi ILIKE $1 ESCAPE '\'
            ORDER BY position ASC
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("suggest_companies", e))?;

        rows.iter()
            .map(|row| decode_company(row).map_err(|e| map_sqlx_error("suggest_companies", e)))
            .collect()
    }
}

fn encode_invoice(invoice: &Invoice) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(invoice).map_err(|e| {
        StoreError::Corrupt(format!(
            "failed to serialize invoice {}: {}",
            invoice.invoice_number, e
        ))
    })
}

fn decode_invoice(row: &PgRow) -> Result<Invoice, StoreError> {
    let document: serde_json::Value = row
        .try_get("document")
        .map_err(|e| map_sqlx_error("decode_invoice", e))?;
    serde_json::from_value(document)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize invoice document: {}", e)))
}

fn decode_item(row: &PgRow) -> Result<CatalogItem, sqlx::Error> {
    Ok(CatalogItem {
        id: ItemId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        rate: row.try_get("rate")?,
    })
}

fn decode_company(row: &PgRow) -> Result<Company, sqlx::Error> {
    Ok(Company {
        name: row.try_get("name")?,
        name_hindi: row.try_get("name_hindi")?,
        address: row.try_get("address")?,
        vehicle: row.try_get("vehicle")?,
    })
}

fn counter_from_db(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("negative counter value {value}")))
}

/// Escape `%`, `_` and the escape character itself for an `ILIKE` pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode error in {}: {}", operation, err))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}
