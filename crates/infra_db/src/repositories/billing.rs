//! Billing repository implementation
//!
//! This module provides database access for invoices, payments and the
//! per-partition invoice number counters.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseError;

const INVOICE_COLUMNS: &str = r#"
    id, case_id, invoice_number, invoice_type, currency,
    amount, vat_percentage, vat_amount, total_amount, status,
    description, issued_date, due_date, created_at, updated_at
"#;

/// Strictly later than the stored value even within one clock tick
const NEXT_UPDATED_AT: &str = "GREATEST(now(), updated_at + interval '1 microsecond')";

const PAYMENT_COLUMNS: &str = r#"
    id, invoice_id, case_id, amount, currency, payment_date, method, notes
"#;

/// Repository for invoices, payments and sequence counters
///
/// All queries are checked at runtime; rows map through `sqlx::FromRow`.
#[derive(Debug, Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

impl BillingRepository {
    /// Creates a new BillingRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Increments and returns the counter of a `(prefix, year)` partition
    ///
    /// One statement: the first call for a partition inserts the counter,
    /// seeded from the greatest existing invoice number matching
    /// `number_pattern`; later calls increment under the row lock taken by
    /// `ON CONFLICT DO UPDATE`. Concurrent callers therefore never observe
    /// the same value.
    pub async fn next_sequence(
        &self,
        prefix: &str,
        year: i32,
        number_pattern: &str,
    ) -> Result<i64, DatabaseError> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO invoice_sequences (prefix, year, last_value)
            VALUES (
                $1,
                $2,
                COALESCE(
                    (
                        SELECT MAX(CAST(SUBSTRING(invoice_number FROM '[0-9]+$') AS BIGINT))
                        FROM invoices
                        WHERE invoice_number ~ $3
                    ),
                    0
                ) + 1
            )
            ON CONFLICT (prefix, year)
            DO UPDATE SET last_value = invoice_sequences.last_value + 1, updated_at = now()
            RETURNING last_value
            "#,
        )
        .bind(prefix)
        .bind(year)
        .bind(number_pattern)
        .fetch_one(&self.pool)
        .await?;

        debug!(prefix, year, value, "sequence advanced");
        Ok(value)
    }

    /// Inserts an invoice row
    ///
    /// A duplicate `invoice_number` surfaces as `DatabaseError::DuplicateEntry`.
    pub async fn insert_invoice(&self, row: &InvoiceRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, case_id, invoice_number, invoice_type, currency,
                amount, vat_percentage, vat_amount, total_amount, status,
                description, issued_date, due_date, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(row.id)
        .bind(row.case_id)
        .bind(&row.invoice_number)
        .bind(&row.invoice_type)
        .bind(&row.currency)
        .bind(row.amount)
        .bind(row.vat_percentage)
        .bind(row.vat_amount)
        .bind(row.total_amount)
        .bind(&row.status)
        .bind(&row.description)
        .bind(row.issued_date)
        .bind(row.due_date)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Retrieves an invoice by id
    pub async fn get_invoice(&self, id: Uuid) -> Result<InvoiceRow, DatabaseError> {
        sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Invoice", id))
    }

    /// Lists invoices, optionally filtered by case and status, by number
    pub async fn find_invoices(
        &self,
        case_id: Option<Uuid>,
        status: Option<&str>,
    ) -> Result<Vec<InvoiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {} FROM invoices
            WHERE ($1::uuid IS NULL OR case_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY invoice_number
            "#,
            INVOICE_COLUMNS
        ))
        .bind(case_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Writes the columns set in `patch` and returns the row
    ///
    /// `invoice_number`, `invoice_type`, `case_id` and `issued_date` are not
    /// part of the statement. With `expected_updated_at` set, nothing is
    /// written unless the stored `updated_at` still matches.
    pub async fn update_invoice(&self, id: Uuid, patch: &InvoicePatch) -> Result<InvoiceRow, DatabaseError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            UPDATE invoices SET
                amount = COALESCE($2, amount),
                vat_percentage = COALESCE($3, vat_percentage),
                vat_amount = COALESCE($4, vat_amount),
                total_amount = COALESCE($5, total_amount),
                description = COALESCE($6, description),
                due_date = COALESCE($7, due_date),
                status = COALESCE($8, status),
                updated_at = {}
            WHERE id = $1 AND ($9::timestamptz IS NULL OR updated_at = $9::timestamptz)
            RETURNING {}
            "#,
            NEXT_UPDATED_AT, INVOICE_COLUMNS
        ))
        .bind(id)
        .bind(patch.amount)
        .bind(patch.vat_percentage)
        .bind(patch.vat_amount)
        .bind(patch.total_amount)
        .bind(&patch.description)
        .bind(patch.due_date)
        .bind(&patch.status)
        .bind(patch.expected_updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row),
            None => Err(self.missed_write(id).await),
        }
    }

    /// Overwrites `status`, lowering it if asked to
    pub async fn set_status(&self, id: Uuid, status: &str) -> Result<InvoiceRow, DatabaseError> {
        sqlx::query_as::<_, InvoiceRow>(&format!(
            "UPDATE invoices SET status = $2, updated_at = {} WHERE id = $1 RETURNING {}",
            NEXT_UPDATED_AT, INVOICE_COLUMNS
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Invoice", id))
    }

    /// Sets `status` only if it ranks above the stored status and the row
    /// is still at `expected_updated_at`
    ///
    /// Statuses rank `pending` < `partial` < `paid`. Returns whether the
    /// row changed; `StaleWrite` if the row moved on.
    pub async fn advance_status(
        &self,
        id: Uuid,
        status: &str,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE invoices SET status = $2::text, updated_at = {}
            WHERE id = $1
              AND updated_at = $3
              AND array_position(ARRAY['pending', 'partial', 'paid'], status)
                < array_position(ARRAY['pending', 'partial', 'paid'], $2::text)
            "#,
            NEXT_UPDATED_AT
        ))
        .bind(id)
        .bind(status)
        .bind(expected_updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match self.updated_at(id).await? {
            None => Err(DatabaseError::not_found("Invoice", id)),
            Some(current) if current != expected_updated_at => Err(stale(id)),
            Some(_) => Ok(false),
        }
    }

    /// Deletes an invoice row
    ///
    /// Fails with `ForeignKeyViolation` while payments still reference it.
    pub async fn delete_invoice(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Invoice", id));
        }
        Ok(())
    }

    /// Inserts a payment row and moves its invoice's `updated_at` forward
    ///
    /// One statement, so a concurrent status write on the invoice either
    /// sees the payment or fails its `updated_at` check.
    pub async fn insert_payment(&self, row: &PaymentRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(&format!(
            r#"
            WITH touched AS (
                UPDATE invoices SET updated_at = {}
                WHERE id = $2
                RETURNING id
            )
            INSERT INTO payments (
                id, invoice_id, case_id, amount, currency, payment_date, method, notes
            )
            SELECT $1::uuid, touched.id, $3::uuid, $4::numeric, $5::text,
                   $6::timestamptz, $7::text, $8::text
            FROM touched
            "#,
            NEXT_UPDATED_AT
        ))
        .bind(row.id)
        .bind(row.invoice_id)
        .bind(row.case_id)
        .bind(row.amount)
        .bind(&row.currency)
        .bind(row.payment_date)
        .bind(&row.method)
        .bind(&row.notes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Invoice", row.invoice_id));
        }
        Ok(())
    }

    async fn updated_at(&self, id: Uuid) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let updated_at = sqlx::query_scalar::<_, DateTime<Utc>>("SELECT updated_at FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated_at)
    }

    /// Explains why a guarded write touched no row
    async fn missed_write(&self, id: Uuid) -> DatabaseError {
        match self.updated_at(id).await {
            Ok(Some(_)) => stale(id),
            Ok(None) => DatabaseError::not_found("Invoice", id),
            Err(e) => e,
        }
    }

    /// Payments of an invoice, oldest first
    pub async fn payments_for_invoice(&self, invoice_id: Uuid) -> Result<Vec<PaymentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE invoice_id = $1 ORDER BY payment_date, created_at",
            PAYMENT_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Payments filed under a case, oldest first
    pub async fn payments_for_case(&self, case_id: Uuid) -> Result<Vec<PaymentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE case_id = $1 ORDER BY payment_date, created_at",
            PAYMENT_COLUMNS
        ))
        .bind(case_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Deletes all payments of an invoice, returning how many were removed
    pub async fn delete_payments_for_invoice(&self, invoice_id: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM payments WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Column values for [`BillingRepository::update_invoice`]; `None` keeps
/// the stored value
#[derive(Debug, Clone, Default)]
pub struct InvoicePatch {
    pub amount: Option<Decimal>,
    pub vat_percentage: Option<Decimal>,
    pub vat_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub expected_updated_at: Option<DateTime<Utc>>,
}

fn stale(id: Uuid) -> DatabaseError {
    DatabaseError::StaleWrite(format!("invoice {} changed since it was read", id))
}

/// Database row for an invoice
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub case_id: Uuid,
    pub invoice_number: String,
    pub invoice_type: String,
    pub currency: String,
    pub amount: Decimal,
    pub vat_percentage: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
    pub status: String,
    pub description: String,
    pub issued_date: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for a payment
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub case_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_date: DateTime<Utc>,
    pub method: String,
    pub notes: String,
}
