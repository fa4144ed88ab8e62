//! PostgreSQL Ledger Adapter
//!
//! This module provides the internal (database) adapter for the billing
//! domain, implementing the `LedgerStore` port on top of the
//! `BillingRepository`.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_billing::{InvoiceLedger, LedgerSettings, LedgerStore};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
//! let ledger = InvoiceLedger::new(store, LedgerSettings::default());
//! ```

use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, CaseId, Currency, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId,
    Money, PaymentId, PortError,
};
use domain_billing::{
    Invoice, InvoiceChanges, InvoiceQuery, InvoiceStatus, InvoiceType, LedgerStore, Partition,
    Payment, PaymentMethod, SEQUENCE_WIDTH,
};

use crate::error::DatabaseError;
use crate::repositories::billing::{BillingRepository, InvoicePatch, InvoiceRow, PaymentRow};

const ADAPTER_ID: &str = "postgres-ledger-store";

/// Health checks slower than this report the store as degraded
const SLOW_HEALTH_CHECK: Duration = Duration::from_millis(500);

/// PostgreSQL-backed implementation of the LedgerStore port
///
/// Database errors are translated to `PortError` variants:
/// - `DatabaseError::NotFound` -> `PortError::NotFound`
/// - duplicates, foreign key violations and stale writes -> `PortError::Conflict`
/// - pool exhaustion -> `PortError::Timeout`
/// - connection errors -> `PortError::Connection`
/// - decode errors -> `PortError::Transformation`
/// - anything else -> `PortError::Internal`
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    repository: BillingRepository,
    pool: PgPool,
    acquire_timeout: Duration,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: BillingRepository::new(pool.clone()),
            acquire_timeout: pool.options().get_acquire_timeout(),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &BillingRepository {
        &self.repository
    }

    fn port_error(&self, error: DatabaseError) -> PortError {
        db_to_port_error(error, self.acquire_timeout)
    }

    fn invoice_error(&self, id: InvoiceId, error: DatabaseError) -> PortError {
        if error.is_not_found() {
            PortError::not_found("Invoice", id)
        } else {
            self.port_error(error)
        }
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Performs a `SELECT 1` round trip through the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let elapsed = start.elapsed();
        let (status, message) = match result {
            Ok(_) => health_for_latency(elapsed),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
        };

        HealthCheckResult {
            adapter_id: ADAPTER_ID.to_string(),
            status,
            latency_ms: elapsed.as_millis() as u64,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(partition = %partition))]
    async fn next_sequence(&self, partition: &Partition) -> Result<u64, PortError> {
        let value = self
            .repository
            .next_sequence(partition.prefix, partition.year, &number_pattern(partition))
            .await
            .map_err(|e| self.port_error(e))?;

        u64::try_from(value)
            .map_err(|_| PortError::transformation(format!("negative sequence value {}", value)))
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
        self.repository
            .insert_invoice(&invoice_to_row(invoice))
            .await
            .map_err(|e| self.port_error(e))
    }

    #[instrument(skip(self))]
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        let row = self
            .repository
            .get_invoice(id.into())
            .await
            .map_err(|e| self.invoice_error(id, e))?;
        row_to_invoice(row)
    }

    #[instrument(skip(self))]
    async fn find_invoices(&self, query: InvoiceQuery) -> Result<Vec<Invoice>, PortError> {
        debug!(?query, "finding invoices");

        let rows = self
            .repository
            .find_invoices(
                query.case_id.map(Into::into),
                query.status.as_ref().map(InvoiceStatus::as_str),
            )
            .await
            .map_err(|e| self.port_error(e))?;

        rows.into_iter().map(row_to_invoice).collect()
    }

    #[instrument(skip(self, changes))]
    async fn update_invoice(
        &self,
        id: InvoiceId,
        changes: &InvoiceChanges,
    ) -> Result<Invoice, PortError> {
        let row = self
            .repository
            .update_invoice(id.into(), &changes_to_patch(changes))
            .await
            .map_err(|e| self.invoice_error(id, e))?;
        row_to_invoice(row)
    }

    #[instrument(skip(self))]
    async fn set_invoice_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, PortError> {
        let row = self
            .repository
            .set_status(id.into(), status.as_str())
            .await
            .map_err(|e| self.invoice_error(id, e))?;
        row_to_invoice(row)
    }

    #[instrument(skip(self))]
    async fn advance_invoice_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<bool, PortError> {
        self.repository
            .advance_status(id.into(), status.as_str(), expected_updated_at)
            .await
            .map_err(|e| self.invoice_error(id, e))
    }

    #[instrument(skip(self))]
    async fn delete_invoice(&self, id: InvoiceId) -> Result<(), PortError> {
        self.repository
            .delete_invoice(id.into())
            .await
            .map_err(|e| self.invoice_error(id, e))
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id, invoice_id = %payment.invoice_id))]
    async fn insert_payment(&self, payment: &Payment) -> Result<(), PortError> {
        self.repository
            .insert_payment(&payment_to_row(payment))
            .await
            .map_err(|e| self.invoice_error(payment.invoice_id, e))
    }

    #[instrument(skip(self))]
    async fn payments_for_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError> {
        let rows = self
            .repository
            .payments_for_invoice(invoice_id.into())
            .await
            .map_err(|e| self.port_error(e))?;
        rows.into_iter().map(row_to_payment).collect()
    }

    #[instrument(skip(self))]
    async fn payments_for_case(&self, case_id: CaseId) -> Result<Vec<Payment>, PortError> {
        let rows = self
            .repository
            .payments_for_case(case_id.into())
            .await
            .map_err(|e| self.port_error(e))?;
        rows.into_iter().map(row_to_payment).collect()
    }

    #[instrument(skip(self))]
    async fn delete_payments_for_invoice(&self, invoice_id: InvoiceId) -> Result<u64, PortError> {
        self.repository
            .delete_payments_for_invoice(invoice_id.into())
            .await
            .map_err(|e| self.port_error(e))
    }
}

fn health_for_latency(elapsed: Duration) -> (AdapterHealth, Option<String>) {
    if elapsed > SLOW_HEALTH_CHECK {
        (
            AdapterHealth::Degraded,
            Some(format!("slow response: {}ms", elapsed.as_millis())),
        )
    } else {
        (AdapterHealth::Healthy, None)
    }
}

/// Regex matching every well-formed invoice number of a partition
fn number_pattern(partition: &Partition) -> String {
    format!(
        "^{}-{}-[0-9]{{{},}}$",
        partition.prefix, partition.year, SEQUENCE_WIDTH
    )
}

fn db_to_port_error(error: DatabaseError, acquire_timeout: Duration) -> PortError {
    match error {
        DatabaseError::NotFound(message) => PortError::NotFound {
            entity_type: "record".to_string(),
            id: message,
        },
        DatabaseError::DuplicateEntry(message)
        | DatabaseError::ForeignKeyViolation(message)
        | DatabaseError::StaleWrite(message) => PortError::conflict(message),
        DatabaseError::SerializationError(message) => PortError::transformation(message),
        DatabaseError::PoolExhausted => PortError::Timeout {
            operation: "acquire database connection".to_string(),
            duration_ms: acquire_timeout.as_millis() as u64,
        },
        e @ DatabaseError::ConnectionFailed(_) => PortError::Connection {
            message: e.to_string(),
            source: Some(Box::new(e)),
        },
        other => PortError::Internal {
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
    }
}

fn changes_to_patch(changes: &InvoiceChanges) -> InvoicePatch {
    InvoicePatch {
        amount: changes.amounts.map(|a| a.amount.amount()),
        vat_percentage: changes.amounts.map(|a| a.vat_percentage),
        vat_amount: changes.amounts.map(|a| a.vat_amount.amount()),
        total_amount: changes.amounts.map(|a| a.total_amount.amount()),
        description: changes.description.clone(),
        due_date: changes.due_date,
        status: changes.derived_status.map(|d| d.status.as_str().to_string()),
        expected_updated_at: changes.derived_status.map(|d| d.derived_at),
    }
}

fn parse_currency(raw: &str) -> Result<Currency, PortError> {
    Currency::from_str(raw.trim()).map_err(|e| PortError::transformation(e.to_string()))
}

/// Converts a database invoice row to the domain Invoice
fn row_to_invoice(row: InvoiceRow) -> Result<Invoice, PortError> {
    let currency = parse_currency(&row.currency)?;
    let money = |amount| Money::new(amount, currency).round_half_up();

    Ok(Invoice {
        id: InvoiceId::from(row.id),
        case_id: CaseId::from(row.case_id),
        invoice_type: InvoiceType::from(row.invoice_type),
        currency,
        amount: money(row.amount),
        vat_percentage: row.vat_percentage.normalize(),
        vat_amount: money(row.vat_amount),
        total_amount: money(row.total_amount),
        status: InvoiceStatus::from_str(&row.status).map_err(PortError::transformation)?,
        description: row.description,
        issued_date: row.issued_date,
        due_date: row.due_date,
        created_at: row.created_at,
        updated_at: row.updated_at,
        invoice_number: row.invoice_number,
    })
}

fn invoice_to_row(invoice: &Invoice) -> InvoiceRow {
    InvoiceRow {
        id: invoice.id.into(),
        case_id: invoice.case_id.into(),
        invoice_number: invoice.invoice_number.clone(),
        invoice_type: invoice.invoice_type.to_string(),
        currency: invoice.currency.code().to_string(),
        amount: invoice.amount.amount(),
        vat_percentage: invoice.vat_percentage,
        vat_amount: invoice.vat_amount.amount(),
        total_amount: invoice.total_amount.amount(),
        status: invoice.status.as_str().to_string(),
        description: invoice.description.clone(),
        issued_date: invoice.issued_date,
        due_date: invoice.due_date,
        created_at: invoice.created_at,
        updated_at: invoice.updated_at,
    }
}

fn row_to_payment(row: PaymentRow) -> Result<Payment, PortError> {
    let currency = parse_currency(&row.currency)?;

    Ok(Payment {
        id: PaymentId::from(row.id),
        invoice_id: InvoiceId::from(row.invoice_id),
        case_id: CaseId::from(row.case_id),
        amount: Money::new(row.amount, currency).round_half_up(),
        payment_date: row.payment_date,
        method: PaymentMethod::from_str(&row.method).map_err(PortError::transformation)?,
        notes: row.notes,
    })
}

fn payment_to_row(payment: &Payment) -> PaymentRow {
    PaymentRow {
        id: payment.id.into(),
        invoice_id: payment.invoice_id.into(),
        case_id: payment.case_id.into(),
        amount: payment.amount.amount(),
        currency: payment.amount.currency().code().to_string(),
        payment_date: payment.payment_date,
        method: payment.method.as_str().to_string(),
        notes: payment.notes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::InvoiceAmounts;
    use rust_decimal_macros::dec;

    fn sample_invoice() -> Invoice {
        let amounts = InvoiceAmounts::compute(Money::new(dec!(1000), Currency::KWD), dec!(5)).unwrap();
        Invoice::new(
            CaseId::new(),
            "DN-2026-000004",
            InvoiceType::DebitNote,
            amounts,
            "Adjustment",
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_number_pattern() {
        let pattern = number_pattern(&Partition::new("RCPT", 2026));
        assert_eq!(pattern, "^RCPT-2026-[0-9]{6,}$");
    }

    #[test]
    fn test_invoice_row_round_trip_rescales_numeric() {
        let invoice = sample_invoice();
        let mut row = invoice_to_row(&invoice);
        assert_eq!(row.invoice_type, "debit_note");
        assert_eq!(row.currency, "KWD");

        // NUMERIC(20, 4) hands values back at scale 4
        row.total_amount = dec!(1050.0000);
        row.vat_percentage = dec!(5.0000);

        let restored = row_to_invoice(row).unwrap();
        assert_eq!(restored.total_amount.to_canonical_string(), "1050.000");
        assert_eq!(restored.vat_percentage.to_string(), "5");
        assert_eq!(restored.invoice_number, invoice.invoice_number);
    }

    #[test]
    fn test_unknown_status_is_transformation_error() {
        let mut row = invoice_to_row(&sample_invoice());
        row.status = "void".to_string();
        assert!(matches!(row_to_invoice(row), Err(PortError::Transformation { .. })));
    }

    #[test]
    fn test_error_mapping() {
        let timeout = Duration::from_secs(10);
        assert!(db_to_port_error(DatabaseError::DuplicateEntry("invoice_number".into()), timeout).is_conflict());
        assert!(db_to_port_error(DatabaseError::ForeignKeyViolation("payments".into()), timeout).is_conflict());
        assert!(db_to_port_error(DatabaseError::StaleWrite("invoice".into()), timeout).is_conflict());
        assert!(db_to_port_error(DatabaseError::ConnectionFailed("reset".into()), timeout).is_transient());
    }

    #[test]
    fn test_pool_exhaustion_is_timeout() {
        let error = db_to_port_error(DatabaseError::PoolExhausted, Duration::from_secs(10));
        assert!(error.is_transient());
        assert!(matches!(error, PortError::Timeout { duration_ms: 10_000, .. }));
    }

    #[test]
    fn test_slow_health_check_is_degraded() {
        assert_eq!(health_for_latency(Duration::from_millis(20)).0, AdapterHealth::Healthy);

        let (status, message) = health_for_latency(Duration::from_millis(1200));
        assert_eq!(status, AdapterHealth::Degraded);
        assert!(message.unwrap().contains("1200ms"));
    }

    #[test]
    fn test_patch_guards_only_derived_status() {
        let invoice = sample_invoice();
        let edit = InvoiceChanges {
            description: Some("Edited".to_string()),
            ..Default::default()
        };
        let patch = changes_to_patch(&edit);
        assert!(patch.status.is_none());
        assert!(patch.expected_updated_at.is_none());
        assert!(patch.amount.is_none());

        let reprice = InvoiceChanges {
            amounts: Some(InvoiceAmounts::compute(invoice.amount, dec!(10)).unwrap()),
            derived_status: Some(domain_billing::DerivedStatus {
                status: InvoiceStatus::Partial,
                derived_at: invoice.updated_at,
            }),
            ..Default::default()
        };
        let patch = changes_to_patch(&reprice);
        assert_eq!(patch.status.as_deref(), Some("partial"));
        assert_eq!(patch.expected_updated_at, Some(invoice.updated_at));
        assert_eq!(patch.vat_amount, Some(dec!(100.000)));
    }
}
