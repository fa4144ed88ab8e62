//! Billing Domain Ports
//!
//! This module defines the persistence port for the ledger. The
//! `LedgerStore` trait is the only way the ledger reads or writes invoices,
//! payments and sequence counters. Adapters:
//!
//! - **Internal Adapter**: PostgreSQL (`infra_db::adapters::PostgresLedgerStore`)
//! - **Mock Adapter**: in memory, for tests and local runs (feature `mock`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_billing::{InvoiceLedger, LedgerSettings, LedgerStore};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
//! let ledger = InvoiceLedger::new(store.clone(), LedgerSettings::default());
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::{CaseId, DomainPort, HealthCheckable, InvoiceId, PortError};

use crate::invoice::{Invoice, InvoiceAmounts, InvoiceStatus};
use crate::numbering::Partition;
use crate::payment::Payment;

/// Filter for listing invoices
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceQuery {
    pub case_id: Option<CaseId>,
    pub status: Option<InvoiceStatus>,
}

impl InvoiceQuery {
    /// All invoices of a case
    pub fn by_case(case_id: CaseId) -> Self {
        Self {
            case_id: Some(case_id),
            ..Default::default()
        }
    }

    /// Returns true if `invoice` passes the filter
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.case_id.map_or(true, |case_id| invoice.case_id == case_id)
            && self.status.map_or(true, |status| invoice.status == status)
    }
}

/// Field changes written by [`LedgerStore::update_invoice`]
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceChanges {
    pub amounts: Option<InvoiceAmounts>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Status re-derived for new `amounts`; turns the write into a
    /// compare-and-set on `updated_at`
    pub derived_status: Option<DerivedStatus>,
}

impl InvoiceChanges {
    pub fn is_empty(&self) -> bool {
        self.amounts.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.derived_status.is_none()
    }
}

/// A status computed from a snapshot of an invoice and its payments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedStatus {
    pub status: InvoiceStatus,
    /// `updated_at` of the snapshot
    pub derived_at: DateTime<Utc>,
}

/// Persistence boundary of the billing ledger
///
/// Every write that can change an invoice's derived status moves its
/// `updated_at` strictly forward. Status writes computed from a snapshot are
/// compare-and-set on that value, so they fail with `PortError::Conflict`
/// instead of overwriting a newer state.
///
/// Every method is a single store round trip; callers never hold a lock
/// across calls.
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Atomically increments and returns the counter of `partition`
    ///
    /// The first call for a partition seeds the counter from the greatest
    /// existing invoice number in that partition. No two callers may ever
    /// observe the same value.
    async fn next_sequence(&self, partition: &Partition) -> Result<u64, PortError>;

    /// Inserts a new invoice
    ///
    /// Returns `PortError::Conflict` if the id or `invoice_number` exists.
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError>;

    /// Loads an invoice; `PortError::NotFound` if absent
    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    /// Lists invoices ordered by invoice number
    async fn find_invoices(&self, query: InvoiceQuery) -> Result<Vec<Invoice>, PortError>;

    /// Writes the given fields of an existing invoice and returns it
    ///
    /// Status is written only as `changes.derived_status`, and then only if
    /// the stored `updated_at` still equals its `derived_at`; otherwise
    /// nothing is written and `PortError::Conflict` is returned.
    /// `invoice_number`, `type`, `case_id` and `issued_date` are never written.
    async fn update_invoice(
        &self,
        id: InvoiceId,
        changes: &InvoiceChanges,
    ) -> Result<Invoice, PortError>;

    /// Overwrites the status unconditionally, lowering it if asked to
    async fn set_invoice_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, PortError>;

    /// Raises the status of an existing invoice to `status`
    ///
    /// A single conditional write: `PortError::Conflict` if the stored
    /// `updated_at` differs from `expected_updated_at`, otherwise the status
    /// is raised but never lowered. Returns true if the stored status changed.
    async fn advance_invoice_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<bool, PortError>;

    /// Deletes an invoice
    ///
    /// `PortError::NotFound` if absent, `PortError::Conflict` while payments
    /// still reference it.
    async fn delete_invoice(&self, id: InvoiceId) -> Result<(), PortError>;

    /// Appends a payment and moves its invoice's `updated_at` forward
    ///
    /// `PortError::NotFound` if the invoice does not exist.
    async fn insert_payment(&self, payment: &Payment) -> Result<(), PortError>;

    /// All payments of an invoice, oldest first
    async fn payments_for_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError>;

    /// All payments filed under a case, oldest first
    async fn payments_for_case(&self, case_id: CaseId) -> Result<Vec<Payment>, PortError>;

    /// Deletes every payment of an invoice and returns how many were removed
    async fn delete_payments_for_invoice(&self, invoice_id: InvoiceId) -> Result<u64, PortError>;
}

/// In-memory implementation of LedgerStore for testing
///
/// All state sits behind one mutex, so `next_sequence` is atomic with
/// respect to every other operation on the same store.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::Duration;
    use tokio::sync::Mutex;

    use core_kernel::{AdapterHealth, HealthCheckResult, PaymentId};

    #[derive(Debug, Default)]
    struct MemoryState {
        invoices: HashMap<InvoiceId, Invoice>,
        payments: Vec<Payment>,
        sequences: HashMap<Partition, u64>,
    }

    /// In-memory ledger store
    #[derive(Debug, Default, Clone)]
    pub struct InMemoryLedgerStore {
        state: Arc<Mutex<MemoryState>>,
        sequencing_down: Arc<AtomicBool>,
        status_updates_down: Arc<AtomicBool>,
    }

    impl InMemoryLedgerStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with invoices, e.g. data written before counters existed
        pub async fn with_invoices(invoices: Vec<Invoice>) -> Self {
            let store = Self::new();
            {
                let mut state = store.state.lock().await;
                for invoice in invoices {
                    state.invoices.insert(invoice.id, invoice);
                }
            }
            store
        }

        /// Simulates the counter becoming unreachable
        pub fn set_sequencing_available(&self, available: bool) {
            self.sequencing_down.store(!available, Ordering::SeqCst);
        }

        /// Simulates status writes failing after payments were stored
        pub fn set_status_updates_available(&self, available: bool) {
            self.status_updates_down.store(!available, Ordering::SeqCst);
        }

        /// Number of stored payments, across all invoices
        pub async fn payment_count(&self) -> usize {
            self.state.lock().await.payments.len()
        }

        /// Looks up a payment by id
        pub async fn payment(&self, id: PaymentId) -> Option<Payment> {
            self.state
                .lock()
                .await
                .payments
                .iter()
                .find(|p| p.id == id)
                .cloned()
        }
    }

    /// Moves `updated_at` strictly forward, even within one clock tick
    fn touch(invoice: &mut Invoice) {
        invoice.updated_at = Utc::now().max(invoice.updated_at + Duration::microseconds(1));
    }

    impl DomainPort for InMemoryLedgerStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryLedgerStore {
        async fn health_check(&self) -> HealthCheckResult {
            let mut failing = Vec::new();
            if self.sequencing_down.load(Ordering::SeqCst) {
                failing.push("sequencing");
            }
            if self.status_updates_down.load(Ordering::SeqCst) {
                failing.push("status updates");
            }

            let (status, message) = if failing.is_empty() {
                (AdapterHealth::Healthy, "In-memory store healthy".to_string())
            } else {
                (AdapterHealth::Degraded, format!("unavailable: {}", failing.join(", ")))
            };

            HealthCheckResult {
                adapter_id: "memory-ledger-store".to_string(),
                status,
                latency_ms: 0,
                message: Some(message),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for InMemoryLedgerStore {
        async fn next_sequence(&self, partition: &Partition) -> Result<u64, PortError> {
            if self.sequencing_down.load(Ordering::SeqCst) {
                return Err(PortError::connection("sequence counter unreachable"));
            }

            let mut state = self.state.lock().await;
            let MemoryState { invoices, sequences, .. } = &mut *state;
            let counter = sequences.entry(*partition).or_insert_with(|| {
                partition.highest_sequence(invoices.values().map(|i| i.invoice_number.as_str()))
            });
            *counter += 1;
            Ok(*counter)
        }

        async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
            let mut state = self.state.lock().await;
            if state.invoices.contains_key(&invoice.id) {
                return Err(PortError::conflict(format!("invoice {} exists", invoice.id)));
            }
            if state
                .invoices
                .values()
                .any(|existing| existing.invoice_number == invoice.invoice_number)
            {
                return Err(PortError::conflict(format!(
                    "invoice_number {} exists",
                    invoice.invoice_number
                )));
            }
            state.invoices.insert(invoice.id, invoice.clone());
            Ok(())
        }

        async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
            self.state
                .lock()
                .await
                .invoices
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Invoice", id))
        }

        async fn find_invoices(&self, query: InvoiceQuery) -> Result<Vec<Invoice>, PortError> {
            let state = self.state.lock().await;
            let mut invoices: Vec<Invoice> = state
                .invoices
                .values()
                .filter(|invoice| query.matches(invoice))
                .cloned()
                .collect();
            invoices.sort_by(|a, b| a.invoice_number.cmp(&b.invoice_number));
            Ok(invoices)
        }

        async fn update_invoice(
            &self,
            id: InvoiceId,
            changes: &InvoiceChanges,
        ) -> Result<Invoice, PortError> {
            let mut state = self.state.lock().await;
            let stored = state
                .invoices
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Invoice", id))?;

            if let Some(derived) = changes.derived_status {
                if stored.updated_at != derived.derived_at {
                    return Err(PortError::conflict(format!("invoice {} changed since it was read", id)));
                }
                stored.status = derived.status;
            }
            if let Some(amounts) = changes.amounts {
                stored.apply_amounts(amounts);
            }
            if let Some(description) = &changes.description {
                stored.description = description.clone();
            }
            if let Some(due_date) = changes.due_date {
                stored.due_date = Some(due_date);
            }
            touch(stored);
            Ok(stored.clone())
        }

        async fn set_invoice_status(
            &self,
            id: InvoiceId,
            status: InvoiceStatus,
        ) -> Result<Invoice, PortError> {
            let mut state = self.state.lock().await;
            let stored = state
                .invoices
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Invoice", id))?;
            stored.status = status;
            touch(stored);
            Ok(stored.clone())
        }

        async fn advance_invoice_status(
            &self,
            id: InvoiceId,
            status: InvoiceStatus,
            expected_updated_at: DateTime<Utc>,
        ) -> Result<bool, PortError> {
            if self.status_updates_down.load(Ordering::SeqCst) {
                return Err(PortError::connection("status write failed"));
            }

            let mut state = self.state.lock().await;
            let stored = state
                .invoices
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Invoice", id))?;
            if stored.updated_at != expected_updated_at {
                return Err(PortError::conflict(format!("invoice {} changed since it was read", id)));
            }
            if status <= stored.status {
                return Ok(false);
            }
            stored.status = status;
            touch(stored);
            Ok(true)
        }

        async fn delete_invoice(&self, id: InvoiceId) -> Result<(), PortError> {
            let mut state = self.state.lock().await;
            if !state.invoices.contains_key(&id) {
                return Err(PortError::not_found("Invoice", id));
            }
            if state.payments.iter().any(|p| p.invoice_id == id) {
                return Err(PortError::conflict(format!("payments still reference invoice {}", id)));
            }
            state.invoices.remove(&id);
            Ok(())
        }

        async fn insert_payment(&self, payment: &Payment) -> Result<(), PortError> {
            let mut state = self.state.lock().await;
            if state.payments.iter().any(|p| p.id == payment.id) {
                return Err(PortError::conflict(format!("payment {} exists", payment.id)));
            }
            let invoice = state
                .invoices
                .get_mut(&payment.invoice_id)
                .ok_or_else(|| PortError::not_found("Invoice", payment.invoice_id))?;
            touch(invoice);
            state.payments.push(payment.clone());
            Ok(())
        }

        async fn payments_for_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError> {
            let state = self.state.lock().await;
            Ok(state
                .payments
                .iter()
                .filter(|p| p.invoice_id == invoice_id)
                .cloned()
                .collect())
        }

        async fn payments_for_case(&self, case_id: CaseId) -> Result<Vec<Payment>, PortError> {
            let state = self.state.lock().await;
            Ok(state
                .payments
                .iter()
                .filter(|p| p.case_id == case_id)
                .cloned()
                .collect())
        }

        async fn delete_payments_for_invoice(&self, invoice_id: InvoiceId) -> Result<u64, PortError> {
            let mut state = self.state.lock().await;
            let before = state.payments.len();
            state.payments.retain(|p| p.invoice_id != invoice_id);
            Ok((before - state.payments.len()) as u64)
        }
    }
}
