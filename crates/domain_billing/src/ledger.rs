//! Invoice ledger
//!
//! Creation, update, deletion and listing of invoices. Numbers come from the
//! [`InvoiceSequencer`]; derived amounts always come from
//! [`InvoiceAmounts::compute`] and derived status from [`InvoiceStatus::derive`].

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, instrument, warn};

use core_kernel::{CaseId, Currency, InvoiceId, Money, PortError};

use crate::error::BillingError;
use crate::invoice::{CreateInvoice, Invoice, InvoiceAmounts, InvoiceStatus, InvoiceUpdate};
use crate::numbering::InvoiceSequencer;
use crate::payment::total_paid;
use crate::ports::{DerivedStatus, InvoiceChanges, InvoiceQuery, LedgerStore};

/// Insert attempts before a number collision is reported
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 3;

/// Attempts of an update or delete that keeps racing concurrent payments
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Defaults applied to incoming requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    pub default_currency: Currency,
    pub default_vat_percentage: Decimal,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            default_currency: Currency::AED,
            default_vat_percentage: dec!(5),
        }
    }
}

/// Counts and paid revenue across the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingSummary {
    pub total_invoices: usize,
    pub pending_invoices: usize,
    pub partial_invoices: usize,
    pub paid_invoices: usize,
    /// Unpaid invoices whose due date has passed
    pub overdue_invoices: usize,
    /// Sum of `total_amount` over paid invoices, one entry per currency
    pub total_revenue: Vec<Money>,
}

/// Invoice lifecycle service
#[derive(Clone)]
pub struct InvoiceLedger {
    store: Arc<dyn LedgerStore>,
    sequencer: InvoiceSequencer,
    settings: LedgerSettings,
}

impl InvoiceLedger {
    pub fn new(store: Arc<dyn LedgerStore>, settings: LedgerSettings) -> Self {
        Self {
            sequencer: InvoiceSequencer::new(store.clone()),
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Creates a pending invoice numbered in the current year
    pub async fn create_invoice(&self, request: CreateInvoice) -> Result<Invoice, BillingError> {
        self.create_invoice_at(request, Utc::now()).await
    }

    /// Creates a pending invoice issued at `now`
    ///
    /// The year of `now` selects the numbering partition.
    #[instrument(skip(self, request), fields(case_id = %request.case_id, invoice_type = %request.invoice_type))]
    pub async fn create_invoice_at(
        &self,
        request: CreateInvoice,
        now: DateTime<Utc>,
    ) -> Result<Invoice, BillingError> {
        let currency = request.currency.unwrap_or(self.settings.default_currency);
        let vat_percentage = request
            .vat_percentage
            .unwrap_or(self.settings.default_vat_percentage);
        let amounts = InvoiceAmounts::compute(Money::new(request.amount, currency), vat_percentage)?;

        if !request.invoice_type.is_recognized() {
            warn!(
                error = %BillingError::InvalidInvoiceType(request.invoice_type.to_string()),
                "falling back to generic invoice prefix"
            );
        }

        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let number = self.sequencer.allocate(&request.invoice_type, now.year()).await?;
            let invoice = Invoice::new(
                request.case_id,
                number.to_string(),
                request.invoice_type.clone(),
                amounts,
                request.description.clone(),
                request.due_date,
                now,
            );

            match self.store.insert_invoice(&invoice).await {
                Ok(()) => {
                    info!(
                        invoice_id = %invoice.id,
                        invoice_number = %invoice.invoice_number,
                        total = %invoice.total_amount,
                        "invoice created"
                    );
                    return Ok(invoice);
                }
                Err(PortError::Conflict { message }) => {
                    warn!(attempt, %number, %message, "invoice number collision, reallocating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BillingError::ConcurrencyConflict(format!(
            "no free invoice number for {} after {} attempts",
            request.invoice_type, MAX_ALLOCATION_ATTEMPTS
        )))
    }

    /// Applies the allow-listed fields of `update`
    ///
    /// An explicit `status` is an administrative override and wins. Without
    /// one, a change to amount or VAT re-derives the status from the
    /// invoice's payments against the new total, written in the same
    /// compare-and-set as the amounts. A payment landing in between makes
    /// the write conflict and the update starts over from a fresh read.
    #[instrument(skip(self, update))]
    pub async fn update_invoice(
        &self,
        id: InvoiceId,
        update: InvoiceUpdate,
    ) -> Result<Invoice, BillingError> {
        let changes_amounts = update.changes_amounts();

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let invoice = self.load(id).await?;

            let mut changes = InvoiceChanges {
                description: update.description.clone(),
                due_date: update.due_date,
                ..Default::default()
            };
            if changes_amounts {
                let amount = update.amount.unwrap_or_else(|| invoice.amount.amount());
                let vat_percentage = update
                    .vat_percentage
                    .unwrap_or_else(|| invoice.effective_vat_percentage());
                let amounts =
                    InvoiceAmounts::compute(Money::new(amount, invoice.currency), vat_percentage)?;

                if update.status.is_none() {
                    let payments = self.store.payments_for_invoice(id).await?;
                    let paid = total_paid(&invoice, &payments)?;
                    changes.derived_status = Some(DerivedStatus {
                        status: InvoiceStatus::derive(&paid, &amounts.total_amount)?,
                        derived_at: invoice.updated_at,
                    });
                }
                changes.amounts = Some(amounts);
            }

            let mut updated = if changes.is_empty() {
                invoice
            } else {
                match self.store.update_invoice(id, &changes).await {
                    Ok(updated) => updated,
                    Err(PortError::Conflict { message }) => {
                        warn!(attempt, %message, "invoice changed during update, retrying");
                        continue;
                    }
                    Err(e) => return Err(not_found(e, id)),
                }
            };

            if let Some(status) = update.status {
                updated = self
                    .store
                    .set_invoice_status(id, status)
                    .await
                    .map_err(|e| not_found(e, id))?;
            }

            self.warn_ignored(&updated, &update);
            info!(
                invoice_number = %updated.invoice_number,
                status = %updated.status,
                total = %updated.total_amount,
                "invoice updated"
            );
            return Ok(updated);
        }

        Err(BillingError::ConcurrencyConflict(format!(
            "invoice {} kept changing, update abandoned after {} attempts",
            id, MAX_WRITE_ATTEMPTS
        )))
    }

    /// Deletes an invoice together with all its payments
    ///
    /// Payments go first so that no payment is ever left pointing at a
    /// missing invoice. A payment recorded in between makes the store refuse
    /// the delete; its payments are then cleared again.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, id: InvoiceId) -> Result<(), BillingError> {
        let invoice = self.load(id).await?;

        let mut removed: u64 = 0;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            removed += self.store.delete_payments_for_invoice(id).await?;
            match self.store.delete_invoice(id).await {
                Ok(()) => {
                    info!(invoice_number = %invoice.invoice_number, payments_removed = removed, "invoice deleted");
                    return Ok(());
                }
                Err(PortError::Conflict { message }) => {
                    warn!(attempt, %message, "payment recorded during delete, retrying");
                }
                Err(e) => return Err(not_found(e, id)),
            }
        }

        Err(BillingError::ConcurrencyConflict(format!(
            "payments kept arriving for invoice {}, delete abandoned after {} attempts",
            id, MAX_WRITE_ATTEMPTS
        )))
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        self.load(id).await
    }

    /// Invoices of a case, ordered by invoice number
    pub async fn invoices_for_case(&self, case_id: CaseId) -> Result<Vec<Invoice>, BillingError> {
        Ok(self.store.find_invoices(InvoiceQuery::by_case(case_id)).await?)
    }

    /// Aggregates counts by status and paid revenue by currency
    pub async fn summary(&self) -> Result<BillingSummary, BillingError> {
        self.summary_on(Utc::now().date_naive()).await
    }

    /// Like [`InvoiceLedger::summary`], counting invoices overdue on `today`
    #[instrument(skip(self))]
    pub async fn summary_on(&self, today: NaiveDate) -> Result<BillingSummary, BillingError> {
        let invoices = self.store.find_invoices(InvoiceQuery::default()).await?;

        let count = |status: InvoiceStatus| invoices.iter().filter(|i| i.status == status).count();

        let mut total_revenue: Vec<Money> = Vec::new();
        for invoice in invoices.iter().filter(|i| i.status == InvoiceStatus::Paid) {
            match total_revenue
                .iter_mut()
                .find(|m| m.currency() == invoice.currency)
            {
                Some(sum) => *sum = sum.checked_add(&invoice.total_amount)?,
                None => total_revenue.push(invoice.total_amount),
            }
        }
        total_revenue.sort_by_key(|m| m.currency().code());

        Ok(BillingSummary {
            total_invoices: invoices.len(),
            pending_invoices: count(InvoiceStatus::Pending),
            partial_invoices: count(InvoiceStatus::Partial),
            paid_invoices: count(InvoiceStatus::Paid),
            overdue_invoices: invoices.iter().filter(|i| i.is_overdue(today)).count(),
            total_revenue,
        })
    }

    fn warn_ignored(&self, invoice: &Invoice, update: &InvoiceUpdate) {
        if let Some(requested) = &update.invoice_type {
            if *requested != invoice.invoice_type {
                warn!(
                    invoice_number = %invoice.invoice_number,
                    current = %invoice.invoice_type,
                    %requested,
                    "invoice type is fixed after creation, ignoring"
                );
            }
        }
        if !update.ignored.is_empty() {
            let mut fields: Vec<&str> = update.ignored.keys().map(String::as_str).collect();
            fields.sort_unstable();
            warn!(invoice_number = %invoice.invoice_number, ?fields, "ignoring fields outside the update allow-list");
        }
    }

    async fn load(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        self.store.get_invoice(id).await.map_err(|e| not_found(e, id))
    }
}

fn not_found(error: PortError, id: InvoiceId) -> BillingError {
    match error {
        PortError::NotFound { .. } => BillingError::NotFound(format!("invoice {}", id)),
        other => BillingError::Store(other),
    }
}
