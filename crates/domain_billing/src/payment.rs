//! Payment processing
//!
//! Payments are append-only. After every payment the invoice status is
//! re-derived from the full, freshly read payment set; no running total is
//! ever cached, so two concurrent payments cannot lose each other's update.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{CaseId, InvoiceId, Money, PaymentId, PortError};

use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::ports::LedgerStore;

/// Status writes attempted before a recompute gives up on a busy invoice
pub const MAX_RECOMPUTE_ATTEMPTS: u32 = 5;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    BankTransfer,
    Cheque,
    Card,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Card => "card",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "cheque" => Ok(PaymentMethod::Cheque),
            "card" => Ok(PaymentMethod::Card),
            "other" => Ok(PaymentMethod::Other),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

/// A payment record; never mutated once stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub case_id: CaseId,
    /// Always positive, in the invoice's currency
    pub amount: Money,
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    #[serde(default)]
    pub notes: String,
}

/// Request to record a payment
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPayment {
    pub invoice_id: InvoiceId,
    /// Defaults to the invoice's case; must match it when given
    #[serde(default)]
    pub case_id: Option<CaseId>,
    pub amount: Decimal,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub notes: String,
    /// Defaults to the time of recording
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
}

/// What has been paid against an invoice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceBalance {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    pub total_amount: Money,
    pub total_paid: Money,
    /// Outstanding amount, never negative
    pub balance_due: Money,
    /// Amount paid beyond the total, never negative
    pub credit_balance: Money,
}

/// Records payments and drives invoice status transitions
#[derive(Clone)]
pub struct PaymentProcessor {
    store: Arc<dyn LedgerStore>,
}

impl PaymentProcessor {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Records a payment and recomputes the invoice status
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` if the amount is not positive or finer than the
    ///   currency's minor unit
    /// * `InvoiceNotFound` if the invoice does not exist
    /// * `CaseMismatch` if `case_id` is given and differs from the invoice's
    /// * `StatusRecomputeFailed` if the payment was stored but the status
    ///   write failed; the payment is kept and the caller should retry
    ///   [`PaymentProcessor::recompute_status`]
    #[instrument(skip(self, request), fields(invoice_id = %request.invoice_id, amount = %request.amount))]
    pub async fn record_payment(&self, request: RecordPayment) -> Result<Payment, BillingError> {
        if request.amount <= Decimal::ZERO {
            return Err(BillingError::InvalidAmount(format!(
                "payment amount must be positive, got {}",
                request.amount
            )));
        }

        let invoice = self.load_invoice(request.invoice_id).await?;

        let amount = Money::new(request.amount, invoice.currency);
        if !amount.fits_minor_unit() {
            return Err(BillingError::InvalidAmount(format!(
                "{} has more decimal places than {} allows",
                request.amount, invoice.currency
            )));
        }

        let case_id = match request.case_id {
            Some(case_id) if case_id != invoice.case_id => {
                return Err(BillingError::CaseMismatch {
                    invoice_case: invoice.case_id,
                    payment_case: case_id,
                });
            }
            _ => invoice.case_id,
        };

        let payment = Payment {
            id: PaymentId::new_v7(),
            invoice_id: invoice.id,
            case_id,
            amount: amount.round_half_up(),
            payment_date: request.payment_date.unwrap_or_else(Utc::now),
            method: request.method,
            notes: request.notes,
        };

        // The invoice may have been deleted since it was loaded
        self.store.insert_payment(&payment).await.map_err(|e| match e {
            PortError::NotFound { .. } => BillingError::InvoiceNotFound(invoice.id),
            other => BillingError::Store(other),
        })?;
        info!(payment_id = %payment.id, method = %payment.method, "payment recorded");

        let source = match self.recompute_status(invoice.id).await {
            Ok(_) => return Ok(payment),
            Err(BillingError::Store(source)) => source,
            Err(BillingError::ConcurrencyConflict(message)) => PortError::conflict(message),
            Err(e) => return Err(e),
        };
        warn!(payment_id = %payment.id, error = %source, "status recompute failed after payment");
        Err(BillingError::StatusRecomputeFailed {
            payment_id: payment.id,
            invoice_id: invoice.id,
            source,
        })
    }

    /// Re-derives and persists the status of an invoice from all its payments
    ///
    /// Idempotent: running it again over the same payment set yields the
    /// same status and writes nothing. The status never moves backwards
    /// here; only an explicit invoice update can lower it. The write is
    /// conditional on the invoice being unchanged since it was read, and a
    /// conflicting write restarts from a fresh read.
    ///
    /// # Errors
    ///
    /// `ConcurrencyConflict` if the invoice changed under every one of
    /// [`MAX_RECOMPUTE_ATTEMPTS`] attempts.
    #[instrument(skip(self))]
    pub async fn recompute_status(&self, invoice_id: InvoiceId) -> Result<InvoiceStatus, BillingError> {
        for attempt in 1..=MAX_RECOMPUTE_ATTEMPTS {
            let invoice = self.load_invoice(invoice_id).await?;
            let payments = self.store.payments_for_invoice(invoice_id).await?;

            let total_paid = total_paid(&invoice, &payments)?;
            let derived = InvoiceStatus::derive(&total_paid, &invoice.total_amount)?;
            let status = derived.max(invoice.status);

            if status == invoice.status {
                return Ok(status);
            }

            match self
                .store
                .advance_invoice_status(invoice_id, status, invoice.updated_at)
                .await
            {
                Ok(changed) => {
                    if changed {
                        info!(
                            invoice_number = %invoice.invoice_number,
                            from = %invoice.status,
                            to = %status,
                            %total_paid,
                            "invoice status changed"
                        );
                    }
                    return Ok(status);
                }
                Err(PortError::Conflict { message }) => {
                    debug!(attempt, %message, "invoice changed during recompute, rereading");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BillingError::ConcurrencyConflict(format!(
            "invoice {} kept changing during status recompute",
            invoice_id
        )))
    }

    /// Computes paid and outstanding amounts of an invoice
    #[instrument(skip(self))]
    pub async fn balance(&self, invoice_id: InvoiceId) -> Result<InvoiceBalance, BillingError> {
        let invoice = self.load_invoice(invoice_id).await?;
        let payments = self.store.payments_for_invoice(invoice_id).await?;

        let total_paid = total_paid(&invoice, &payments)?;
        let difference = invoice.total_amount.checked_sub(&total_paid)?;
        let zero = Money::zero(invoice.currency).round_half_up();

        let (balance_due, credit_balance) = if difference.is_negative() {
            (zero, total_paid.checked_sub(&invoice.total_amount)?)
        } else {
            (difference, zero)
        };

        Ok(InvoiceBalance {
            invoice_id,
            status: invoice.status,
            total_amount: invoice.total_amount,
            total_paid,
            balance_due,
            credit_balance,
        })
    }

    /// All payments filed under a case
    pub async fn payments_for_case(&self, case_id: CaseId) -> Result<Vec<Payment>, BillingError> {
        Ok(self.store.payments_for_case(case_id).await?)
    }

    async fn load_invoice(&self, invoice_id: InvoiceId) -> Result<Invoice, BillingError> {
        self.store.get_invoice(invoice_id).await.map_err(|e| match e {
            PortError::NotFound { .. } => BillingError::InvoiceNotFound(invoice_id),
            other => BillingError::Store(other),
        })
    }
}

/// Sum of all payments of an invoice, in the invoice's currency
pub(crate) fn total_paid(invoice: &Invoice, payments: &[Payment]) -> Result<Money, BillingError> {
    let total = Money::sum(payments.iter().map(|p| &p.amount), invoice.currency)?;
    Ok(total.round_half_up())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{InvoiceAmounts, InvoiceType};
    use crate::ports::mock::InMemoryLedgerStore;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    async fn store_with_invoice(amount: Decimal) -> (Arc<InMemoryLedgerStore>, Invoice) {
        let amounts = InvoiceAmounts::compute(Money::new(amount, Currency::AED), dec!(5)).unwrap();
        let invoice = Invoice::new(
            CaseId::new(),
            "FEES-2026-000001",
            InvoiceType::Fees,
            amounts,
            "Retainer",
            None,
            Utc::now(),
        );
        let store = Arc::new(InMemoryLedgerStore::with_invoices(vec![invoice.clone()]).await);
        (store, invoice)
    }

    fn payment_request(invoice: &Invoice, amount: Decimal) -> RecordPayment {
        RecordPayment {
            invoice_id: invoice.id,
            case_id: None,
            amount,
            method: PaymentMethod::BankTransfer,
            notes: String::new(),
            payment_date: None,
        }
    }

    #[tokio::test]
    async fn test_zero_and_negative_payments_rejected() {
        let (store, invoice) = store_with_invoice(dec!(1000)).await;
        let processor = PaymentProcessor::new(store.clone());

        for amount in [dec!(0), dec!(-10)] {
            let err = processor.record_payment(payment_request(&invoice, amount)).await.unwrap_err();
            assert!(matches!(err, BillingError::InvalidAmount(_)));
        }
        assert_eq!(store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_case_defaults_to_invoice_case() {
        let (store, invoice) = store_with_invoice(dec!(1000)).await;
        let processor = PaymentProcessor::new(store);

        let payment = processor.record_payment(payment_request(&invoice, dec!(10))).await.unwrap();
        assert_eq!(payment.case_id, invoice.case_id);
        assert_eq!(payment.amount.to_canonical_string(), "10.00");
    }

    #[tokio::test]
    async fn test_case_mismatch_rejected() {
        let (store, invoice) = store_with_invoice(dec!(1000)).await;
        let processor = PaymentProcessor::new(store.clone());

        let mut request = payment_request(&invoice, dec!(10));
        request.case_id = Some(CaseId::new());
        let err = processor.record_payment(request).await.unwrap_err();

        assert!(matches!(err, BillingError::CaseMismatch { .. }));
        assert_eq!(store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_balance_with_credit() {
        let (store, invoice) = store_with_invoice(dec!(1000)).await;
        let processor = PaymentProcessor::new(store);

        processor.record_payment(payment_request(&invoice, dec!(1100))).await.unwrap();
        let balance = processor.balance(invoice.id).await.unwrap();

        assert_eq!(balance.status, InvoiceStatus::Paid);
        assert_eq!(balance.balance_due.amount(), dec!(0));
        assert_eq!(balance.credit_balance.amount(), dec!(50.00));
    }
}
