//! Billing domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{CaseId, InvoiceId, MoneyError, PaymentId, PortError};

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Amount is negative, zero where a positive value is required,
    /// or carries more digits than the currency's minor unit
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// VAT percentage outside 0..=100
    #[error("Invalid VAT percentage {0}: must be between 0 and 100")]
    InvalidVatPercentage(Decimal),

    /// Unrecognized invoice type. Non-fatal: creation falls back to the
    /// generic `INV` prefix and only logs this.
    #[error("Unrecognized invoice type '{0}', numbering with the generic prefix")]
    InvalidInvoiceType(String),

    /// Invoice or payment absent on update/delete
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payment refers to an invoice that does not exist
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Payment was filed against a different case than its invoice
    #[error("Payment case {payment_case} does not match invoice case {invoice_case}")]
    CaseMismatch {
        invoice_case: CaseId,
        payment_case: CaseId,
    },

    /// The store could not perform the atomic number allocation
    #[error("Invoice sequencing unavailable: {0}")]
    SequencingUnavailable(String),

    /// Allocation kept colliding with existing invoice numbers
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Payment is durable but the invoice status could not be updated
    #[error("Payment {payment_id} recorded but status recompute for invoice {invoice_id} failed: {source}")]
    StatusRecomputeFailed {
        payment_id: PaymentId,
        invoice_id: InvoiceId,
        #[source]
        source: PortError,
    },

    /// Money arithmetic failed
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Any other store failure
    #[error("Store error: {0}")]
    Store(#[from] PortError),
}

impl BillingError {
    /// Errors a caller should retry with backoff before surfacing
    ///
    /// Transient store failures (connection loss, timeouts) count as well.
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::SequencingUnavailable(_)
            | BillingError::ConcurrencyConflict(_)
            | BillingError::StatusRecomputeFailed { .. } => true,
            BillingError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Errors caused by the request itself rather than the system
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BillingError::InvalidAmount(_)
                | BillingError::InvalidVatPercentage(_)
                | BillingError::CaseMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_retryable_classification() {
        assert!(BillingError::SequencingUnavailable("down".into()).is_retryable());
        assert!(BillingError::ConcurrencyConflict("taken".into()).is_retryable());
        assert!(!BillingError::InvalidAmount("-1".into()).is_retryable());
        assert!(!BillingError::InvoiceNotFound(InvoiceId::new()).is_retryable());
        assert!(BillingError::Store(PortError::connection("reset")).is_retryable());
        assert!(!BillingError::Store(PortError::conflict("dup")).is_retryable());
    }

    #[test]
    fn test_validation_classification() {
        assert!(BillingError::InvalidVatPercentage(dec!(101)).is_validation());
        assert!(!BillingError::Store(PortError::internal("boom")).is_validation());
    }

    #[test]
    fn test_vat_message() {
        let message = BillingError::InvalidVatPercentage(dec!(-1)).to_string();
        assert!(message.contains("-1"));
        assert!(message.contains("between 0 and 100"));
    }
}
