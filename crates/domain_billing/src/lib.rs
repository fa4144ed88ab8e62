//! Billing Domain - Invoice and Payment Ledger
//!
//! This crate implements invoicing and payment tracking for a legal
//! practice. Every invoice belongs to a case, carries a human-readable
//! number unique within its `(prefix, year)` partition, and moves through
//! `pending -> partial -> paid` as payments arrive.
//!
//! # Components
//!
//! - **InvoiceSequencer**: collision-free invoice numbers via an atomic
//!   store counter
//! - **InvoiceLedger**: create, update, delete and list invoices
//! - **PaymentProcessor**: record payments and recompute invoice status
//! - **LedgerStore**: the persistence port, with an in-memory mock
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{CreateInvoice, InvoiceLedger, LedgerSettings, PaymentProcessor};
//!
//! let ledger = InvoiceLedger::new(store.clone(), LedgerSettings::default());
//! let invoice = ledger.create_invoice(request).await?;
//! assert_eq!(invoice.invoice_number, "FEES-2026-000001");
//!
//! let processor = PaymentProcessor::new(store);
//! processor.record_payment(payment).await?;
//! ```

pub mod error;
pub mod invoice;
pub mod ledger;
pub mod numbering;
pub mod payment;
pub mod ports;
pub mod retry;

pub use error::BillingError;
pub use invoice::{CreateInvoice, Invoice, InvoiceAmounts, InvoiceStatus, InvoiceType, InvoiceUpdate};
pub use ledger::{BillingSummary, InvoiceLedger, LedgerSettings, MAX_ALLOCATION_ATTEMPTS, MAX_WRITE_ATTEMPTS};
pub use numbering::{InvoiceNumber, InvoiceSequencer, Partition, SEQUENCE_WIDTH};
pub use payment::{
    InvoiceBalance, Payment, PaymentMethod, PaymentProcessor, RecordPayment, MAX_RECOMPUTE_ATTEMPTS,
};
pub use ports::{DerivedStatus, InvoiceChanges, InvoiceQuery, LedgerStore};
pub use retry::RetryPolicy;
