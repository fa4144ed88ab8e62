//! Billing DTOs
//!
//! Requests deserialize straight into the domain request types
//! (`CreateInvoice`, `InvoiceUpdate`, `RecordPayment`). Responses flatten
//! money into canonical decimal strings such as `"1050.00"`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use core_kernel::Money;
use domain_billing::{BillingSummary, Invoice, InvoiceBalance, Payment};

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub case_id: Uuid,
    pub invoice_number: String,
    #[serde(rename = "type")]
    pub invoice_type: String,
    pub currency: String,
    pub amount: String,
    pub vat_percentage: Decimal,
    pub vat_amount: String,
    pub total_amount: String,
    pub status: String,
    pub description: String,
    pub issued_date: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id.into(),
            case_id: invoice.case_id.into(),
            invoice_type: invoice.invoice_type.to_string(),
            currency: invoice.currency.code().to_string(),
            amount: invoice.amount.to_canonical_string(),
            vat_percentage: invoice.vat_percentage.normalize(),
            vat_amount: invoice.vat_amount.to_canonical_string(),
            total_amount: invoice.total_amount.to_canonical_string(),
            status: invoice.status.to_string(),
            description: invoice.description,
            issued_date: invoice.issued_date,
            due_date: invoice.due_date,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
            invoice_number: invoice.invoice_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub case_id: Uuid,
    pub amount: String,
    pub currency: String,
    pub payment_date: DateTime<Utc>,
    pub method: String,
    pub notes: String,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.into(),
            invoice_id: payment.invoice_id.into(),
            case_id: payment.case_id.into(),
            amount: payment.amount.to_canonical_string(),
            currency: payment.amount.currency().code().to_string(),
            payment_date: payment.payment_date,
            method: payment.method.to_string(),
            notes: payment.notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub invoice_id: Uuid,
    pub status: String,
    pub currency: String,
    pub total_amount: String,
    pub total_paid: String,
    pub balance_due: String,
    pub credit_balance: String,
}

impl From<InvoiceBalance> for BalanceResponse {
    fn from(balance: InvoiceBalance) -> Self {
        Self {
            invoice_id: balance.invoice_id.into(),
            status: balance.status.to_string(),
            currency: balance.total_amount.currency().code().to_string(),
            total_amount: balance.total_amount.to_canonical_string(),
            total_paid: balance.total_paid.to_canonical_string(),
            balance_due: balance.balance_due.to_canonical_string(),
            credit_balance: balance.credit_balance.to_canonical_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AmountResponse {
    pub currency: String,
    pub amount: String,
}

impl From<Money> for AmountResponse {
    fn from(money: Money) -> Self {
        Self {
            currency: money.currency().code().to_string(),
            amount: money.to_canonical_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_invoices: usize,
    pub pending_invoices: usize,
    pub partial_invoices: usize,
    pub paid_invoices: usize,
    pub overdue_invoices: usize,
    pub total_revenue: Vec<AmountResponse>,
}

impl From<BillingSummary> for StatsResponse {
    fn from(summary: BillingSummary) -> Self {
        Self {
            total_invoices: summary.total_invoices,
            pending_invoices: summary.pending_invoices,
            partial_invoices: summary.partial_invoices,
            paid_invoices: summary.paid_invoices,
            overdue_invoices: summary.overdue_invoices,
            total_revenue: summary.total_revenue.into_iter().map(Into::into).collect(),
        }
    }
}
