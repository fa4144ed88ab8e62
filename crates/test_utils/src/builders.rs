//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.
//!
//! Request builders (`CreateInvoiceBuilder`, `RecordPaymentBuilder`) feed the
//! ledger services. Record builders (`InvoiceBuilder`, `PaymentBuilder`) build
//! stored entities directly, for exercising a `LedgerStore` on its own.

use chrono::{DateTime, NaiveDate, Utc};
use core_kernel::{CaseId, Currency, InvoiceId, Money, PaymentId};
use domain_billing::{
    CreateInvoice, Invoice, InvoiceAmounts, InvoiceStatus, InvoiceType, Partition, Payment,
    PaymentMethod, RecordPayment,
};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixtures::{IdFixtures, RateFixtures, TemporalFixtures};

/// Random human-looking invoice description
pub fn fake_description() -> String {
    Sentence(3..8).fake()
}

/// Builder for invoice creation requests
#[derive(Debug, Clone)]
pub struct CreateInvoiceBuilder {
    case_id: CaseId,
    invoice_type: InvoiceType,
    amount: Decimal,
    vat_percentage: Option<Decimal>,
    currency: Option<Currency>,
    description: String,
    due_date: Option<NaiveDate>,
}

impl Default for CreateInvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CreateInvoiceBuilder {
    /// A 1000.00 fees invoice for a fresh case, leaving rate and currency
    /// to the ledger defaults
    pub fn new() -> Self {
        Self {
            case_id: IdFixtures::new_case_id(),
            invoice_type: InvoiceType::Fees,
            amount: dec!(1000.00),
            vat_percentage: None,
            currency: None,
            description: fake_description(),
            due_date: None,
        }
    }

    pub fn case_id(mut self, case_id: CaseId) -> Self {
        self.case_id = case_id;
        self
    }

    pub fn invoice_type(mut self, invoice_type: impl Into<InvoiceType>) -> Self {
        self.invoice_type = invoice_type.into();
        self
    }

    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn vat_percentage(mut self, vat_percentage: Decimal) -> Self {
        self.vat_percentage = Some(vat_percentage);
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn build(self) -> CreateInvoice {
        CreateInvoice {
            case_id: self.case_id,
            invoice_type: self.invoice_type,
            amount: self.amount,
            vat_percentage: self.vat_percentage,
            currency: self.currency,
            description: self.description,
            due_date: self.due_date,
        }
    }
}

/// Builder for stored invoices
///
/// Amounts are derived through [`InvoiceAmounts::compute`], so built
/// invoices always satisfy the VAT and total invariants.
#[derive(Debug, Clone)]
pub struct InvoiceBuilder {
    case_id: CaseId,
    invoice_type: InvoiceType,
    sequence: u64,
    invoice_number: Option<String>,
    amount: Money,
    vat_percentage: Decimal,
    status: InvoiceStatus,
    issued_at: DateTime<Utc>,
    due_date: Option<NaiveDate>,
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceBuilder {
    pub fn new() -> Self {
        Self {
            case_id: IdFixtures::case_id(),
            invoice_type: InvoiceType::Fees,
            sequence: 1,
            invoice_number: None,
            amount: Money::new(dec!(1000.00), Currency::AED),
            vat_percentage: RateFixtures::standard_vat(),
            status: InvoiceStatus::Pending,
            issued_at: TemporalFixtures::issued_at(),
            due_date: None,
        }
    }

    pub fn case_id(mut self, case_id: CaseId) -> Self {
        self.case_id = case_id;
        self
    }

    pub fn invoice_type(mut self, invoice_type: impl Into<InvoiceType>) -> Self {
        self.invoice_type = invoice_type.into();
        self
    }

    /// Sequence within the type's partition for the issue year
    pub fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Overrides the generated number verbatim
    pub fn invoice_number(mut self, number: impl Into<String>) -> Self {
        self.invoice_number = Some(number.into());
        self
    }

    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn vat_percentage(mut self, vat_percentage: Decimal) -> Self {
        self.vat_percentage = vat_percentage;
        self
    }

    pub fn status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = issued_at;
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Builds the invoice
    ///
    /// # Panics
    ///
    /// Panics if the amount or rate is out of range
    pub fn build(self) -> Invoice {
        use chrono::Datelike;

        let amounts = InvoiceAmounts::compute(self.amount, self.vat_percentage)
            .expect("builder amounts must be valid");
        let number = self.invoice_number.unwrap_or_else(|| {
            Partition::for_type(&self.invoice_type, self.issued_at.year())
                .number(self.sequence)
                .to_string()
        });

        let mut invoice = Invoice::new(
            self.case_id,
            number,
            self.invoice_type,
            amounts,
            fake_description(),
            self.due_date,
            self.issued_at,
        );
        invoice.status = self.status;
        invoice
    }
}

/// Builder for payment requests
#[derive(Debug, Clone)]
pub struct RecordPaymentBuilder {
    invoice_id: InvoiceId,
    case_id: Option<CaseId>,
    amount: Decimal,
    method: PaymentMethod,
    notes: String,
    payment_date: Option<DateTime<Utc>>,
}

impl RecordPaymentBuilder {
    /// A cash payment against `invoice_id`
    pub fn new(invoice_id: InvoiceId, amount: Decimal) -> Self {
        Self {
            invoice_id,
            case_id: None,
            amount,
            method: PaymentMethod::Cash,
            notes: String::new(),
            payment_date: None,
        }
    }

    /// A payment against `invoice`, filed under its case
    pub fn for_invoice(invoice: &Invoice, amount: Decimal) -> Self {
        Self::new(invoice.id, amount).case_id(invoice.case_id)
    }

    pub fn case_id(mut self, case_id: CaseId) -> Self {
        self.case_id = Some(case_id);
        self
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn payment_date(mut self, payment_date: DateTime<Utc>) -> Self {
        self.payment_date = Some(payment_date);
        self
    }

    pub fn build(self) -> RecordPayment {
        RecordPayment {
            invoice_id: self.invoice_id,
            case_id: self.case_id,
            amount: self.amount,
            method: self.method,
            notes: self.notes,
            payment_date: self.payment_date,
        }
    }
}

/// Builder for stored payments
#[derive(Debug, Clone)]
pub struct PaymentBuilder {
    invoice_id: InvoiceId,
    case_id: CaseId,
    amount: Money,
    payment_date: DateTime<Utc>,
    method: PaymentMethod,
}

impl PaymentBuilder {
    /// A payment of `amount` (in the invoice's currency) against `invoice`
    pub fn for_invoice(invoice: &Invoice, amount: Decimal) -> Self {
        Self {
            invoice_id: invoice.id,
            case_id: invoice.case_id,
            amount: Money::new(amount, invoice.currency),
            payment_date: invoice.issued_date,
            method: PaymentMethod::BankTransfer,
        }
    }

    pub fn payment_date(mut self, payment_date: DateTime<Utc>) -> Self {
        self.payment_date = payment_date;
        self
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn build(self) -> Payment {
        Payment {
            id: PaymentId::new_v7(),
            invoice_id: self.invoice_id,
            case_id: self.case_id,
            amount: self.amount,
            payment_date: self.payment_date,
            method: self.method,
            notes: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_invoice_builder_defaults() {
        let request = CreateInvoiceBuilder::new().build();
        assert_eq!(request.invoice_type, InvoiceType::Fees);
        assert_eq!(request.amount, dec!(1000.00));
        assert!(request.vat_percentage.is_none());
        assert!(request.currency.is_none());
        assert!(!request.description.is_empty());
    }

    #[test]
    fn test_invoice_builder_derives_amounts() {
        let invoice = InvoiceBuilder::new().build();
        assert_eq!(invoice.invoice_number, "FEES-2026-000001");
        assert_eq!(invoice.vat_amount.amount(), dec!(50.00));
        assert_eq!(invoice.total_amount.amount(), dec!(1050.00));
        assert_eq!(invoice.status, InvoiceStatus::Pending);
    }

    #[test]
    fn test_invoice_builder_numbering() {
        let invoice = InvoiceBuilder::new()
            .invoice_type("retainer")
            .sequence(12)
            .issued_at(TemporalFixtures::year_end())
            .build();
        assert_eq!(invoice.invoice_number, "INV-2025-000012");

        let invoice = InvoiceBuilder::new().invoice_number("FEES-2026-1").build();
        assert_eq!(invoice.invoice_number, "FEES-2026-1");
    }

    #[test]
    fn test_payment_builders() {
        let invoice = InvoiceBuilder::new().build();

        let request = RecordPaymentBuilder::for_invoice(&invoice, dec!(10)).notes("first").build();
        assert_eq!(request.case_id, Some(invoice.case_id));
        assert_eq!(request.notes, "first");

        let payment = PaymentBuilder::for_invoice(&invoice, dec!(10)).build();
        assert_eq!(payment.amount.currency(), invoice.currency);
        assert_eq!(payment.invoice_id, invoice.id);
    }
}
