//! Invoice management
//!
//! Invoice records, their type and status enumerations, and the single
//! computation of the derived fields (`vat_amount`, `total_amount`, `status`).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{CaseId, Currency, InvoiceId, Money, MoneyError, Rate};

use crate::error::BillingError;

/// Kind of invoice; determines the numbering prefix
///
/// Unrecognized type strings are kept verbatim as `Other` and numbered
/// under the generic `INV` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvoiceType {
    /// Legal fees
    Fees,
    /// Disbursements and expenses
    Expenses,
    Receipt,
    CreditNote,
    DebitNote,
    Other(String),
}

impl InvoiceType {
    /// Numbering prefix for this type
    pub fn prefix(&self) -> &'static str {
        match self {
            InvoiceType::Fees => "FEES",
            InvoiceType::Expenses => "EXP",
            InvoiceType::Receipt => "RCPT",
            InvoiceType::CreditNote => "CN",
            InvoiceType::DebitNote => "DN",
            InvoiceType::Other(_) => "INV",
        }
    }

    /// Wire name of the type
    pub fn as_str(&self) -> &str {
        match self {
            InvoiceType::Fees => "fees",
            InvoiceType::Expenses => "expenses",
            InvoiceType::Receipt => "receipt",
            InvoiceType::CreditNote => "credit_note",
            InvoiceType::DebitNote => "debit_note",
            InvoiceType::Other(raw) => raw,
        }
    }

    /// Returns true for one of the five known types
    pub fn is_recognized(&self) -> bool {
        !matches!(self, InvoiceType::Other(_))
    }
}

impl From<String> for InvoiceType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "fees" => InvoiceType::Fees,
            "expenses" => InvoiceType::Expenses,
            "receipt" => InvoiceType::Receipt,
            "credit_note" => InvoiceType::CreditNote,
            "debit_note" => InvoiceType::DebitNote,
            _ => InvoiceType::Other(raw),
        }
    }
}

impl From<&str> for InvoiceType {
    fn from(raw: &str) -> Self {
        InvoiceType::from(raw.to_string())
    }
}

impl From<InvoiceType> for String {
    fn from(invoice_type: InvoiceType) -> Self {
        invoice_type.as_str().to_string()
    }
}

impl fmt::Display for InvoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice status, derived from the invoice's payments
///
/// Variants are ordered by progress so that "never move backwards" can be
/// expressed as `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Nothing paid yet
    Pending,
    /// Some but not all of the total paid
    Partial,
    /// Total paid in full (or overpaid)
    Paid,
}

impl InvoiceStatus {
    /// Derives the status from the paid total and the invoice total
    pub fn derive(total_paid: &Money, total_amount: &Money) -> Result<Self, MoneyError> {
        Ok(match total_paid.checked_cmp(total_amount)? {
            Ordering::Greater | Ordering::Equal => InvoiceStatus::Paid,
            Ordering::Less if total_paid.is_positive() => InvoiceStatus::Partial,
            Ordering::Less => InvoiceStatus::Pending,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "partial" => Ok(InvoiceStatus::Partial),
            "paid" => Ok(InvoiceStatus::Paid),
            other => Err(format!("unknown invoice status '{}'", other)),
        }
    }
}

/// The amount inputs of an invoice together with their derived values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceAmounts {
    pub amount: Money,
    pub vat_percentage: Decimal,
    pub vat_amount: Money,
    pub total_amount: Money,
}

impl InvoiceAmounts {
    /// Validates the inputs and derives VAT and total
    ///
    /// VAT is rounded half-up to the currency's minor unit exactly once,
    /// here; the total is the exact sum of amount and rounded VAT.
    pub fn compute(amount: Money, vat_percentage: Decimal) -> Result<Self, BillingError> {
        if amount.is_negative() {
            return Err(BillingError::InvalidAmount(format!(
                "invoice amount must not be negative, got {}",
                amount
            )));
        }
        if !amount.fits_minor_unit() {
            return Err(BillingError::InvalidAmount(format!(
                "{} has more decimal places than {} allows",
                amount.amount(),
                amount.currency()
            )));
        }
        if vat_percentage < Decimal::ZERO || vat_percentage > dec!(100) {
            return Err(BillingError::InvalidVatPercentage(vat_percentage));
        }

        // Only pads the scale; the amount already fits the minor unit
        let amount = amount.round_half_up();
        let vat_amount = Rate::from_percentage(vat_percentage)
            .apply(&amount)?
            .round_half_up();
        let total_amount = amount.checked_add(&vat_amount)?;

        Ok(Self {
            amount,
            vat_percentage,
            vat_amount,
            total_amount,
        })
    }
}

/// An invoice raised against a case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Owning case; never reassigned
    pub case_id: CaseId,
    /// Human-readable number `{PREFIX}-{YEAR}-{SEQ:06}`; assigned once
    pub invoice_number: String,
    #[serde(rename = "type")]
    pub invoice_type: InvoiceType,
    pub currency: Currency,
    /// Pre-VAT amount
    pub amount: Money,
    pub vat_percentage: Decimal,
    /// Derived from `amount` and `vat_percentage`
    pub vat_amount: Money,
    /// Derived from `amount` and `vat_amount`
    pub total_amount: Money,
    /// Derived from payments
    pub status: InvoiceStatus,
    #[serde(default, alias = "description_ar")]
    pub description: String,
    pub issued_date: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Builds a freshly numbered, pending invoice
    pub fn new(
        case_id: CaseId,
        invoice_number: impl Into<String>,
        invoice_type: InvoiceType,
        amounts: InvoiceAmounts,
        description: impl Into<String>,
        due_date: Option<NaiveDate>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvoiceId::new_v7(),
            case_id,
            invoice_number: invoice_number.into(),
            invoice_type,
            currency: amounts.amount.currency(),
            amount: amounts.amount,
            vat_percentage: amounts.vat_percentage,
            vat_amount: amounts.vat_amount,
            total_amount: amounts.total_amount,
            status: InvoiceStatus::Pending,
            description: description.into(),
            issued_date: issued_at,
            due_date,
            created_at: issued_at,
            updated_at: issued_at,
        }
    }

    /// The VAT rate currently applied to this invoice
    ///
    /// This is the stored rate; it equals `vat_amount / amount * 100` up to
    /// the minor-unit rounding of `vat_amount`, and stays defined when the
    /// stored amount is zero.
    pub fn effective_vat_percentage(&self) -> Decimal {
        self.vat_percentage
    }

    /// Replaces the amount inputs and their derived values together
    pub fn apply_amounts(&mut self, amounts: InvoiceAmounts) {
        self.amount = amounts.amount;
        self.vat_percentage = amounts.vat_percentage;
        self.vat_amount = amounts.vat_amount;
        self.total_amount = amounts.total_amount;
    }

    /// Returns true when the due date has passed and the invoice is unpaid
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != InvoiceStatus::Paid && self.due_date.is_some_and(|due| today > due)
    }
}

/// Request to create an invoice
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoice {
    pub case_id: CaseId,
    #[serde(rename = "type")]
    pub invoice_type: InvoiceType,
    /// Pre-VAT amount
    pub amount: Decimal,
    /// Falls back to the ledger's default rate when absent
    #[serde(default)]
    pub vat_percentage: Option<Decimal>,
    /// Falls back to the ledger's default currency when absent
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default, alias = "description_ar")]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Partial update of an invoice
///
/// Only the allow-listed fields below can change. Anything else in the
/// payload (`invoice_number`, `case_id`, `issued_date`, derived amounts)
/// lands in `ignored` and has no effect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceUpdate {
    /// Administrative status override
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    /// Accepted on the wire but the type is fixed after creation
    #[serde(default, rename = "type")]
    pub invoice_type: Option<InvoiceType>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub vat_percentage: Option<Decimal>,
    #[serde(default, alias = "description_ar")]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub ignored: HashMap<String, serde_json::Value>,
}

impl InvoiceUpdate {
    /// True if the update touches an input of the derived amounts
    pub fn changes_amounts(&self) -> bool {
        self.amount.is_some() || self.vat_percentage.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aed(amount: Decimal) -> Money {
        Money::new(amount, Currency::AED)
    }

    #[test]
    fn test_type_prefixes() {
        assert_eq!(InvoiceType::from("fees").prefix(), "FEES");
        assert_eq!(InvoiceType::from("expenses").prefix(), "EXP");
        assert_eq!(InvoiceType::from("receipt").prefix(), "RCPT");
        assert_eq!(InvoiceType::from("credit_note").prefix(), "CN");
        assert_eq!(InvoiceType::from("debit_note").prefix(), "DN");
        assert_eq!(InvoiceType::from("retainer").prefix(), "INV");
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let t = InvoiceType::from("retainer");
        assert!(!t.is_recognized());
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"retainer\"");
    }

    #[test]
    fn test_vat_and_total() {
        let amounts = InvoiceAmounts::compute(aed(dec!(1000)), dec!(5)).unwrap();
        assert_eq!(amounts.vat_amount.to_canonical_string(), "50.00");
        assert_eq!(amounts.total_amount.to_canonical_string(), "1050.00");
    }

    #[test]
    fn test_vat_rounds_half_up_once() {
        // 10.05 * 5% = 0.5025 -> 0.50
        let amounts = InvoiceAmounts::compute(aed(dec!(10.05)), dec!(5)).unwrap();
        assert_eq!(amounts.vat_amount.amount(), dec!(0.50));

        // 10.10 * 5% = 0.505 -> 0.51
        let amounts = InvoiceAmounts::compute(aed(dec!(10.10)), dec!(5)).unwrap();
        assert_eq!(amounts.vat_amount.amount(), dec!(0.51));
        assert_eq!(amounts.total_amount.amount(), dec!(10.61));
    }

    #[test]
    fn test_rejects_negative_amount() {
        let result = InvoiceAmounts::compute(aed(dec!(-1)), dec!(5));
        assert!(matches!(result, Err(BillingError::InvalidAmount(_))));
    }

    #[test]
    fn test_rejects_sub_fils_amount() {
        let result = InvoiceAmounts::compute(aed(dec!(1.005)), dec!(5));
        assert!(matches!(result, Err(BillingError::InvalidAmount(_))));
    }

    #[test]
    fn test_vat_bounds() {
        assert!(InvoiceAmounts::compute(aed(dec!(1)), dec!(0)).is_ok());
        assert!(InvoiceAmounts::compute(aed(dec!(1)), dec!(100)).is_ok());
        assert!(matches!(
            InvoiceAmounts::compute(aed(dec!(1)), dec!(100.01)),
            Err(BillingError::InvalidVatPercentage(_))
        ));
        assert!(matches!(
            InvoiceAmounts::compute(aed(dec!(1)), dec!(-0.5)),
            Err(BillingError::InvalidVatPercentage(_))
        ));
    }

    #[test]
    fn test_status_derivation() {
        let total = aed(dec!(1050.00));
        assert_eq!(InvoiceStatus::derive(&aed(dec!(0)), &total).unwrap(), InvoiceStatus::Pending);
        assert_eq!(InvoiceStatus::derive(&aed(dec!(500)), &total).unwrap(), InvoiceStatus::Partial);
        assert_eq!(InvoiceStatus::derive(&aed(dec!(1050)), &total).unwrap(), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::derive(&aed(dec!(2000)), &total).unwrap(), InvoiceStatus::Paid);
    }

    #[test]
    fn test_zero_total_is_paid_immediately() {
        let zero = aed(dec!(0));
        assert_eq!(InvoiceStatus::derive(&zero, &zero).unwrap(), InvoiceStatus::Paid);
    }

    #[test]
    fn test_status_ordering() {
        assert!(InvoiceStatus::Pending < InvoiceStatus::Partial);
        assert!(InvoiceStatus::Partial < InvoiceStatus::Paid);
    }

    #[test]
    fn test_update_collects_ignored_fields() {
        let update: InvoiceUpdate = serde_json::from_value(serde_json::json!({
            "amount": "200",
            "invoice_number": "X",
            "issued_date": "2000-01-01"
        }))
        .unwrap();

        assert_eq!(update.amount, Some(dec!(200)));
        assert!(update.changes_amounts());
        assert!(update.ignored.contains_key("invoice_number"));
        assert!(update.ignored.contains_key("issued_date"));
    }

    #[test]
    fn test_overdue() {
        let amounts = InvoiceAmounts::compute(aed(dec!(100)), dec!(5)).unwrap();
        let mut invoice = Invoice::new(
            CaseId::new(),
            "FEES-2026-000001",
            InvoiceType::Fees,
            amounts,
            "",
            NaiveDate::from_ymd_opt(2026, 1, 31),
            Utc::now(),
        );
        let feb = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert!(invoice.is_overdue(feb));

        invoice.status = InvoiceStatus::Paid;
        assert!(!invoice.is_overdue(feb));
    }
}
