//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for the billing ledger. These fixtures
//! are consistent and predictable for unit tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{CaseId, Currency, Money};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A typical consultation fee
    pub fn aed_1000() -> Money {
        Money::new(dec!(1000.00), Currency::AED)
    }

    /// VAT on [`MoneyFixtures::aed_1000`] at the default rate
    pub fn aed_50() -> Money {
        Money::new(dec!(50.00), Currency::AED)
    }

    /// Total of [`MoneyFixtures::aed_1000`] with VAT
    pub fn aed_1050() -> Money {
        Money::new(dec!(1050.00), Currency::AED)
    }

    pub fn aed_zero() -> Money {
        Money::zero(Currency::AED)
    }

    /// An amount in a currency with three minor digits
    pub fn kwd_250() -> Money {
        Money::new(dec!(250.000), Currency::KWD)
    }

    /// A USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }
}

/// Fixture for VAT rates
pub struct RateFixtures;

impl RateFixtures {
    /// UAE standard rate
    pub fn standard_vat() -> Decimal {
        dec!(5)
    }

    pub fn zero_vat() -> Decimal {
        Decimal::ZERO
    }

    /// KSA standard rate
    pub fn ksa_vat() -> Decimal {
        dec!(15)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Standard issue time (Mar 15, 2026)
    pub fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 9, 30, 0).unwrap()
    }

    /// Last instant of 2025, for year-boundary numbering tests
    pub fn year_end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap()
    }

    /// First instant of 2026
    pub fn year_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    /// Thirty days after [`TemporalFixtures::issued_at`]
    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 14).unwrap()
    }

    /// A day after the due date
    pub fn after_due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 15).unwrap()
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    /// A fixed case id, stable across runs
    pub fn case_id() -> CaseId {
        CaseId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0001))
    }

    /// A second fixed case id
    pub fn other_case_id() -> CaseId {
        CaseId::from_uuid(Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0002))
    }

    /// A fresh case id
    pub fn new_case_id() -> CaseId {
        CaseId::new_v7()
    }
}

/// Fixture for invoice number strings
pub struct NumberFixtures;

impl NumberFixtures {
    pub fn first_fees_2026() -> &'static str {
        "FEES-2026-000001"
    }

    pub fn expenses_2026(sequence: u64) -> String {
        format!("EXP-2026-{:06}", sequence)
    }

    /// Numbers that must never count toward a partition's seed
    pub fn malformed() -> Vec<&'static str> {
        vec![
            "FEES-2026-1",
            "FEES-2026-00001A",
            "fees-2026-000001",
            "FEES-26-000001",
            "FEES2026000001",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::{InvoiceNumber, Partition};

    #[test]
    fn test_money_fixtures_consistent() {
        let total = MoneyFixtures::aed_1000()
            .checked_add(&MoneyFixtures::aed_50())
            .unwrap();
        assert_eq!(total, MoneyFixtures::aed_1050());
        assert!(MoneyFixtures::kwd_250().fits_minor_unit());
    }

    #[test]
    fn test_temporal_fixtures_ordering() {
        assert!(TemporalFixtures::year_end() < TemporalFixtures::year_start());
        assert!(TemporalFixtures::issued_at().date_naive() < TemporalFixtures::due_date());
        assert!(TemporalFixtures::due_date() < TemporalFixtures::after_due_date());
    }

    #[test]
    fn test_fixed_case_ids_distinct() {
        assert_ne!(IdFixtures::case_id(), IdFixtures::other_case_id());
        assert_eq!(IdFixtures::case_id(), IdFixtures::case_id());
    }

    #[test]
    fn test_number_fixtures() {
        let partition = Partition::new("EXP", 2026);
        let number: InvoiceNumber = NumberFixtures::expenses_2026(42).parse().unwrap();
        assert!(partition.contains(&number));

        assert!(NumberFixtures::first_fees_2026().parse::<InvoiceNumber>().is_ok());
        for malformed in NumberFixtures::malformed() {
            let fees = Partition::new("FEES", 2026);
            let counted = malformed
                .parse::<InvoiceNumber>()
                .map(|n| fees.contains(&n))
                .unwrap_or(false);
            assert!(!counted, "{} must not count", malformed);
        }
    }
}
