//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for ledger types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_billing::{Invoice, InvoiceNumber, Partition, SEQUENCE_WIDTH};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Asserts that a Money value is positive
pub fn assert_money_positive(money: &Money) {
    assert!(money.is_positive(), "Expected positive money, got {}", money);
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts that money values sum to a total
///
/// # Panics
///
/// Panics if the currencies differ or the sum doesn't equal the total
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum = Money::sum(parts, total.currency()).expect("Currency mismatch in sum");

    assert_eq!(
        sum.amount(),
        total.amount(),
        "Sum of parts ({}) doesn't equal total ({})",
        sum.amount(),
        total.amount()
    );
}

/// Asserts the derived amounts of an invoice
///
/// `vat_amount` must be `amount * vat_percentage / 100` rounded half-up to
/// the minor unit, and `total_amount` the exact sum of the two.
pub fn assert_invoice_amounts_consistent(invoice: &Invoice) {
    let exact = invoice.amount.amount() * invoice.vat_percentage / dec!(100);
    let expected_vat = Money::new(exact, invoice.currency).round_half_up();

    assert_eq!(
        invoice.vat_amount.amount(),
        expected_vat.amount(),
        "Invoice {} VAT {} != {}% of {}",
        invoice.invoice_number,
        invoice.vat_amount,
        invoice.vat_percentage,
        invoice.amount
    );
    assert_money_sum_equals(&[invoice.amount, invoice.vat_amount], &invoice.total_amount);
    assert!(
        invoice.total_amount.fits_minor_unit(),
        "Invoice {} total {} is finer than the minor unit",
        invoice.invoice_number,
        invoice.total_amount
    );
}

/// Asserts that `number` is a well-formed number in `partition` and returns
/// its sequence
pub fn assert_number_in_partition(number: &str, partition: &Partition) -> u64 {
    let parsed: InvoiceNumber = number
        .parse()
        .unwrap_or_else(|e| panic!("{}", e));
    assert!(
        partition.contains(&parsed),
        "Invoice number {} is not in partition {}",
        number,
        partition
    );
    let digits = number.len() - partition.number_prefix().len();
    assert!(
        digits >= SEQUENCE_WIDTH,
        "Invoice number {} has fewer than {} sequence digits",
        number,
        SEQUENCE_WIDTH
    );
    parsed.sequence
}

/// Asserts that `numbers` are exactly sequences `1..=n` of `partition`,
/// in any order, with no gaps or duplicates
pub fn assert_contiguous_sequences<S: AsRef<str>>(numbers: &[S], partition: &Partition) {
    let mut sequences: Vec<u64> = numbers
        .iter()
        .map(|n| assert_number_in_partition(n.as_ref(), partition))
        .collect();
    sequences.sort_unstable();

    let expected: Vec<u64> = (1..=numbers.len() as u64).collect();
    assert_eq!(
        sequences, expected,
        "Sequences in {} are not contiguous from 1",
        partition
    );
}

/// Asserts that a decimal value is within a range
pub fn assert_decimal_in_range(value: Decimal, min: Decimal, max: Decimal) {
    assert!(
        value >= min && value <= max,
        "Decimal {} is not in range [{}, {}]",
        value,
        min,
        max
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
