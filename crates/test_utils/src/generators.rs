//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::{Currency, Money};
use domain_billing::{InvoiceType, PaymentMethod};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::AED),
        Just(Currency::SAR),
        Just(Currency::KWD),
        Just(Currency::BHD),
        Just(Currency::OMR),
        Just(Currency::QAR),
        Just(Currency::EGP),
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
    ]
}

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for positive Money aligned to the currency's minor unit
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

/// Strategy for positive AED amounts
pub fn aed_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|amount| Money::from_minor(amount, Currency::AED))
}

/// Strategy for VAT percentages between 0 and 100 with up to two decimals
pub fn vat_percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..=10_000u32).prop_map(|n| Decimal::new(n as i64, 2))
}

/// Strategy for VAT percentages outside the accepted range
pub fn invalid_vat_percentage_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        (1i64..1_000_000i64).prop_map(|n| -Decimal::new(n, 2)),
        (10_001i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2)),
    ]
}

/// Strategy for the five recognized invoice types
pub fn recognized_invoice_type_strategy() -> impl Strategy<Value = InvoiceType> {
    prop_oneof![
        Just(InvoiceType::Fees),
        Just(InvoiceType::Expenses),
        Just(InvoiceType::Receipt),
        Just(InvoiceType::CreditNote),
        Just(InvoiceType::DebitNote),
    ]
}

/// Strategy for any invoice type, including unrecognized ones
pub fn invoice_type_strategy() -> impl Strategy<Value = InvoiceType> {
    prop_oneof![
        4 => recognized_invoice_type_strategy(),
        1 => "[a-z_]{1,12}".prop_map(InvoiceType::from),
    ]
}

/// Strategy for payment methods
pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::BankTransfer),
        Just(PaymentMethod::Cheque),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::Other),
    ]
}

/// Strategy for splitting a payment run into 1 to `max_parts` positive
/// minor-unit installments
pub fn installments_strategy(max_parts: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..1_000_000i64, 1..=max_parts)
}

/// Strategy for year values the numbering format accepts
pub fn year_strategy() -> impl Strategy<Value = i32> {
    2000i32..=2099i32
}
