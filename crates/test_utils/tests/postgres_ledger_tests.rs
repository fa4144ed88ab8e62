//! PostgreSQL ledger store tests
//!
//! Each test starts its own container; run with `cargo test -- --ignored`
//! on a machine with Docker.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use rust_decimal_macros::dec;

use core_kernel::{Currency, HealthCheckable, InvoiceId, Money, PortError};
use domain_billing::{
    BillingError, DerivedStatus, InvoiceAmounts, InvoiceChanges, InvoiceLedger, InvoiceQuery,
    InvoiceStatus, InvoiceType, LedgerSettings, LedgerStore, Partition, PaymentProcessor,
};
use test_utils::{
    assert_contiguous_sequences, assert_err_variant, assert_invoice_amounts_consistent, db_test,
    CreateInvoiceBuilder, IdFixtures, InvoiceBuilder, MoneyFixtures, PaymentBuilder,
    RecordPaymentBuilder, TemporalFixtures,
};

db_test!(test_concurrent_creation_yields_contiguous_numbers, |db, store| {
    let ledger = InvoiceLedger::new(store.clone(), LedgerSettings::default());
    let case_id = IdFixtures::new_case_id();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .create_invoice_at(
                        CreateInvoiceBuilder::new().case_id(case_id).build(),
                        TemporalFixtures::issued_at(),
                    )
                    .await
            })
        })
        .collect();

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap().invoice_number);
    }

    assert_contiguous_sequences(&numbers, &Partition::new("FEES", 2026));
    assert_eq!(ledger.invoices_for_case(case_id).await.unwrap().len(), 32);
    drop(db);
});

db_test!(test_counter_seeded_from_existing_numbers, |db, store| {
    store
        .insert_invoice(&InvoiceBuilder::new().invoice_type(InvoiceType::Expenses).sequence(41).build())
        .await
        .unwrap();
    // Too few digits, must not count toward the seed
    store
        .insert_invoice(&InvoiceBuilder::new().invoice_number("EXP-2026-99").build())
        .await
        .unwrap();

    let expenses = Partition::new("EXP", 2026);
    assert_eq!(store.next_sequence(&expenses).await.unwrap(), 42);
    assert_eq!(store.next_sequence(&expenses).await.unwrap(), 43);

    // Other partitions start from scratch
    assert_eq!(store.next_sequence(&Partition::new("EXP", 2027)).await.unwrap(), 1);
    assert_eq!(store.next_sequence(&Partition::new("FEES", 2026)).await.unwrap(), 1);
    drop(db);
});

db_test!(test_duplicate_number_is_conflict, |db, store| {
    let first = InvoiceBuilder::new().sequence(7).build();
    let second = InvoiceBuilder::new().sequence(7).build();

    store.insert_invoice(&first).await.unwrap();
    assert_err_variant!(store.insert_invoice(&second).await, PortError::Conflict { .. });
    drop(db);
});

db_test!(test_invoice_round_trip, |db, store| {
    let invoice = InvoiceBuilder::new()
        .amount(MoneyFixtures::kwd_250())
        .vat_percentage(dec!(12.5))
        .due_date(TemporalFixtures::due_date())
        .build();
    store.insert_invoice(&invoice).await.unwrap();

    let loaded = store.get_invoice(invoice.id).await.unwrap();
    assert_eq!(loaded.invoice_number, invoice.invoice_number);
    assert_eq!(loaded.currency, Currency::KWD);
    assert_eq!(loaded.amount, invoice.amount);
    assert_eq!(loaded.vat_amount.amount(), dec!(31.250));
    assert_eq!(loaded.total_amount.to_canonical_string(), "281.250");
    assert_eq!(loaded.due_date, Some(TemporalFixtures::due_date()));
    assert_eq!(loaded.issued_date.timestamp(), invoice.issued_date.timestamp());
    assert_invoice_amounts_consistent(&loaded);

    assert_err_variant!(store.get_invoice(InvoiceId::new()).await, PortError::NotFound { .. });
    drop(db);
});

db_test!(test_status_never_regresses, |db, store| {
    let invoice = InvoiceBuilder::new().build();
    store.insert_invoice(&invoice).await.unwrap();
    let stamp = store.get_invoice(invoice.id).await.unwrap().updated_at;

    assert!(store.advance_invoice_status(invoice.id, InvoiceStatus::Partial, stamp).await.unwrap());
    let partial = store.get_invoice(invoice.id).await.unwrap();
    assert!(partial.updated_at > stamp);
    assert!(!store
        .advance_invoice_status(invoice.id, InvoiceStatus::Pending, partial.updated_at)
        .await
        .unwrap());
    assert_eq!(store.get_invoice(invoice.id).await.unwrap().status, InvoiceStatus::Partial);

    // Written against the older snapshot
    assert_err_variant!(
        store.advance_invoice_status(invoice.id, InvoiceStatus::Paid, stamp).await,
        PortError::Conflict { .. }
    );
    assert!(store
        .advance_invoice_status(invoice.id, InvoiceStatus::Paid, partial.updated_at)
        .await
        .unwrap());
    assert_err_variant!(
        store.advance_invoice_status(InvoiceId::new(), InvoiceStatus::Paid, stamp).await,
        PortError::NotFound { .. }
    );
    drop(db);
});

db_test!(test_payment_invalidates_derived_status, |db, store| {
    let invoice = InvoiceBuilder::new().build();
    store.insert_invoice(&invoice).await.unwrap();
    let snapshot = store.get_invoice(invoice.id).await.unwrap();

    store
        .insert_payment(&PaymentBuilder::for_invoice(&invoice, dec!(10)).build())
        .await
        .unwrap();

    let changes = InvoiceChanges {
        amounts: Some(InvoiceAmounts::compute(MoneyFixtures::aed_1000(), dec!(5)).unwrap()),
        derived_status: Some(DerivedStatus {
            status: InvoiceStatus::Pending,
            derived_at: snapshot.updated_at,
        }),
        ..Default::default()
    };
    assert_err_variant!(store.update_invoice(invoice.id, &changes).await, PortError::Conflict { .. });

    let edit = InvoiceChanges {
        description: Some("Edited".to_string()),
        ..Default::default()
    };
    store.set_invoice_status(invoice.id, InvoiceStatus::Partial).await.unwrap();
    let edited = store.update_invoice(invoice.id, &edit).await.unwrap();
    assert_eq!(edited.description, "Edited");
    assert_eq!(edited.status, InvoiceStatus::Partial);
    drop(db);
});

db_test!(test_payment_needs_existing_invoice, |db, store| {
    let invoice = InvoiceBuilder::new().build();
    assert_err_variant!(
        store.insert_payment(&PaymentBuilder::for_invoice(&invoice, dec!(10)).build()).await,
        PortError::NotFound { .. }
    );

    store.insert_invoice(&invoice).await.unwrap();
    store
        .insert_payment(&PaymentBuilder::for_invoice(&invoice, dec!(10)).build())
        .await
        .unwrap();
    assert_err_variant!(store.delete_invoice(invoice.id).await, PortError::Conflict { .. });
    drop(db);
});

db_test!(test_payments_drive_status, |db, store| {
    let ledger = InvoiceLedger::new(store.clone(), LedgerSettings::default());
    let processor = PaymentProcessor::new(store.clone());
    let invoice = ledger
        .create_invoice(CreateInvoiceBuilder::new().amount(dec!(1000)).build())
        .await
        .unwrap();
    let year = Utc::now().year();
    assert_eq!(invoice.invoice_number, format!("FEES-{}-000001", year));

    processor
        .record_payment(RecordPaymentBuilder::for_invoice(&invoice, dec!(500)).build())
        .await
        .unwrap();
    assert_eq!(ledger.get_invoice(invoice.id).await.unwrap().status, InvoiceStatus::Partial);

    processor
        .record_payment(RecordPaymentBuilder::for_invoice(&invoice, dec!(600)).build())
        .await
        .unwrap();
    let balance = processor.balance(invoice.id).await.unwrap();
    assert_eq!(balance.status, InvoiceStatus::Paid);
    assert_eq!(balance.credit_balance, Money::new(dec!(50.00), Currency::AED));

    let payments = processor.payments_for_case(invoice.case_id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].amount.amount(), dec!(500));
    drop(db);
});

db_test!(test_delete_removes_payments, |db, store| {
    let ledger = InvoiceLedger::new(store.clone(), LedgerSettings::default());
    let invoice = InvoiceBuilder::new().case_id(IdFixtures::other_case_id()).build();
    store.insert_invoice(&invoice).await.unwrap();
    store
        .insert_payment(&PaymentBuilder::for_invoice(&invoice, dec!(10)).build())
        .await
        .unwrap();

    ledger.delete_invoice(invoice.id).await.unwrap();

    assert!(store.payments_for_invoice(invoice.id).await.unwrap().is_empty());
    assert!(store
        .find_invoices(InvoiceQuery::by_case(invoice.case_id))
        .await
        .unwrap()
        .is_empty());
    assert_err_variant!(ledger.delete_invoice(invoice.id).await, BillingError::NotFound(_));
    drop(db);
});

db_test!(test_health_and_clear, |db, store| {
    assert!(store.health_check().await.is_operational());

    store.insert_invoice(&InvoiceBuilder::new().build()).await.unwrap();
    db.clear_data().await.unwrap();
    assert!(store.find_invoices(InvoiceQuery::default()).await.unwrap().is_empty());

    let store: Arc<dyn LedgerStore> = store;
    assert_eq!(store.next_sequence(&Partition::new("FEES", 2026)).await.unwrap(), 1);
});
