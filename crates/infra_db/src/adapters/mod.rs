//! Domain Adapters
//!
//! Adapter implementations connecting domain ports to PostgreSQL. Each
//! adapter implements a port trait, converts rows to domain models and
//! translates database errors.

pub mod ledger;

pub use ledger::PostgresLedgerStore;
