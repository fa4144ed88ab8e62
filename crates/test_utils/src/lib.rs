//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! billing ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for money, rates, dates and ids
//! - `builders`: Builder patterns for invoice and payment test data
//! - `database`: PostgreSQL container management for store tests
//! - `assertions`: Custom assertion helpers for ledger types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
