//! Repository implementations
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! plain column values. Queries are checked at runtime, so the crate builds
//! without a live database.

pub mod billing;

pub use billing::BillingRepository;
