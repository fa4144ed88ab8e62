//! Core Kernel - Foundational types for the billing ledger
//!
//! This crate provides the building blocks shared by every other crate:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - Port error and health types for the adapters

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError, Rate};
pub use identifiers::{CaseId, InvoiceId, PaymentId};
pub use ports::{PortError, DomainPort, AdapterHealth, HealthCheckable, HealthCheckResult};
