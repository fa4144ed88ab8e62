//! Invoice numbering
//!
//! Invoice numbers have the durable external format `{PREFIX}-{YEAR}-{SEQ}`
//! with `SEQ` zero-padded to six digits. Within a partition (prefix and
//! year) lexicographic order of the numbers matches allocation order up to
//! 999999; beyond that the field widens rather than wrapping.
//!
//! Allocation never reads the last number and adds one in process. The
//! [`InvoiceSequencer`] delegates to [`LedgerStore::next_sequence`], which
//! must increment and return the partition counter in one atomic store
//! operation so that concurrent writers, including other service instances,
//! can never receive the same value. A number whose invoice is never
//! persisted is simply skipped; gaps are expected.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::BillingError;
use crate::invoice::InvoiceType;
use crate::ports::LedgerStore;

/// Minimum width of the sequence field
pub const SEQUENCE_WIDTH: usize = 6;

/// The `(prefix, year)` grouping within which sequence numbers are unique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub prefix: &'static str,
    pub year: i32,
}

impl Partition {
    pub fn new(prefix: &'static str, year: i32) -> Self {
        Self { prefix, year }
    }

    /// Partition for an invoice type in a given year
    pub fn for_type(invoice_type: &InvoiceType, year: i32) -> Self {
        Self::new(invoice_type.prefix(), year)
    }

    /// The `{PREFIX}-{YEAR}-` prefix shared by every number in the partition
    pub fn number_prefix(&self) -> String {
        format!("{}-{}-", self.prefix, self.year)
    }

    /// Builds the invoice number for a sequence value in this partition
    pub fn number(&self, sequence: u64) -> InvoiceNumber {
        InvoiceNumber {
            prefix: self.prefix.to_string(),
            year: self.year,
            sequence,
        }
    }

    /// Returns true if `number` belongs to this partition
    pub fn contains(&self, number: &InvoiceNumber) -> bool {
        number.prefix == self.prefix && number.year == self.year
    }

    /// Greatest sequence among `numbers` that belong to this partition
    ///
    /// Strings that do not parse as invoice numbers are skipped. Used to
    /// seed a partition counter from invoices that predate it.
    pub fn highest_sequence<'a, I>(&self, numbers: I) -> u64
    where
        I: IntoIterator<Item = &'a str>,
    {
        numbers
            .into_iter()
            .filter_map(|raw| raw.parse::<InvoiceNumber>().ok())
            .filter(|number| self.contains(number))
            .map(|number| number.sequence)
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.year)
    }
}

/// A parsed invoice number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvoiceNumber {
    pub prefix: String,
    pub year: i32,
    pub sequence: u64,
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:0width$}",
            self.prefix,
            self.year,
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

/// Error returned when a string is not a well-formed invoice number
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed invoice number '{0}'")]
pub struct InvoiceNumberError(pub String);

impl FromStr for InvoiceNumber {
    type Err = InvoiceNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || InvoiceNumberError(s.to_string());

        let mut parts = s.split('-');
        let (prefix, year, sequence) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(year), Some(sequence), None) => (prefix, year, sequence),
            _ => return Err(malformed()),
        };

        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if prefix.is_empty()
            || !prefix.bytes().all(|b| b.is_ascii_uppercase())
            || year.len() != 4
            || !all_digits(year)
            || sequence.len() < SEQUENCE_WIDTH
            || !all_digits(sequence)
        {
            return Err(malformed());
        }

        Ok(Self {
            prefix: prefix.to_string(),
            year: year.parse().map_err(|_| malformed())?,
            sequence: sequence.parse().map_err(|_| malformed())?,
        })
    }
}

/// Allocates invoice numbers through the store's atomic counter
#[derive(Clone)]
pub struct InvoiceSequencer {
    store: Arc<dyn LedgerStore>,
}

impl InvoiceSequencer {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Allocates the next number for `invoice_type` in `year`
    ///
    /// # Errors
    ///
    /// `SequencingUnavailable` if the store cannot perform the atomic
    /// increment. Nothing has been allocated in that case.
    #[instrument(skip(self), fields(invoice_type = %invoice_type))]
    pub async fn allocate(
        &self,
        invoice_type: &InvoiceType,
        year: i32,
    ) -> Result<InvoiceNumber, BillingError> {
        let partition = Partition::for_type(invoice_type, year);

        let sequence = self
            .store
            .next_sequence(&partition)
            .await
            .map_err(|e| BillingError::SequencingUnavailable(format!("{}: {}", partition, e)))?;

        let number = partition.number(sequence);
        debug!(%number, "allocated invoice number");
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_pads_to_six_digits() {
        let number = Partition::new("FEES", 2026).number(42);
        assert_eq!(number.to_string(), "FEES-2026-000042");
    }

    #[test]
    fn test_format_widens_past_six_digits() {
        let number = Partition::new("CN", 2026).number(1_000_000);
        assert_eq!(number.to_string(), "CN-2026-1000000");
    }

    #[test]
    fn test_parse() {
        let number: InvoiceNumber = "RCPT-2025-000913".parse().unwrap();
        assert_eq!(number.prefix, "RCPT");
        assert_eq!(number.year, 2025);
        assert_eq!(number.sequence, 913);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["", "FEES", "FEES-2026", "FEES-26-000001", "fees-2026-000001", "FEES-2026-12", "FEES-2026-00000x", "FEES-2026-000001-1"] {
            assert!(raw.parse::<InvoiceNumber>().is_err(), "{} should not parse", raw);
        }
    }

    #[test]
    fn test_highest_sequence_only_counts_partition() {
        let partition = Partition::new("FEES", 2026);
        let numbers = [
            "FEES-2026-000007",
            "FEES-2026-000012",
            "FEES-2025-000099",
            "EXP-2026-000500",
            "garbage",
        ];
        assert_eq!(partition.highest_sequence(numbers), 12);
        assert_eq!(Partition::new("DN", 2026).highest_sequence(numbers), 0);
    }

    proptest! {
        #[test]
        fn sort_order_matches_sequence_order(a in 1u64..999_999u64, b in 1u64..999_999u64) {
            let partition = Partition::new("EXP", 2026);
            let (na, nb) = (partition.number(a).to_string(), partition.number(b).to_string());
            prop_assert_eq!(na.cmp(&nb), a.cmp(&b));
        }

        #[test]
        fn formatted_numbers_parse_back(seq in 1u64..100_000_000u64, year in 2000i32..2100i32) {
            let number = Partition::new("DN", year).number(seq);
            let parsed: InvoiceNumber = number.to_string().parse().unwrap();
            prop_assert_eq!(parsed, number);
        }
    }
}
