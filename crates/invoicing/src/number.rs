//! Invoice number labels and numeric-run extraction.

use serde::{Deserialize, Serialize};

use invoicer_core::ValueObject;

/// Largest sequence value. Counters are stored as signed 64-bit integers.
pub const MAX_SEQUENCE: u64 = i64::MAX as u64;

/// Extract the first contiguous run of ASCII decimal digits from a label.
///
/// `"INV-42"` yields 42 and `"INV-007"` yields 7. Only the first run is
/// considered, so `"INV-2024-007"` yields 2024. Labels without digits, and runs
/// above [`MAX_SEQUENCE`], yield `None`.
pub fn extract_first_numeric_run(label: &str) -> Option<u64> {
    let start = label.find(|c: char| c.is_ascii_digit())?;
    let run = &label[start..];
    let end = run
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(run.len());
    run[..end]
        .parse::<u64>()
        .ok()
        .filter(|n| *n <= MAX_SEQUENCE)
}

/// Human-facing invoice label (e.g. `"INV-42"`), unique across invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Numeric run used for sequencing, if the label has one.
    pub fn numeric_run(&self) -> Option<u64> {
        extract_first_numeric_run(&self.0)
    }

    /// Label for a sequence value in the form the invoice form proposes.
    pub fn with_sequence(prefix: &str, sequence: u64) -> Self {
        Self(format!("{prefix}{sequence}"))
    }
}

impl ValueObject for InvoiceNumber {}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InvoiceNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InvoiceNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}
