//! Invoicing domain module.
//!
//! Business rules for invoice documents: number labels and their numeric
//! runs, line amounts, totals and proportional rate rebalancing. Pure logic
//! only (no IO, no HTTP, no storage).

pub mod invoice;
pub mod number;
pub mod totals;

pub use invoice::{Invoice, InvoiceLine};
pub use number::{InvoiceNumber, MAX_SEQUENCE, extract_first_numeric_run};
pub use totals::{Totals, rebalance_to_total};
