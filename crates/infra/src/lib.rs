//! Infrastructure layer: document stores, the invoice sequence allocator and
//! the services the HTTP layer calls.

pub mod catalog;
pub mod invoices;
pub mod sequence;
pub mod store;

pub use catalog::{AddCompanyOutcome, CatalogService};
pub use invoices::{InvoiceService, ServiceError};
pub use sequence::{INVOICE_COUNTER_KEY, InvoiceSequence, SequenceError};
pub use store::{DocumentStore, InMemoryStore, StoreError};

#[cfg(feature = "postgres")]
pub use store::PostgresStore;
