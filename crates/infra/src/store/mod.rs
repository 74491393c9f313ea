//! Document storage boundary.
//!
//! Four narrow traits describe what the services need from persistence:
//! invoice documents, named counters, catalog items and the company
//! directory. `InMemoryStore` backs tests/dev; `PostgresStore` (feature
//! `postgres`) backs production.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use invoicer_catalog::{CatalogItem, Company, ItemPatch};
use invoicer_core::ItemId;
use invoicer_invoicing::{Invoice, InvoiceNumber};

pub use in_memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// Storage operation error.
///
/// These are infrastructure failures, as opposed to domain errors
/// (validation, invariants). Callers decide whether to retry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected the write.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// A value does not fit the backend's column type.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// A stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Invoice documents keyed by their unique invoice number.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// All invoices, most recently saved first.
    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError>;

    async fn find_invoice(&self, number: &InvoiceNumber) -> Result<Option<Invoice>, StoreError>;

    /// Insert a new document; `StoreError::Duplicate` if the number is taken.
    async fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, StoreError>;

    /// Replace the document with the same number. `None` if there is none.
    async fn replace_invoice(&self, invoice: Invoice) -> Result<Option<Invoice>, StoreError>;

    /// Returns whether a document was removed.
    async fn delete_invoice(&self, number: &InvoiceNumber) -> Result<bool, StoreError>;

    /// Every stored invoice number, most recently saved first.
    async fn scan_invoice_numbers(&self) -> Result<Vec<InvoiceNumber>, StoreError>;
}

/// Named monotone counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn read_counter(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Atomically raise the counter to `candidate` if it is absent or lower.
    ///
    /// Returns the value stored after the operation, which is never below
    /// the previous value. Implementations must perform the comparison and
    /// the write as one step.
    async fn advance_counter(&self, key: &str, candidate: u64) -> Result<u64, StoreError>;
}

/// Predefined catalog items.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// All items by ascending id.
    async fn list_items(&self) -> Result<Vec<CatalogItem>, StoreError>;

    /// `StoreError::Duplicate` if the id is taken.
    async fn insert_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError>;

    async fn update_item(
        &self,
        id: ItemId,
        patch: &ItemPatch,
    ) -> Result<Option<CatalogItem>, StoreError>;

    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError>;
}

/// Company directory used for customer autofill.
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// All companies in insertion order.
    async fn list_companies(&self) -> Result<Vec<Company>, StoreError>;

    /// Returns `false` if a company with the same name already exists.
    async fn add_company(&self, company: Company) -> Result<bool, StoreError>;

    /// Companies whose name or Hindi name contains `term` (case-insensitive).
    async fn suggest_companies(&self, term: &str, limit: usize) -> Result<Vec<Company>, StoreError>;
}

/// Everything the HTTP front door needs from one backend.
pub trait DocumentStore: InvoiceRepository + CounterStore + ItemRepository + CompanyDirectory {}

impl<T> DocumentStore for T where T: InvoiceRepository + CounterStore + ItemRepository + CompanyDirectory {}

#[async_trait]
impl<S> InvoiceRepository for Arc<S>
where
    S: InvoiceRepository + ?Sized,
{
    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        (**self).list_invoices().await
    }

    async fn find_invoice(&self, number: &InvoiceNumber) -> Result<Option<Invoice>, StoreError> {
        (**self).find_invoice(number).await
    }

    async fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, StoreError> {
        (**self).insert_invoice(invoice).await
    }

    async fn replace_invoice(&self, invoice: Invoice) -> Result<Option<Invoice>, StoreError> {
        (**self).replace_invoice(invoice).await
    }

    async fn delete_invoice(&self, number: &InvoiceNumber) -> Result<bool, StoreError> {
        (**self).delete_invoice(number).await
    }

    async fn scan_invoice_numbers(&self) -> Result<Vec<InvoiceNumber>, StoreError> {
        (**self).scan_invoice_numbers().await
    }
}

#[async_trait]
impl<S> CounterStore for Arc<S>
where
    S: CounterStore + ?Sized,
{
    async fn read_counter(&self, key: &str) -> Result<Option<u64>, StoreError> {
        (**self).read_counter(key).await
    }

    async fn advance_counter(&self, key: &str, candidate: u64) -> Result<u64, StoreError> {
        (**self).advance_counter(key, candidate).await
    }
}

#[async_trait]
impl<S> ItemRepository for Arc<S>
where
    S: ItemRepository + ?Sized,
{
    async fn list_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        (**self).list_items().await
    }

    async fn insert_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError> {
        (**self).insert_item(item).await
    }

    async fn update_item(
        &self,
        id: ItemId,
        patch: &ItemPatch,
    ) -> Result<Option<CatalogItem>, StoreError> {
        (**self).update_item(id, patch).await
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError> {
        (**self).delete_item(id).await
    }
}

#[async_trait]
impl<S> CompanyDirectory for Arc<S>
where
    S: CompanyDirectory + ?Sized,
{
    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        (**self).list_companies().await
    }

    async fn add_company(&self, company: Company) -> Result<bool, StoreError> {
        (**self).add_company(company).await
    }

    async fn suggest_companies(&self, term: &str, limit: usize) -> Result<Vec<Company>, StoreError> {
        (**self).suggest_companies(term, limit).await
    }
}
