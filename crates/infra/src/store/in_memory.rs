use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use invoicer_catalog::{CatalogItem, Company, ItemPatch};
use invoicer_core::{Entity, ItemId};
use invoicer_invoicing::{Invoice, InvoiceNumber};

use super::{CompanyDirectory, CounterStore, InvoiceRepository, ItemRepository, StoreError};

/// In-memory document store.
///
/// Intended for tests/dev. Every operation holds a single lock for its whole
/// duration, which gives the counter its compare-and-advance atomicity.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    invoices: RwLock<HashMap<InvoiceNumber, Invoice>>,
    counters: RwLock<HashMap<String, u64>>,
    items: RwLock<BTreeMap<ItemId, CatalogItem>>,
    companies: RwLock<Vec<Company>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
}

fn newest_first(invoices: &HashMap<InvoiceNumber, Invoice>) -> Vec<&Invoice> {
    let mut all: Vec<&Invoice> = invoices.values().collect();
    // `None` sorts before `Some`, so unsaved documents end up last.
    all.sort_by(|a, b| {
        b.saved_at
            .cmp(&a.saved_at)
            .then_with(|| a.invoice_number.cmp(&b.invoice_number))
    });
    all
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let invoices = read(&self.invoices)?;
        Ok(newest_first(&invoices).into_iter().cloned().collect())
    }

    async fn find_invoice(&self, number: &InvoiceNumber) -> Result<Option<Invoice>, StoreError> {
        Ok(read(&self.invoices)?.get(number).cloned())
    }

    async fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, StoreError> {
        let mut invoices = write(&self.invoices)?;
        if invoices.contains_key(invoice.id()) {
            return Err(StoreError::Duplicate(format!(
                "invoice number '{}' already exists",
                invoice.id()
            )));
        }
        invoices.insert(invoice.id().clone(), invoice.clone());
        Ok(invoice)
    }

    async fn replace_invoice(&self, invoice: Invoice) -> Result<Option<Invoice>, StoreError> {
        let mut invoices = write(&self.invoices)?;
        match invoices.get_mut(invoice.id()) {
            Some(slot) => {
                *slot = invoice.clone();
                Ok(Some(invoice))
            }
            None => Ok(None),
        }
    }

    async fn delete_invoice(&self, number: &InvoiceNumber) -> Result<bool, StoreError> {
        Ok(write(&self.invoices)?.remove(number).is_some())
    }

    async fn scan_invoice_numbers(&self) -> Result<Vec<InvoiceNumber>, StoreError> {
        let invoices = read(&self.invoices)?;
        Ok(newest_first(&invoices)
            .into_iter()
            .map(|i| i.invoice_number.clone())
            .collect())
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn read_counter(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(read(&self.counters)?.get(key).copied())
    }

    async fn advance_counter(&self, key: &str, candidate: u64) -> Result<u64, StoreError> {
        let mut counters = write(&self.counters)?;
        let slot = counters.entry(key.to_string()).or_insert(candidate);
        if candidate > *slot {
            *slot = candidate;
        }
        Ok(*slot)
    }
}

#[async_trait]
impl ItemRepository for InMemoryStore {
    async fn list_items(&self) -> Result<Vec<CatalogItem>, StoreError> {
        Ok(read(&self.items)?.values().cloned().collect())
    }

    async fn insert_item(&self, item: CatalogItem) -> Result<CatalogItem, StoreError> {
        let mut items = write(&self.items)?;
        if items.contains_key(item.id()) {
            return Err(StoreError::Duplicate(format!("item id {} already exists", item.id())));
        }
        items.insert(*item.id(), item.clone());
        Ok(item)
    }

    async fn update_item(
        &self,
        id: ItemId,
        patch: &ItemPatch,
    ) -> Result<Option<CatalogItem>, StoreError> {
        let mut items = write(&self.items)?;
        Ok(items.get_mut(&id).map(|item| {
            patch.apply(item);
            item.clone()
        }))
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError> {
        Ok(write(&self.items)?.remove(&id).is_some())
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryStore {
    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        Ok(read(&self.companies)?.clone())
    }

    async fn add_company(&self, company: Company) -> Result<bool, StoreError> {
        let mut companies = write(&self.companies)?;
        if companies.iter().any(|c| c.id() == company.id()) {
            return Ok(false);
        }
        companies.push(company);
        Ok(true)
    }

    async fn suggest_companies(&self, term: &str, limit: usize) -> Result<Vec<Company>, StoreError> {
        Ok(read(&self.companies)?
            .iter()
            .filter(|c| c.matches(term))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn saved(number: &str, minute: u32) -> Invoice {
        let mut inv = Invoice::new(number, "2024-01-01");
        inv.mark_saved(Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap());
        inv
    }

    #[tokio::test]
    async fn invoices_are_listed_newest_first_and_numbers_are_unique() {
        let store = InMemoryStore::new();
        store.insert_invoice(saved("INV-1", 1)).await.unwrap();
        store.insert_invoice(saved("INV-2", 5)).await.unwrap();
        store.insert_invoice(saved("INV-3", 3)).await.unwrap();

        let err = store.insert_invoice(saved("INV-2", 9)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let numbers: Vec<String> = store
            .scan_invoice_numbers()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(numbers, ["INV-2", "INV-3", "INV-1"]);
    }

    #[tokio::test]
    async fn replace_and_delete_report_missing_documents() {
        let store = InMemoryStore::new();
        assert!(store.replace_invoice(saved("INV-1", 0)).await.unwrap().is_none());
        assert!(!store.delete_invoice(&"INV-1".into()).await.unwrap());

        store.insert_invoice(saved("INV-1", 0)).await.unwrap();
        let mut edited = saved("INV-1", 0);
        edited.to_name = "Gupta".into();
        store.replace_invoice(edited).await.unwrap().unwrap();
        let found = store.find_invoice(&"INV-1".into()).await.unwrap().unwrap();
        assert_eq!(found.to_name, "Gupta");

        assert!(store.delete_invoice(&"INV-1".into()).await.unwrap());
        assert!(store.find_invoice(&"INV-1".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counter_never_moves_backwards() {
        let store = InMemoryStore::new();
        assert_eq!(store.read_counter("k").await.unwrap(), None);
        assert_eq!(store.advance_counter("k", 5).await.unwrap(), 5);
        assert_eq!(store.advance_counter("k", 3).await.unwrap(), 5);
        assert_eq!(store.advance_counter("k", 8).await.unwrap(), 8);
        assert_eq!(store.read_counter("k").await.unwrap(), Some(8));
        assert_eq!(store.read_counter("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn items_are_ordered_by_id_and_patched_in_place() {
        let store = InMemoryStore::new();
        for (id, name) in [(30, "Besan"), (10, "Atta"), (20, "Suji")] {
            store
                .insert_item(CatalogItem { id: ItemId::new(id), name: name.into(), rate: 1.0 })
                .await
                .unwrap();
        }
        let names: Vec<String> = store.list_items().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["Atta", "Suji", "Besan"]);

        let patch = ItemPatch { name: None, rate: Some(42.0) };
        let updated = store.update_item(ItemId::new(20), &patch).await.unwrap().unwrap();
        assert_eq!(updated.rate, 42.0);
        assert_eq!(updated.name, "Suji");
        assert!(store.update_item(ItemId::new(99), &patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn companies_deduplicate_by_name_and_suggest_with_limit() {
        let store = InMemoryStore::new();
        assert!(store.add_company(Company::named("Alpha Mills")).await.unwrap());
        assert!(!store.add_company(Company::named("Alpha Mills")).await.unwrap());
        for i in 0..12 {
            store.add_company(Company::named(format!("Beta {i}"))).await.unwrap();
        }

        let hits = store.suggest_companies("beta", 10).await.unwrap();
        assert_eq!(hits.len(), 10);
        assert_eq!(hits[0].name, "Beta 0");

        let hits = store.suggest_companies("MILLS", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
