//! Catalog items and the company directory.

use chrono::Utc;
use tracing::instrument;

use invoicer_catalog::{
    CatalogItem, Company, ItemDraft, ItemPatch, SUGGESTION_LIMIT, normalize_company_name,
};
use invoicer_core::{DomainError, ItemId};

use crate::invoices::ServiceError;
use crate::store::{CompanyDirectory, ItemRepository};

/// Result of submitting a company name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddCompanyOutcome {
    /// Nothing but whitespace was submitted.
    Blank,
    /// The name was already on file. Carries the full list of names.
    Existing(Vec<String>),
    /// The name was stored. Carries the full list of names.
    Added(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S> CatalogService<S>
where
    S: ItemRepository + CompanyDirectory,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn list_items(&self) -> Result<Vec<CatalogItem>, ServiceError> {
        Ok(self.store.list_items().await?)
    }

    #[instrument(skip(self, draft), err)]
    pub async fn create_item(&self, draft: ItemDraft) -> Result<CatalogItem, ServiceError> {
        let item = draft.into_item(ItemId::from_time(Utc::now()))?;
        let item = self.store.insert_item(item).await?;
        tracing::info!(item_id = %item.id, name = %item.name, "catalog item created");
        Ok(item)
    }

    #[instrument(skip(self, patch), fields(item_id = %id), err)]
    pub async fn update_item(
        &self,
        id: ItemId,
        patch: ItemPatch,
    ) -> Result<CatalogItem, ServiceError> {
        patch.validate()?;
        self.store
            .update_item(id, &patch)
            .await?
            .ok_or_else(|| item_not_found(id).into())
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    pub async fn delete_item(&self, id: ItemId) -> Result<(), ServiceError> {
        if self.store.delete_item(id).await? {
            Ok(())
        } else {
            Err(item_not_found(id).into())
        }
    }

    pub async fn company_names(&self) -> Result<Vec<String>, ServiceError> {
        Ok(names(self.store.list_companies().await?))
    }

    #[instrument(skip(self), err)]
    pub async fn add_company(&self, raw_name: &str) -> Result<AddCompanyOutcome, ServiceError> {
        let Some(name) = normalize_company_name(raw_name) else {
            return Ok(AddCompanyOutcome::Blank);
        };
        let added = self.store.add_company(Company::named(name)).await?;
        let all = self.company_names().await?;
        Ok(if added {
            AddCompanyOutcome::Added(all)
        } else {
            AddCompanyOutcome::Existing(all)
        })
    }

    /// Up to ten names matching `term`; an empty term returns the first ten.
    pub async fn suggest_companies(&self, term: &str) -> Result<Vec<String>, ServiceError> {
        let term = term.trim();
        Ok(names(
            self.store.suggest_companies(term, SUGGESTION_LIMIT).await?,
        ))
    }
}

fn names(companies: Vec<Company>) -> Vec<String> {
    companies.into_iter().map(|c| c.name).collect()
}

fn item_not_found(id: ItemId) -> DomainError {
    DomainError::not_found(format!("item {id}"))
}
