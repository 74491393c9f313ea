use std::sync::Arc;

use invoicer_infra::{CatalogService, DocumentStore, InMemoryStore, InvoiceService, StoreError};

use crate::config::AppConfig;

#[cfg(feature = "postgres")]
use invoicer_infra::PostgresStore;

/// Backend shared by every service.
pub type SharedStore = Arc<dyn DocumentStore>;

#[derive(Clone)]
pub struct AppServices {
    pub invoices: InvoiceService<SharedStore>,
    pub catalog: CatalogService<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            invoices: InvoiceService::new(store.clone()),
            catalog: CatalogService::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    if config.use_persistent_stores {
        #[cfg(feature = "postgres")]
        {
            return build_persistent_services(config).await;
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
            );
            return Ok(AppServices::in_memory());
        }
    }

    Ok(AppServices::in_memory())
}

#[cfg(feature = "postgres")]
async fn build_persistent_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| StoreError::Unavailable("DATABASE_URL not set".to_string()))?;

    let store = PostgresStore::connect(url).await?;
    store.migrate().await?;
    tracing::info!("using postgres document store");

    Ok(AppServices::new(Arc::new(store)))
}
