use serde::{Deserialize, Serialize};

use invoicer_core::{DomainError, DomainResult, Entity, ItemId, lenient};

/// Predefined item with a default rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub rate: f64,
}

impl Entity for CatalogItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Request to create an item. The id is optional; the store assigns one when
/// the client does not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rate: f64,
}

impl ItemDraft {
    /// Validate and turn the draft into an item, using `fallback_id` when the
    /// client did not choose one.
    pub fn into_item(self, fallback_id: ItemId) -> DomainResult<CatalogItem> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("item name is required"));
        }
        ensure_rate(self.rate)?;
        Ok(CatalogItem {
            id: self.id.unwrap_or(fallback_id),
            name: name.to_string(),
            rate: self.rate,
        })
    }
}

/// Partial update: absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rate: Option<f64>,
}

impl ItemPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("item name must not be blank"));
            }
        }
        if let Some(rate) = self.rate {
            ensure_rate(rate)?;
        }
        Ok(())
    }

    pub fn apply(&self, item: &mut CatalogItem) {
        if let Some(name) = &self.name {
            item.name = name.trim().to_string();
        }
        if let Some(rate) = self.rate {
            item.rate = rate;
        }
    }
}

fn ensure_rate(rate: f64) -> DomainResult<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(DomainError::validation(
            "item rate must be a non-negative number",
        ));
    }
    Ok(())
}
