use serde::{Deserialize, Serialize};

use invoicer_core::Entity;

/// Maximum number of names returned by a suggestion lookup.
pub const SUGGESTION_LIMIT: usize = 10;

/// Company directory entry, keyed by its display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Company {
    pub name: String,
    pub name_hindi: String,
    pub address: String,
    pub vehicle: String,
}

impl Company {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Case-insensitive substring match on either name.
    ///
    /// An empty term matches every company.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term) || self.name_hindi.to_lowercase().contains(&term)
    }
}

impl Entity for Company {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.name
    }
}

/// Trim a submitted company name; blank names yield `None`.
pub fn normalize_company_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
