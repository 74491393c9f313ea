//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a predefined catalog item.
///
/// Items are keyed by a plain integer. Clients may choose one; when they do
/// not, the store assigns one derived from the creation time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(i64);

impl ItemId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Derive an identifier from a point in time (Unix milliseconds).
    pub fn from_time(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis())
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for ItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|e| DomainError::validation(format!("ItemId: {e}")))?;
        Ok(Self(value))
    }
}
