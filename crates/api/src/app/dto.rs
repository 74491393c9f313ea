use chrono::NaiveDate;
use serde::Deserialize;

use invoicer_core::{DomainError, DomainResult, lenient};
use invoicer_invoicing::InvoiceLine;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /companies`: a bare JSON string, `{"name": ..}` or `{"value": ..}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AddCompanyRequest {
    Bare(String),
    Named { name: String },
    Valued { value: String },
}

impl AddCompanyRequest {
    pub fn into_name(self) -> String {
        match self {
            Self::Bare(name) | Self::Named { name } | Self::Valued { value: name } => name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionQuery {
    #[serde(default)]
    pub q: String,
}

/// Body of `POST /invoices/rebalance`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRequest {
    #[serde(default)]
    pub items: Vec<InvoiceLine>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tax_rate: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub discount: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub target_total: f64,
}

impl RebalanceRequest {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_non_negative("targetTotal", self.target_total)?;
        ensure_non_negative("taxRate", self.tax_rate)?;
        ensure_non_negative("discount", self.discount)?;
        for (idx, line) in self.items.iter().enumerate() {
            ensure_non_negative(&format!("items[{idx}].rate"), line.rate)?;
            ensure_non_negative(&format!("items[{idx}].quantity"), line.quantity)?;
        }
        Ok(())
    }
}

fn ensure_non_negative(field: &str, value: f64) -> DomainResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(())
}

// -------------------------
// Response helpers
// -------------------------

/// Attachment name for an export taken on `day`.
pub fn export_filename(day: NaiveDate) -> String {
    format!("invoices_{}.json", day.format("%Y-%m-%d"))
}
