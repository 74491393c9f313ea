use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use invoicer_core::{DomainError, DomainResult, Entity, lenient};

use crate::number::InvoiceNumber;
use crate::totals::{self, Totals};

/// One billed line of an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceLine {
    pub name: String,
    #[serde(deserialize_with = "lenient::number")]
    pub rate: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub quantity: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub amount: f64,
    /// Rate was filled in from a catalog item and not edited since.
    pub rate_prefilled: bool,
}

impl InvoiceLine {
    pub fn new(name: impl Into<String>, rate: f64, quantity: f64) -> Self {
        Self {
            name: name.into(),
            rate,
            quantity,
            amount: totals::line_amount(rate, quantity),
            rate_prefilled: false,
        }
    }
}

/// Invoice document as stored in the invoice repository.
///
/// Serialized in camelCase; unknown fields sent by clients are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Invoice {
    pub invoice_number: InvoiceNumber,
    pub invoice_date: String,
    pub from_name: String,
    pub from_name_eng: String,
    pub from_address: String,
    pub to_name: String,
    pub to_name_hindi: String,
    pub to_address: String,
    pub to_vehicle: String,
    pub items: Vec<InvoiceLine>,
    #[serde(deserialize_with = "lenient::number")]
    pub subtotal: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub tax_rate: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub tax: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub discount: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn new(invoice_number: impl Into<InvoiceNumber>, invoice_date: impl Into<String>) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            invoice_date: invoice_date.into(),
            ..Default::default()
        }
    }

    pub fn with_line(mut self, line: InvoiceLine) -> Self {
        self.items.push(line);
        self
    }

    pub fn totals(&self) -> Totals {
        Totals::compute(&self.items, self.tax_rate, self.discount)
    }

    /// Check the document before it is persisted.
    pub fn validate(&self) -> DomainResult<()> {
        if self.invoice_number.is_blank() {
            return Err(DomainError::validation("invoiceNumber is required"));
        }
        if self.invoice_date.trim().is_empty() {
            return Err(DomainError::validation("invoiceDate is required"));
        }
        ensure_amount("taxRate", self.tax_rate)?;
        ensure_amount("discount", self.discount)?;
        for (idx, line) in self.items.iter().enumerate() {
            ensure_amount(&format!("items[{idx}].rate"), line.rate)?;
            ensure_amount(&format!("items[{idx}].quantity"), line.quantity)?;
        }
        Ok(())
    }

    /// Recompute every line amount and the invoice totals from rates.
    pub fn recalculate(&mut self) {
        for line in &mut self.items {
            line.amount = totals::line_amount(line.rate, line.quantity);
        }
        let t = self.totals();
        self.subtotal = t.subtotal;
        self.tax = t.tax;
        self.total = t.total;
    }

    /// Stamp a brand-new document.
    pub fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.saved_at = Some(at);
        self.updated_at = None;
    }

    /// Take over the identity and creation time of the document being replaced.
    pub fn supersede(&mut self, previous: &Invoice, at: DateTime<Utc>) {
        self.invoice_number = previous.invoice_number.clone();
        self.saved_at = previous.saved_at.or(Some(at));
        self.updated_at = Some(at);
    }
}

impl Entity for Invoice {
    type Id = InvoiceNumber;

    fn id(&self) -> &Self::Id {
        &self.invoice_number
    }
}

fn ensure_amount(field: &str, value: f64) -> DomainResult<()> {
    if !value.is_finite() {
        return Err(DomainError::validation(format!("{field} must be a finite number")));
    }
    if value < 0.0 {
        return Err(DomainError::validation(format!("{field} must not be negative")));
    }
    Ok(())
}
