//! Invoice arithmetic: line amounts, totals and proportional rebalancing.

use serde::{Deserialize, Serialize};

use invoicer_core::ValueObject;

use crate::invoice::InvoiceLine;

/// Derived money figures of an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl ValueObject for Totals {}

impl Totals {
    /// `total = subtotal + subtotal * tax_rate / 100 - discount`.
    pub fn compute(lines: &[InvoiceLine], tax_rate: f64, discount: f64) -> Self {
        let subtotal: f64 = lines.iter().map(|l| l.amount).sum();
        let tax = subtotal * tax_rate / 100.0;
        Self {
            subtotal,
            tax,
            total: subtotal + tax - discount,
        }
    }
}

pub fn line_amount(rate: f64, quantity: f64) -> f64 {
    rate * quantity
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scale line rates so the invoice total becomes `target_total`.
///
/// Solves `subtotal = (target_total + discount) / (1 + tax_rate / 100)` and
/// multiplies every priced line (positive rate and quantity) by the same
/// ratio, rounding rates to cents. Lines are left untouched when the current
/// subtotal or the target is zero. Returns whether any line changed.
pub fn rebalance_to_total(
    lines: &mut [InvoiceLine],
    tax_rate: f64,
    discount: f64,
    target_total: f64,
) -> bool {
    let current_subtotal: f64 = lines.iter().map(|l| l.amount).sum();
    if current_subtotal == 0.0 || target_total == 0.0 {
        return false;
    }

    let target_subtotal = (target_total + discount) / (1.0 + tax_rate / 100.0);
    let ratio = target_subtotal / current_subtotal;

    let mut changed = false;
    for line in lines.iter_mut().filter(|l| l.rate > 0.0 && l.quantity > 0.0) {
        line.rate = round_to_cents(line.rate * ratio);
        line.amount = line_amount(line.rate, line.quantity);
        line.rate_prefilled = false;
        changed = true;
    }
    changed
}
