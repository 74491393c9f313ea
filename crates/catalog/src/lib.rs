//! Catalog domain module.
//!
//! Predefined line items (name + default rate) offered when composing an
//! invoice, and the company directory used for customer autofill.

pub mod company;
pub mod item;

pub use company::{Company, SUGGESTION_LIMIT, normalize_company_name};
pub use item::{CatalogItem, ItemDraft, ItemPatch};
