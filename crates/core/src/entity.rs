//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Invoices are identified by their invoice-number label, catalog items by a
/// numeric id and companies by their display name.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
