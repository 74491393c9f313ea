//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; an
/// invoice number label or a computed set of totals is a value object, an
/// invoice document (identified by its number) is an entity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
