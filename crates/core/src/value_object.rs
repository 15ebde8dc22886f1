//! Value object trait: equality by value, not identity.

/// Marker trait for immutable values compared attribute by attribute.
///
/// `Money { minor_units: 100 }` is a value object; a `Package` with id 3 is an
/// entity, even if another package happens to hold the same line items.
///
/// To "change" a value object, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
