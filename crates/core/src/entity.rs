//! Entity trait: identity that survives state changes.

/// Something with a stable identity inside its owning aggregate (a line item, a
/// package, a payment, a cart line).
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
