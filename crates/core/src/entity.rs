//! Entity trait: identity + continuity across state changes.
//!
//! Used for records that live **inside** an aggregate (e.g. a payment inside
//! an invoice) and are addressed by id through the owning aggregate's
//! commands.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
