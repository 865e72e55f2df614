//! Value object trait: equality by value, not identity.
//!
//! Value objects are immutable domain objects defined entirely by their
//! attribute values; two with the same values are the same value. `Money` is
//! the canonical example here, contrasted with entities such as a payment,
//! which keeps its identity while its status changes.

/// Marker trait for value objects.
///
/// Requires `Clone` (values are cheap to copy), `PartialEq` (compared by
/// value) and `Debug` (loggable in tests).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
