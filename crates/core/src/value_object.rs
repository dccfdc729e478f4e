//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; two
/// value objects with the same values are the same value. To "modify" one,
/// construct a new one. (`LineTotals { subtotal, .. }` is a value object;
/// an invoice with an `InvoiceId` is an entity.)
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
