//! Delivery orders domain module (event-sourced).
//!
//! A delivery order tracks dispatch and delivery of picked goods: carrier and
//! tracking metadata, per-line shipped vs delivered quantities, and a
//! lifecycle that supports amendment after partial delivery
//! (`partial` ↔ `delivered`).

pub mod delivery;

pub use delivery::{
    AddDeliveryLine, AssignCarrier, CarrierAssigned, ChangeDeliveryStatus, CreateDeliveryOrder,
    DeliveryLineAdded, DeliveryOrder, DeliveryOrderCommand, DeliveryOrderCreated,
    DeliveryOrderEvent, DeliveryOrderId, DeliveryOrderLine, DeliveryOrderStatus, DeliveryRecorded,
    DeliveryStatusChanged, RecordDelivery,
};
