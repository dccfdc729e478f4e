//! Sales orders domain module (event-sourced).
//!
//! This crate contains the order side of the order-to-cash workflow: the
//! sales order lifecycle, its line items, and the six-counter quantity
//! pipeline (ordered → allocated → picked → shipped → delivered → invoiced)
//! with its conservation rules. Pure domain logic only — no IO, no HTTP,
//! no storage.

pub mod order;
pub mod quantity;
pub mod status;

pub use order::{
    AddLine, AttachPickList, ChangeOrderStatus, CreateSalesOrder, LineAdded, LineQuantityRecorded,
    LineRemoved, OrderStatusChanged, PickListAttached, RecordLineQuantity, RemoveLine, SalesOrder,
    SalesOrderCommand, SalesOrderCreated, SalesOrderEvent, SalesOrderId, SalesOrderLine,
};
pub use quantity::{PipelineStage, QuantityPipeline, quantity_advance_valid};
pub use status::SalesOrderStatus;
