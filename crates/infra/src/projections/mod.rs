//! Projection implementations (read model builders).
//!
//! Projections consume published domain events and build query-optimized
//! read models. All projections are:
//! - **Rebuildable**: reconstructed from the event stream at any time
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: safe for at-least-once delivery (sequence cursors)

mod cursors;

pub mod deliveries;
pub mod inventory_stock;
pub mod invoices;
pub mod pick_lists;
pub mod sales_orders;

pub use deliveries::{DeliveriesProjection, DeliveryLineReadModel, DeliveryOrderReadModel};
pub use inventory_stock::{InventoryReadModel, InventoryStockProjection};
pub use invoices::{InvoiceReadModel, InvoicesProjection};
pub use pick_lists::{PickItemReadModel, PickListReadModel, PickListsProjection};
pub use sales_orders::{SalesOrderLineReadModel, SalesOrderReadModel, SalesOrdersProjection};
