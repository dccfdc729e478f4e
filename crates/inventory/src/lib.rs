//! Inventory items domain module (event-sourced).
//!
//! Items carry the master data (name, sku, unit price) that order and invoice
//! lines snapshot at creation time, plus an on-hand stock level.

pub mod item;

pub use item::{
    AdjustStock, CreateItem, InventoryCommand, InventoryEvent, InventoryItem, InventoryItemId,
    ItemCreated, ItemRepriced, RepriceItem, StockAdjusted,
};
