use rust_decimal::Decimal;
use serde::Deserialize;

use stockflow_core::StatusLifecycle;
use stockflow_infra::event_store::StoredEvent;
use stockflow_infra::projections::{
    deliveries::DeliveryOrderReadModel, inventory_stock::InventoryReadModel,
    invoices::InvoiceReadModel, pick_lists::PickListReadModel, sales_orders::SalesOrderReadModel,
};
use stockflow_invoicing::InvoiceKind;
use stockflow_orders::SalesOrderStatus;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct RepriceItemRequest {
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateSalesOrderRequest {
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderLineRequest {
    /// When present, name/sku/price default to a snapshot of this item.
    pub item_id: Option<String>,
    pub item_name: Option<String>,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordQuantityRequest {
    pub line_no: u32,
    /// One of: allocated, picked, shipped, delivered, invoiced.
    pub stage: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreatePickListRequest {
    pub sales_order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddPickItemRequest {
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<String>,
    pub item_name: String,
    pub requested_quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RecordPickRequest {
    pub line_no: u32,
    pub picked_quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeliveryOrderRequest {
    pub sales_order_id: Option<String>,
    pub pick_list_id: Option<String>,
    pub customer_id: Option<String>,
    pub shipping_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddDeliveryLineRequest {
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<String>,
    pub item_name: String,
    pub quantity_shipped: u32,
}

#[derive(Debug, Deserialize)]
pub struct AssignCarrierRequest {
    pub carrier: String,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordDeliveryRequest {
    pub line_no: u32,
    pub quantity_delivered: u32,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceLineRequest {
    pub sales_order_line_no: Option<u32>,
    pub item_id: Option<String>,
    pub item_name: String,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub discount_percent: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct IssueInvoiceRequest {
    pub customer_id: Option<String>,
    pub sales_order_id: Option<String>,
    pub delivery_order_id: Option<String>,
    /// RFC3339.
    pub due_date: Option<String>,
    pub lines: Vec<InvoiceLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    /// One of: cash, bank_transfer, card, check, other.
    pub method: String,
    pub reference_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCreditNoteRequest {
    pub reason: Option<String>,
    pub lines: Vec<InvoiceLineRequest>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn kind_str(kind: InvoiceKind) -> &'static str {
    match kind {
        InvoiceKind::Invoice => "invoice",
        InvoiceKind::CreditNote => "credit_note",
    }
}

pub fn item_to_json(rm: InventoryReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.item_id.0.to_string(),
        "name": rm.name,
        "sku": rm.sku,
        "unit_price": rm.unit_price,
        "quantity": rm.quantity,
    })
}

pub fn sales_order_to_json(rm: SalesOrderReadModel) -> serde_json::Value {
    let derived: Option<&str> = if rm.lines.is_empty() {
        None
    } else if rm.lines.iter().all(|l| l.quantities.fully_shipped()) {
        Some(SalesOrderStatus::Shipped.as_str())
    } else if rm.lines.iter().any(|l| l.quantities.any_shipped()) {
        Some(SalesOrderStatus::PartialShipped.as_str())
    } else {
        None
    };

    serde_json::json!({
        "id": rm.order_id.0.to_string(),
        "display_id": rm.display_id,
        "customer_id": rm.customer_id.map(|c| c.to_string()),
        "status": rm.status.as_str(),
        "derived_shipping_status": derived,
        "pick_list_id": rm.pick_list_id.map(|p| p.to_string()),
        "totals": {
            "subtotal": rm.totals.subtotal,
            "discount_amount": rm.totals.total_discount,
            "tax_amount": rm.totals.total_tax,
            "total": rm.totals.total,
        },
        "lines": rm.lines.into_iter().map(|l| serde_json::json!({
            "line_no": l.line_no,
            "item_name": l.item_name,
            "sku": l.sku,
            "unit_price": l.unit_price,
            "discount_percent": l.discount_percent,
            "tax_rate": l.tax_rate,
            "line_total": l.line_total,
            "quantity_ordered": l.quantities.ordered,
            "quantity_allocated": l.quantities.allocated,
            "quantity_picked": l.quantities.picked,
            "quantity_shipped": l.quantities.shipped,
            "quantity_delivered": l.quantities.delivered,
            "quantity_invoiced": l.quantities.invoiced,
        })).collect::<Vec<_>>()
    })
}

pub fn pick_list_to_json(rm: PickListReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.pick_list_id.0.to_string(),
        "display_id": rm.display_id,
        "status": rm.status.as_str(),
        "sales_order_id": rm.sales_order_id.map(|s| s.to_string()),
        "items": rm.items.into_iter().map(|i| serde_json::json!({
            "line_no": i.line_no,
            "sales_order_line_no": i.sales_order_line_no,
            "item_name": i.item_name,
            "requested_quantity": i.requested_quantity,
            "picked_quantity": i.picked_quantity,
        })).collect::<Vec<_>>()
    })
}

pub fn delivery_to_json(rm: DeliveryOrderReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.delivery_order_id.0.to_string(),
        "display_id": rm.display_id,
        "status": rm.status.as_str(),
        "sales_order_id": rm.sales_order_id.map(|s| s.to_string()),
        "pick_list_id": rm.pick_list_id.map(|p| p.to_string()),
        "carrier": rm.carrier,
        "tracking_number": rm.tracking_number,
        "dispatched_at": rm.dispatched_at.map(|t| t.to_rfc3339()),
        "delivered_at": rm.delivered_at.map(|t| t.to_rfc3339()),
        "lines": rm.lines.into_iter().map(|l| serde_json::json!({
            "line_no": l.line_no,
            "sales_order_line_no": l.sales_order_line_no,
            "item_name": l.item_name,
            "quantity_shipped": l.quantity_shipped,
            "quantity_delivered": l.quantity_delivered,
        })).collect::<Vec<_>>()
    })
}

pub fn invoice_to_json(rm: InvoiceReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.invoice_id.0.to_string(),
        "display_id": rm.display_id,
        "invoice_type": kind_str(rm.kind),
        "status": rm.status.as_str(),
        "customer_id": rm.customer_id.map(|c| c.to_string()),
        "sales_order_id": rm.sales_order_id.map(|s| s.to_string()),
        "delivery_order_id": rm.delivery_order_id.map(|d| d.to_string()),
        "original_invoice_id": rm.original_invoice_id.map(|i| i.to_string()),
        "due_date": rm.due_date.map(|t| t.to_rfc3339()),
        "total": rm.total,
        "amount_paid": rm.amount_paid,
        "balance_due": rm.balance_due,
        "lines": rm.lines.into_iter().map(|l| serde_json::json!({
            "line_no": l.line_no,
            "item_name": l.item_name,
            "sku": l.sku,
            "quantity": l.quantity,
            "unit_price": l.unit_price,
            "discount_percent": l.discount_percent,
            "tax_rate": l.tax_rate,
        })).collect::<Vec<_>>()
    })
}

pub fn stored_event_to_json(e: StoredEvent) -> serde_json::Value {
    serde_json::json!({
        "event_id": e.event_id.to_string(),
        "aggregate_id": e.aggregate_id.to_string(),
        "aggregate_type": e.aggregate_type,
        "sequence_number": e.sequence_number,
        "event_type": e.event_type,
        "occurred_at": e.occurred_at.to_rfc3339(),
    })
}
