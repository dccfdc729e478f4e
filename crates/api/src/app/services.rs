//! Infrastructure wiring for the HTTP app.
//!
//! One in-process event store + bus, a command dispatcher, and the read-model
//! projections, with a background subscriber keeping the projections current.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use stockflow_core::{Aggregate, TenantId};
use stockflow_events::{EventBus, EventEnvelope, InMemoryEventBus};
use stockflow_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use stockflow_infra::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use stockflow_infra::projections::{
    DeliveriesProjection, InventoryStockProjection, InvoicesProjection, PickListsProjection,
    SalesOrdersProjection,
    deliveries::DeliveryOrderReadModel,
    inventory_stock::InventoryReadModel,
    invoices::InvoiceReadModel,
    pick_lists::PickListReadModel,
    sales_orders::SalesOrderReadModel,
};
use stockflow_infra::read_model::InMemoryTenantStore;
use stockflow_infra::sequence::{DisplayIdSequence, InMemorySequences};
use stockflow_inventory::{InventoryItem, InventoryItemId};
use stockflow_invoicing::{Invoice, InvoiceCommand, InvoiceEvent, InvoiceId};
use stockflow_orders::{SalesOrder, SalesOrderCommand, SalesOrderId};
use stockflow_picking::{PickList, PickListCommand, PickListId};
use stockflow_shipping::{DeliveryOrder, DeliveryOrderCommand, DeliveryOrderId};

type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>;
type Store<K, V> = Arc<InMemoryTenantStore<K, V>>;

pub struct AppServices {
    store: Arc<InMemoryEventStore>,
    dispatcher: Dispatcher,
    inventory_projection: Arc<InventoryStockProjection<Store<InventoryItemId, InventoryReadModel>>>,
    orders_projection: Arc<SalesOrdersProjection<Store<SalesOrderId, SalesOrderReadModel>>>,
    pick_lists_projection: Arc<PickListsProjection<Store<PickListId, PickListReadModel>>>,
    deliveries_projection: Arc<DeliveriesProjection<Store<DeliveryOrderId, DeliveryOrderReadModel>>>,
    invoices_projection: Arc<InvoicesProjection<Store<InvoiceId, InvoiceReadModel>>>,
    sequences: Arc<InMemorySequences>,
}

/// Build the service graph and start the projection subscriber.
pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());

    let inventory_projection = Arc::new(InventoryStockProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let orders_projection = Arc::new(SalesOrdersProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let pick_lists_projection = Arc::new(PickListsProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let deliveries_projection = Arc::new(DeliveriesProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let invoices_projection = Arc::new(InvoicesProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));

    // Subscribe before the dispatcher can publish anything.
    let subscription = bus.subscribe();
    {
        let inventory = inventory_projection.clone();
        let orders = orders_projection.clone();
        let pick_lists = pick_lists_projection.clone();
        let deliveries = deliveries_projection.clone();
        let invoices = invoices_projection.clone();
        std::thread::spawn(move || {
            while let Ok(env) = subscription.recv() {
                if let Err(e) = inventory.apply_envelope(&env) {
                    warn!("inventory projection failed: {e}");
                }
                if let Err(e) = orders.apply_envelope(&env) {
                    warn!("orders projection failed: {e}");
                }
                if let Err(e) = pick_lists.apply_envelope(&env) {
                    warn!("pick lists projection failed: {e}");
                }
                if let Err(e) = deliveries.apply_envelope(&env) {
                    warn!("deliveries projection failed: {e}");
                }
                if let Err(e) = invoices.apply_envelope(&env) {
                    warn!("invoices projection failed: {e}");
                }
            }
        });
    }

    let dispatcher = CommandDispatcher::new(store.clone(), bus);

    AppServices {
        store,
        dispatcher,
        inventory_projection,
        orders_projection,
        pick_lists_projection,
        deliveries_projection,
        invoices_projection,
        sequences: Arc::new(InMemorySequences::new()),
    }
}

impl AppServices {
    pub fn next_display_id(&self, prefix: &str) -> String {
        self.sequences.next(prefix)
    }

    // ---- command dispatch, one wrapper per document type ----

    pub fn dispatch_item(
        &self,
        tenant_id: TenantId,
        item_id: InventoryItemId,
        cmd: stockflow_inventory::InventoryCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, item_id.0, "inventory.item", cmd, |_, id| {
                InventoryItem::empty(InventoryItemId::new(id))
            })
    }

    pub fn dispatch_order(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
        cmd: SalesOrderCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, order_id.0, "orders.sales_order", cmd, |_, id| {
                SalesOrder::empty(SalesOrderId::new(id))
            })
    }

    pub fn dispatch_pick_list(
        &self,
        tenant_id: TenantId,
        pick_list_id: PickListId,
        cmd: PickListCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, pick_list_id.0, "picking.pick_list", cmd, |_, id| {
                PickList::empty(PickListId::new(id))
            })
    }

    pub fn dispatch_delivery(
        &self,
        tenant_id: TenantId,
        delivery_order_id: DeliveryOrderId,
        cmd: DeliveryOrderCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch(
            tenant_id,
            delivery_order_id.0,
            "shipping.delivery_order",
            cmd,
            |_, id| DeliveryOrder::empty(DeliveryOrderId::new(id)),
        )
    }

    pub fn dispatch_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        cmd: InvoiceCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, invoice_id.0, "billing.invoice", cmd, |_, id| {
                Invoice::empty(InvoiceId::new(id))
            })
    }

    // ---- read models ----

    pub fn item_get(&self, tenant_id: TenantId, id: &InventoryItemId) -> Option<InventoryReadModel> {
        self.inventory_projection.get(tenant_id, id)
    }

    pub fn item_list(&self, tenant_id: TenantId) -> Vec<InventoryReadModel> {
        self.inventory_projection.list(tenant_id)
    }

    pub fn order_get(&self, tenant_id: TenantId, id: &SalesOrderId) -> Option<SalesOrderReadModel> {
        self.orders_projection.get(tenant_id, id)
    }

    pub fn order_list(&self, tenant_id: TenantId) -> Vec<SalesOrderReadModel> {
        self.orders_projection.list(tenant_id)
    }

    pub fn pick_list_get(&self, tenant_id: TenantId, id: &PickListId) -> Option<PickListReadModel> {
        self.pick_lists_projection.get(tenant_id, id)
    }

    pub fn pick_list_list(&self, tenant_id: TenantId) -> Vec<PickListReadModel> {
        self.pick_lists_projection.list(tenant_id)
    }

    pub fn delivery_get(
        &self,
        tenant_id: TenantId,
        id: &DeliveryOrderId,
    ) -> Option<DeliveryOrderReadModel> {
        self.deliveries_projection.get(tenant_id, id)
    }

    pub fn delivery_list(&self, tenant_id: TenantId) -> Vec<DeliveryOrderReadModel> {
        self.deliveries_projection.list(tenant_id)
    }

    pub fn invoice_get(&self, tenant_id: TenantId, id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.invoices_projection.get(tenant_id, id)
    }

    pub fn invoice_list(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.invoices_projection.list(tenant_id)
    }

    pub fn invoice_list_open(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.invoices_projection.list_open(tenant_id)
    }

    /// Tenant-scoped audit trail, straight from the event store.
    pub fn events(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, DispatchError> {
        self.store.load_tenant(tenant_id).map_err(DispatchError::from)
    }

    /// Rehydrate an invoice snapshot from its stream.
    ///
    /// Used for the cross-document credit-note checks, which need the
    /// authoritative write-side state of both invoices.
    pub fn load_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Option<Invoice>, DispatchError> {
        let history = self.store.load_stream(tenant_id, invoice_id.0)?;
        if history.is_empty() {
            return Ok(None);
        }
        let mut invoice = Invoice::empty(invoice_id);
        for stored in history {
            let ev: InvoiceEvent = serde_json::from_value(stored.payload)
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            invoice.apply(&ev);
        }
        Ok(Some(invoice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockflow_core::AggregateId;
    use stockflow_inventory::{AdjustStock, CreateItem, InventoryCommand};

    /// The projection subscriber runs on its own thread; poll briefly.
    fn wait_for<T>(mut probe: impl FnMut() -> Option<T>) -> T {
        for _ in 0..200 {
            if let Some(v) = probe() {
                return v;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        panic!("read model did not converge");
    }

    #[test]
    fn dispatched_commands_flow_into_read_models() {
        let services = build_services();
        let tenant_id = TenantId::new();
        let item_id = InventoryItemId::new(AggregateId::new());

        services
            .dispatch_item(
                tenant_id,
                item_id,
                InventoryCommand::CreateItem(CreateItem {
                    tenant_id,
                    item_id,
                    name: "Widget A".to_string(),
                    sku: Some("WID-A".to_string()),
                    unit_price: dec!(50),
                    occurred_at: Utc::now(),
                }),
            )
            .unwrap();
        services
            .dispatch_item(
                tenant_id,
                item_id,
                InventoryCommand::AdjustStock(AdjustStock {
                    tenant_id,
                    item_id,
                    delta: 5,
                    occurred_at: Utc::now(),
                }),
            )
            .unwrap();

        let rm = wait_for(|| {
            services
                .item_get(tenant_id, &item_id)
                .filter(|rm| rm.quantity == 5)
        });
        assert_eq!(rm.name, "Widget A");
        assert_eq!(rm.unit_price, dec!(50));

        // The audit trail carries both committed events.
        let events = services.events(tenant_id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "inventory.item.created");
    }

    #[test]
    fn display_ids_are_sequential_per_prefix() {
        let services = build_services();
        assert_eq!(services.next_display_id("SO"), "SO-1001");
        assert_eq!(services.next_display_id("INV"), "INV-1001");
        assert_eq!(services.next_display_id("SO"), "SO-1002");
    }
}
