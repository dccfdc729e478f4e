use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockflow_core::TenantId;
use stockflow_events::EventEnvelope;
use stockflow_inventory::{InventoryEvent, InventoryItemId};

use crate::projections::cursors::{CursorCheck, CursorMap};
use crate::read_model::TenantStore;

pub const AGGREGATE_TYPE: &str = "inventory.item";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReadModel {
    pub item_id: InventoryItemId,
    pub name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i64,
}

#[derive(Debug, Error)]
pub enum InventoryProjectionError {
    #[error("failed to deserialize inventory event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug)]
pub struct InventoryStockProjection<S>
where
    S: TenantStore<InventoryItemId, InventoryReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> InventoryStockProjection<S>
where
    S: TenantStore<InventoryItemId, InventoryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, item_id: &InventoryItemId) -> Option<InventoryReadModel> {
        self.store.get(tenant_id, item_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<InventoryReadModel> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), InventoryProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq) {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Gap { last, found } => {
                return Err(InventoryProjectionError::NonMonotonicSequence { last, found });
            }
            CursorCheck::Apply => {}
        }

        let ev: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| InventoryProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, item_id) = match &ev {
            InventoryEvent::ItemCreated(e) => (e.tenant_id, e.item_id),
            InventoryEvent::StockAdjusted(e) => (e.tenant_id, e.item_id),
            InventoryEvent::ItemRepriced(e) => (e.tenant_id, e.item_id),
        };

        if event_tenant != tenant_id {
            return Err(InventoryProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if item_id.0 != aggregate_id {
            return Err(InventoryProjectionError::TenantIsolation(
                "event item_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            InventoryEvent::ItemCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.item_id,
                    InventoryReadModel {
                        item_id: e.item_id,
                        name: e.name,
                        sku: e.sku,
                        unit_price: e.unit_price,
                        quantity: 0,
                    },
                );
            }
            InventoryEvent::StockAdjusted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.item_id) {
                    rm.quantity += e.delta;
                    self.store.upsert(tenant_id, e.item_id, rm);
                }
            }
            InventoryEvent::ItemRepriced(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.item_id) {
                    rm.unit_price = e.unit_price;
                    self.store.upsert(tenant_id, e.item_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
