use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockflow_core::TenantId;
use stockflow_events::EventEnvelope;
use stockflow_orders::SalesOrderId;
use stockflow_picking::PickListId;
use stockflow_shipping::{DeliveryOrderEvent, DeliveryOrderId, DeliveryOrderStatus};

use crate::projections::cursors::{CursorCheck, CursorMap};
use crate::read_model::TenantStore;

pub const AGGREGATE_TYPE: &str = "shipping.delivery_order";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryLineReadModel {
    pub line_no: u32,
    pub sales_order_line_no: Option<u32>,
    pub item_name: String,
    pub quantity_shipped: u32,
    pub quantity_delivered: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOrderReadModel {
    pub delivery_order_id: DeliveryOrderId,
    pub display_id: String,
    pub status: DeliveryOrderStatus,
    pub sales_order_id: Option<SalesOrderId>,
    pub pick_list_id: Option<PickListId>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub lines: Vec<DeliveryLineReadModel>,
}

impl DeliveryOrderReadModel {
    fn empty(delivery_order_id: DeliveryOrderId) -> Self {
        Self {
            delivery_order_id,
            display_id: String::new(),
            status: DeliveryOrderStatus::Draft,
            sales_order_id: None,
            pick_list_id: None,
            carrier: None,
            tracking_number: None,
            dispatched_at: None,
            delivered_at: None,
            lines: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryProjectionError {
    #[error("failed to deserialize delivery order event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug)]
pub struct DeliveriesProjection<S>
where
    S: TenantStore<DeliveryOrderId, DeliveryOrderReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> DeliveriesProjection<S>
where
    S: TenantStore<DeliveryOrderId, DeliveryOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        delivery_order_id: &DeliveryOrderId,
    ) -> Option<DeliveryOrderReadModel> {
        self.store.get(tenant_id, delivery_order_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<DeliveryOrderReadModel> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), DeliveryProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq) {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Gap { last, found } => {
                return Err(DeliveryProjectionError::NonMonotonicSequence { last, found });
            }
            CursorCheck::Apply => {}
        }

        let ev: DeliveryOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| DeliveryProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, delivery_order_id) = match &ev {
            DeliveryOrderEvent::DeliveryOrderCreated(e) => (e.tenant_id, e.delivery_order_id),
            DeliveryOrderEvent::DeliveryLineAdded(e) => (e.tenant_id, e.delivery_order_id),
            DeliveryOrderEvent::CarrierAssigned(e) => (e.tenant_id, e.delivery_order_id),
            DeliveryOrderEvent::DeliveryRecorded(e) => (e.tenant_id, e.delivery_order_id),
            DeliveryOrderEvent::DeliveryStatusChanged(e) => (e.tenant_id, e.delivery_order_id),
        };

        if event_tenant != tenant_id {
            return Err(DeliveryProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if delivery_order_id.0 != aggregate_id {
            return Err(DeliveryProjectionError::TenantIsolation(
                "event delivery_order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        let mut rm = self
            .store
            .get(tenant_id, &delivery_order_id)
            .unwrap_or_else(|| DeliveryOrderReadModel::empty(delivery_order_id));

        match ev {
            DeliveryOrderEvent::DeliveryOrderCreated(e) => {
                rm = DeliveryOrderReadModel::empty(e.delivery_order_id);
                rm.display_id = e.display_id;
                rm.sales_order_id = e.sales_order_id;
                rm.pick_list_id = e.pick_list_id;
            }
            DeliveryOrderEvent::DeliveryLineAdded(e) => {
                rm.lines.push(DeliveryLineReadModel {
                    line_no: e.line_no,
                    sales_order_line_no: e.sales_order_line_no,
                    item_name: e.item_name,
                    quantity_shipped: e.quantity_shipped,
                    quantity_delivered: 0,
                });
            }
            DeliveryOrderEvent::CarrierAssigned(e) => {
                rm.carrier = Some(e.carrier);
                rm.tracking_number = e.tracking_number;
            }
            DeliveryOrderEvent::DeliveryRecorded(e) => {
                if let Some(line) = rm.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.quantity_delivered = e.quantity_delivered;
                }
            }
            DeliveryOrderEvent::DeliveryStatusChanged(e) => {
                rm.status = e.to;
                match e.to {
                    DeliveryOrderStatus::Dispatched if rm.dispatched_at.is_none() => {
                        rm.dispatched_at = Some(e.occurred_at);
                    }
                    DeliveryOrderStatus::Delivered if rm.delivered_at.is_none() => {
                        rm.delivered_at = Some(e.occurred_at);
                    }
                    _ => {}
                }
            }
        }

        self.store.upsert(tenant_id, delivery_order_id, rm);
        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
