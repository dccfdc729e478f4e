use serde_json::Value as JsonValue;
use thiserror::Error;

use stockflow_core::TenantId;
use stockflow_events::EventEnvelope;
use stockflow_orders::SalesOrderId;
use stockflow_picking::{PickListEvent, PickListId, PickListStatus};

use crate::projections::cursors::{CursorCheck, CursorMap};
use crate::read_model::TenantStore;

pub const AGGREGATE_TYPE: &str = "picking.pick_list";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickItemReadModel {
    pub line_no: u32,
    pub sales_order_line_no: Option<u32>,
    pub item_name: String,
    pub requested_quantity: u32,
    pub picked_quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickListReadModel {
    pub pick_list_id: PickListId,
    pub display_id: String,
    pub status: PickListStatus,
    pub sales_order_id: Option<SalesOrderId>,
    pub items: Vec<PickItemReadModel>,
}

impl PickListReadModel {
    fn empty(pick_list_id: PickListId) -> Self {
        Self {
            pick_list_id,
            display_id: String::new(),
            status: PickListStatus::Draft,
            sales_order_id: None,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PickListProjectionError {
    #[error("failed to deserialize pick list event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug)]
pub struct PickListsProjection<S>
where
    S: TenantStore<PickListId, PickListReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> PickListsProjection<S>
where
    S: TenantStore<PickListId, PickListReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, pick_list_id: &PickListId) -> Option<PickListReadModel> {
        self.store.get(tenant_id, pick_list_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<PickListReadModel> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), PickListProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq) {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Gap { last, found } => {
                return Err(PickListProjectionError::NonMonotonicSequence { last, found });
            }
            CursorCheck::Apply => {}
        }

        let ev: PickListEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| PickListProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, pick_list_id) = match &ev {
            PickListEvent::PickListCreated(e) => (e.tenant_id, e.pick_list_id),
            PickListEvent::PickItemAdded(e) => (e.tenant_id, e.pick_list_id),
            PickListEvent::ItemPicked(e) => (e.tenant_id, e.pick_list_id),
            PickListEvent::PickListStatusChanged(e) => (e.tenant_id, e.pick_list_id),
        };

        if event_tenant != tenant_id {
            return Err(PickListProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if pick_list_id.0 != aggregate_id {
            return Err(PickListProjectionError::TenantIsolation(
                "event pick_list_id does not match envelope aggregate_id".to_string(),
            ));
        }

        let mut rm = self
            .store
            .get(tenant_id, &pick_list_id)
            .unwrap_or_else(|| PickListReadModel::empty(pick_list_id));

        match ev {
            PickListEvent::PickListCreated(e) => {
                rm = PickListReadModel::empty(e.pick_list_id);
                rm.display_id = e.display_id;
                rm.sales_order_id = e.sales_order_id;
            }
            PickListEvent::PickItemAdded(e) => {
                rm.items.push(PickItemReadModel {
                    line_no: e.line_no,
                    sales_order_line_no: e.sales_order_line_no,
                    item_name: e.item_name,
                    requested_quantity: e.requested_quantity,
                    picked_quantity: 0,
                });
            }
            PickListEvent::ItemPicked(e) => {
                if let Some(item) = rm.items.iter_mut().find(|i| i.line_no == e.line_no) {
                    item.picked_quantity = e.picked_quantity;
                }
            }
            PickListEvent::PickListStatusChanged(e) => {
                rm.status = e.to;
            }
        }

        self.store.upsert(tenant_id, pick_list_id, rm);
        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
