use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockflow_core::{AggregateId, CustomerId, TenantId};
use stockflow_events::EventEnvelope;
use stockflow_orders::{
    QuantityPipeline, SalesOrderEvent, SalesOrderId, SalesOrderStatus,
};
use stockflow_pricing::{DocumentTotals, LineInput, document_totals, line_total};

use crate::projections::cursors::{CursorCheck, CursorMap};
use crate::read_model::TenantStore;

pub const AGGREGATE_TYPE: &str = "orders.sales_order";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrderLineReadModel {
    pub line_no: u32,
    pub item_name: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_rate: Decimal,
    pub quantities: QuantityPipeline,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrderReadModel {
    pub order_id: SalesOrderId,
    pub display_id: String,
    pub customer_id: Option<CustomerId>,
    pub status: SalesOrderStatus,
    pub pick_list_id: Option<AggregateId>,
    pub lines: Vec<SalesOrderLineReadModel>,
    pub totals: DocumentTotals,
}

impl SalesOrderReadModel {
    fn empty(order_id: SalesOrderId) -> Self {
        Self {
            order_id,
            display_id: String::new(),
            customer_id: None,
            status: SalesOrderStatus::Draft,
            pick_list_id: None,
            lines: Vec::new(),
            totals: DocumentTotals::ZERO,
        }
    }
}

#[derive(Debug, Error)]
pub enum SalesOrderProjectionError {
    #[error("failed to deserialize sales order event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
    #[error("failed to recompute totals: {0}")]
    Pricing(String),
}

#[derive(Debug)]
pub struct SalesOrdersProjection<S>
where
    S: TenantStore<SalesOrderId, SalesOrderReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> SalesOrdersProjection<S>
where
    S: TenantStore<SalesOrderId, SalesOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, order_id: &SalesOrderId) -> Option<SalesOrderReadModel> {
        self.store.get(tenant_id, order_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<SalesOrderReadModel> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), SalesOrderProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq) {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Gap { last, found } => {
                return Err(SalesOrderProjectionError::NonMonotonicSequence { last, found });
            }
            CursorCheck::Apply => {}
        }

        let ev: SalesOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| SalesOrderProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, order_id) = match &ev {
            SalesOrderEvent::SalesOrderCreated(e) => (e.tenant_id, e.order_id),
            SalesOrderEvent::LineAdded(e) => (e.tenant_id, e.order_id),
            SalesOrderEvent::LineRemoved(e) => (e.tenant_id, e.order_id),
            SalesOrderEvent::OrderStatusChanged(e) => (e.tenant_id, e.order_id),
            SalesOrderEvent::PickListAttached(e) => (e.tenant_id, e.order_id),
            SalesOrderEvent::LineQuantityRecorded(e) => (e.tenant_id, e.order_id),
        };

        if event_tenant != tenant_id {
            return Err(SalesOrderProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if order_id.0 != aggregate_id {
            return Err(SalesOrderProjectionError::TenantIsolation(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        let mut rm = self
            .store
            .get(tenant_id, &order_id)
            .unwrap_or_else(|| SalesOrderReadModel::empty(order_id));

        match ev {
            SalesOrderEvent::SalesOrderCreated(e) => {
                rm = SalesOrderReadModel::empty(e.order_id);
                rm.display_id = e.display_id;
                rm.customer_id = e.customer_id;
            }
            SalesOrderEvent::LineAdded(e) => {
                let totals = line_total(&LineInput {
                    quantity: e.quantity_ordered,
                    unit_price: e.unit_price,
                    discount_percent: e.discount_percent,
                    tax_rate: e.tax_rate,
                })
                .map_err(|err| SalesOrderProjectionError::Pricing(err.to_string()))?;
                rm.lines.push(SalesOrderLineReadModel {
                    line_no: e.line_no,
                    item_name: e.item_name,
                    sku: e.sku,
                    unit_price: e.unit_price,
                    discount_percent: e.discount_percent,
                    tax_rate: e.tax_rate,
                    quantities: QuantityPipeline::new(e.quantity_ordered),
                    line_total: totals.line_total,
                });
            }
            SalesOrderEvent::LineRemoved(e) => {
                rm.lines.retain(|l| l.line_no != e.line_no);
            }
            SalesOrderEvent::OrderStatusChanged(e) => {
                rm.status = e.to;
            }
            SalesOrderEvent::PickListAttached(e) => {
                rm.pick_list_id = Some(e.pick_list_id);
            }
            SalesOrderEvent::LineQuantityRecorded(e) => {
                if let Some(line) = rm.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.quantities.set_unchecked(e.stage, e.quantity);
                }
            }
        }

        let inputs: Vec<LineInput> = rm
            .lines
            .iter()
            .map(|l| LineInput {
                quantity: l.quantities.ordered,
                unit_price: l.unit_price,
                discount_percent: l.discount_percent,
                tax_rate: l.tax_rate,
            })
            .collect();
        rm.totals = document_totals(&inputs)
            .map_err(|err| SalesOrderProjectionError::Pricing(err.to_string()))?;

        self.store.upsert(tenant_id, order_id, rm);
        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), SalesOrderProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
                self.cursors.clear_tenant(t);
            }
        }

        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
