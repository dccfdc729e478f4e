use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockflow_core::{CustomerId, TenantId};
use stockflow_events::EventEnvelope;
use stockflow_invoicing::{
    InvoiceEvent, InvoiceId, InvoiceKind, InvoiceLine, InvoiceStatus,
};
use stockflow_orders::SalesOrderId;
use stockflow_shipping::DeliveryOrderId;

use crate::projections::cursors::{CursorCheck, CursorMap};
use crate::read_model::TenantStore;

pub const AGGREGATE_TYPE: &str = "billing.invoice";

/// Queryable invoice read model (header + lines + ledger fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub display_id: String,
    pub kind: InvoiceKind,
    pub status: InvoiceStatus,
    pub customer_id: Option<CustomerId>,
    pub sales_order_id: Option<SalesOrderId>,
    pub delivery_order_id: Option<DeliveryOrderId>,
    pub original_invoice_id: Option<InvoiceId>,
    pub due_date: Option<DateTime<Utc>>,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub lines: Vec<InvoiceLine>,
}

#[derive(Debug, Error)]
pub enum InvoiceProjectionError {
    #[error("failed to deserialize invoice event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
    #[error("event for unknown invoice {0}")]
    UnknownInvoice(InvoiceId),
}

#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: CursorMap,
}

impl<S> InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorMap::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(tenant_id, invoice_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.store.list(tenant_id)
    }

    /// Open receivables: standard invoices that still carry a balance.
    pub fn list_open(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| {
                rm.kind == InvoiceKind::Invoice
                    && rm.balance_due > Decimal::ZERO
                    && matches!(
                        rm.status,
                        InvoiceStatus::Sent | InvoiceStatus::Partial | InvoiceStatus::Overdue
                    )
            })
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), InvoiceProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq) {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Gap { last, found } => {
                return Err(InvoiceProjectionError::NonMonotonicSequence { last, found });
            }
            CursorCheck::Apply => {}
        }

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| InvoiceProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, invoice_id) = match &ev {
            InvoiceEvent::InvoiceIssued(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::InvoiceStatusChanged(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::PaymentRecorded(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::CreditApplied(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::CreditNoteApplied(e) => (e.tenant_id, e.invoice_id),
        };

        if event_tenant != tenant_id {
            return Err(InvoiceProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if invoice_id.0 != aggregate_id {
            return Err(InvoiceProjectionError::TenantIsolation(
                "event invoice_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                self.store.upsert(
                    tenant_id,
                    e.invoice_id,
                    InvoiceReadModel {
                        invoice_id: e.invoice_id,
                        display_id: e.display_id,
                        kind: e.kind,
                        status: InvoiceStatus::Draft,
                        customer_id: e.customer_id,
                        sales_order_id: e.sales_order_id,
                        delivery_order_id: e.delivery_order_id,
                        original_invoice_id: e.original_invoice_id,
                        due_date: e.due_date,
                        total: e.total,
                        amount_paid: Decimal::ZERO,
                        balance_due: e.total,
                        lines: e.lines,
                    },
                );
            }
            InvoiceEvent::InvoiceStatusChanged(e) => {
                let mut rm = self
                    .store
                    .get(tenant_id, &e.invoice_id)
                    .ok_or(InvoiceProjectionError::UnknownInvoice(e.invoice_id))?;
                rm.status = e.to;
                self.store.upsert(tenant_id, e.invoice_id, rm);
            }
            InvoiceEvent::PaymentRecorded(e) => {
                let mut rm = self
                    .store
                    .get(tenant_id, &e.invoice_id)
                    .ok_or(InvoiceProjectionError::UnknownInvoice(e.invoice_id))?;
                rm.amount_paid = e.new_amount_paid;
                rm.balance_due = e.new_balance_due;
                rm.status = e.new_status;
                self.store.upsert(tenant_id, e.invoice_id, rm);
            }
            InvoiceEvent::CreditApplied(e) => {
                let mut rm = self
                    .store
                    .get(tenant_id, &e.invoice_id)
                    .ok_or(InvoiceProjectionError::UnknownInvoice(e.invoice_id))?;
                rm.amount_paid = e.new_amount_paid;
                rm.balance_due = e.new_balance_due;
                rm.status = e.new_status;
                self.store.upsert(tenant_id, e.invoice_id, rm);
            }
            InvoiceEvent::CreditNoteApplied(e) => {
                let mut rm = self
                    .store
                    .get(tenant_id, &e.invoice_id)
                    .ok_or(InvoiceProjectionError::UnknownInvoice(e.invoice_id))?;
                rm.amount_paid = e.amount;
                rm.balance_due = Decimal::ZERO;
                rm.status = InvoiceStatus::Paid;
                self.store.upsert(tenant_id, e.invoice_id, rm);
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }
}
