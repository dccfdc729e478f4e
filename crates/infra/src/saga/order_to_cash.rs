//! Order-to-cash saga: delivery confirmation → invoice issuance.
//!
//! Orchestrates the billing tail of the workflow:
//! 1. DeliveryOrder reaches `delivered` → request invoice issuance
//! 2. Invoice issued → complete saga
//!
//! Correlated by the sales order the delivery fulfills.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockflow_core::{AggregateId, TenantId};
use stockflow_events::{EventEnvelope, Saga, SagaAction};
use stockflow_orders::SalesOrderId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderToCashSagaState {
    #[default]
    WaitingForDelivery,
    WaitingForInvoiceIssued,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderToCashSagaEvent {
    DeliveryConfirmedReceived,
    InvoiceIssueRequested,
    InvoiceIssuedReceived { invoice_id: String },
    SagaCompleted,
    SagaFailed { reason: String },
}

pub struct OrderToCashSaga;

/// Pull the payload object of a specific event enum variant
/// (`{"DeliveryStatusChanged": {...}}` → the inner object).
fn variant<'a>(payload: &'a JsonValue, name: &str) -> Option<&'a JsonValue> {
    payload.as_object()?.get(name)
}

fn sales_order_id_of(value: &JsonValue) -> Option<SalesOrderId> {
    let id = value.get("sales_order_id")?.as_str()?;
    let uuid = uuid::Uuid::parse_str(id).ok()?;
    Some(SalesOrderId::new(AggregateId::from_uuid(uuid)))
}

impl Saga for OrderToCashSaga {
    type State = OrderToCashSagaState;
    type SagaEvent = OrderToCashSagaEvent;
    type CorrelationId = SalesOrderId;

    fn saga_type() -> &'static str {
        "saga.order_to_cash"
    }

    fn correlate(envelope: &EventEnvelope<JsonValue>) -> Option<Self::CorrelationId> {
        match envelope.aggregate_type() {
            "shipping.delivery_order" | "billing.invoice" => {
                // Every relevant event variant carries `sales_order_id`.
                let obj = envelope.payload().as_object()?;
                let inner = obj.values().next()?;
                sales_order_id_of(inner)
            }
            _ => None,
        }
    }

    fn saga_id(_tenant_id: TenantId, correlation: &Self::CorrelationId) -> AggregateId {
        // Deterministic: one saga instance per sales order. Derived (v5)
        // rather than reused, so the saga stream never collides with the
        // order's own stream.
        AggregateId::from_uuid(uuid::Uuid::new_v5(
            &uuid::Uuid::NAMESPACE_OID,
            correlation.0.as_uuid().as_bytes(),
        ))
    }

    fn apply(state: &mut Self::State, event: &Self::SagaEvent) {
        match event {
            OrderToCashSagaEvent::DeliveryConfirmedReceived => {
                *state = OrderToCashSagaState::WaitingForInvoiceIssued;
            }
            OrderToCashSagaEvent::InvoiceIssueRequested => {
                // No state change; waiting for InvoiceIssued.
            }
            OrderToCashSagaEvent::InvoiceIssuedReceived { .. }
            | OrderToCashSagaEvent::SagaCompleted => {
                *state = OrderToCashSagaState::Completed;
            }
            OrderToCashSagaEvent::SagaFailed { .. } => {
                *state = OrderToCashSagaState::Failed;
            }
        }
    }

    fn react(
        state: &Self::State,
        tenant_id: TenantId,
        correlation: &Self::CorrelationId,
        incoming: &EventEnvelope<JsonValue>,
    ) -> Vec<SagaAction> {
        match state {
            OrderToCashSagaState::WaitingForDelivery => {
                if incoming.aggregate_type() != "shipping.delivery_order" {
                    return vec![];
                }
                let Some(changed) = variant(incoming.payload(), "DeliveryStatusChanged") else {
                    return vec![];
                };
                if changed.get("to").and_then(|v| v.as_str()) != Some("delivered") {
                    return vec![];
                }

                vec![
                    SagaAction::Emit {
                        event_type: "delivery_confirmed_received".to_string(),
                        payload: serde_json::json!({}),
                    },
                    SagaAction::Emit {
                        event_type: "invoice_issue_requested".to_string(),
                        payload: serde_json::json!({}),
                    },
                    SagaAction::Command {
                        aggregate_type: "billing.invoice".to_string(),
                        command_type: "IssueInvoice".to_string(),
                        payload: serde_json::json!({
                            "tenant_id": tenant_id,
                            "sales_order_id": correlation.0,
                            "delivery_order_id": incoming.aggregate_id(),
                        }),
                    },
                ]
            }
            OrderToCashSagaState::WaitingForInvoiceIssued => {
                if incoming.aggregate_type() != "billing.invoice" {
                    return vec![];
                }
                let Some(issued) = variant(incoming.payload(), "InvoiceIssued") else {
                    return vec![];
                };
                let Some(invoice_id) = issued.get("invoice_id").and_then(|v| v.as_str()) else {
                    return vec![];
                };

                vec![
                    SagaAction::Emit {
                        event_type: "invoice_issued_received".to_string(),
                        payload: serde_json::json!({ "invoice_id": invoice_id }),
                    },
                    SagaAction::Complete,
                ]
            }
            OrderToCashSagaState::Completed | OrderToCashSagaState::Failed => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockflow_core::StatusLifecycle;
    use stockflow_events::{Event, execute};
    use stockflow_shipping::{
        AddDeliveryLine, ChangeDeliveryStatus, CreateDeliveryOrder, DeliveryOrder,
        DeliveryOrderCommand, DeliveryOrderId, DeliveryOrderStatus,
    };

    fn envelope_for<E: Event + serde::Serialize>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        seq: u64,
        event: &E,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            uuid::Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type,
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn delivered_envelopes(
        tenant_id: TenantId,
        sales_order_id: SalesOrderId,
    ) -> Vec<EventEnvelope<JsonValue>> {
        let delivery_order_id = DeliveryOrderId::new(AggregateId::new());
        let mut order = DeliveryOrder::empty(delivery_order_id);
        let mut all = Vec::new();

        let mut run = |cmd: DeliveryOrderCommand, order: &mut DeliveryOrder| {
            for ev in execute(order, &cmd).unwrap() {
                all.push(ev);
            }
        };

        run(
            DeliveryOrderCommand::CreateDeliveryOrder(CreateDeliveryOrder {
                tenant_id,
                delivery_order_id,
                display_id: "DO-1001".to_string(),
                sales_order_id: Some(sales_order_id),
                pick_list_id: None,
                customer_id: None,
                shipping_address: None,
                occurred_at: Utc::now(),
            }),
            &mut order,
        );
        run(
            DeliveryOrderCommand::AddDeliveryLine(AddDeliveryLine {
                tenant_id,
                delivery_order_id,
                sales_order_line_no: Some(1),
                item_id: None,
                item_name: "Widget A".to_string(),
                quantity_shipped: 5,
                occurred_at: Utc::now(),
            }),
            &mut order,
        );
        for next in [
            DeliveryOrderStatus::Ready,
            DeliveryOrderStatus::Dispatched,
            DeliveryOrderStatus::Delivered,
        ] {
            run(
                DeliveryOrderCommand::ChangeDeliveryStatus(ChangeDeliveryStatus {
                    tenant_id,
                    delivery_order_id,
                    next,
                    occurred_at: Utc::now(),
                }),
                &mut order,
            );
        }

        all.iter()
            .enumerate()
            .map(|(i, ev)| {
                envelope_for(
                    tenant_id,
                    delivery_order_id.0,
                    "shipping.delivery_order",
                    (i + 1) as u64,
                    ev,
                )
            })
            .collect()
    }

    #[test]
    fn delivery_confirmation_requests_an_invoice() {
        let tenant_id = TenantId::new();
        let sales_order_id = SalesOrderId::new(AggregateId::new());
        let envelopes = delivered_envelopes(tenant_id, sales_order_id);

        let mut state = OrderToCashSagaState::default();
        let mut issued_command = false;

        for env in &envelopes {
            let Some(correlation) = OrderToCashSaga::correlate(env) else {
                continue;
            };
            assert_eq!(correlation, sales_order_id);

            for action in OrderToCashSaga::react(&state, tenant_id, &correlation, env) {
                match action {
                    SagaAction::Emit { event_type, .. } => {
                        if event_type == "delivery_confirmed_received" {
                            OrderToCashSaga::apply(
                                &mut state,
                                &OrderToCashSagaEvent::DeliveryConfirmedReceived,
                            );
                        }
                    }
                    SagaAction::Command {
                        aggregate_type,
                        command_type,
                        ..
                    } => {
                        assert_eq!(aggregate_type, "billing.invoice");
                        assert_eq!(command_type, "IssueInvoice");
                        issued_command = true;
                    }
                    _ => {}
                }
            }
        }

        assert!(issued_command);
        assert_eq!(state, OrderToCashSagaState::WaitingForInvoiceIssued);
    }

    #[test]
    fn intermediate_statuses_do_not_trigger_billing() {
        let tenant_id = TenantId::new();
        let sales_order_id = SalesOrderId::new(AggregateId::new());
        let state = OrderToCashSagaState::WaitingForDelivery;

        // Walk only to dispatched; the saga must stay quiet.
        for env in delivered_envelopes(tenant_id, sales_order_id) {
            let Some(correlation) = OrderToCashSaga::correlate(&env) else {
                continue;
            };
            let to_delivered = env
                .payload()
                .get("DeliveryStatusChanged")
                .and_then(|v| v.get("to"))
                .and_then(|v| v.as_str())
                == Some(DeliveryOrderStatus::Delivered.as_str());
            let actions = OrderToCashSaga::react(&state, tenant_id, &correlation, &env);
            if to_delivered {
                assert!(!actions.is_empty());
            } else {
                assert!(actions.is_empty(), "unexpected actions for {env:?}");
            }
        }
    }
}
