use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockflow_core::{AggregateId, CustomerId, ItemId};
use stockflow_invoicing::{
    ApplyCredit, ChangeInvoiceStatus, InvoiceCommand, InvoiceId, InvoiceKind, InvoiceLine,
    InvoiceStatus, IssueInvoice, MarkCreditNoteApplied, PaymentMethod, RecordPayment,
    application, validate_source,
};
use stockflow_orders::SalesOrderId;
use stockflow_shipping::DeliveryOrderId;

use crate::app::routes::common::{parse_id, parse_opt_id};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(issue_invoice).get(list_invoices))
        .route("/open", get(list_open_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/status", post(change_status))
        .route("/:id/payments", post(record_payment))
        .route("/:id/credit-notes", post(create_credit_note))
        .route("/:id/apply", post(apply_credit_note))
}

fn to_lines(
    req_lines: Vec<dto::InvoiceLineRequest>,
) -> Result<Vec<InvoiceLine>, axum::response::Response> {
    let mut lines = Vec::with_capacity(req_lines.len());
    for (idx, l) in req_lines.into_iter().enumerate() {
        let item_id: Option<ItemId> = parse_opt_id(l.item_id.as_deref(), "item id")?;
        lines.push(InvoiceLine {
            line_no: (idx as u32) + 1,
            sales_order_line_no: l.sales_order_line_no,
            item_id,
            item_name: l.item_name,
            sku: l.sku,
            quantity: l.quantity,
            unit_price: l.unit_price,
            discount_percent: l.discount_percent.unwrap_or(Decimal::ZERO),
            tax_rate: l.tax_rate.unwrap_or(Decimal::ZERO),
        });
    }
    Ok(lines)
}

fn parse_due_date(
    due_date: Option<&str>,
) -> Result<Option<DateTime<Utc>>, axum::response::Response> {
    due_date
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| {
                    errors::json_error(
                        StatusCode::BAD_REQUEST,
                        "validation_error",
                        "due_date must be RFC3339",
                    )
                })
        })
        .transpose()
}

pub async fn issue_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::IssueInvoiceRequest>,
) -> axum::response::Response {
    let customer_id: Option<CustomerId> =
        match parse_opt_id(body.customer_id.as_deref(), "customer id") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
    let sales_order: Option<AggregateId> =
        match parse_opt_id(body.sales_order_id.as_deref(), "sales order id") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
    let delivery_order: Option<AggregateId> =
        match parse_opt_id(body.delivery_order_id.as_deref(), "delivery order id") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
    let due_date = match parse_due_date(body.due_date.as_deref()) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let lines = match to_lines(body.lines) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let agg = AggregateId::new();
    let invoice_id = InvoiceId::new(agg);
    let display_id = services.next_display_id("INV");

    let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        display_id: display_id.clone(),
        kind: InvoiceKind::Invoice,
        customer_id,
        sales_order_id: sales_order.map(SalesOrderId::new),
        delivery_order_id: delivery_order.map(DeliveryOrderId::new),
        original_invoice_id: None,
        credit_reason: None,
        lines,
        due_date,
        occurred_at: Utc::now(),
    });

    match services.dispatch_invoice(tenant.tenant_id(), invoice_id, cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"id": agg.to_string(), "display_id": display_id})),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Issue a credit note against the invoice at `:id`.
///
/// The source check (§ credit notes cannot source credit notes) runs here at
/// the boundary, against the authoritative write-side snapshot.
pub async fn create_credit_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateCreditNoteRequest>,
) -> axum::response::Response {
    let original_agg: AggregateId = match parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let original_id = InvoiceId::new(original_agg);

    let original = match services.load_invoice(tenant.tenant_id(), original_id) {
        Ok(Some(inv)) => inv,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found");
        }
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    if let Err(e) = validate_source(&original) {
        return errors::dispatch_error_to_response(e.into());
    }

    let lines = match to_lines(body.lines) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let agg = AggregateId::new();
    let note_id = InvoiceId::new(agg);
    let display_id = services.next_display_id("INV");

    let cmd = InvoiceCommand::IssueInvoice(IssueInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id: note_id,
        display_id: display_id.clone(),
        kind: InvoiceKind::CreditNote,
        customer_id: original.customer_id(),
        sales_order_id: original.sales_order_id(),
        delivery_order_id: original.delivery_order_id(),
        original_invoice_id: Some(original_id),
        credit_reason: body.reason,
        lines,
        due_date: None,
        occurred_at: Utc::now(),
    });

    match services.dispatch_invoice(tenant.tenant_id(), note_id, cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"id": agg.to_string(), "display_id": display_id})),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Apply the credit note at `:id` against its original invoice.
///
/// Settles both sides: the original gains `abs(total)` paid, the note itself
/// becomes `paid`.
pub async fn apply_credit_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let note_agg: AggregateId = match parse_id(&id, "credit note id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let note_id = InvoiceId::new(note_agg);

    let note = match services.load_invoice(tenant.tenant_id(), note_id) {
        Ok(Some(inv)) => inv,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "credit note not found");
        }
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    let Some(original_id) = note.original_invoice_id() else {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_credit_note_source",
            "document does not reference an original invoice",
        );
    };
    let original = match services.load_invoice(tenant.tenant_id(), original_id) {
        Ok(Some(inv)) => inv,
        Ok(None) => {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                "original invoice not found",
            );
        }
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let app = match application(&original, &note) {
        Ok(v) => v,
        Err(e) => return errors::dispatch_error_to_response(e.into()),
    };

    if let Err(e) = services.dispatch_invoice(
        tenant.tenant_id(),
        original_id,
        InvoiceCommand::ApplyCredit(ApplyCredit {
            tenant_id: tenant.tenant_id(),
            invoice_id: original_id,
            credit_note_id: note_id,
            amount: app.amount,
            occurred_at: Utc::now(),
        }),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    match services.dispatch_invoice(
        tenant.tenant_id(),
        note_id,
        InvoiceCommand::MarkCreditNoteApplied(MarkCreditNoteApplied {
            tenant_id: tenant.tenant_id(),
            invoice_id: note_id,
            occurred_at: Utc::now(),
        }),
    ) {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "original_invoice_id": original_id.to_string(),
                "credit_note_id": note_id.to_string(),
                "amount": app.amount,
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeStatusRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let invoice_id = InvoiceId::new(agg);

    let next: InvoiceStatus = match errors::parse_enum(&body.status, "invoice status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = InvoiceCommand::ChangeInvoiceStatus(ChangeInvoiceStatus {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        next,
        occurred_at: Utc::now(),
    });

    match services.dispatch_invoice(tenant.tenant_id(), invoice_id, cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let invoice_id = InvoiceId::new(agg);

    let method: PaymentMethod = match errors::parse_enum(&body.method, "payment method") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = InvoiceCommand::RecordPayment(RecordPayment {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        amount: body.amount,
        method,
        reference_number: body.reference_number,
        occurred_at: Utc::now(),
    });

    match services.dispatch_invoice(tenant.tenant_id(), invoice_id, cmd) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "invoice id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.invoice_get(tenant.tenant_id(), &InvoiceId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::invoice_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .invoice_list(tenant.tenant_id())
        .into_iter()
        .map(dto::invoice_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn list_open_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .invoice_list_open(tenant.tenant_id())
        .into_iter()
        .map(dto::invoice_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
