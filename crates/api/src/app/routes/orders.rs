use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;
use rust_decimal::Decimal;

use stockflow_core::{AggregateId, CustomerId, ItemId};
use stockflow_inventory::InventoryItemId;
use stockflow_orders::{
    AddLine, ChangeOrderStatus, CreateSalesOrder, PipelineStage, RecordLineQuantity, RemoveLine,
    SalesOrderCommand, SalesOrderId, SalesOrderStatus,
};

use crate::app::routes::common::{parse_id, parse_opt_id};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/lines", post(add_line))
        .route("/:id/lines/:line_no", delete(remove_line))
        .route("/:id/status", post(change_status))
        .route("/:id/quantities", post(record_quantity))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateSalesOrderRequest>,
) -> axum::response::Response {
    let customer_id: Option<CustomerId> =
        match parse_opt_id(body.customer_id.as_deref(), "customer id") {
            Ok(v) => v,
            Err(resp) => return resp,
        };

    let agg = AggregateId::new();
    let order_id = SalesOrderId::new(agg);
    let display_id = services.next_display_id("SO");

    let cmd = SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
        tenant_id: tenant.tenant_id(),
        order_id,
        display_id: display_id.clone(),
        customer_id,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(tenant.tenant_id(), order_id, cmd) {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"id": agg.to_string(), "display_id": display_id})),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateOrderLineRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order_id = SalesOrderId::new(agg);

    // Snapshot item master data when an item reference is given; explicit
    // body fields win over the snapshot.
    let item_agg: Option<AggregateId> = match parse_opt_id(body.item_id.as_deref(), "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let snapshot = item_agg
        .and_then(|a| services.item_get(tenant.tenant_id(), &InventoryItemId::new(a)));

    let item_name = match body.item_name.or_else(|| snapshot.as_ref().map(|s| s.name.clone())) {
        Some(v) => v,
        None => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "item_name is required when no known item_id is given",
            );
        }
    };
    let sku = body.sku.or_else(|| snapshot.as_ref().and_then(|s| s.sku.clone()));
    let unit_price = match body.unit_price.or_else(|| snapshot.as_ref().map(|s| s.unit_price)) {
        Some(v) => v,
        None => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "unit_price is required when no known item_id is given",
            );
        }
    };

    let cmd = SalesOrderCommand::AddLine(AddLine {
        tenant_id: tenant.tenant_id(),
        order_id,
        item_id: item_agg.map(|a| ItemId::from_uuid(*a.as_uuid())),
        item_name,
        sku,
        quantity: body.quantity,
        unit_price,
        discount_percent: body.discount_percent.unwrap_or(Decimal::ZERO),
        tax_rate: body.tax_rate.unwrap_or(Decimal::ZERO),
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(tenant.tenant_id(), order_id, cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path((id, line_no)): Path<(String, u32)>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order_id = SalesOrderId::new(agg);

    let cmd = SalesOrderCommand::RemoveLine(RemoveLine {
        tenant_id: tenant.tenant_id(),
        order_id,
        line_no,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(tenant.tenant_id(), order_id, cmd) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeStatusRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order_id = SalesOrderId::new(agg);

    let next: SalesOrderStatus = match errors::parse_enum(&body.status, "sales order status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = SalesOrderCommand::ChangeOrderStatus(ChangeOrderStatus {
        tenant_id: tenant.tenant_id(),
        order_id,
        next,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(tenant.tenant_id(), order_id, cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordQuantityRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order_id = SalesOrderId::new(agg);

    let stage: PipelineStage = match errors::parse_enum(&body.stage, "pipeline stage") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = SalesOrderCommand::RecordLineQuantity(RecordLineQuantity {
        tenant_id: tenant.tenant_id(),
        order_id,
        line_no: body.line_no,
        stage,
        quantity: body.quantity,
        occurred_at: Utc::now(),
    });

    match services.dispatch_order(tenant.tenant_id(), order_id, cmd) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.order_get(tenant.tenant_id(), &SalesOrderId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::sales_order_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "sales order not found"),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .order_list(tenant.tenant_id())
        .into_iter()
        .map(dto::sales_order_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
