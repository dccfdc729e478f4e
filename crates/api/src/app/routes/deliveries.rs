use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use stockflow_core::{AggregateId, CustomerId, ItemId};
use stockflow_orders::SalesOrderId;
use stockflow_picking::PickListId;
use stockflow_shipping::{
    AddDeliveryLine, AssignCarrier, ChangeDeliveryStatus, CreateDeliveryOrder,
    DeliveryOrderCommand, DeliveryOrderId, DeliveryOrderStatus, RecordDelivery,
};

use crate::app::routes::common::{parse_id, parse_opt_id};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_delivery).get(list_deliveries))
        .route("/:id", get(get_delivery))
        .route("/:id/lines", post(add_line))
        .route("/:id/carrier", post(assign_carrier))
        .route("/:id/deliveries", post(record_delivery))
        .route("/:id/status", post(change_status))
}

pub async fn create_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateDeliveryOrderRequest>,
) -> axum::response::Response {
    let sales_order: Option<AggregateId> =
        match parse_opt_id(body.sales_order_id.as_deref(), "sales order id") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
    let pick_list: Option<AggregateId> =
        match parse_opt_id(body.pick_list_id.as_deref(), "pick list id") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
    let customer_id: Option<CustomerId> =
        match parse_opt_id(body.customer_id.as_deref(), "customer id") {
            Ok(v) => v,
            Err(resp) => return resp,
        };

    let agg = AggregateId::new();
    let delivery_order_id = DeliveryOrderId::new(agg);
    let display_id = services.next_display_id("DO");

    let cmd = DeliveryOrderCommand::CreateDeliveryOrder(CreateDeliveryOrder {
        tenant_id: tenant.tenant_id(),
        delivery_order_id,
        display_id: display_id.clone(),
        sales_order_id: sales_order.map(SalesOrderId::new),
        pick_list_id: pick_list.map(PickListId::new),
        customer_id,
        shipping_address: body.shipping_address,
        occurred_at: Utc::now(),
    });

    match services.dispatch_delivery(tenant.tenant_id(), delivery_order_id, cmd) {
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
    Json(body): Json<dto::AddDeliveryLineRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "delivery order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let delivery_order_id = DeliveryOrderId::new(agg);

    let item_id: Option<ItemId> = match parse_opt_id(body.item_id.as_deref(), "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = DeliveryOrderCommand::AddDeliveryLine(AddDeliveryLine {
        tenant_id: tenant.tenant_id(),
        delivery_order_id,
        sales_order_line_no: body.sales_order_line_no,
        item_id,
        item_name: body.item_name,
        quantity_shipped: body.quantity_shipped,
        occurred_at: Utc::now(),
    });

    match services.dispatch_delivery(tenant.tenant_id(), delivery_order_id, cmd) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn assign_carrier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignCarrierRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "delivery order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let delivery_order_id = DeliveryOrderId::new(agg);

    let cmd = DeliveryOrderCommand::AssignCarrier(AssignCarrier {
        tenant_id: tenant.tenant_id(),
        delivery_order_id,
        carrier: body.carrier,
        tracking_number: body.tracking_number,
        occurred_at: Utc::now(),
    });

    match services.dispatch_delivery(tenant.tenant_id(), delivery_order_id, cmd) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordDeliveryRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "delivery order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let delivery_order_id = DeliveryOrderId::new(agg);

    let cmd = DeliveryOrderCommand::RecordDelivery(RecordDelivery {
        tenant_id: tenant.tenant_id(),
        delivery_order_id,
        line_no: body.line_no,
        quantity_delivered: body.quantity_delivered,
        occurred_at: Utc::now(),
    });

    match services.dispatch_delivery(tenant.tenant_id(), delivery_order_id, cmd) {
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
    let agg: AggregateId = match parse_id(&id, "delivery order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let delivery_order_id = DeliveryOrderId::new(agg);

    let next: DeliveryOrderStatus = match errors::parse_enum(&body.status, "delivery order status")
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = DeliveryOrderCommand::ChangeDeliveryStatus(ChangeDeliveryStatus {
        tenant_id: tenant.tenant_id(),
        delivery_order_id,
        next,
        occurred_at: Utc::now(),
    });

    match services.dispatch_delivery(tenant.tenant_id(), delivery_order_id, cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "delivery order id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.delivery_get(tenant.tenant_id(), &DeliveryOrderId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::delivery_to_json(rm))).into_response(),
        None => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "delivery order not found",
        ),
    }
}

pub async fn list_deliveries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .delivery_list(tenant.tenant_id())
        .into_iter()
        .map(dto::delivery_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
