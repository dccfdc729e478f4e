use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use stockflow_core::{AggregateId, ItemId};
use stockflow_orders::{AttachPickList, SalesOrderCommand, SalesOrderId};
use stockflow_picking::{
    AddPickItem, ChangePickListStatus, CreatePickList, PickListCommand, PickListId,
    PickListStatus, RecordPick,
};

use crate::app::routes::common::{parse_id, parse_opt_id};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_pick_list).get(list_pick_lists))
        .route("/:id", get(get_pick_list))
        .route("/:id/items", post(add_item))
        .route("/:id/picks", post(record_pick))
        .route("/:id/status", post(change_status))
}

pub async fn create_pick_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreatePickListRequest>,
) -> axum::response::Response {
    let sales_order_agg: Option<AggregateId> =
        match parse_opt_id(body.sales_order_id.as_deref(), "sales order id") {
            Ok(v) => v,
            Err(resp) => return resp,
        };

    let agg = AggregateId::new();
    let pick_list_id = PickListId::new(agg);
    let display_id = services.next_display_id("PL");

    let cmd = PickListCommand::CreatePickList(CreatePickList {
        tenant_id: tenant.tenant_id(),
        pick_list_id,
        display_id: display_id.clone(),
        sales_order_id: sales_order_agg.map(SalesOrderId::new),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch_pick_list(tenant.tenant_id(), pick_list_id, cmd) {
        return errors::dispatch_error_to_response(e);
    }

    // Link the source order back to its pick list.
    if let Some(order_agg) = sales_order_agg {
        let attach = SalesOrderCommand::AttachPickList(AttachPickList {
            tenant_id: tenant.tenant_id(),
            order_id: SalesOrderId::new(order_agg),
            pick_list_id: agg,
            occurred_at: Utc::now(),
        });
        if let Err(e) =
            services.dispatch_order(tenant.tenant_id(), SalesOrderId::new(order_agg), attach)
        {
            return errors::dispatch_error_to_response(e);
        }
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "display_id": display_id})),
    )
        .into_response()
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddPickItemRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "pick list id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let pick_list_id = PickListId::new(agg);

    let item_id: Option<ItemId> = match parse_opt_id(body.item_id.as_deref(), "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PickListCommand::AddPickItem(AddPickItem {
        tenant_id: tenant.tenant_id(),
        pick_list_id,
        sales_order_line_no: body.sales_order_line_no,
        item_id,
        item_name: body.item_name,
        requested_quantity: body.requested_quantity,
        occurred_at: Utc::now(),
    });

    match services.dispatch_pick_list(tenant.tenant_id(), pick_list_id, cmd) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_pick(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPickRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "pick list id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let pick_list_id = PickListId::new(agg);

    let cmd = PickListCommand::RecordPick(RecordPick {
        tenant_id: tenant.tenant_id(),
        pick_list_id,
        line_no: body.line_no,
        picked_quantity: body.picked_quantity,
        occurred_at: Utc::now(),
    });

    match services.dispatch_pick_list(tenant.tenant_id(), pick_list_id, cmd) {
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
    let agg: AggregateId = match parse_id(&id, "pick list id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let pick_list_id = PickListId::new(agg);

    let next: PickListStatus = match errors::parse_enum(&body.status, "pick list status") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = PickListCommand::ChangePickListStatus(ChangePickListStatus {
        tenant_id: tenant.tenant_id(),
        pick_list_id,
        next,
        occurred_at: Utc::now(),
    });

    match services.dispatch_pick_list(tenant.tenant_id(), pick_list_id, cmd) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_pick_list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "pick list id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.pick_list_get(tenant.tenant_id(), &PickListId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::pick_list_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "pick list not found"),
    }
}

pub async fn list_pick_lists(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .pick_list_list(tenant.tenant_id())
        .into_iter()
        .map(dto::pick_list_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
