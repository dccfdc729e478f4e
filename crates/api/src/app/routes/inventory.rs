use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use rust_decimal::Decimal;

use stockflow_core::AggregateId;
use stockflow_inventory::{
    AdjustStock, CreateItem, InventoryCommand, InventoryItemId, RepriceItem,
};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_item).get(list_items))
        .route("/:id", get(get_item))
        .route("/:id/adjust", post(adjust_stock))
        .route("/:id/reprice", post(reprice_item))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let item_id = InventoryItemId::new(agg);

    let cmd = InventoryCommand::CreateItem(CreateItem {
        tenant_id: tenant.tenant_id(),
        item_id,
        name: body.name,
        sku: body.sku,
        unit_price: body.unit_price,
        occurred_at: Utc::now(),
    });

    match services.dispatch_item(tenant.tenant_id(), item_id, cmd) {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id = InventoryItemId::new(agg);

    let cmd = InventoryCommand::AdjustStock(AdjustStock {
        tenant_id: tenant.tenant_id(),
        item_id,
        delta: body.delta,
        occurred_at: Utc::now(),
    });

    match services.dispatch_item(tenant.tenant_id(), item_id, cmd) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn reprice_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RepriceItemRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id = InventoryItemId::new(agg);

    let unit_price: Decimal = body.unit_price;
    let cmd = InventoryCommand::RepriceItem(RepriceItem {
        tenant_id: tenant.tenant_id(),
        item_id,
        unit_price,
        occurred_at: Utc::now(),
    });

    match services.dispatch_item(tenant.tenant_id(), item_id, cmd) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match parse_id(&id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.item_get(tenant.tenant_id(), &InventoryItemId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::item_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .item_list(tenant.tenant_id())
        .into_iter()
        .map(dto::item_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
