use reqwest::StatusCode;
use serde_json::json;

use stockflow_core::{TenantId, UserId};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = stockflow_api::app::build_app();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn tenant_headers(
    builder: reqwest::RequestBuilder,
    tenant_id: TenantId,
    user_id: UserId,
) -> reqwest::RequestBuilder {
    builder
        .header("x-tenant-id", tenant_id.to_string())
        .header("x-user-id", user_id.to_string())
}

async fn get_eventually(
    client: &reqwest::Client,
    url: &str,
    tenant_id: TenantId,
    user_id: UserId,
) -> serde_json::Value {
    // The API is intentionally eventual-consistent (command path vs projection
    // update). Poll briefly until the projection catches up.
    for _ in 0..100 {
        let res = tenant_headers(client.get(url), tenant_id, user_id)
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("resource did not become visible in projection within timeout");
}

#[tokio::test]
async fn requests_without_tenant_header_are_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/items", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn item_lifecycle_round_trips_through_the_api() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let user_id = UserId::new();

    // Create an item.
    let res = tenant_headers(
        client.post(format!("{}/items", server.base_url)),
        tenant_id,
        user_id,
    )
    .json(&json!({"name": "Widget A", "sku": "WID-A", "unit_price": "50"}))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let item_id = body["id"].as_str().unwrap().to_string();

    // Adjust stock.
    let res = tenant_headers(
        client.post(format!("{}/items/{}/adjust", server.base_url, item_id)),
        tenant_id,
        user_id,
    )
    .json(&json!({"delta": 25}))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let item = get_eventually(
        &client,
        &format!("{}/items/{}", server.base_url, item_id),
        tenant_id,
        user_id,
    )
    .await;
    assert_eq!(item["name"], "Widget A");

    // Another tenant cannot see it.
    let res = tenant_headers(
        client.get(format!("{}/items/{}", server.base_url, item_id)),
        TenantId::new(),
        user_id,
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_workflow_enforces_the_transition_table() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let user_id = UserId::new();

    // Create an order with one line.
    let res = tenant_headers(
        client.post(format!("{}/orders", server.base_url)),
        tenant_id,
        user_id,
    )
    .json(&json!({}))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let order_id = body["id"].as_str().unwrap().to_string();
    assert!(body["display_id"].as_str().unwrap().starts_with("SO-"));

    let res = tenant_headers(
        client.post(format!("{}/orders/{}/lines", server.base_url, order_id)),
        tenant_id,
        user_id,
    )
    .json(&json!({"item_name": "Widget A", "quantity": 5, "unit_price": "100", "tax_rate": "8"}))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Draft cannot jump straight to shipped.
    let res = tenant_headers(
        client.post(format!("{}/orders/{}/status", server.base_url, order_id)),
        tenant_id,
        user_id,
    )
    .json(&json!({"status": "shipped"}))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["error"], "invalid_transition");

    // Submitting is fine, and the read model shows derived totals.
    let res = tenant_headers(
        client.post(format!("{}/orders/{}/status", server.base_url, order_id)),
        tenant_id,
        user_id,
    )
    .json(&json!({"status": "submitted"}))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let order = get_eventually(
        &client,
        &format!("{}/orders/{}", server.base_url, order_id),
        tenant_id,
        user_id,
    )
    .await;
    // 5 * 100 = 500, plus 8% tax = 540.
    let total: rust_decimal::Decimal = order["totals"]["total"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(total, rust_decimal_macros::dec!(540));
    assert_eq!(order["lines"][0]["quantity_ordered"], 5);
}
