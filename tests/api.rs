use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use retail_portal::config::PortalConfig;
use retail_portal::domain::aggregates::{BestSellers, OrderStatus, RawItemRow, RawStockRow};
use retail_portal::domain::fulfillment::SentRecord;
use retail_portal::routes::router;
use retail_portal::services::EventPublisher;
use retail_portal::state::AppState;
use retail_portal::store::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_last_reference(1000));
    let items: Vec<RawItemRow> = serde_json::from_value(json!([
        { "Style": "A039", "Barcode": "B1", "Color": "SKIN", "Color Name": "Skin", "Size": "32B", "MRP": "1,299" },
        { "Style": "A039", "Barcode": "B2", "Color": "SKIN", "Color Name": "Skin", "Size": "34B", "MRP": "1,299" },
        { "Style": "F074", "Barcode": "B3", "Color": "BLACK", "Size": "M", "MRP": "699" },
    ])).unwrap();
    let stock: Vec<RawStockRow> = serde_json::from_value(json!([
        { "item name": "A039", "color": "SKIN", "size": "32B", "quantity": 40 },
        { "item name": "A039", "color": "SKIN", "size": "34B", "quantity": 3 },
    ])).unwrap();
    store.set_catalog(items, stock).await;

    let config = PortalConfig {
        host: [127, 0, 0, 1].into(), port: 0, database_url: None, database_max_connections: 1,
        nats_url: None, best_sellers: BestSellers::new(["F074"]), reference_attempts: 3,
    };
    let state = AppState::new(store.clone(), EventPublisher::disabled(), &config);
    state.catalog.refresh().await;
    (router(state), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn health() {
    let (app, _) = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn catalog_lists_best_sellers_first() {
    let (app, _) = app().await;
    let (status, body) = send(&app, "GET", "/api/v1/catalog", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["products"][0]["style"], "F074");

    let (_, body) = send(&app, "GET", "/api/v1/catalog?search=a03", None).await;
    assert_eq!(body["total"], 1);

    let (status, body) = send(&app, "GET", "/api/v1/catalog/A039", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalStock"], 43);
    assert_eq!(body["variantStock"][0]["color"]["code"], "SKIN");
    assert_eq!(body["variantStock"][0]["variants"][1]["stockLabel"], "Only 3 left");

    let (status, _) = send(&app, "GET", "/api/v1/catalog/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cart_flow_and_order_submission() {
    let (app, store) = app().await;
    let cart = "/api/v1/retailers/shop-1/cart";

    let (status, body) = send(&app, "POST", cart, Some(json!({ "barcode": "B1", "quantity": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalItems"], 2);

    send(&app, "POST", cart, Some(json!({ "barcode": "B1", "quantity": 3 }))).await;
    let (_, body) = send(&app, "POST", cart, Some(json!({ "barcode": "B2", "quantity": 5 }))).await;
    assert_eq!(body["lines"].as_array().unwrap().len(), 2);
    assert_eq!(body["stockIssues"][0]["kind"], "exceeds_stock");

    let (_, body) = send(&app, "PUT", &format!("{cart}/B2"), Some(json!({ "quantity": 0 }))).await;
    assert_eq!(body["totalItems"], 5);

    let (status, order) = send(&app, "POST", "/api/v1/retailers/shop-1/orders", Some(json!({ "orderNote": "deliver Monday" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["referenceNumber"], 1001);
    assert_eq!(order["totalQuantity"], 5);
    assert_eq!(order["status"], "Approval Pending");

    let (_, body) = send(&app, "GET", cart, None).await;
    assert_eq!(body["totalItems"], 0);

    let (status, body) = send(&app, "POST", "/api/v1/retailers/shop-1/orders", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Your cart is empty");

    store.set_order_status(1001, OrderStatus::Approved, Some("ops")).await;
    store.push_sent(serde_json::from_value::<SentRecord>(json!({ "orderNumber": 1001, "billedItems": [{ "barcode": "B1", "quantity": 2 }] })).unwrap()).await;
    let (status, body) = send(&app, "GET", "/api/v1/retailers/shop-1/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"][0]["status"], "Partially Fulfilled");
    assert_eq!(body["orders"][0]["badge"], "blue");
    assert_eq!(body["orders"][0]["sentQuantity"], 2);
}

#[tokio::test]
async fn adding_unknown_or_out_of_stock_variant_is_refused() {
    let (app, _) = app().await;
    let cart = "/api/v1/retailers/shop-1/cart";
    let (status, _) = send(&app, "POST", cart, Some(json!({ "barcode": "NOPE", "quantity": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", cart, Some(json!({ "barcode": "B3", "quantity": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "POST", cart, Some(json!({ "barcode": "B1", "quantity": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_retailer_is_unauthenticated() {
    let (app, _) = app().await;
    let (status, _) = send(&app, "GET", "/api/v1/retailers/%20/cart", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn quick_order_verifies_and_adds() {
    let (app, _) = app().await;
    let uri = "/api/v1/retailers/shop-2/quick-order";
    let text = "A039,32B,SKIN,4\n\nA039,XL,SKIN,1\nbad line\n";

    let (status, body) = send(&app, "POST", uri, Some(json!({ "text": text }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["found"], 1);
    assert_eq!(body["errors"], 2);
    assert_eq!(body["report"]["lines"][1]["status"], "Variant not found");
    assert_eq!(body["report"]["lines"][2]["lineNumber"], 4);

    let (_, body) = send(&app, "POST", uri, Some(json!({ "text": text, "addToCart": true }))).await;
    assert_eq!(body["added"], 1);
    assert_eq!(body["cart"]["totalItems"], 4);

    let (status, body) = send(&app, "POST", uri, Some(json!({ "text": "bad line", "addToCart": true }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request: No valid items to add");
}

#[tokio::test]
async fn closing_the_session_reloads_the_saved_cart() {
    let (app, _) = app().await;
    let cart = "/api/v1/retailers/shop-3/cart";
    send(&app, "POST", cart, Some(json!({ "barcode": "B1", "quantity": 2 }))).await;

    let (status, _) = send(&app, "DELETE", "/api/v1/retailers/shop-3/session", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", cart, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalItems"], 2);
}
