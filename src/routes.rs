//! HTTP surface.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::domain::aggregates::{CartLedger, CartLine, Catalog, Product, ProductVariant, StockIssue};
use crate::domain::quick_order::{QuickOrderParser, QuickOrderReport};
use crate::domain::value_objects::{Barcode, ColorRef, RetailerId, StockLevel};
use crate::services::{CartChange, HistoryFetch, RefreshOutcome};
use crate::state::AppState;
use crate::{PortalError, Result};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "retail-portal"})) }))
        .route("/api/v1/catalog", get(list_catalog))
        .route("/api/v1/catalog/refresh", post(refresh_catalog))
        .route("/api/v1/catalog/:style", get(get_product))
        .route("/api/v1/retailers/:retailer/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/api/v1/retailers/:retailer/cart/:barcode", put(update_quantity).delete(remove_from_cart))
        .route("/api/v1/retailers/:retailer/orders", get(order_history).post(submit_order))
        .route("/api/v1/retailers/:retailer/quick-order", post(quick_order))
        .route("/api/v1/retailers/:retailer/session", delete(close_session))
        .with_state(state)
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::EmptyCart | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
        }
        (status, Json(serde_json::json!({ "error": self.to_string(), "retryable": self.is_retryable() }))).into_response()
    }
}

fn retailer(raw: &str) -> Result<RetailerId> { RetailerId::new(raw).map_err(|_| PortalError::Unauthenticated) }

fn validated<T: Validate>(req: T) -> Result<T> {
    req.validate().map_err(|e| PortalError::InvalidRequest(e.to_string()))?;
    Ok(req)
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CatalogParams { pub search: Option<String>, pub page: Option<usize> }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPageResponse { pub products: Vec<Product>, pub page: usize, pub total_pages: usize, pub total: usize }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantResponse {
    #[serde(flatten)]
    pub variant: ProductVariant,
    pub stock_level: StockLevel,
    pub stock_label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorVariants {
    pub color: ColorRef,
    pub variants: Vec<VariantResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub total_stock: u64,
    pub variant_stock: Vec<ColorVariants>,
}

async fn list_catalog(State(s): State<AppState>, Query(p): Query<CatalogParams>) -> Json<CatalogPageResponse> {
    let catalog = s.catalog.current().await;
    let page = catalog.page(p.search.as_deref().unwrap_or(""), p.page.unwrap_or(1));
    Json(CatalogPageResponse {
        products: page.products.into_iter().cloned().collect(),
        page: page.page, total_pages: page.total_pages, total: page.total,
    })
}

async fn refresh_catalog(State(s): State<AppState>) -> Result<Json<serde_json::Value>> {
    let refresh = s.catalog.refresh().await;
    if let RefreshOutcome::Failed(reason) = refresh.outcome {
        return Err(PortalError::BackendUnavailable(reason));
    }
    Ok(Json(serde_json::json!({ "outcome": refresh.outcome, "products": refresh.catalog.len() })))
}

async fn get_product(State(s): State<AppState>, Path(style): Path<String>) -> Result<Json<ProductResponse>> {
    let catalog = s.catalog.current().await;
    let product = catalog.get(&style).ok_or_else(|| PortalError::NotFound(format!("style {style}")))?;
    let variant_stock = product.colors.iter().map(|color| ColorVariants {
        color: color.clone(),
        variants: product.variants_for_color(&color.code).map(|v| VariantResponse {
            stock_level: v.stock_level(), stock_label: v.stock_level().label(), variant: v.clone(),
        }).collect(),
    }).collect();
    Ok(Json(ProductResponse { total_stock: product.total_stock(), variant_stock, product: product.clone() }))
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub lines: Vec<CartLine>,
    pub total_items: u64,
    pub total_amount: Decimal,
    pub stock_issues: Vec<StockIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_error: Option<String>,
}

impl CartResponse {
    fn new(cart: &CartLedger, catalog: &Catalog, persist_error: Option<String>) -> Self {
        Self {
            lines: cart.lines().to_vec(), total_items: cart.total_items(), total_amount: cart.total_amount(),
            stock_issues: cart.stock_issues(catalog), persist_error,
        }
    }

    async fn from_change(s: &AppState, change: CartChange) -> Json<Self> {
        let catalog = s.catalog.current().await;
        Json(Self::new(&change.cart, &catalog, change.persist_error))
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[validate(length(min = 1, max = 64))]
    pub barcode: String,
    #[validate(range(min = 1, max = 100000))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(range(max = 100000))]
    pub quantity: i64,
}

async fn get_cart(State(s): State<AppState>, Path(r): Path<String>) -> Result<Json<CartResponse>> {
    let session = s.sessions.session(&retailer(&r)?).await;
    let cart = session.cart().await;
    let catalog = s.catalog.current().await;
    Ok(Json(CartResponse::new(&cart, &catalog, None)))
}

async fn add_to_cart(State(s): State<AppState>, Path(r): Path<String>, Json(req): Json<AddToCartRequest>) -> Result<Json<CartResponse>> {
    let req = validated(req)?;
    let retailer = retailer(&r)?;
    let catalog = s.catalog.current().await;
    let variant = catalog.variant(&Barcode::new(&req.barcode)).ok_or_else(|| PortalError::NotFound(format!("barcode {}", req.barcode)))?;
    if !variant.is_in_stock() {
        return Err(PortalError::InvalidRequest(format!("{} {} {} is out of stock", variant.style, variant.color.code, variant.size)));
    }
    let line = CartLine::from_variant(variant, req.quantity);
    let change = s.sessions.session(&retailer).await.add_to_cart(line).await;
    Ok(Json(CartResponse::new(&change.cart, &catalog, change.persist_error)))
}

async fn update_quantity(
    State(s): State<AppState>,
    Path((r, barcode)): Path<(String, String)>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>> {
    let req = validated(req)?;
    let change = s.sessions.session(&retailer(&r)?).await.update_quantity(&Barcode::new(barcode), req.quantity).await;
    Ok(CartResponse::from_change(&s, change).await)
}

async fn remove_from_cart(State(s): State<AppState>, Path((r, barcode)): Path<(String, String)>) -> Result<Json<CartResponse>> {
    let change = s.sessions.session(&retailer(&r)?).await.remove_from_cart(&Barcode::new(barcode)).await;
    Ok(CartResponse::from_change(&s, change).await)
}

async fn clear_cart(State(s): State<AppState>, Path(r): Path<String>) -> Result<Json<CartResponse>> {
    let change = s.sessions.session(&retailer(&r)?).await.clear_cart().await;
    Ok(CartResponse::from_change(&s, change).await)
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    #[validate(length(max = 500))]
    pub order_note: Option<String>,
}

async fn submit_order(
    State(s): State<AppState>,
    Path(r): Path<String>,
    body: Option<Json<SubmitOrderRequest>>,
) -> Result<impl IntoResponse> {
    let req = validated(body.map(|Json(b)| b).unwrap_or_default())?;
    let session = s.sessions.session(&retailer(&r)?).await;
    let order = s.orders.submit(&session, req.order_note).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Logout teardown. The next request for the retailer loads the cart afresh.
async fn close_session(State(s): State<AppState>, Path(r): Path<String>) -> Result<StatusCode> {
    s.sessions.close(&retailer(&r)?).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn order_history(State(s): State<AppState>, Path(r): Path<String>) -> Result<Json<HistoryFetch>> {
    let session = s.sessions.session(&retailer(&r)?).await;
    Ok(Json(s.orders.history(&session).await?))
}

// =============================================================================
// Quick order
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuickOrderRequest {
    #[validate(length(min = 1, max = 100000))]
    pub text: String,
    #[serde(default)]
    pub add_to_cart: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickOrderResponse {
    pub report: QuickOrderReport,
    pub found: usize,
    pub errors: usize,
    pub added: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart: Option<CartResponse>,
}

async fn quick_order(State(s): State<AppState>, Path(r): Path<String>, Json(req): Json<QuickOrderRequest>) -> Result<Json<QuickOrderResponse>> {
    let req = validated(req)?;
    let retailer = retailer(&r)?;
    let catalog = s.catalog.current().await;
    let report = QuickOrderParser::new(&catalog).verify(&req.text);
    let (found, errors) = (report.found_count(), report.error_count());
    if !req.add_to_cart {
        return Ok(Json(QuickOrderResponse { report, found, errors, added: 0, cart: None }));
    }
    if found == 0 {
        return Err(PortalError::InvalidRequest("No valid items to add".into()));
    }
    let lines: Vec<CartLine> = report.found().map(|(variant, qty)| CartLine::from_variant(variant, qty)).collect();
    let change = s.sessions.session(&retailer).await.add_lines(lines).await;
    let cart = CartResponse::new(&change.cart, &catalog, change.persist_error);
    Ok(Json(QuickOrderResponse { report, found, errors, added: found, cart: Some(cart) }))
}
