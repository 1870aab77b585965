//! Catalog lookups beyond the uniform CRUD contract.
//!
//! ```text
//!   GET /api/stock                          stock index, batches oldest first
//!   GET /api/product-detail/by-product/:id  batches of one product
//!   GET /api/product/by-supplier/:id        products of one supplier
//!   GET /api/order-form/by-supplier/:id     purchase orders of one supplier
//! ```

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use kho_core::stock::StockIndex;
use kho_core::{OrderForm, Product, ProductDetail};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/stock", get(stock))
        .route("/api/product-detail/by-product/:id", get(batches_of_product))
        .route("/api/product/by-supplier/:id", get(products_of_supplier))
        .route("/api/order-form/by-supplier/:id", get(order_forms_of_supplier))
}

async fn stock(State(state): State<AppState>) -> ApiResult<Json<StockIndex>> {
    Ok(Json(state.db.product_details().stock_index().await?))
}

async fn batches_of_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ProductDetail>>> {
    Ok(Json(state.db.product_details().list_by_product(&id).await?))
}

async fn products_of_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.products().list_by_supplier(&id).await?))
}

async fn order_forms_of_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<OrderForm>>> {
    Ok(Json(state.db.order_forms().list_by_supplier(&id).await?))
}
