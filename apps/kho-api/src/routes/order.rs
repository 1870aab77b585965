//! # Order Routes
//!
//! ```text
//!   GET    /api/order              list orders (with items)
//!   POST   /api/order              checkout or save draft  → {order, settlement}
//!   DELETE /api/order              delete all (no inventory reversal)
//!   PATCH  /api/order/draft        {orderId, payment_method} → paid + settled
//!   GET    /api/order/:id
//!   DELETE /api/order/:id          hard delete, no inventory reversal
//!   POST   /api/order/:id/settle   settle a paid order that never was
//! ```

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use kho_core::inputs::{CompleteDraft, NewOrder};
use kho_core::settlement::SettlementOutcome;
use kho_core::Order;
use kho_db::CheckoutOutcome;

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/order", get(list).post(create).delete(delete_all))
        .route("/api/order/draft", patch(complete_draft))
        .route("/api/order/:id", get(get_one).delete(delete_one))
        .route("/api/order/:id/settle", post(settle))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.db.orders().list().await?))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Order>> {
    Ok(Json(state.db.orders().get(&id).await?))
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CheckoutOutcome>)> {
    let Json(input) = payload?;
    let outcome = state.db.orders().create(input, state.shortfall_policy()).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn complete_draft(
    State(state): State<AppState>,
    payload: Result<Json<CompleteDraft>, JsonRejection>,
) -> ApiResult<Json<CheckoutOutcome>> {
    let Json(input) = payload?;
    let outcome = state
        .db
        .orders()
        .complete_draft(input, state.shortfall_policy())
        .await?;
    Ok(Json(outcome))
}

async fn settle(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<SettlementOutcome>> {
    let outcome = state.db.orders().settle(&id, state.shortfall_policy()).await?;
    Ok(Json(outcome))
}

async fn delete_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state.db.orders().delete(&id).await?;
    Ok(Json(json!({ "_id": id, "deleted": true })))
}

async fn delete_all(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let deleted = state.db.orders().delete_all().await?;
    Ok(Json(json!({ "deletedCount": deleted })))
}
