//! # Uniform CRUD Routes
//!
//! One router per [`CrudRepository`] implementation:
//!
//! ```text
//!   GET    /api/{collection}        list          200  [entity]
//!   POST   /api/{collection}        create        201  entity
//!   DELETE /api/{collection}        delete all    200  {"deletedCount": n}
//!   GET    /api/{collection}/:id    get           200  entity
//!   PATCH  /api/{collection}/:id    update        200  entity
//!   PUT    /api/{collection}/:id    update        200  entity
//!   DELETE /api/{collection}/:id    delete        200  {"_id": id, "deleted": true}
//! ```

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use kho_db::CrudRepository;

use crate::error::ApiResult;
use crate::state::AppState;

pub fn crud_routes<R>() -> Router<AppState>
where
    R: CrudRepository + 'static,
{
    let base = format!("/api/{}", R::COLLECTION.path());

    Router::new()
        .route(
            &base,
            get(list::<R>).post(create::<R>).delete(delete_all::<R>),
        )
        .route(
            &format!("{}/:id", base),
            get(get_one::<R>)
                .patch(update::<R>)
                .put(update::<R>)
                .delete(delete_one::<R>),
        )
}

pub(crate) fn repo<R: CrudRepository>(state: &AppState) -> R {
    R::from_pool(state.db.pool().clone())
}

async fn list<R: CrudRepository>(State(state): State<AppState>) -> ApiResult<Json<Vec<R::Entity>>> {
    Ok(Json(repo::<R>(&state).list().await?))
}

async fn get_one<R: CrudRepository>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<R::Entity>> {
    Ok(Json(repo::<R>(&state).get(&id).await?))
}

async fn create<R: CrudRepository>(
    State(state): State<AppState>,
    payload: Result<Json<R::Create>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<R::Entity>)> {
    let Json(input) = payload?;
    let entity = repo::<R>(&state).create(input).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

async fn update<R: CrudRepository>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<R::Update>, JsonRejection>,
) -> ApiResult<Json<R::Entity>> {
    let Json(patch) = payload?;
    Ok(Json(repo::<R>(&state).update(&id, patch).await?))
}

async fn delete_one<R: CrudRepository>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    repo::<R>(&state).delete(&id).await?;
    info!(collection = R::COLLECTION.path(), id = %id, "Deleted");
    Ok(Json(json!({ "_id": id, "deleted": true })))
}

async fn delete_all<R: CrudRepository>(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let deleted = repo::<R>(&state).delete_all().await?;
    info!(collection = R::COLLECTION.path(), deleted, "Deleted all");
    Ok(Json(json!({ "deletedCount": deleted })))
}
