//! Login and session routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use kho_core::{Account, User};
use kho_db::CrudRepository;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub account: Account,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub account: Account,
    pub user: Option<User>,
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(request) = payload?;
    let account = state
        .db
        .accounts()
        .verify_credentials(&request.username, &request.password)
        .await?;

    let access_token = state.jwt.generate_access_token(&account)?;
    info!(account_id = %account.id, username = %account.username, "Login");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.jwt.lifetime_secs(),
        account,
    }))
}

async fn me(State(state): State<AppState>, AuthUser(claims): AuthUser) -> ApiResult<Json<MeResponse>> {
    let account = state.db.accounts().get(&claims.sub).await?;
    let user = state.db.users().find_by_account(&account.id).await?;
    Ok(Json(MeResponse { account, user }))
}
