//! `GET /api/report/revenue?type=hour|day|month|year|product|category|top_products`

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, NaiveDate, Utc};
use tracing::debug;

use kho_core::report::{ReportParams, ReportQuery, RevenueReport};

use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/report/revenue", get(revenue))
}

/// Today on the shop's wall clock.
pub(crate) fn local_today(utc_offset_minutes: i32) -> NaiveDate {
    (Utc::now() + Duration::minutes(utc_offset_minutes as i64)).date_naive()
}

async fn revenue(
    State(state): State<AppState>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> ApiResult<Json<RevenueReport>> {
    let Query(params) = params?;
    let offset = state.utc_offset_minutes();

    let query = ReportQuery::from_params(params, local_today(offset))?;
    debug!(report = query.name(), "Revenue report requested");

    Ok(Json(state.db.reports().revenue(&query, offset).await?))
}
