//! # kho-api
//!
//! REST server for the Kho back-office: catalog, batches, purchasing,
//! checkout with batch settlement, and revenue reports.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP request                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  TraceLayer (span per request) → CorsLayer                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  require_auth (only when auth.enforce)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  handler: parse → kho-db repository → Json / ApiError                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::middleware;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::KhoConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Builds the full router.
pub fn app(state: AppState) -> Router {
    error::set_support_contact(state.config.support_contact.clone());

    let mut api = routes::api_routes();
    if state.config.auth.enforce {
        api = api.route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));
    }

    Router::new()
        .merge(api)
        .merge(routes::auth::routes())
        .merge(routes::health::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
